//! Entity registry seen by the scheduler

pub mod world;

use crate::behavior::BehaviorManager;
use crate::core::types::{EntityId, EntityKind};

/// What the router needs from whoever owns the entities
///
/// Managers are checked out with [`take_manager`](EntityRegistry::take_manager)
/// for the duration of a dispatch and handed back with
/// [`restore_manager`](EntityRegistry::restore_manager). While checked out, an
/// entity still `contains` but yields no manager.
pub trait EntityRegistry {
    fn contains(&self, id: EntityId) -> bool;

    fn is_marked_for_deletion(&self, id: EntityId) -> bool;

    fn kind_of(&self, id: EntityId) -> Option<EntityKind>;

    /// Every entity, in a stable order
    fn entity_ids(&self) -> Vec<EntityId>;

    fn take_manager(&mut self, id: EntityId) -> Option<BehaviorManager>;

    fn restore_manager(&mut self, id: EntityId, manager: BehaviorManager);
}

pub use world::World;
