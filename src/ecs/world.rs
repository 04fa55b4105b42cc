//! World - owns every entity and its behavior manager

use ahash::AHashMap;

use crate::behavior::BehaviorManager;
use crate::core::config::SchedulerConfig;
use crate::core::types::{EntityId, EntityKind};
use crate::ecs::EntityRegistry;

struct EntityRecord {
    kind: EntityKind,
    name: String,
    marked_for_deletion: bool,
    manager: Option<BehaviorManager>,
}

/// The game world containing all entities
pub struct World {
    pub current_frame: u64,
    entity_registry: AHashMap<EntityId, EntityRecord>,
    spawn_order: Vec<EntityId>,
    config: SchedulerConfig,
}

impl World {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            current_frame: 0,
            entity_registry: AHashMap::new(),
            spawn_order: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn spawn(&mut self, kind: EntityKind, name: impl Into<String>) -> EntityId {
        let entity_id = EntityId::new();
        let manager = BehaviorManager::new(entity_id, &self.config);

        self.entity_registry.insert(
            entity_id,
            EntityRecord {
                kind,
                name: name.into(),
                marked_for_deletion: false,
                manager: Some(manager),
            },
        );
        self.spawn_order.push(entity_id);

        entity_id
    }

    pub fn name(&self, entity_id: EntityId) -> Option<&str> {
        self.entity_registry
            .get(&entity_id)
            .map(|record| record.name.as_str())
    }

    pub fn manager(&self, entity_id: EntityId) -> Option<&BehaviorManager> {
        self.entity_registry
            .get(&entity_id)
            .and_then(|record| record.manager.as_ref())
    }

    pub fn manager_mut(&mut self, entity_id: EntityId) -> Option<&mut BehaviorManager> {
        self.entity_registry
            .get_mut(&entity_id)
            .and_then(|record| record.manager.as_mut())
    }

    /// Flag an entity for removal at the end of the frame
    ///
    /// From now on messages and slices addressed to it are dropped.
    pub fn mark_for_deletion(&mut self, entity_id: EntityId) -> bool {
        match self.entity_registry.get_mut(&entity_id) {
            Some(record) => {
                record.marked_for_deletion = true;
                true
            }
            None => false,
        }
    }

    /// Remove every entity marked for deletion, returning their ids
    pub fn remove_marked(&mut self) -> Vec<EntityId> {
        let removed: Vec<EntityId> = self
            .spawn_order
            .iter()
            .copied()
            .filter(|id| {
                self.entity_registry
                    .get(id)
                    .is_some_and(|record| record.marked_for_deletion)
            })
            .collect();

        for id in &removed {
            self.entity_registry.remove(id);
        }
        self.spawn_order
            .retain(|id| self.entity_registry.contains_key(id));

        removed
    }

    pub fn entity_count(&self) -> usize {
        self.spawn_order.len()
    }

    pub fn entities_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = EntityId> + '_ {
        self.spawn_order
            .iter()
            .copied()
            .filter(move |id| self.kind_of(*id) == Some(kind))
    }

    pub fn tick(&mut self) {
        self.current_frame += 1;
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityRegistry for World {
    fn contains(&self, id: EntityId) -> bool {
        self.entity_registry.contains_key(&id)
    }

    fn is_marked_for_deletion(&self, id: EntityId) -> bool {
        self.entity_registry
            .get(&id)
            .is_some_and(|record| record.marked_for_deletion)
    }

    fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        self.entity_registry.get(&id).map(|record| record.kind)
    }

    fn entity_ids(&self) -> Vec<EntityId> {
        self.spawn_order.clone()
    }

    fn take_manager(&mut self, id: EntityId) -> Option<BehaviorManager> {
        self.entity_registry
            .get_mut(&id)
            .and_then(|record| record.manager.take())
    }

    fn restore_manager(&mut self, id: EntityId, manager: BehaviorManager) {
        match self.entity_registry.get_mut(&id) {
            Some(record) => record.manager = Some(manager),
            None => tracing::debug!("Entity {} vanished during dispatch", id),
        }
    }
}
