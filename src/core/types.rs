//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First block of the uuid is plenty to tell entities apart in logs
        let text = self.0.simple().to_string();
        f.write_str(&text[..8])
    }
}

/// Entity type tag used by broadcast filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityKind(pub u32);

impl EntityKind {
    pub const fn new(kind: u32) -> Self {
        Self(kind)
    }
}

/// Simulation clock value in seconds
pub type Time = f64;

/// Index of a behavior lane within an entity's behavior manager
pub type LaneId = usize;

/// State index inside a state table
pub type StateId = u32;

/// Substate index inside a state
pub type SubstateId = u32;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ids_are_unique() {
        let a = EntityId::new();
        let b = EntityId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_entity_id_display_is_short() {
        let id = EntityId::new();
        assert_eq!(id.to_string().len(), 8);
    }

    #[test]
    fn test_entity_kind_hash() {
        use std::collections::HashMap;
        let mut map: HashMap<EntityKind, &str> = HashMap::new();
        map.insert(EntityKind::new(1), "guard");
        assert_eq!(map.get(&EntityKind(1)), Some(&"guard"));
    }
}
