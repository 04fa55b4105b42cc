use crate::core::types::{EntityId, LaneId};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Programmer errors in behavior authoring
///
/// These are never returned to callers. They go through [`fault`], which logs
/// them and halts debug builds.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("{behavior} on entity {entity} requested a second state change in one dispatch")]
    DoubleStateChange {
        entity: EntityId,
        behavior: &'static str,
    },

    #[error("{behavior} on entity {entity} requested a state change inside an Exit handler")]
    ChangeDuringExit {
        entity: EntityId,
        behavior: &'static str,
    },

    #[error("{behavior} on entity {entity} exceeded {limit} state changes in one dispatch (states are flip-flopping)")]
    StateChangeOverflow {
        entity: EntityId,
        behavior: &'static str,
        limit: usize,
    },

    #[error("{behavior} on entity {entity} popped its state with an empty history")]
    EmptyHistory {
        entity: EntityId,
        behavior: &'static str,
    },

    #[error("cannot pop the last behavior on lane {lane} of entity {entity}")]
    PopLastBehavior { entity: EntityId, lane: LaneId },

    #[error("structural change already pending on lane {lane} of entity {entity}")]
    DoubleStructuralChange { entity: EntityId, lane: LaneId },

    #[error("lane {lane} of entity {entity} exceeded {limit} structural changes in one update")]
    StructuralChangeOverflow {
        entity: EntityId,
        lane: LaneId,
        limit: usize,
    },
}

/// Report a fault: logged in every build, panics when debug assertions are on.
///
/// In release builds the caller drops the offending request and carries on.
#[track_caller]
pub fn fault(fault: Fault) {
    tracing::error!(%fault, "behavior fault");
    if cfg!(debug_assertions) {
        panic!("{}", fault);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_messages_name_the_entity() {
        let entity = EntityId::new();
        let text = Fault::PopLastBehavior { entity, lane: 1 }.to_string();
        assert!(text.contains(&entity.to_string()));
        assert!(text.contains("lane 1"));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "empty history")]
    fn test_fault_panics_in_debug() {
        fault(Fault::EmptyHistory {
            entity: EntityId::new(),
            behavior: "Test",
        });
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::InvalidConfig("lane_count must be at least 1".into());
        assert_eq!(
            err.to_string(),
            "Invalid configuration: lane_count must be at least 1"
        );
    }
}
