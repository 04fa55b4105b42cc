//! Scheduler configuration with documented constants
//!
//! Every limit the scheduler enforces lives here so a game can tune them from a
//! TOML file instead of recompiling.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Budget applied by `MessageRouter::deliver_slices` each call
///
/// The policy is checked after every delivered slice, so the budget can be
/// overshot by at most one slice.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", content = "constraint", rename_all = "snake_case")]
pub enum SlicePolicy {
    /// Deliver every due slice
    #[default]
    None,
    /// Stop once this many seconds of wall-clock time have been spent
    ConstrainByTime(f64),
    /// Stop once this fraction (0, 1] of all registered slices has been delivered
    ConstrainByProportion(f64),
    /// Stop after this many deliveries
    ConstrainByCount(usize),
}

/// Configuration for the behavior scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Independent behavior stacks per entity
    ///
    /// Lane 0 is conventionally movement/main logic; extra lanes run
    /// concurrently-active behaviors such as UI reactions.
    pub lane_count: usize,

    /// Depth of the per-behavior history used by `pop_state`
    ///
    /// Oldest entries are dropped once the history is full.
    pub history_depth: usize,

    /// Transitions a behavior may resolve in a single dispatch
    ///
    /// Hitting this limit means two states keep switching to each other
    /// from their Enter handlers.
    pub max_state_changes: usize,

    /// Structural changes a lane may resolve in a single manager update
    pub max_structural_changes: usize,

    /// Load-balancing policy for periodic slices
    pub slices: SlicePolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lane_count: 2,
            history_depth: 10,
            max_state_changes: 20,
            max_structural_changes: 20,
            slices: SlicePolicy::None,
        }
    }
}

impl SchedulerConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lanes(mut self, lane_count: usize) -> Self {
        self.lane_count = lane_count;
        self
    }

    pub fn with_slice_policy(mut self, policy: SlicePolicy) -> Self {
        self.slices = policy;
        self
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.lane_count == 0 {
            return Err("lane_count must be at least 1".into());
        }

        if self.history_depth == 0 {
            return Err("history_depth must be at least 1".into());
        }

        if self.max_state_changes == 0 || self.max_structural_changes == 0 {
            return Err("change limits must be at least 1".into());
        }

        match self.slices {
            SlicePolicy::ConstrainByTime(secs) if secs <= 0.0 => {
                Err(format!("slice time budget ({}) must be positive", secs))
            }
            SlicePolicy::ConstrainByProportion(p) if p <= 0.0 || p > 1.0 => Err(format!(
                "slice proportion ({}) must be in (0, 1]",
                p
            )),
            SlicePolicy::ConstrainByCount(0) => Err("slice count must be at least 1".into()),
            _ => Ok(()),
        }
    }

    /// Parse and validate a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SchedulerConfig = toml::from_str(content)?;
        config.validate().map_err(Error::InvalidConfig)?;
        Ok(config)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded scheduler config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.history_depth, 10);
        assert_eq!(config.max_state_changes, 20);
    }

    #[test]
    fn test_parse_count_policy() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            lane_count = 3

            [slices]
            policy = "constrain_by_count"
            constraint = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.lane_count, 3);
        assert_eq!(config.slices, SlicePolicy::ConstrainByCount(4));
        // Unspecified fields fall back to defaults
        assert_eq!(config.max_structural_changes, 20);
    }

    #[test]
    fn test_parse_time_policy() {
        let config = SchedulerConfig::from_toml_str(
            r#"
            [slices]
            policy = "constrain_by_time"
            constraint = 0.002
            "#,
        )
        .unwrap();
        assert_eq!(config.slices, SlicePolicy::ConstrainByTime(0.002));
    }

    #[test]
    fn test_rejects_bad_proportion() {
        let result = SchedulerConfig::from_toml_str(
            r#"
            [slices]
            policy = "constrain_by_proportion"
            constraint = 1.5
            "#,
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_zero_lanes() {
        let config = SchedulerConfig::new().with_lanes(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_reported() {
        let result = SchedulerConfig::from_toml_str("lane_count = \"many\"");
        assert!(matches!(result, Err(Error::TomlError(_))));
    }
}
