//! Configuration for Coact
//!
//! TigerStyle: Explicit defaults, validation, reasonable limits.

use crate::constants::*;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Main configuration for Coact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoactConfig {
    /// Scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl CoactConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.scheduler.validate()?;
        Ok(())
    }
}

/// What `Scheduler::run` does once nothing is runnable
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Return when the run queue is empty and the reactor has no watchers
    #[default]
    UntilIdle,
    /// Keep polling the reactor until it reports a shutdown
    Forever,
}

/// What happens when an actor with no links exits abnormally
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the reason and keep running
    #[default]
    Log,
    /// Log the reason and make the current `run` return an error
    Escalate,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub run_mode: RunMode,

    #[serde(default)]
    pub unlinked_failure: FailurePolicy,

    /// Turn panics inside actor bodies into abnormal exits
    #[serde(default = "default_catch_panics")]
    pub catch_panics: bool,

    /// Longest timeout accepted by a receive filter (milliseconds)
    #[serde(default = "default_receive_timeout_ms_max")]
    pub receive_timeout_ms_max: u64,

    /// Maximum live actors
    #[serde(default = "default_actor_count_max")]
    pub actor_count_max: usize,
}

fn default_catch_panics() -> bool {
    true
}

fn default_receive_timeout_ms_max() -> u64 {
    RECEIVE_TIMEOUT_MS_DEFAULT
}

fn default_actor_count_max() -> usize {
    ACTOR_COUNT_DEFAULT
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_mode: RunMode::default(),
            unlinked_failure: FailurePolicy::default(),
            catch_panics: default_catch_panics(),
            receive_timeout_ms_max: default_receive_timeout_ms_max(),
            actor_count_max: default_actor_count_max(),
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.receive_timeout_ms_max == 0 {
            return Err(Error::InvalidConfiguration {
                field: "scheduler.receive_timeout_ms_max".into(),
                reason: "must be positive".into(),
            });
        }

        if self.receive_timeout_ms_max > RECEIVE_TIMEOUT_MS_MAX {
            return Err(Error::InvalidConfiguration {
                field: "scheduler.receive_timeout_ms_max".into(),
                reason: format!(
                    "{} exceeds limit {}",
                    self.receive_timeout_ms_max, RECEIVE_TIMEOUT_MS_MAX
                ),
            });
        }

        if self.actor_count_max == 0 {
            return Err(Error::InvalidConfiguration {
                field: "scheduler.actor_count_max".into(),
                reason: "must be positive".into(),
            });
        }

        if self.actor_count_max > ACTOR_COUNT_MAX {
            return Err(Error::InvalidConfiguration {
                field: "scheduler.actor_count_max".into(),
                reason: format!("{} exceeds limit {}", self.actor_count_max, ACTOR_COUNT_MAX),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CoactConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scheduler.run_mode, RunMode::UntilIdle);
        assert_eq!(config.scheduler.unlinked_failure, FailurePolicy::Log);
        assert!(config.scheduler.catch_panics);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: CoactConfig =
            serde_json::from_str(r#"{"scheduler": {"run_mode": "forever"}}"#).unwrap();
        assert_eq!(config.scheduler.run_mode, RunMode::Forever);
        assert_eq!(
            config.scheduler.receive_timeout_ms_max,
            RECEIVE_TIMEOUT_MS_DEFAULT
        );
        assert_eq!(config.scheduler.actor_count_max, ACTOR_COUNT_DEFAULT);
    }

    #[test]
    fn test_invalid_receive_timeout() {
        let mut config = CoactConfig::default();
        config.scheduler.receive_timeout_ms_max = RECEIVE_TIMEOUT_MS_MAX + 1;
        assert!(config.validate().is_err());

        config.scheduler.receive_timeout_ms_max = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_actor_count() {
        let mut config = SchedulerConfig {
            actor_count_max: 0,
            ..SchedulerConfig::default()
        };
        assert!(config.validate().is_err());

        config.actor_count_max = ACTOR_COUNT_MAX + 1;
        assert!(config.validate().is_err());
    }
}
