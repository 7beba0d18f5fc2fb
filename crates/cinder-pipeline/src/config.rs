//! Pipeline configuration.
//!
//! Configs are plain serde structs so they can be embedded in an
//! application's own TOML file. Durations are written as humantime
//! strings like "250ms", "5s" or "1m 30s".

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How `sync()` schedules the per-node reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrainMode {
    /// One node at a time, in the order nodes were first addressed.
    #[default]
    Sequential,
    /// All nodes at once. Each node's replies are still matched in order.
    Concurrent,
}

/// Tunables for a [`Pipeline`](crate::Pipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Upper bound on one node's bulk read during drain. A node that
    /// exceeds it fails like a broken connection.
    #[serde(with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub read_timeout: Option<Duration>,

    pub drain_mode: DrainMode,

    /// Initial capacity of each node's reply queue.
    pub initial_queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            read_timeout: None,
            drain_mode: DrainMode::Sequential,
            initial_queue_capacity: 16,
        }
    }
}

impl PipelineConfig {
    /// Parses a config from TOML. Missing fields take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(input)?)
    }
}
