//! CLI configuration
//!
//! Operational defaults loaded from the environment (prefix `PODPART`),
//! mapped onto the orchestrator's timing knobs.

use anyhow::{Context, Result};
use podpart_lib::OrchestratorConfig;
use serde::Deserialize;
use std::time::Duration;

/// Environment-derived CLI configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CliConfig {
    /// Default namespace when --namespace is not given
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Monitoring tick interval in seconds
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,

    /// Connectivity probe timeout in seconds
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,

    /// Apply/restore command timeout in seconds
    #[serde(default = "default_exec_timeout_secs")]
    pub exec_timeout_secs: u64,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_tick_secs() -> u64 {
    10
}

fn default_probe_timeout_secs() -> u64 {
    3
}

fn default_exec_timeout_secs() -> u64 {
    10
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            tick_secs: default_tick_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            exec_timeout_secs: default_exec_timeout_secs(),
        }
    }
}

impl CliConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("PODPART"))
            .build()?;

        config
            .try_deserialize()
            .context("invalid PODPART_* environment configuration")
    }

    /// Map onto the orchestrator's timing configuration
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            tick_interval: Duration::from_secs(self.tick_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            exec_timeout: Duration::from_secs(self.exec_timeout_secs),
        }
    }
}
