//! Run configuration.
//!
//! Loaded from an optional JSON file; every field falls back to its
//! default when absent. Command-line flags are applied on top by the
//! binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rwfuzz_experiment::ExperimentConfig;
use rwfuzz_explore::search::SchedulerConfig;
use rwfuzz_explore::seeding::confirm::ConfirmConfig;
use rwfuzz_ledger::LedgerConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Shell commands that bring the ledger cluster up and down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub start_command: Option<String>,
    pub stop_command: Option<String>,
    /// Directory both commands run in.
    pub working_dir: Option<PathBuf>,
    /// Pause after start and deploy before the first call (default: 5).
    pub settle_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            start_command: None,
            stop_command: None,
            working_dir: None,
            settle_secs: 5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Contract bytecode to install before the campaign. Unset means the
    /// contract is already deployed.
    pub bytecode_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Ledger JSON-RPC endpoint (default: http://127.0.0.1:12301/rpc).
    pub endpoint: String,
    /// Parent of every run directory (default: ./result).
    pub result_root: PathBuf,
    /// Global RNG seed; each stage derives its own stream.
    pub seed: u64,
    pub rpc_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Run the mutation search but skip load experiments.
    pub skip_experiments: bool,
    pub cluster: ClusterConfig,
    pub deploy: DeployConfig,
    pub confirm: ConfirmConfig,
    pub scheduler: SchedulerConfig,
    pub experiment: ExperimentConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:12301/rpc".into(),
            result_root: PathBuf::from("./result"),
            seed: 0,
            rpc_timeout_secs: 30,
            connect_timeout_secs: 10,
            skip_experiments: false,
            cluster: ClusterConfig::default(),
            deploy: DeployConfig::default(),
            confirm: ConfirmConfig::default(),
            scheduler: SchedulerConfig::default(),
            experiment: ExperimentConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn ledger_config(&self, contract: &str) -> LedgerConfig {
        LedgerConfig {
            endpoint: self.endpoint.clone(),
            contract: contract.to_string(),
            timeout: Duration::from_secs(self.rpc_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}
