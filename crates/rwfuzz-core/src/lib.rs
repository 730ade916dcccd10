//! Run orchestration for the read/write-set conflict fuzzer: configuration,
//! the per-run context, journals, ledger cluster control, and the campaign
//! that drives every stage in order.

pub mod campaign;
pub mod cluster;
pub mod config;
pub mod context;
pub mod logging;

pub use campaign::Campaign;
pub use cluster::{ClusterControl, ClusterError};
pub use config::{ClusterConfig, ConfigError, DeployConfig, RunConfig};
pub use context::RunContext;
