//! Load experiments that check a suspected conflict on a live ledger.
//!
//! A conflict pair is replayed as batches of concurrent submissions at
//! several call ratios, then as a sustained near-capacity run. Every
//! submission becomes a [`Tx`] record; records and summary images are
//! written under a per-pair directory.

pub mod render;
pub mod runner;
pub mod tx;
pub mod worker;

pub use runner::{
    ExperimentConfig, ExperimentRunner, ExperimentSummary, RatioOutcome, SustainedConfig,
};
pub use tx::{ArtifactError, Tx, TxLog};
pub use worker::WorkerPool;
