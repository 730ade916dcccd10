//! Search engine of the read/write-set conflict fuzzer.
//!
//! Stages run in dependency order:
//! [`seeding::confirm`] resolves a working value for every parameter,
//! [`seeding::seed`] records each function's ledger footprint,
//! [`pairing::pool`] scores and classifies seed pairs, and
//! [`search::scheduler`] mutates candidates toward confirmed conflicts.

pub mod pairing;
pub mod search;
pub mod seeding;

/// `tracing` targets for the per-category run journals.
pub mod targets {
    /// Stage progress and contract metadata.
    pub const EXECUTION: &str = "rwfuzz::execution";
    /// Generated seeds and pair classification.
    pub const FUNCSEEDS: &str = "rwfuzz::funcseeds";
    /// Conflict validation experiments.
    pub const CONFLICT: &str = "rwfuzz::conflict";
    /// Mutation search turns.
    pub const FUZZ: &str = "rwfuzz::fuzz";
}
