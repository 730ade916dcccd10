//! Pair scoring and the two-queue pair pool.

pub mod pool;
pub mod similarity;
