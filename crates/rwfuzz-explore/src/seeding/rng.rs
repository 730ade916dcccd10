//! Per-stage RNG seeding with ChaCha8.
//!
//! Each search stage draws from its own ChaCha8Rng seeded from
//! `(global_seed + stage_id)`. Same seed, same mutations.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stage id for related-path probing during seed generation.
pub const STAGE_SEEDING: u64 = 1;
/// Stage id for the mutation search scheduler.
pub const STAGE_MUTATION: u64 = 2;

/// Create a deterministic RNG for a given global seed and stage ID.
pub fn stage_rng(global_seed: u64, stage_id: u64) -> ChaCha8Rng {
    let combined = global_seed.wrapping_add(stage_id);
    ChaCha8Rng::seed_from_u64(combined)
}
