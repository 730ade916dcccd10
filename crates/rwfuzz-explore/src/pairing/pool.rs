//! The pair pool: confirmed conflicts awaiting validation and mutation
//! candidates awaiting search.
//!
//! Each queue holds at most one pair per unordered function-name pair, and
//! a function-name pair never sits in both queues. The pool persists as a
//! JSON document with `conflict_seeds` and `mutate_seeds` arrays, in queue
//! order.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rwfuzz_ir::FuncPairSeed;
use serde::{Deserialize, Deserializer, Serialize};

use super::similarity::{conflict_potential, max_similarity, CONFLICT_THRESHOLD};
use crate::seeding::seed::FuncSeedsPool;
use crate::targets;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("pool snapshot io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("pool snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where a pair ended up after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Conflict,
    Mutate,
    /// Already represented, or no route to a conflict.
    Discarded,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FuncPairSeedsPool {
    #[serde(rename = "conflict_seeds", default, deserialize_with = "null_as_empty")]
    conflict: VecDeque<FuncPairSeed>,
    #[serde(rename = "mutate_seeds", default, deserialize_with = "null_as_empty")]
    mutate: VecDeque<FuncPairSeed>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<VecDeque<FuncPairSeed>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<VecDeque<FuncPairSeed>>::deserialize(deserializer)?.unwrap_or_default())
}

impl FuncPairSeedsPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Score every unordered seed pair, self-pairs included, and classify
    /// each in enumeration order.
    pub fn build(seeds: &FuncSeedsPool) -> Self {
        let all: Vec<_> = seeds.iter().collect();
        let index_pairs: Vec<(usize, usize)> = (0..all.len())
            .flat_map(|i| (i..all.len()).map(move |j| (i, j)))
            .collect();

        let scored: Vec<FuncPairSeed> = index_pairs
            .par_iter()
            .map(|&(i, j)| FuncPairSeed {
                seed_one: all[i].clone(),
                seed_two: all[j].clone(),
                max_similarity: max_similarity(all[i], all[j]),
                mutability: conflict_potential(all[i], all[j]),
            })
            .collect();

        let mut pool = Self::new();
        for pair in scored {
            let summary = format!(
                "{} x {} similarity={:.2} mutability={}",
                pair.seed_one.function_name,
                pair.seed_two.function_name,
                pair.max_similarity,
                pair.mutability
            );
            let placement = pool.classify(pair);
            tracing::info!(target: targets::FUNCSEEDS, placement = ?placement, "{}", summary);
        }
        tracing::info!(
            target: targets::EXECUTION,
            seeds = all.len(),
            pairs = index_pairs.len(),
            conflicts = pool.conflict.len(),
            candidates = pool.mutate.len(),
            "pair pool built"
        );
        pool
    }

    /// Route one scored pair into the pool.
    pub fn classify(&mut self, pair: FuncPairSeed) -> Placement {
        if pair.max_similarity > CONFLICT_THRESHOLD {
            if self.offer_conflict(pair) {
                return Placement::Conflict;
            }
        } else if pair.mutability && self.offer_mutation(pair) {
            return Placement::Mutate;
        }
        Placement::Discarded
    }

    /// Queue a confirmed conflict unless its function pair is already
    /// queued as one. Any mutation candidate for the same function pair is
    /// dropped.
    pub fn offer_conflict(&mut self, pair: FuncPairSeed) -> bool {
        if self.conflict.iter().any(|p| p.same_functions(&pair)) {
            return false;
        }
        self.mutate.retain(|p| !p.same_functions(&pair));
        self.conflict.push_back(pair);
        true
    }

    /// Queue a mutation candidate unless its function pair is already in
    /// either queue.
    pub fn offer_mutation(&mut self, pair: FuncPairSeed) -> bool {
        if self.contains_functions(&pair) {
            return false;
        }
        self.mutate.push_back(pair);
        true
    }

    pub fn contains_functions(&self, pair: &FuncPairSeed) -> bool {
        self.conflict
            .iter()
            .chain(self.mutate.iter())
            .any(|p| p.same_functions(pair))
    }

    pub fn pop_conflict(&mut self) -> Option<FuncPairSeed> {
        self.conflict.pop_front()
    }

    pub fn pop_mutation(&mut self) -> Option<FuncPairSeed> {
        self.mutate.pop_front()
    }

    /// Put a searched candidate back at the end of the mutation queue.
    pub fn requeue_mutation(&mut self, pair: FuncPairSeed) {
        self.mutate.push_back(pair);
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &FuncPairSeed> {
        self.conflict.iter()
    }

    pub fn mutations(&self) -> impl Iterator<Item = &FuncPairSeed> {
        self.mutate.iter()
    }

    pub fn conflict_len(&self) -> usize {
        self.conflict.len()
    }

    pub fn mutate_len(&self) -> usize {
        self.mutate.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflict.is_empty() && self.mutate.is_empty()
    }

    /// Write the pool as `func_pair_seeds_pool_<contract>_<YYYYMMDD_HHMMSS>.json`
    /// under `dir`, returning the file path.
    pub fn save_to_dir(&self, dir: &Path, contract: &str) -> Result<PathBuf, PoolError> {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("func_pair_seeds_pool_{}_{}.json", contract, stamp));
        self.save(&path)?;
        Ok(path)
    }

    pub fn save(&self, path: &Path) -> Result<(), PoolError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| PoolError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, PoolError> {
        let text = std::fs::read_to_string(path).map_err(|source| PoolError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwfuzz_ir::{FuncSeed, FunctionInput, Value, ValuePath};

    fn seed(name: &str, reads: &[&str], writes: &[&str]) -> FuncSeed {
        let mut seed = FuncSeed::new(name, FunctionInput::new());
        seed.read_set = reads.iter().map(|s| s.to_string()).collect();
        seed.write_set = writes.iter().map(|s| s.to_string()).collect();
        seed
    }

    fn pair(a: &str, b: &str, similarity: f64, mutability: bool) -> FuncPairSeed {
        FuncPairSeed {
            seed_one: seed(a, &[], &[]),
            seed_two: seed(b, &[], &[]),
            max_similarity: similarity,
            mutability,
        }
    }

    #[test]
    fn test_shared_key_lands_in_conflict_queue() {
        let mut seeds = FuncSeedsPool::default();
        seeds.seeds.insert("find".into(), vec![seed("find", &["k1"], &[])]);
        seeds.seeds.insert("save".into(), vec![seed("save", &["k1"], &["k1"])]);

        let pool = FuncPairSeedsPool::build(&seeds);
        let names: Vec<_> = pool.conflicts().map(|p| p.function_names()).collect();
        assert!(names.contains(&("find", "save")));
        assert_eq!(pool.mutate_len(), 0);
        assert!(pool
            .conflicts()
            .all(|p| p.max_similarity > CONFLICT_THRESHOLD));
    }

    #[test]
    fn test_build_enumerates_self_pairs() {
        let mut seeds = FuncSeedsPool::default();
        seeds.seeds.insert("save".into(), vec![seed("save", &["k1"], &["k1"])]);
        let pool = FuncPairSeedsPool::build(&seeds);
        assert_eq!(pool.conflict_len(), 1);
        assert_eq!(pool.conflicts().next().unwrap().function_names(), ("save", "save"));
    }

    #[test]
    fn test_mutable_pair_goes_to_mutate_queue() {
        let mut one = seed("a", &["user#1"], &[]);
        one.read_related_value_paths.push(ValuePath::param("id"));
        let mut two = seed("b", &[], &["user#9"]);
        two.write_related_value_paths.push(ValuePath::param("id"));
        let mut seeds = FuncSeedsPool::default();
        seeds.seeds.insert("a".into(), vec![one]);
        seeds.seeds.insert("b".into(), vec![two]);

        let pool = FuncPairSeedsPool::build(&seeds);
        assert_eq!(pool.conflict_len(), 0);
        assert_eq!(pool.mutate_len(), 1);
        let candidate = pool.mutations().next().unwrap();
        assert!(candidate.mutability);
        assert!(candidate.max_similarity < CONFLICT_THRESHOLD);
    }

    #[test]
    fn test_dedup_by_unordered_names() {
        let mut pool = FuncPairSeedsPool::new();
        assert_eq!(pool.classify(pair("a", "b", 1.0, false)), Placement::Conflict);
        assert_eq!(pool.classify(pair("b", "a", 1.0, false)), Placement::Discarded);
        assert_eq!(pool.classify(pair("a", "b", 0.5, true)), Placement::Discarded);
        assert_eq!(pool.classify(pair("a", "c", 0.5, true)), Placement::Mutate);
        assert_eq!(pool.classify(pair("c", "a", 0.6, true)), Placement::Discarded);
        assert_eq!(pool.classify(pair("c", "c", 0.2, false)), Placement::Discarded);
    }

    #[test]
    fn test_conflict_evicts_candidate_with_same_names() {
        let mut pool = FuncPairSeedsPool::new();
        pool.classify(pair("a", "c", 0.5, true));
        assert_eq!(pool.mutate_len(), 1);
        assert_eq!(pool.classify(pair("c", "a", 1.0, true)), Placement::Conflict);
        assert_eq!(pool.mutate_len(), 0);
        assert_eq!(pool.conflict_len(), 1);
    }

    #[test]
    fn test_queue_rotation() {
        let mut pool = FuncPairSeedsPool::new();
        pool.classify(pair("a", "b", 0.1, true));
        pool.classify(pair("a", "c", 0.1, true));
        let first = pool.pop_mutation().unwrap();
        pool.requeue_mutation(first);
        let order: Vec<_> = pool.mutations().map(|p| p.function_names()).collect();
        assert_eq!(order, vec![("a", "c"), ("a", "b")]);
    }

    #[test]
    fn test_snapshot_keeps_floats_exact() {
        let prices = [9.950000000000001, 4.0248566366484795e-253, 0.1 + 0.2, -1.0 / 3.0];
        let mut pool = FuncPairSeedsPool::new();
        for n in 1..60u32 {
            for k in 1..n {
                let similarity = 1.0 - f64::from(k) / f64::from(n);
                let mut candidate = pair(&format!("f{}", n), &format!("g{}", k), similarity, true);
                let price = f64::from(k) * 0.01 + f64::from(n) * 1.1;
                candidate
                    .seed_one
                    .function_input
                    .insert("price".into(), Value::float(price));
                candidate.seed_two.function_input.insert(
                    "quote".into(),
                    Value::float(prices[(k as usize) % prices.len()]),
                );
                pool.classify(candidate);
            }
        }
        pool.classify(pair("hot", "cold", 1.0 - 1.0 / 199.0, false));
        assert!(pool.mutate_len() > 1000);
        assert_eq!(pool.conflict_len(), 1);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        pool.save(&path).unwrap();
        let restored = FuncPairSeedsPool::load(&path).unwrap();
        assert_eq!(restored, pool);
    }

    #[test]
    fn test_load_accepts_null_arrays() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pool.json");
        std::fs::write(&path, r#"{"conflict_seeds": null, "mutate_seeds": []}"#).unwrap();
        let pool = FuncPairSeedsPool::load(&path).unwrap();
        assert!(pool.is_empty());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FuncPairSeedsPool::load(Path::new("/nope/pool.json")).unwrap_err();
        assert!(matches!(err, PoolError::Io { .. }));
    }
}
