//! Mutation search over candidate pairs.
//!
//! Each scheduling turn either hands the front confirmed conflict to a
//! [`ConflictSink`] or spends one iteration budget hill-climbing the front
//! mutation candidate. A candidate that crosses the conflict threshold is
//! promoted; one that exhausts its budget goes to the back of the queue
//! with whatever similarity it reached.

use rand::Rng;
use rwfuzz_ir::{ContractInfo, FuncPairSeed, ValuePath};
use rwfuzz_ledger::ExecutionService;
use serde::{Deserialize, Serialize};

use crate::pairing::pool::FuncPairSeedsPool;
use crate::pairing::similarity::{max_similarity, CONFLICT_THRESHOLD};
use crate::seeding::mutate::Mutator;
use crate::seeding::seed::refresh_rw_sets;
use crate::targets;

/// Receiver of confirmed conflict pairs.
pub trait ConflictSink {
    fn validate(&mut self, pair: &FuncPairSeed);
}

/// Sink that keeps every pair it is handed.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub validated: Vec<FuncPairSeed>,
}

impl ConflictSink for CollectingSink {
    fn validate(&mut self, pair: &FuncPairSeed) {
        self.validated.push(pair.clone());
    }
}

/// Configuration for the mutation scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Mutations tried per candidate per turn.
    pub iteration_budget: usize,
    /// Similarity above which a pair is a confirmed conflict.
    pub threshold: f64,
    /// Stop after this many turns even if work remains.
    pub max_rounds: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            iteration_budget: 10_000,
            threshold: CONFLICT_THRESHOLD,
            max_rounds: None,
        }
    }
}

/// Result of searching one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Promoted { pair: FuncPairSeed, iterations: usize },
    Exhausted { pair: FuncPairSeed },
    /// The pair has no related paths to mutate.
    Unmutatable { pair: FuncPairSeed },
}

/// What one scheduling turn did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Validated,
    Promoted,
    Requeued,
    Dropped,
    Idle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub rounds: u64,
    pub validated: u64,
    pub promoted: u64,
    pub requeued: u64,
    pub dropped: u64,
}

pub struct MutationScheduler<'a, S: ExecutionService + ?Sized> {
    service: &'a S,
    info: &'a ContractInfo,
    mutator: Mutator,
    config: SchedulerConfig,
}

impl<'a, S: ExecutionService + ?Sized> MutationScheduler<'a, S> {
    pub fn new(
        service: &'a S,
        info: &'a ContractInfo,
        mutator: Mutator,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            service,
            info,
            mutator,
            config,
        }
    }

    /// Drain the pool, or stop at `max_rounds`.
    pub fn run<K: ConflictSink + ?Sized>(
        &mut self,
        pool: &mut FuncPairSeedsPool,
        sink: &mut K,
    ) -> SchedulerStats {
        let mut stats = SchedulerStats::default();
        while !pool.is_empty() {
            if self.config.max_rounds.is_some_and(|max| stats.rounds >= max) {
                tracing::info!(
                    target: targets::EXECUTION,
                    rounds = stats.rounds,
                    conflicts = pool.conflict_len(),
                    candidates = pool.mutate_len(),
                    "round limit reached"
                );
                break;
            }
            match self.turn(pool, sink, stats.rounds) {
                TurnOutcome::Validated => stats.validated += 1,
                TurnOutcome::Promoted => stats.promoted += 1,
                TurnOutcome::Requeued => stats.requeued += 1,
                TurnOutcome::Dropped => stats.dropped += 1,
                TurnOutcome::Idle => break,
            }
            stats.rounds += 1;
        }
        stats
    }

    /// One scheduling turn. Confirmed conflicts take priority.
    pub fn turn<K: ConflictSink + ?Sized>(
        &mut self,
        pool: &mut FuncPairSeedsPool,
        sink: &mut K,
        round: u64,
    ) -> TurnOutcome {
        if let Some(pair) = pool.pop_conflict() {
            let (one, two) = pair.function_names();
            tracing::info!(target: targets::EXECUTION, round, one, two, "validating conflict pair");
            tracing::info!(target: targets::CONFLICT, round, "{}", pair);
            sink.validate(&pair);
            tracing::info!(target: targets::EXECUTION, round, "conflict pair validated");
            return TurnOutcome::Validated;
        }

        let Some(pair) = pool.pop_mutation() else {
            return TurnOutcome::Idle;
        };
        tracing::info!(target: targets::EXECUTION, round, "mutating candidate pair");
        tracing::info!(target: targets::FUZZ, round, "start: {}", pair);

        match self.search(pair) {
            SearchOutcome::Promoted { pair, iterations } => {
                tracing::info!(
                    target: targets::FUZZ,
                    round,
                    iterations,
                    similarity = pair.max_similarity,
                    "conflict found: {}",
                    pair
                );
                if !pool.offer_conflict(pair) {
                    tracing::info!(target: targets::FUZZ, round, "function pair already queued as conflict");
                }
                TurnOutcome::Promoted
            }
            SearchOutcome::Exhausted { pair } => {
                tracing::info!(
                    target: targets::FUZZ,
                    round,
                    similarity = pair.max_similarity,
                    "budget exhausted; requeued"
                );
                pool.requeue_mutation(pair);
                TurnOutcome::Requeued
            }
            SearchOutcome::Unmutatable { pair } => {
                let (one, two) = pair.function_names();
                tracing::warn!(target: targets::FUZZ, round, one, two, "no related paths; dropped");
                TurnOutcome::Dropped
            }
        }
    }

    /// Hill-climb one pair for up to the iteration budget.
    pub fn search(&mut self, mut pair: FuncPairSeed) -> SearchOutcome {
        let total = related_paths(&pair).count();
        if total == 0 {
            return SearchOutcome::Unmutatable { pair };
        }

        for iteration in 0..self.config.iteration_budget {
            let pick = self.mutator.rng().gen_range(0..total);
            let Some((first_side, path)) = related_paths(&pair).nth(pick) else {
                break;
            };
            let path = path.clone();

            let mut candidate = pair.clone();
            let seed = if first_side {
                &mut candidate.seed_one
            } else {
                &mut candidate.seed_two
            };
            let invoke_name = self.info.invoke_name(&seed.function_name).to_string();
            self.mutator.mutate_at(&mut seed.function_input, &path);
            refresh_rw_sets(self.service, &invoke_name, seed);
            candidate.max_similarity = max_similarity(&candidate.seed_one, &candidate.seed_two);

            if candidate.max_similarity > self.config.threshold {
                return SearchOutcome::Promoted {
                    pair: candidate,
                    iterations: iteration + 1,
                };
            }
            if candidate.max_similarity > pair.max_similarity {
                tracing::debug!(
                    target: targets::FUZZ,
                    iteration,
                    from = pair.max_similarity,
                    to = candidate.max_similarity,
                    "climbed"
                );
                pair = candidate;
            }
        }
        SearchOutcome::Exhausted { pair }
    }
}

/// The four related-path lists of a pair, in order: first seed read, first
/// seed write, second seed read, second seed write. Yields
/// `(is_first_seed, path)`.
fn related_paths(pair: &FuncPairSeed) -> impl Iterator<Item = (bool, &ValuePath)> {
    let one = &pair.seed_one;
    let two = &pair.seed_two;
    one.read_related_value_paths
        .iter()
        .chain(&one.write_related_value_paths)
        .map(|p| (true, p))
        .chain(
            two.read_related_value_paths
                .iter()
                .chain(&two.write_related_value_paths)
                .map(|p| (false, p)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rwfuzz_ir::{FuncSeed, FunctionDescriptor, FunctionInput, Value};
    use rwfuzz_ledger::{find_arg, MockCall, MockLedger};

    fn seed(name: &str, param: &str, value: Value) -> FuncSeed {
        let mut input = FunctionInput::new();
        input.insert(param.into(), value);
        FuncSeed::new(name, input)
    }

    #[test]
    fn test_related_paths_order() {
        let mut one = seed("a", "x", Value::int(0));
        one.write_related_value_paths.push(ValuePath::param("x"));
        let mut two = seed("b", "y", Value::int(0));
        two.read_related_value_paths.push(ValuePath::param("y"));
        let pair = FuncPairSeed {
            seed_one: one,
            seed_two: two,
            max_similarity: 0.0,
            mutability: true,
        };
        let sides: Vec<bool> = related_paths(&pair).map(|(side, _)| side).collect();
        assert_eq!(sides, vec![true, false]);
    }

    #[test]
    fn test_unmutatable_pair_dropped() {
        let ledger = MockLedger::new();
        let info = ContractInfo::new("c");
        let pair = FuncPairSeed {
            seed_one: seed("a", "x", Value::int(0)),
            seed_two: seed("b", "y", Value::int(0)),
            max_similarity: 0.1,
            mutability: true,
        };
        let mut pool = FuncPairSeedsPool::new();
        pool.offer_mutation(pair);
        let mut scheduler = MutationScheduler::new(
            &ledger,
            &info,
            Mutator::from_seed(0, 2),
            SchedulerConfig::default(),
        );
        let stats = scheduler.run(&mut pool, &mut CollectingSink::default());
        assert_eq!(stats.dropped, 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_exhausted_pair_is_requeued_with_climbed_state() {
        // Reads "slot#<x>" where x only ever grows; writes a fixed key.
        let ledger = MockLedger::new()
            .on("reader", |args| {
                let x =
                    String::from_utf8_lossy(find_arg(args, "x").unwrap_or_default()).into_owned();
                MockCall::ok([format!("slot#{}", x)], Vec::<String>::new())
            })
            .on("writer", |_| MockCall::ok(Vec::<String>::new(), ["zzzzzzzz"]));
        let mut info = ContractInfo::new("c");
        info.add_function(FunctionDescriptor::new("reader", vec!["x".into()]));
        info.add_function(FunctionDescriptor::new("writer", vec![]));

        let mut one = seed("reader", "x", Value::string("aaaa"));
        one.read_set = vec!["slot#aaaa".into()];
        one.read_related_value_paths.push(ValuePath::param("x"));
        let mut two = FuncSeed::new("writer", FunctionInput::new());
        two.write_set = vec!["zzzzzzzz".into()];
        let start = max_similarity(&one, &two);
        let pair = FuncPairSeed {
            seed_one: one,
            seed_two: two,
            max_similarity: start,
            mutability: true,
        };

        let mut scheduler = MutationScheduler::new(
            &ledger,
            &info,
            Mutator::from_seed(3, 2),
            SchedulerConfig {
                iteration_budget: 200,
                ..SchedulerConfig::default()
            },
        );
        match scheduler.search(pair) {
            SearchOutcome::Exhausted { pair } => assert!(pair.max_similarity >= start),
            other => panic!("expected exhaustion, got {:?}", other),
        }
        assert_eq!(ledger.dry_run_count(), 200);
    }
}
