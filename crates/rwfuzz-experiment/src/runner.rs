//! Conflict validation experiments.
//!
//! For a confirmed pair, every configured call ratio is replayed as rounds
//! of concurrent submissions. The runner then waits for the node's
//! transaction pool to drain, and looks up each record's final status. A
//! sustained run at a fixed ratio closes the experiment. Every step writes
//! its artifacts on a best-effort basis; artifact failures are logged and
//! the experiment carries on.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rwfuzz_explore::search::ConflictSink;
use rwfuzz_explore::targets;
use rwfuzz_ir::{ContractInfo, FuncPairSeed};
use rwfuzz_ledger::{encode_args, ExecutionService, KeyValuePair};
use serde::{Deserialize, Serialize};

use crate::render::{draw_grid, drops_per_second, plot_drops};
use crate::tx::{save_txs, ArtifactError, Tx, TxLog};
use crate::worker::WorkerPool;

/// Near-capacity load held for a long stretch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SustainedConfig {
    /// Calls to the first and second function per round.
    pub ratio: (usize, usize),
    pub rounds: usize,
    pub round_delay_ms: u64,
    /// Reference line drawn on the drop plot, in transactions per second.
    pub capacity: u32,
}

impl Default for SustainedConfig {
    fn default() -> Self {
        Self {
            ratio: (85, 85),
            rounds: 600,
            round_delay_ms: 1000,
            capacity: 170,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// `(calls to A, calls to B)` per round, one experiment each.
    pub ratios: Vec<(usize, usize)>,
    pub rounds: usize,
    pub round_delay_ms: u64,
    /// Concurrent submissions and lookups.
    pub workers: usize,
    /// Spacing of pool-status polls while waiting for the pool to drain.
    pub poll_interval_ms: u64,
    /// Records shown in each grid image.
    pub grid_limit: usize,
    pub sustained: SustainedConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            ratios: vec![(1, 99), (30, 70), (50, 50), (70, 30), (99, 1)],
            rounds: 100,
            round_delay_ms: 0,
            workers: 20,
            poll_interval_ms: 30_000,
            grid_limit: 1000,
            sustained: SustainedConfig::default(),
        }
    }
}

/// Per-ratio tallies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatioOutcome {
    pub ratio: (usize, usize),
    pub sent: usize,
    pub arrived: usize,
    pub executed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentSummary {
    /// Where artifacts went, if the directory could be created.
    pub dir: Option<PathBuf>,
    pub ratios: Vec<RatioOutcome>,
    pub sustained_sent: usize,
    pub sustained_dropped: usize,
}

/// A pair's two calls, encoded once.
struct PairCalls {
    first: (String, Arc<Vec<KeyValuePair>>),
    second: (String, Arc<Vec<KeyValuePair>>),
}

pub struct ExperimentRunner {
    service: Arc<dyn ExecutionService>,
    info: ContractInfo,
    run_dir: PathBuf,
    config: ExperimentConfig,
    workers: WorkerPool,
    summaries: Vec<ExperimentSummary>,
}

impl ExperimentRunner {
    pub fn new(
        service: Arc<dyn ExecutionService>,
        info: ContractInfo,
        run_dir: impl Into<PathBuf>,
        config: ExperimentConfig,
    ) -> Self {
        let workers = WorkerPool::new(config.workers);
        Self {
            service,
            info,
            run_dir: run_dir.into(),
            config,
            workers,
            summaries: Vec::new(),
        }
    }

    /// Summaries of every experiment run so far.
    pub fn summaries(&self) -> &[ExperimentSummary] {
        &self.summaries
    }

    /// Run the ratio sweep and the sustained run for one pair.
    pub fn run(&self, pair: &FuncPairSeed) -> ExperimentSummary {
        let (first, second) = pair.function_names();
        let stamp = chrono::Utc::now().timestamp();
        let dir = self.run_dir.join(format!("{}_{}_{}", first, second, stamp));
        let dir = match std::fs::create_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(target: targets::CONFLICT, dir = %dir.display(), "experiment directory");
                Some(dir)
            }
            Err(err) => {
                tracing::warn!(
                    target: targets::CONFLICT,
                    dir = %dir.display(),
                    error = %err,
                    "cannot create experiment directory; artifacts will be skipped"
                );
                None
            }
        };

        let calls = self.pair_calls(pair);
        let mut summary = ExperimentSummary {
            dir: dir.clone(),
            ratios: Vec::new(),
            sustained_sent: 0,
            sustained_dropped: 0,
        };

        for &(a, b) in &self.config.ratios {
            let txs = self.ratio_experiment(&calls, a, b);
            let outcome = RatioOutcome {
                ratio: (a, b),
                sent: txs.len(),
                arrived: txs.iter().filter(|tx| tx.arrived()).count(),
                executed: txs.iter().filter(|tx| tx.executed()).count(),
            };
            tracing::info!(
                target: targets::CONFLICT,
                ratio = %format!("{}:{}", a, b),
                sent = outcome.sent,
                arrived = outcome.arrived,
                executed = outcome.executed,
                "ratio experiment finished"
            );
            if let Some(dir) = &dir {
                self.write_ratio_artifacts(dir, a, b, &txs);
            }
            summary.ratios.push(outcome);
        }

        let txs = self.sustained_experiment(&calls);
        summary.sustained_sent = txs.len();
        summary.sustained_dropped = txs
            .iter()
            .filter(|tx| !tx.send_status.is_success())
            .count();
        if let Some(dir) = &dir {
            report(
                "LongTermExperiment.json",
                save_txs(&txs, &dir.join("LongTermExperiment.json")),
            );
            report(
                "LongTermExperiment.png",
                plot_drops(
                    &drops_per_second(&txs),
                    self.config.sustained.capacity,
                    &dir.join("LongTermExperiment.png"),
                ),
            );
        }
        summary
    }

    /// Send `a:b` for the configured rounds, drain the pool, then resolve
    /// every record.
    fn ratio_experiment(&self, calls: &PairCalls, a: usize, b: usize) -> Vec<Tx> {
        tracing::info!(target: targets::CONFLICT, ratio = %format!("{}:{}", a, b), "running ratio experiment");
        let txs = self.send_rounds(calls, a, b, self.config.rounds, self.config.round_delay_ms);
        tracing::info!(target: targets::CONFLICT, count = txs.len(), "transactions generated");
        self.wait_for_empty_pool();
        self.resolve_statuses(txs)
    }

    /// Hold the sustained load, then drain the pool. Records keep their send
    /// outcome only.
    fn sustained_experiment(&self, calls: &PairCalls) -> Vec<Tx> {
        let sustained = &self.config.sustained;
        tracing::info!(
            target: targets::CONFLICT,
            ratio = %format!("{}:{}", sustained.ratio.0, sustained.ratio.1),
            rounds = sustained.rounds,
            "starting sustained run"
        );
        let txs = self.send_rounds(
            calls,
            sustained.ratio.0,
            sustained.ratio.1,
            sustained.rounds,
            sustained.round_delay_ms,
        );
        tracing::info!(target: targets::CONFLICT, count = txs.len(), "sustained run finished");
        self.wait_for_empty_pool();
        txs
    }

    fn send_rounds(
        &self,
        calls: &PairCalls,
        a: usize,
        b: usize,
        rounds: usize,
        delay_ms: u64,
    ) -> Vec<Tx> {
        let log = Arc::new(TxLog::new());
        for _ in 0..rounds {
            let jobs = std::iter::repeat(&calls.first)
                .take(a)
                .chain(std::iter::repeat(&calls.second).take(b))
                .map(|(method, args)| {
                    let service = Arc::clone(&self.service);
                    let log = Arc::clone(&log);
                    let method = method.clone();
                    let args = Arc::clone(args);
                    move || {
                        let outcome = service.invoke_async(&method, &args);
                        log.push(Tx::from_send(outcome, chrono::Utc::now().timestamp_millis()));
                    }
                });
            self.workers.run_batch(jobs);
            if delay_ms > 0 {
                std::thread::sleep(Duration::from_millis(delay_ms));
            }
        }
        log.take_sorted()
    }

    /// Block until the node reports no pending or queued transactions. A
    /// failed status query ends the wait.
    pub fn wait_for_empty_pool(&self) {
        tracing::info!(target: targets::CONFLICT, "waiting for the transaction pool to drain");
        loop {
            match self.service.get_pool_status() {
                Ok(status) if status.total() == 0 => {
                    tracing::info!(target: targets::CONFLICT, "transaction pool is empty");
                    return;
                }
                Ok(status) => {
                    tracing::info!(
                        target: targets::CONFLICT,
                        pending = status.total(),
                        retry_ms = self.config.poll_interval_ms,
                        "transaction pool not empty"
                    );
                    std::thread::sleep(Duration::from_millis(self.config.poll_interval_ms));
                }
                Err(err) => {
                    tracing::warn!(target: targets::CONFLICT, error = %err, "pool status query failed");
                    return;
                }
            }
        }
    }

    /// Look up each record: on chain takes the ledger's result, otherwise
    /// the record notes whether it is still pooled. Order is preserved.
    pub fn resolve_statuses(&self, txs: Vec<Tx>) -> Vec<Tx> {
        let shared = Arc::new(Mutex::new(txs));
        let pending: Vec<(usize, String)> = shared
            .lock()
            .unwrap()
            .iter()
            .enumerate()
            .filter(|(_, tx)| !tx.on_chain && !tx.tx_id.is_empty())
            .map(|(i, tx)| (i, tx.tx_id.clone()))
            .collect();

        let jobs = pending.into_iter().map(|(i, tx_id)| {
            let service = Arc::clone(&self.service);
            let shared = Arc::clone(&shared);
            move || {
                let on_chain = match service.get_transaction(&tx_id) {
                    Ok(found) => found,
                    Err(err) => {
                        tracing::debug!(target: targets::CONFLICT, tx_id = %tx_id, error = %err, "lookup failed");
                        return;
                    }
                };
                let in_pool = match &on_chain {
                    Some(_) => false,
                    None => match service.get_transactions_in_pool(std::slice::from_ref(&tx_id)) {
                        Ok(ids) => !ids.is_empty(),
                        Err(err) => {
                            tracing::debug!(target: targets::CONFLICT, tx_id = %tx_id, error = %err, "pool lookup failed");
                            return;
                        }
                    },
                };
                let mut txs = shared.lock().unwrap();
                let tx = &mut txs[i];
                match on_chain {
                    Some(status) => {
                        tx.on_chain = true;
                        tx.execute_result = status.code.0;
                        tx.execute_message = status.message;
                    }
                    None => tx.in_pool = in_pool,
                }
            }
        });
        self.workers.run_batch(jobs);

        let mut txs = shared.lock().unwrap();
        std::mem::take(&mut *txs)
    }

    fn pair_calls(&self, pair: &FuncPairSeed) -> PairCalls {
        let call = |seed: &rwfuzz_ir::FuncSeed| {
            (
                self.info.invoke_name(&seed.function_name).to_string(),
                Arc::new(encode_args(&seed.function_input)),
            )
        };
        PairCalls {
            first: call(&pair.seed_one),
            second: call(&pair.seed_two),
        }
    }

    fn write_ratio_artifacts(&self, dir: &Path, a: usize, b: usize, txs: &[Tx]) {
        let stem = format!("{}_{}", a, b);
        let shown = &txs[..txs.len().min(self.config.grid_limit)];

        report(&stem, save_txs(txs, &dir.join(format!("{}.json", stem))));
        let arrived: Vec<bool> = shown.iter().map(Tx::arrived).collect();
        report(&stem, draw_grid(&arrived, &dir.join(format!("{}_loss.png", stem))));
        let executed: Vec<bool> = shown.iter().map(Tx::executed).collect();
        report(&stem, draw_grid(&executed, &dir.join(format!("{}_execute.png", stem))));
    }
}

fn report(artifact: &str, result: Result<(), ArtifactError>) {
    if let Err(err) = result {
        tracing::warn!(target: targets::CONFLICT, artifact, error = %err, "artifact not written");
    }
}

impl ConflictSink for ExperimentRunner {
    fn validate(&mut self, pair: &FuncPairSeed) {
        let summary = self.run(pair);
        self.summaries.push(summary);
    }
}
