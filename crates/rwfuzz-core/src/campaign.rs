//! The campaign: every stage of one fuzzing run, in order.
//!
//! Start-up journals the contract and optionally brings up and deploys to a
//! cluster. A run then either generates a fresh pair pool (confirmation,
//! seeds, pairing, snapshot) or resumes from a snapshot, and finally drives
//! the mutation scheduler until the pool is empty.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use rwfuzz_experiment::ExperimentRunner;
use rwfuzz_explore::pairing::pool::FuncPairSeedsPool;
use rwfuzz_explore::search::{CollectingSink, MutationScheduler, SchedulerStats};
use rwfuzz_explore::seeding::confirm::TypeConfirmer;
use rwfuzz_explore::seeding::mutate::Mutator;
use rwfuzz_explore::seeding::rng::{STAGE_MUTATION, STAGE_SEEDING};
use rwfuzz_explore::seeding::seed::SeedGenerator;
use rwfuzz_explore::targets;
use rwfuzz_ir::ContractInfo;

use crate::cluster::ClusterControl;
use crate::context::RunContext;

/// File the search-only mode writes its confirmed conflicts to.
pub const CONFLICTS_FILE: &str = "confirmed_conflicts.json";

pub struct Campaign {
    ctx: RunContext,
    cluster: ClusterControl,
}

impl Campaign {
    pub fn new(ctx: RunContext) -> Self {
        let cluster = ClusterControl::new(ctx.config.cluster.clone());
        Self { ctx, cluster }
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    /// Start-up, then a fresh or resumed search.
    pub fn run(&mut self, load: Option<&Path>) -> anyhow::Result<SchedulerStats> {
        self.start();
        let pool = match load {
            Some(path) => {
                tracing::info!(target: targets::EXECUTION, path = %path.display(), "loading pair pool");
                FuncPairSeedsPool::load(path)
                    .with_context(|| format!("loading pair pool {}", path.display()))?
            }
            None => self.generate_seeds(),
        };
        Ok(self.handle_pool(pool))
    }

    /// Journal the contract, start the cluster and deploy if configured.
    /// Failures here are logged; the calls that follow will show whether the
    /// ledger is usable.
    pub fn start(&self) {
        journal_contract(&self.ctx.info, "contract loaded");

        let started = match self.cluster.start() {
            Ok(started) => started,
            Err(err) => {
                tracing::warn!(target: targets::EXECUTION, error = %err, "cluster start failed");
                false
            }
        };
        if started {
            self.cluster.settle();
        }

        let Some(path) = &self.ctx.config.deploy.bytecode_path else {
            return;
        };
        match self.deploy(path) {
            Ok(tx_id) => {
                tracing::info!(target: targets::EXECUTION, tx_id = %tx_id, "contract deploy submitted");
                self.cluster.settle();
                match self.ctx.service.get_transaction(&tx_id) {
                    Ok(Some(status)) => tracing::info!(
                        target: targets::EXECUTION,
                        tx_id = %tx_id,
                        code = %status.code,
                        message = %status.message,
                        "contract deploy result"
                    ),
                    Ok(None) => tracing::warn!(target: targets::EXECUTION, tx_id = %tx_id, "deploy not on chain yet"),
                    Err(err) => tracing::warn!(target: targets::EXECUTION, error = %err, "deploy lookup failed"),
                }
            }
            Err(err) => {
                tracing::warn!(target: targets::EXECUTION, error = %format!("{:#}", err), "contract deploy failed")
            }
        }
    }

    fn deploy(&self, path: &Path) -> anyhow::Result<String> {
        let bytecode =
            std::fs::read(path).with_context(|| format!("reading bytecode {}", path.display()))?;
        let tx_id = self
            .ctx
            .service
            .deploy_contract(&self.ctx.info.name, &bytecode)?;
        Ok(tx_id)
    }

    /// Confirm types, build seeds and the pair pool, and snapshot the pool.
    pub fn generate_seeds(&mut self) -> FuncPairSeedsPool {
        let service = Arc::clone(&self.ctx.service);
        let config = &self.ctx.config;

        let report = TypeConfirmer::new(service.as_ref(), config.confirm.clone())
            .confirm_all(&mut self.ctx.info);
        for function in &report.fallbacks {
            tracing::warn!(
                target: targets::EXECUTION,
                function = %function,
                "parameters forced to placeholder; types may be imprecise"
            );
        }
        journal_contract(&self.ctx.info, "parameter types confirmed");

        let mutator = Mutator::from_seed(config.seed, STAGE_SEEDING);
        let seeds = SeedGenerator::new(service.as_ref(), mutator).generate(&self.ctx.info);
        tracing::info!(target: targets::EXECUTION, seeds = seeds.len(), "seed pool generated");

        let pool = FuncPairSeedsPool::build(&seeds);
        match pool.save_to_dir(&self.ctx.run_dir, &self.ctx.info.name) {
            Ok(path) => {
                tracing::info!(target: targets::EXECUTION, path = %path.display(), "pair pool saved")
            }
            Err(err) => tracing::warn!(target: targets::EXECUTION, error = %err, "pair pool not saved"),
        }
        pool
    }

    /// Run the scheduler to completion, validating conflicts with load
    /// experiments unless they are disabled.
    pub fn handle_pool(&self, mut pool: FuncPairSeedsPool) -> SchedulerStats {
        let config = &self.ctx.config;
        tracing::info!(
            target: targets::EXECUTION,
            conflicts = pool.conflict_len(),
            candidates = pool.mutate_len(),
            "conflict testing and mutation"
        );
        let mut scheduler = MutationScheduler::new(
            self.ctx.service.as_ref(),
            &self.ctx.info,
            Mutator::from_seed(config.seed, STAGE_MUTATION),
            config.scheduler.clone(),
        );

        let stats = if config.skip_experiments {
            let mut sink = CollectingSink::default();
            let stats = scheduler.run(&mut pool, &mut sink);
            self.save_conflicts(&sink);
            stats
        } else {
            let mut runner = ExperimentRunner::new(
                Arc::clone(&self.ctx.service),
                self.ctx.info.clone(),
                &self.ctx.run_dir,
                config.experiment.clone(),
            );
            scheduler.run(&mut pool, &mut runner)
        };

        tracing::info!(
            target: targets::EXECUTION,
            rounds = stats.rounds,
            validated = stats.validated,
            promoted = stats.promoted,
            dropped = stats.dropped,
            "campaign finished"
        );
        stats
    }

    fn save_conflicts(&self, sink: &CollectingSink) {
        let path: PathBuf = self.ctx.run_dir.join(CONFLICTS_FILE);
        let written = serde_json::to_string_pretty(&sink.validated)
            .map_err(anyhow::Error::from)
            .and_then(|text| std::fs::write(&path, text).map_err(anyhow::Error::from));
        match written {
            Ok(()) => tracing::info!(
                target: targets::EXECUTION,
                path = %path.display(),
                count = sink.validated.len(),
                "confirmed conflicts saved"
            ),
            Err(err) => tracing::warn!(target: targets::EXECUTION, error = %err, "confirmed conflicts not saved"),
        }
    }
}

fn journal_contract(info: &ContractInfo, message: &str) {
    tracing::info!(
        target: targets::EXECUTION,
        contract = %info.name,
        functions = ?info.functions.keys().collect::<Vec<_>>(),
        "{}",
        message
    );
    for (param, set) in &info.params {
        tracing::info!(
            target: targets::EXECUTION,
            param = %param,
            confirmed = set.confirmed,
            candidates = ?set.candidates,
            accepted = ?set.accepted,
            "parameter"
        );
    }
}
