//! Per-function seeds and their causal input paths.
//!
//! A seed is built for every combination of a function's accepted
//! parameter values. Its baseline read/write sets come from one dry run;
//! then each leaf path is mutated in isolation and re-run, and paths whose
//! mutation changes the read or write set are recorded as related.

use std::collections::{BTreeMap, BTreeSet};

use rwfuzz_ir::{ContractInfo, FuncSeed, FunctionInput, Value};
use rwfuzz_ledger::{encode_args, ExecutionService};

use super::cartesian;
use super::mutate::Mutator;
use crate::targets;

/// Seeds grouped by function name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FuncSeedsPool {
    pub seeds: BTreeMap<String, Vec<FuncSeed>>,
}

impl FuncSeedsPool {
    /// All seeds, function by function.
    pub fn iter(&self) -> impl Iterator<Item = &FuncSeed> {
        self.seeds.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.seeds.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dry-run `input` and return its `(read, write)` key lists.
///
/// A failed call yields empty sets.
pub fn observe<S: ExecutionService + ?Sized>(
    service: &S,
    invoke_name: &str,
    input: &FunctionInput,
) -> (Vec<String>, Vec<String>) {
    match service.dry_run_invoke(invoke_name, &encode_args(input)) {
        Ok(result) => (result.read_keys, result.write_keys),
        Err(err) => {
            tracing::debug!(
                target: targets::EXECUTION,
                method = invoke_name,
                error = %err,
                "dry run failed; treating read/write sets as empty"
            );
            (Vec::new(), Vec::new())
        }
    }
}

/// Re-run a seed's current input and store the observed sets.
pub fn refresh_rw_sets<S: ExecutionService + ?Sized>(
    service: &S,
    invoke_name: &str,
    seed: &mut FuncSeed,
) {
    let (reads, writes) = observe(service, invoke_name, &seed.function_input);
    seed.read_set = reads;
    seed.write_set = writes;
}

/// Order-insensitive comparison of two key lists.
pub fn same_key_set(a: &[String], b: &[String]) -> bool {
    let a: BTreeSet<&str> = a.iter().map(String::as_str).collect();
    let b: BTreeSet<&str> = b.iter().map(String::as_str).collect();
    a == b
}

pub struct SeedGenerator<'a, S: ExecutionService + ?Sized> {
    service: &'a S,
    mutator: Mutator,
}

impl<'a, S: ExecutionService + ?Sized> SeedGenerator<'a, S> {
    pub fn new(service: &'a S, mutator: Mutator) -> Self {
        Self { service, mutator }
    }

    /// Seeds for every function of `info`. Parameters must already be
    /// confirmed.
    pub fn generate(&mut self, info: &ContractInfo) -> FuncSeedsPool {
        let mut pool = FuncSeedsPool::default();
        for name in info.functions.keys() {
            let seeds = self.seeds_for(info, name);
            tracing::info!(
                target: targets::FUNCSEEDS,
                function = %name,
                count = seeds.len(),
                "seeds generated"
            );
            for seed in &seeds {
                tracing::info!(target: targets::FUNCSEEDS, "{}", seed);
            }
            pool.seeds.insert(name.clone(), seeds);
        }
        pool
    }

    /// One seed per combination of the function's accepted values.
    pub fn seeds_for(&mut self, info: &ContractInfo, function: &str) -> Vec<FuncSeed> {
        let Some(descriptor) = info.functions.get(function) else {
            return Vec::new();
        };
        let choices: Vec<(String, Vec<Value>)> = descriptor
            .params
            .iter()
            .map(|param| {
                let accepted = info
                    .params
                    .get(param)
                    .map(|set| set.accepted.clone())
                    .unwrap_or_default();
                (param.clone(), accepted)
            })
            .collect();

        cartesian(&choices)
            .into_iter()
            .map(|input| self.build_seed(&descriptor.invoke_name, function, input))
            .collect()
    }

    fn build_seed(&mut self, invoke_name: &str, function: &str, input: FunctionInput) -> FuncSeed {
        let mut seed = FuncSeed::new(function, input);
        refresh_rw_sets(self.service, invoke_name, &mut seed);

        for path in seed.value_paths.clone() {
            let mut probe = seed.function_input.clone();
            if !self.mutator.mutate_at(&mut probe, &path) {
                continue;
            }
            let (reads, writes) = observe(self.service, invoke_name, &probe);
            if !same_key_set(&seed.read_set, &reads) {
                seed.read_related_value_paths.push(path.clone());
            }
            if !same_key_set(&seed.write_set, &writes) {
                seed.write_related_value_paths.push(path);
            }
        }

        tracing::debug!(
            target: targets::EXECUTION,
            function,
            paths = seed.value_paths.len(),
            read_related = seed.read_related_value_paths.len(),
            write_related = seed.write_related_value_paths.len(),
            "seed built"
        );
        seed
    }
}
