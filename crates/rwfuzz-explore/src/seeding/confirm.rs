//! Type confirmation: find one ledger-accepted value per parameter.
//!
//! Functions are tried cheapest-first by search product. Each round
//! dry-runs every combination of the chosen function's unconfirmed
//! candidates (confirmed parameters contribute their first accepted value)
//! and accepts every value used in a successful call. A round with no
//! success confirms the function's remaining parameters to a placeholder
//! string, so each function is searched at most once.

use rwfuzz_ir::{ContractInfo, Value};
use rwfuzz_ledger::{encode_args, ExecutionService};
use serde::{Deserialize, Serialize};

use super::cartesian;
use super::mutate::PLACEHOLDER_TEXT;
use crate::targets;

/// Configuration for type confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmConfig {
    /// Value forced onto parameters no combination could confirm.
    pub placeholder: Value,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            placeholder: Value::string(PLACEHOLDER_TEXT),
        }
    }
}

/// What a confirmation run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfirmReport {
    /// Functions searched, in the order they were chosen.
    pub searched: Vec<String>,
    /// Functions whose round found no working combination.
    pub fallbacks: Vec<String>,
    /// Parameters never reached by a search round, settled afterwards.
    pub settled: Vec<String>,
    /// Dry-run calls issued.
    pub dry_runs: usize,
}

pub struct TypeConfirmer<'a, S: ExecutionService + ?Sized> {
    service: &'a S,
    config: ConfirmConfig,
}

impl<'a, S: ExecutionService + ?Sized> TypeConfirmer<'a, S> {
    pub fn new(service: &'a S, config: ConfirmConfig) -> Self {
        Self { service, config }
    }

    /// Confirm every parameter of `info`.
    ///
    /// On return every candidate set is confirmed with at least one
    /// accepted value.
    pub fn confirm_all(&self, info: &mut ContractInfo) -> ConfirmReport {
        let mut report = ConfirmReport::default();

        while let Some((function, product)) = next_function(info) {
            let round = report.searched.len();
            tracing::info!(
                target: targets::EXECUTION,
                round,
                function = %function,
                product,
                "confirming parameter types"
            );
            let succeeded = self.run_round(info, &function, &mut report);
            report.searched.push(function.clone());

            if !succeeded {
                tracing::warn!(
                    target: targets::EXECUTION,
                    round,
                    function = %function,
                    placeholder = %self.config.placeholder,
                    "no combination accepted; forcing unconfirmed parameters to placeholder"
                );
                self.force_placeholder(info, &function);
                report.fallbacks.push(function);
            }
        }

        self.settle_remaining(info, &mut report);
        tracing::info!(
            target: targets::EXECUTION,
            searched = report.searched.len(),
            fallbacks = report.fallbacks.len(),
            dry_runs = report.dry_runs,
            "parameter types confirmed"
        );
        report
    }

    fn run_round(
        &self,
        info: &mut ContractInfo,
        function: &str,
        report: &mut ConfirmReport,
    ) -> bool {
        let Some(descriptor) = info.functions.get(function) else {
            return false;
        };
        let invoke_name = descriptor.invoke_name.clone();
        let choices: Vec<(String, Vec<Value>)> = descriptor
            .params
            .iter()
            .map(|param| {
                let set = &info.params[param];
                let values = match (set.confirmed, set.first_accepted()) {
                    (true, Some(first)) => vec![first.clone()],
                    _ => set.candidates.clone(),
                };
                (param.clone(), values)
            })
            .collect();

        let mut succeeded = false;
        for (i, input) in cartesian(&choices).into_iter().enumerate() {
            report.dry_runs += 1;
            match self.service.dry_run_invoke(&invoke_name, &encode_args(&input)) {
                Ok(result) if result.success => {
                    tracing::info!(
                        target: targets::EXECUTION,
                        function,
                        combination = i,
                        input = ?input,
                        "combination accepted"
                    );
                    for (param, value) in input {
                        if let Some(set) = info.params.get_mut(&param) {
                            set.accept(value);
                        }
                    }
                    succeeded = true;
                }
                Ok(result) => {
                    tracing::debug!(
                        target: targets::EXECUTION,
                        function,
                        combination = i,
                        message = %result.message,
                        "combination rejected"
                    );
                }
                Err(err) => {
                    tracing::debug!(
                        target: targets::EXECUTION,
                        function,
                        combination = i,
                        error = %err,
                        "combination failed"
                    );
                }
            }
        }
        succeeded
    }

    fn force_placeholder(&self, info: &mut ContractInfo, function: &str) {
        let params = info
            .functions
            .get(function)
            .map(|f| f.params.clone())
            .unwrap_or_default();
        for param in params {
            if let Some(set) = info.params.get_mut(&param) {
                if !set.confirmed {
                    set.accept(self.config.placeholder.clone());
                }
            }
        }
    }

    /// Parameters only reachable through functions that were never
    /// searched: a lone candidate is taken as is, anything else gets the
    /// placeholder.
    fn settle_remaining(&self, info: &mut ContractInfo, report: &mut ConfirmReport) {
        for (name, set) in info.params.iter_mut() {
            if set.confirmed && !set.accepted.is_empty() {
                continue;
            }
            let value = match set.candidates.as_slice() {
                [only] => only.clone(),
                _ => self.config.placeholder.clone(),
            };
            tracing::info!(
                target: targets::EXECUTION,
                param = %name,
                value = %value,
                "settling parameter outside any search round"
            );
            set.accept(value);
            report.settled.push(name.clone());
        }
    }
}

/// The function with the smallest search product above one.
pub fn next_function(info: &ContractInfo) -> Option<(String, u64)> {
    info.functions
        .keys()
        .filter_map(|name| {
            info.search_product(name)
                .filter(|product| *product > 1)
                .map(|product| (name.clone(), product))
        })
        .min_by_key(|(_, product)| *product)
}
