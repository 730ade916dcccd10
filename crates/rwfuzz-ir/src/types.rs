use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::path::ValuePath;
use crate::value::Value;

/// Parameter name to concrete argument value.
pub type FunctionInput = BTreeMap<String, Value>;

// ── Contract metadata ────────────────────────────────────────────────

/// Candidate representations for one parameter, and the values the
/// ledger has accepted for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateTypeSet {
    /// Zero-valued representative of each candidate type.
    pub candidates: Vec<Value>,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(default)]
    pub accepted: Vec<Value>,
}

impl CandidateTypeSet {
    /// Build an unconfirmed set, dropping duplicate candidates.
    pub fn new(candidates: impl IntoIterator<Item = Value>) -> Self {
        let mut set = Self::default();
        for candidate in candidates {
            if !set.candidates.contains(&candidate) {
                set.candidates.push(candidate);
            }
        }
        set
    }

    /// Mark confirmed and record `value` unless a value with the same
    /// serialized form is already accepted. Returns whether the value was new.
    pub fn accept(&mut self, value: Value) -> bool {
        self.confirmed = true;
        if self.accepted.iter().any(|v| v.same_serialized(&value)) {
            return false;
        }
        self.accepted.push(value);
        true
    }

    pub fn first_accepted(&self) -> Option<&Value> {
        self.accepted.first()
    }
}

/// One callable entry point of the contract under test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    /// Method name used on the wire.
    pub invoke_name: String,
    pub params: Vec<String>,
}

impl FunctionDescriptor {
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        let name = name.into();
        Self {
            invoke_name: name.clone(),
            name,
            params,
        }
    }

    pub fn with_invoke_name(mut self, invoke_name: impl Into<String>) -> Self {
        self.invoke_name = invoke_name.into();
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractInfo {
    pub name: String,
    pub functions: BTreeMap<String, FunctionDescriptor>,
    pub params: BTreeMap<String, CandidateTypeSet>,
}

impl ContractInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Register a function. Parameters it names that are not yet known
    /// get an empty candidate set.
    pub fn add_function(&mut self, descriptor: FunctionDescriptor) {
        for param in &descriptor.params {
            self.params.entry(param.clone()).or_default();
        }
        self.functions.insert(descriptor.name.clone(), descriptor);
    }

    /// Wire name for `function`, falling back to the function name itself.
    pub fn invoke_name<'a>(&'a self, function: &'a str) -> &'a str {
        self.functions
            .get(function)
            .map(|f| f.invoke_name.as_str())
            .unwrap_or(function)
    }

    /// Branching factor of the remaining confirmation search for `function`:
    /// the product of candidate-set sizes over its unconfirmed parameters.
    ///
    /// `None` when the function takes no parameters or references a
    /// parameter with no candidates; such functions are never searched.
    pub fn search_product(&self, function: &str) -> Option<u64> {
        let descriptor = self.functions.get(function)?;
        if descriptor.params.is_empty() {
            return None;
        }
        let mut product = 1u64;
        for param in &descriptor.params {
            let set = self.params.get(param)?;
            if set.candidates.is_empty() {
                return None;
            }
            if !set.confirmed {
                product = product.saturating_mul(set.candidates.len() as u64);
            }
        }
        Some(product)
    }

    pub fn all_confirmed(&self) -> bool {
        self.params
            .values()
            .all(|set| set.confirmed && !set.accepted.is_empty())
    }
}

// ── Seeds ────────────────────────────────────────────────────────────

/// One executed call and its observed ledger footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncSeed {
    pub function_name: String,
    pub function_input: FunctionInput,
    pub value_paths: Vec<ValuePath>,
    pub read_related_value_paths: Vec<ValuePath>,
    pub write_related_value_paths: Vec<ValuePath>,
    pub read_set: Vec<String>,
    pub write_set: Vec<String>,
}

impl FuncSeed {
    /// A seed with its leaf paths collected and no observations yet.
    pub fn new(function_name: impl Into<String>, function_input: FunctionInput) -> Self {
        let value_paths = ValuePath::leaves(&function_input);
        Self {
            function_name: function_name.into(),
            function_input,
            value_paths,
            read_related_value_paths: Vec::new(),
            write_related_value_paths: Vec::new(),
            read_set: Vec::new(),
            write_set: Vec::new(),
        }
    }
}

impl fmt::Display for FuncSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let input: Vec<String> = self
            .function_input
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        write!(
            f,
            "{}({}) paths={} read_related={} write_related={} reads={:?} writes={:?}",
            self.function_name,
            input.join(", "),
            self.value_paths.len(),
            self.read_related_value_paths.len(),
            self.write_related_value_paths.len(),
            self.read_set,
            self.write_set,
        )
    }
}

/// Two seeds considered together for a read/write race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuncPairSeed {
    pub seed_one: FuncSeed,
    pub seed_two: FuncSeed,
    pub max_similarity: f64,
    pub mutability: bool,
}

impl FuncPairSeed {
    /// Whether both pairs involve the same unordered set of function names.
    pub fn same_functions(&self, other: &FuncPairSeed) -> bool {
        let (a, b) = self.function_names();
        let (c, d) = other.function_names();
        (a == c && b == d) || (a == d && b == c)
    }

    pub fn function_names(&self) -> (&str, &str) {
        (&self.seed_one.function_name, &self.seed_two.function_name)
    }
}

impl fmt::Display for FuncPairSeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} x {}] similarity={:.2} mutability={}\n  one: {}\n  two: {}",
            self.seed_one.function_name,
            self.seed_two.function_name,
            self.max_similarity,
            self.mutability,
            self.seed_one,
            self.seed_two,
        )
    }
}
