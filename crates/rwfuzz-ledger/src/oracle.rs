use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use rwfuzz_ir::{CandidateTypeSet, ContractInfo, FunctionDescriptor, Value};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("cannot read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("manifest parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid manifest: {0}")]
    Invalid(String),
}

/// Source of a contract's entry points and per-parameter candidate types.
///
/// Results are deterministic for a given contract snapshot.
pub trait TypeOracle {
    fn contract_info(&self) -> Result<ContractInfo, OracleError>;
}

#[derive(Debug, Clone, Deserialize)]
struct Manifest {
    contract: String,
    functions: Vec<ManifestFunction>,
    #[serde(default)]
    params: BTreeMap<String, Vec<Value>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestFunction {
    name: String,
    #[serde(default)]
    invoke_name: Option<String>,
    #[serde(default)]
    params: Vec<String>,
}

/// Type oracle backed by a JSON manifest produced ahead of time by a
/// source analyzer.
#[derive(Debug, Clone)]
pub struct ManifestOracle {
    manifest: Manifest,
}

impl ManifestOracle {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, OracleError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| OracleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, OracleError> {
        let manifest: Manifest = serde_json::from_str(text)?;
        if manifest.contract.trim().is_empty() {
            return Err(OracleError::Invalid("contract name is empty".into()));
        }
        if manifest.functions.is_empty() {
            return Err(OracleError::Invalid("no functions listed".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for function in &manifest.functions {
            if !seen.insert(function.name.as_str()) {
                return Err(OracleError::Invalid(format!(
                    "function {} listed twice",
                    function.name
                )));
            }
        }
        Ok(Self { manifest })
    }
}

impl TypeOracle for ManifestOracle {
    fn contract_info(&self) -> Result<ContractInfo, OracleError> {
        let mut info = ContractInfo::new(self.manifest.contract.clone());
        for function in &self.manifest.functions {
            let mut descriptor =
                FunctionDescriptor::new(function.name.clone(), function.params.clone());
            if let Some(invoke_name) = &function.invoke_name {
                descriptor = descriptor.with_invoke_name(invoke_name.clone());
            }
            info.add_function(descriptor);
        }
        for (param, candidates) in &self.manifest.params {
            info.params
                .insert(param.clone(), CandidateTypeSet::new(candidates.iter().cloned()));
        }
        Ok(info)
    }
}
