use std::fmt;

use rwfuzz_ir::FunctionInput;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// One named call argument, already encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValuePair {
    pub key: String,
    pub value: Vec<u8>,
}

/// Encode a call input as key/value arguments, in parameter-name order.
pub fn encode_args(input: &FunctionInput) -> Vec<KeyValuePair> {
    input
        .iter()
        .map(|(key, value)| KeyValuePair {
            key: key.clone(),
            value: value.encode_arg(),
        })
        .collect()
}

/// Look up an argument's bytes by key.
pub fn find_arg<'a>(args: &'a [KeyValuePair], key: &str) -> Option<&'a [u8]> {
    args.iter()
        .find(|kv| kv.key == key)
        .map(|kv| kv.value.as_slice())
}

/// Ledger transaction status code. Zero is success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxStatusCode(pub i32);

impl TxStatusCode {
    pub const SUCCESS: TxStatusCode = TxStatusCode(0);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for TxStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_success() {
            write!(f, "SUCCESS")
        } else {
            write!(f, "CODE_{}", self.0)
        }
    }
}

/// Outcome of a synchronous, simulated execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DryRunResult {
    pub tx_id: String,
    pub read_keys: Vec<String>,
    pub write_keys: Vec<String>,
    pub success: bool,
    pub message: String,
}

/// Outcome of handing a transaction to the node.
#[derive(Debug, Clone, PartialEq)]
pub struct SendResult {
    pub tx_id: String,
    pub status: TxStatusCode,
    pub message: String,
}

/// A transaction that has landed on chain.
#[derive(Debug, Clone, PartialEq)]
pub struct TxStatus {
    pub tx_id: String,
    pub code: TxStatusCode,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatus {
    pub pending: u64,
    pub queued: u64,
}

impl PoolStatus {
    pub fn total(&self) -> u64 {
        self.pending + self.queued
    }
}

/// Calls against a running ledger with the contract under test deployed.
///
/// `method` is always the contract's wire-level invoke name. Every call
/// blocks on the network.
pub trait ExecutionService: Send + Sync {
    fn dry_run_invoke(
        &self,
        method: &str,
        args: &[KeyValuePair],
    ) -> Result<DryRunResult, LedgerError>;

    fn invoke_async(&self, method: &str, args: &[KeyValuePair]) -> Result<SendResult, LedgerError>;

    /// `Ok(None)` when the transaction is not on chain.
    fn get_transaction(&self, tx_id: &str) -> Result<Option<TxStatus>, LedgerError>;

    /// The subset of `tx_ids` currently held in the transaction pool.
    fn get_transactions_in_pool(&self, tx_ids: &[String]) -> Result<Vec<String>, LedgerError>;

    fn get_pool_status(&self) -> Result<PoolStatus, LedgerError>;

    /// Install the contract bytecode, returning the deploy transaction id.
    fn deploy_contract(&self, name: &str, bytecode: &[u8]) -> Result<String, LedgerError>;
}

impl<T: ExecutionService + ?Sized> ExecutionService for std::sync::Arc<T> {
    fn dry_run_invoke(
        &self,
        method: &str,
        args: &[KeyValuePair],
    ) -> Result<DryRunResult, LedgerError> {
        (**self).dry_run_invoke(method, args)
    }

    fn invoke_async(&self, method: &str, args: &[KeyValuePair]) -> Result<SendResult, LedgerError> {
        (**self).invoke_async(method, args)
    }

    fn get_transaction(&self, tx_id: &str) -> Result<Option<TxStatus>, LedgerError> {
        (**self).get_transaction(tx_id)
    }

    fn get_transactions_in_pool(&self, tx_ids: &[String]) -> Result<Vec<String>, LedgerError> {
        (**self).get_transactions_in_pool(tx_ids)
    }

    fn get_pool_status(&self) -> Result<PoolStatus, LedgerError> {
        (**self).get_pool_status()
    }

    fn deploy_contract(&self, name: &str, bytecode: &[u8]) -> Result<String, LedgerError> {
        (**self).deploy_contract(name, bytecode)
    }
}
