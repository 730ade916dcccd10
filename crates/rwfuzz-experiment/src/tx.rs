use std::path::{Path, PathBuf};
use std::sync::Mutex;

use rwfuzz_ledger::{LedgerError, SendResult, TxStatusCode};
use serde::{Deserialize, Serialize};

/// Send status recorded when the submission never reached the node.
pub const SEND_FAILED: TxStatusCode = TxStatusCode(-1);

/// Execution result of a record that has not been resolved on chain.
pub const UNRESOLVED: i32 = -1;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("artifact encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("render error on {path}: {message}")]
    Render { path: PathBuf, message: String },
}

/// One submitted transaction and what became of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tx {
    pub tx_id: String,
    /// Submission time, milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub in_pool: bool,
    pub on_chain: bool,
    pub execute_result: i32,
    pub execute_message: String,
    pub send_status: TxStatusCode,
    pub send_message: String,
}

impl Tx {
    pub fn from_send(outcome: Result<SendResult, LedgerError>, timestamp: i64) -> Self {
        let (tx_id, send_status, send_message) = match outcome {
            Ok(sent) => (sent.tx_id, sent.status, sent.message),
            Err(err) => (String::new(), SEND_FAILED, err.to_string()),
        };
        Self {
            tx_id,
            timestamp,
            in_pool: false,
            on_chain: false,
            execute_result: UNRESOLVED,
            execute_message: String::new(),
            send_status,
            send_message,
        }
    }

    /// Landed or still waiting: anything but lost.
    pub fn arrived(&self) -> bool {
        self.in_pool || self.on_chain
    }

    pub fn executed(&self) -> bool {
        self.execute_result == 0
    }
}

/// Records appended concurrently by workers.
#[derive(Debug, Default)]
pub struct TxLog {
    txs: Mutex<Vec<Tx>>,
}

impl TxLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, tx: Tx) {
        self.txs.lock().unwrap().push(tx);
    }

    pub fn len(&self) -> usize {
        self.txs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take every record, ordered by submission time.
    pub fn take_sorted(&self) -> Vec<Tx> {
        let mut txs = std::mem::take(&mut *self.txs.lock().unwrap());
        txs.sort_by_key(|tx| tx.timestamp);
        txs
    }
}

/// Write records as pretty JSON.
pub fn save_txs(txs: &[Tx], path: &Path) -> Result<(), ArtifactError> {
    let text = serde_json::to_string_pretty(txs)?;
    std::fs::write(path, text).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}
