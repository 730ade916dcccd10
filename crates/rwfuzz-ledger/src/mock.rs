//! In-memory ledger with scripted contract behaviour.
//!
//! Each method is a closure from call arguments to the keys it would read
//! and write. Submitted transactions land on chain immediately unless the
//! drop schedule rejects them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::service::{
    DryRunResult, ExecutionService, KeyValuePair, LedgerError, PoolStatus, SendResult, TxStatus,
    TxStatusCode,
};

/// Scripted result of one contract call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MockCall {
    pub success: bool,
    pub reads: Vec<String>,
    pub writes: Vec<String>,
    pub message: String,
}

impl MockCall {
    pub fn ok<R, W>(reads: R, writes: W) -> Self
    where
        R: IntoIterator,
        R::Item: Into<String>,
        W: IntoIterator,
        W::Item: Into<String>,
    {
        Self {
            success: true,
            reads: reads.into_iter().map(Into::into).collect(),
            writes: writes.into_iter().map(Into::into).collect(),
            message: "ok".into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Self::default()
        }
    }
}

type Behaviour = Box<dyn Fn(&[KeyValuePair]) -> MockCall + Send + Sync>;

/// Status code for a submission the mock refuses.
pub const DROPPED: TxStatusCode = TxStatusCode(21);
/// Status code for an on-chain transaction whose contract call failed.
pub const CONTRACT_FAILED: TxStatusCode = TxStatusCode(4);

#[derive(Default)]
pub struct MockLedger {
    behaviours: HashMap<String, Behaviour>,
    drop_every: Option<u64>,
    busy_polls: AtomicUsize,
    fail_pool_status: bool,
    next_tx: AtomicU64,
    sends: AtomicU64,
    dry_runs: AtomicUsize,
    status_polls: AtomicUsize,
    chain: Mutex<HashMap<String, TxStatus>>,
    pooled: Mutex<HashMap<String, (String, Vec<KeyValuePair>)>>,
    sent: Mutex<Vec<(String, String)>>,
    deployed: Mutex<Vec<(String, String)>>,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behaviour of `method`.
    pub fn on<F>(mut self, method: &str, behaviour: F) -> Self
    where
        F: Fn(&[KeyValuePair]) -> MockCall + Send + Sync + 'static,
    {
        self.behaviours
            .insert(method.to_string(), Box::new(behaviour));
        self
    }

    /// Reject every `n`-th submission with [`DROPPED`].
    pub fn drop_every(mut self, n: u64) -> Self {
        self.drop_every = Some(n.max(1));
        self
    }

    /// Report a non-empty pool for the first `polls` status queries.
    /// Submissions accepted while the pool is busy stay pooled and land on
    /// chain once the last busy query has been answered.
    pub fn busy_for(self, polls: usize) -> Self {
        self.busy_polls.store(polls, Ordering::SeqCst);
        self
    }

    /// Make every pool-status query fail.
    pub fn failing_pool_status(mut self) -> Self {
        self.fail_pool_status = true;
        self
    }

    pub fn dry_run_count(&self) -> usize {
        self.dry_runs.load(Ordering::SeqCst)
    }

    /// Pool-status queries answered so far, failed ones included.
    pub fn pool_status_polls(&self) -> usize {
        self.status_polls.load(Ordering::SeqCst)
    }

    /// `(contract, tx_id)` of every deploy, in order.
    pub fn deployed(&self) -> Vec<(String, String)> {
        self.deployed.lock().unwrap().clone()
    }

    /// `(tx_id, method)` of every submission, in arrival order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    fn run(&self, method: &str, args: &[KeyValuePair]) -> MockCall {
        match self.behaviours.get(method) {
            Some(behaviour) => behaviour(args),
            None => MockCall::fail(format!("unknown method {}", method)),
        }
    }

    fn land(&self, tx_id: &str, method: &str, args: &[KeyValuePair]) {
        let call = self.run(method, args);
        let code = if call.success {
            TxStatusCode::SUCCESS
        } else {
            CONTRACT_FAILED
        };
        self.chain.lock().unwrap().insert(
            tx_id.to_string(),
            TxStatus {
                tx_id: tx_id.to_string(),
                code,
                message: call.message,
            },
        );
    }

    fn fresh_tx_id(&self) -> String {
        let n = self.next_tx.fetch_add(1, Ordering::SeqCst) + 1;
        format!("tx-{:06}", n)
    }
}

impl ExecutionService for MockLedger {
    fn dry_run_invoke(
        &self,
        method: &str,
        args: &[KeyValuePair],
    ) -> Result<DryRunResult, LedgerError> {
        self.dry_runs.fetch_add(1, Ordering::SeqCst);
        let tx_id = self.fresh_tx_id();
        let call = self.run(method, args);
        Ok(DryRunResult {
            tx_id,
            read_keys: call.reads,
            write_keys: call.writes,
            success: call.success,
            message: call.message,
        })
    }

    fn invoke_async(&self, method: &str, args: &[KeyValuePair]) -> Result<SendResult, LedgerError> {
        let tx_id = self.fresh_tx_id();
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        self.sent
            .lock()
            .unwrap()
            .push((tx_id.clone(), method.to_string()));

        if self.drop_every.is_some_and(|every| n % every == 0) {
            return Ok(SendResult {
                tx_id,
                status: DROPPED,
                message: "tx pool is full".into(),
            });
        }

        if self.busy_polls.load(Ordering::SeqCst) > 0 {
            self.pooled
                .lock()
                .unwrap()
                .insert(tx_id.clone(), (method.to_string(), args.to_vec()));
        } else {
            self.land(&tx_id, method, args);
        }

        Ok(SendResult {
            tx_id,
            status: TxStatusCode::SUCCESS,
            message: "ok".into(),
        })
    }

    fn get_transaction(&self, tx_id: &str) -> Result<Option<TxStatus>, LedgerError> {
        Ok(self.chain.lock().unwrap().get(tx_id).cloned())
    }

    fn get_transactions_in_pool(&self, tx_ids: &[String]) -> Result<Vec<String>, LedgerError> {
        let pooled = self.pooled.lock().unwrap();
        Ok(tx_ids
            .iter()
            .filter(|id| pooled.contains_key(*id))
            .cloned()
            .collect())
    }

    fn get_pool_status(&self) -> Result<PoolStatus, LedgerError> {
        self.status_polls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pool_status {
            return Err(LedgerError::Transport("pool status unavailable".into()));
        }
        let remaining = self.busy_polls.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(PoolStatus::default());
        }
        self.busy_polls.store(remaining - 1, Ordering::SeqCst);
        let pending = self.pooled.lock().unwrap().len() as u64;
        if remaining == 1 {
            let drained: Vec<_> = self.pooled.lock().unwrap().drain().collect();
            for (tx_id, (method, args)) in drained {
                self.land(&tx_id, &method, &args);
            }
        }
        Ok(PoolStatus {
            pending: pending.max(1),
            queued: 0,
        })
    }

    fn deploy_contract(&self, name: &str, _bytecode: &[u8]) -> Result<String, LedgerError> {
        let tx_id = self.fresh_tx_id();
        tracing::debug!(contract = name, tx_id = %tx_id, "mock deploy");
        self.deployed
            .lock()
            .unwrap()
            .push((name.to_string(), tx_id.clone()));
        Ok(tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::find_arg;

    fn ledger() -> MockLedger {
        MockLedger::new().on("save", |args| {
            let hash = find_arg(args, "hash").unwrap_or_default();
            let key = format!("fact#{}", String::from_utf8_lossy(hash));
            MockCall::ok(Vec::<String>::new(), vec![key])
        })
    }

    fn arg(key: &str, value: &str) -> Vec<KeyValuePair> {
        vec![KeyValuePair {
            key: key.into(),
            value: value.as_bytes().to_vec(),
        }]
    }

    #[test]
    fn test_dry_run_uses_behaviour() {
        let ledger = ledger();
        let result = ledger.dry_run_invoke("save", &arg("hash", "abc")).unwrap();
        assert!(result.success);
        assert_eq!(result.write_keys, vec!["fact#abc".to_string()]);
        assert_eq!(ledger.dry_run_count(), 1);
    }

    #[test]
    fn test_unknown_method_fails() {
        let ledger = ledger();
        let result = ledger.dry_run_invoke("nope", &[]).unwrap();
        assert!(!result.success);
    }

    #[test]
    fn test_submission_lands_on_chain() {
        let ledger = ledger();
        let sent = ledger.invoke_async("save", &arg("hash", "x")).unwrap();
        assert!(sent.status.is_success());
        let tx = ledger.get_transaction(&sent.tx_id).unwrap().unwrap();
        assert!(tx.code.is_success());
    }

    #[test]
    fn test_drop_schedule() {
        let ledger = ledger().drop_every(2);
        let first = ledger.invoke_async("save", &[]).unwrap();
        let second = ledger.invoke_async("save", &[]).unwrap();
        assert!(first.status.is_success());
        assert_eq!(second.status, DROPPED);
        assert!(ledger.get_transaction(&second.tx_id).unwrap().is_none());
        assert_eq!(ledger.sent().len(), 2);
    }

    #[test]
    fn test_busy_pool_drains() {
        let ledger = ledger().busy_for(2);
        let sent = ledger.invoke_async("save", &[]).unwrap();
        let pooled = ledger
            .get_transactions_in_pool(&[sent.tx_id.clone()])
            .unwrap();
        assert_eq!(pooled, vec![sent.tx_id.clone()]);
        assert!(ledger.get_pool_status().unwrap().total() > 0);
        assert!(ledger.get_transaction(&sent.tx_id).unwrap().is_none());
        assert!(ledger.get_pool_status().unwrap().total() > 0);
        assert_eq!(ledger.get_pool_status().unwrap().total(), 0);
        assert_eq!(ledger.pool_status_polls(), 3);

        let landed = ledger.get_transaction(&sent.tx_id).unwrap().unwrap();
        assert!(landed.code.is_success());
        assert!(ledger
            .get_transactions_in_pool(&[sent.tx_id])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_deploys_recorded() {
        let ledger = ledger();
        let tx_id = ledger.deploy_contract("fact", b"\0asm").unwrap();
        assert_eq!(ledger.deployed(), vec![("fact".to_string(), tx_id)]);
    }
}
