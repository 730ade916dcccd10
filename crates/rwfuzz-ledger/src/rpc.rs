//! JSON-RPC client for a ledger node.
//!
//! Every call is a JSON-RPC 2.0 POST. Argument values travel as base64
//! so that raw byte arguments survive the JSON envelope.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as Json};

use crate::service::{
    DryRunResult, ExecutionService, KeyValuePair, LedgerError, PoolStatus, SendResult, TxStatus,
    TxStatusCode,
};

/// Connection settings for [`JsonRpcService`].
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint URL.
    pub endpoint: String,
    /// Name the contract was deployed under.
    pub contract: String,
    /// Whole-request timeout (default: 30s).
    pub timeout: Duration,
    /// TCP connect timeout (default: 10s).
    pub connect_timeout: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:12301/rpc".into(),
            contract: String::new(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub struct JsonRpcService {
    config: LedgerConfig,
    agent: ureq::Agent,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RwSetBody {
    #[serde(default)]
    reads: Vec<String>,
    #[serde(default)]
    writes: Vec<String>,
}

#[derive(Deserialize)]
struct DryRunBody {
    tx_id: String,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    rw_set: Option<RwSetBody>,
}

#[derive(Deserialize)]
struct TxBody {
    tx_id: String,
    code: i32,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct InPoolBody {
    #[serde(default)]
    tx_ids: Vec<String>,
}

#[derive(Deserialize)]
struct PoolStatusBody {
    pending: u64,
    queued: u64,
}

impl JsonRpcService {
    pub fn new(config: LedgerConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .timeout_connect(config.connect_timeout)
            .build();
        Self {
            config,
            agent,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Json) -> Result<T, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response: Json = self
            .agent
            .post(&self.config.endpoint)
            .set("Content-Type", "application/json")
            .send_json(&body)
            .map_err(|e| LedgerError::Transport(format!("{} failed: {}", method, e)))?
            .into_json()
            .map_err(|e| LedgerError::Transport(format!("{} unreadable: {}", method, e)))?;

        if let Some(error) = response.get("error").filter(|e| !e.is_null()) {
            let error: RpcErrorBody = serde_json::from_value(error.clone())?;
            return Err(LedgerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        let result = response.get("result").cloned().unwrap_or(Json::Null);
        Ok(serde_json::from_value(result)?)
    }

    fn invoke_params(&self, method: &str, args: &[KeyValuePair]) -> Json {
        let engine = base64::engine::general_purpose::STANDARD;
        let args: Vec<Json> = args
            .iter()
            .map(|kv| json!({ "key": kv.key, "value": engine.encode(&kv.value) }))
            .collect();
        json!({
            "contract": self.config.contract,
            "method": method,
            "args": args,
        })
    }
}

impl ExecutionService for JsonRpcService {
    fn dry_run_invoke(
        &self,
        method: &str,
        args: &[KeyValuePair],
    ) -> Result<DryRunResult, LedgerError> {
        let body: DryRunBody =
            self.call("contract_dryRunInvoke", self.invoke_params(method, args))?;
        let (read_keys, write_keys) = body
            .rw_set
            .map(|rw| (rw.reads, rw.writes))
            .unwrap_or_default();
        Ok(DryRunResult {
            tx_id: body.tx_id,
            read_keys,
            write_keys,
            success: body.success,
            message: body.message,
        })
    }

    fn invoke_async(&self, method: &str, args: &[KeyValuePair]) -> Result<SendResult, LedgerError> {
        let body: TxBody = self.call("contract_invokeAsync", self.invoke_params(method, args))?;
        Ok(SendResult {
            tx_id: body.tx_id,
            status: TxStatusCode(body.code),
            message: body.message,
        })
    }

    fn get_transaction(&self, tx_id: &str) -> Result<Option<TxStatus>, LedgerError> {
        let body: Option<TxBody> = self.call("chain_getTxById", json!({ "tx_id": tx_id }))?;
        Ok(body.map(|tx| TxStatus {
            tx_id: tx.tx_id,
            code: TxStatusCode(tx.code),
            message: tx.message,
        }))
    }

    fn get_transactions_in_pool(&self, tx_ids: &[String]) -> Result<Vec<String>, LedgerError> {
        let body: InPoolBody = self.call("txpool_getTxsByIds", json!({ "tx_ids": tx_ids }))?;
        Ok(body.tx_ids)
    }

    fn get_pool_status(&self) -> Result<PoolStatus, LedgerError> {
        let body: PoolStatusBody = self.call("txpool_getPoolStatus", json!({}))?;
        Ok(PoolStatus {
            pending: body.pending,
            queued: body.queued,
        })
    }

    fn deploy_contract(&self, name: &str, bytecode: &[u8]) -> Result<String, LedgerError> {
        let engine = base64::engine::general_purpose::STANDARD;
        let body: TxBody = self.call(
            "contract_create",
            json!({ "contract": name, "bytecode": engine.encode(bytecode) }),
        )?;
        if !TxStatusCode(body.code).is_success() {
            return Err(LedgerError::Rpc {
                code: body.code.into(),
                message: body.message,
            });
        }
        Ok(body.tx_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invoke_params_base64() {
        let service = JsonRpcService::new(LedgerConfig {
            contract: "fact".into(),
            ..LedgerConfig::default()
        });
        let params = service.invoke_params(
            "save",
            &[KeyValuePair {
                key: "file_hash".into(),
                value: b"hi".to_vec(),
            }],
        );
        assert_eq!(params["contract"], "fact");
        assert_eq!(params["method"], "save");
        assert_eq!(params["args"][0]["key"], "file_hash");
        assert_eq!(params["args"][0]["value"], "aGk=");
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let service = JsonRpcService::new(LedgerConfig {
            endpoint: "http://127.0.0.1:1/rpc".into(),
            connect_timeout: Duration::from_millis(200),
            timeout: Duration::from_millis(500),
            ..LedgerConfig::default()
        });
        let err = service.get_pool_status().unwrap_err();
        assert!(matches!(err, LedgerError::Transport(_)));
    }

    #[test]
    fn test_dry_run_body_defaults() {
        let body: DryRunBody = serde_json::from_str(r#"{"tx_id":"t1"}"#).unwrap();
        assert!(!body.success);
        assert!(body.rw_set.is_none());
    }
}
