//! Boundary to the ledger under test and to the contract's type oracle.
//!
//! Everything the search engine knows about the outside world goes through
//! [`ExecutionService`] and [`TypeOracle`]. [`JsonRpcService`] talks to a
//! live node; [`MockLedger`] scripts one in memory.

pub mod mock;
pub mod oracle;
pub mod rpc;
pub mod service;

pub use mock::{MockCall, MockLedger};
pub use oracle::{ManifestOracle, OracleError, TypeOracle};
pub use rpc::{JsonRpcService, LedgerConfig};
pub use service::{
    encode_args, find_arg, DryRunResult, ExecutionService, KeyValuePair, LedgerError, PoolStatus,
    SendResult, TxStatus, TxStatusCode,
};
