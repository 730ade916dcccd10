//! Shared data model for the read/write-set conflict fuzzer.
//!
//! Contract inputs are trees of tagged [`value::Value`]s addressed by
//! [`path::ValuePath`]s. [`types`] holds the contract metadata produced by
//! the type oracle and the seed structures produced by the search stages.

pub mod path;
pub mod types;
pub mod value;

pub use path::{PathToken, ValuePath};
pub use types::{
    CandidateTypeSet, ContractInfo, FuncPairSeed, FuncSeed, FunctionDescriptor, FunctionInput,
};
pub use value::{FloatKind, IntKind, UintKind, Value};
