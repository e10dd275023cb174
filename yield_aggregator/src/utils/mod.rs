//! Utility and helper functions needed for:
//! - Transaction signing and submission
//! - Interacting with the EVM RPC canister
//! - Error handling
//! - Type casting

pub(crate) mod common;
pub(crate) mod error;
pub(crate) mod evm_rpc;
pub(crate) mod signer;
pub(crate) mod transaction_builder;
