use candid::{CandidType, Nat};
use evm_rpc_types::RpcError;
use ic_exports::ic_kit::RejectionCode;
use serde::Deserialize;

/// Yield Aggregator Canister Result
pub type ManagerResult<T> = Result<T, ManagerError>;

/// Yield Aggregator Canister Errors
#[derive(Clone, CandidType, Debug, Deserialize, PartialEq)]
pub enum ManagerError {
    /// The amount was zero
    InvalidAmount,
    /// A withdrawal or transfer exceeds the available funds
    InsufficientBalance,
    /// A protocol's rate or index could not be read
    OracleUnavailable(String),
    /// The position already sits entirely in the requested protocol
    AlreadyOptimal,
    /// The user has nothing to withdraw or move
    NoFunds,
    /// Funds left one protocol but did not reach the next one.
    /// The amount is held by the canister's EOA and tracked in the ledger.
    FundsInLimbo(Nat),
    /// The deposit would split the position across both protocols
    SplitPosition,
    /// Another operation holds this user's lock
    Locked,
    /// `CallResult` error
    CallResult(RejectionCode, String),
    /// Unauthorized access
    Unauthorized,
    /// Wrapper for the RPC errors returned by the EVM RPC canister
    RpcResponseError(RpcError),
    /// Decoding issue
    DecodingError(String),
    /// Unknown/Custom error
    Custom(String),
    /// No consensus was reached among RPC providers
    NoConsensus,
    /// The transaction was mined but reverted. Carries the transaction hash.
    TransactionReverted(String),
    /// No receipt was seen for the transaction in time. It may still be mined.
    Unconfirmed(String),
    /// Arithmetic error
    Arithmetic(String),
}

pub fn arithmetic_err<S: AsRef<str>>(s: S) -> ManagerError {
    ManagerError::Arithmetic(format!("{:#?}", s.as_ref()))
}

/// Wraps any failure of a rate or index read into `OracleUnavailable`.
/// Errors that already carry that kind pass through untouched.
pub fn oracle_err(err: ManagerError) -> ManagerError {
    match err {
        ManagerError::OracleUnavailable(_) => err,
        other => ManagerError::OracleUnavailable(format!("{:?}", other)),
    }
}
