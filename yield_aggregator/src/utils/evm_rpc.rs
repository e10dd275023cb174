//! Bindings for the subset of the EVM RPC canister used by the aggregator.
//! The remaining optional fields of the canister's records default to `null`.

use candid::{self, CandidType, Deserialize, Nat, Principal};
use evm_rpc_types::{Hex32, MultiRpcResult, RpcConfig, RpcServices, TransactionReceipt};
use ic_exports::ic_cdk::{self, api::call::CallResult as Result};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize)]
pub struct GetTransactionCountArgs {
    pub address: String,
    pub block: BlockTag,
}

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize, Default)]
pub enum BlockTag {
    #[default]
    Latest,
    Finalized,
    Safe,
    Earliest,
    Pending,
    Number(Nat),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, CandidType)]
pub enum SendRawTransactionStatus {
    Ok(Option<String>),
    InsufficientFunds,
    NonceTooLow,
    NonceTooHigh,
}

#[derive(Clone, Debug, PartialEq, Eq, CandidType, Deserialize)]
pub struct CallArgs {
    pub transaction: TransactionRequest,
    /// Integer block number, or "latest" for the last mined block or "pending", "earliest" for not yet mined transactions.
    /// Default to "latest" if unspecified, see https://github.com/ethereum/execution-apis/issues/461.
    pub block: Option<BlockTag>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, CandidType, Deserialize)]
pub struct TransactionRequest {
    /// Address of the receiver or `None` in a contract creation transaction.
    pub to: Option<String>,

    /// The address of the sender.
    pub from: Option<String>,

    /// Transaction input data
    pub input: Option<String>,

    /// Amount of ETH sent with this transaction.
    pub value: Option<Nat>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Service(pub Principal);

impl Default for Service {
    fn default() -> Self {
        Self(Principal::anonymous())
    }
}

impl Service {
    pub async fn eth_call(
        &self,
        source: RpcServices,
        config: Option<RpcConfig>,
        args: CallArgs,
        cycles: u128,
    ) -> Result<(MultiRpcResult<String>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_call",
            (source, config, args),
            cycles,
        )
        .await
    }

    pub async fn eth_get_transaction_count(
        &self,
        source: RpcServices,
        config: Option<RpcConfig>,
        args: GetTransactionCountArgs,
        cycles: u128,
    ) -> Result<(MultiRpcResult<Nat>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_getTransactionCount",
            (source, config, args),
            cycles,
        )
        .await
    }

    pub async fn eth_get_transaction_receipt(
        &self,
        source: RpcServices,
        config: Option<RpcConfig>,
        hash: Hex32,
        cycles: u128,
    ) -> Result<(MultiRpcResult<Option<TransactionReceipt>>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_getTransactionReceipt",
            (source, config, hash),
            cycles,
        )
        .await
    }

    pub async fn eth_send_raw_transaction(
        &self,
        source: RpcServices,
        config: Option<RpcConfig>,
        raw_signed_transaction_hex: String,
        cycles: u128,
    ) -> Result<(MultiRpcResult<SendRawTransactionStatus>,)> {
        ic_cdk::api::call::call_with_payment128(
            self.0,
            "eth_sendRawTransaction",
            (source, config, raw_signed_transaction_hex),
            cycles,
        )
        .await
    }
}
