//! Shared EVM plumbing of the protocol adapters: reads through `eth_call` and
//! writes through transactions signed by the EOA.

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use candid::Nat;

use crate::{
    constants::RECEIPT_POLL_ATTEMPTS,
    settings::AggregatorSettings,
    state::EOA_NONCE,
    types::ProtocolId,
    utils::{
        common::{eth_call, get_nonce, get_receipt, receipt_outcome},
        error::{oracle_err, ManagerError, ManagerResult},
        evm_rpc::SendRawTransactionStatus,
        transaction_builder::TransactionBuilder,
    },
};

use super::{aave::AavePool, compound::CompoundMarket, LendingProtocol};

/// Connection to the chain, shared by every adapter
#[derive(Clone, Debug)]
pub struct EvmContext {
    pub settings: AggregatorSettings,
}

impl EvmContext {
    pub fn new(settings: AggregatorSettings) -> Self {
        Self { settings }
    }

    /// Read-only contract call
    pub async fn read<F: SolCall>(&self, to: Address, call: F) -> ManagerResult<F::Return> {
        eth_call(&self.settings.rpc_canister, to, &call).await
    }

    /// Read-only contract call whose failure means the protocol's rates are unavailable
    pub async fn read_rate<F: SolCall>(&self, to: Address, call: F) -> ManagerResult<F::Return> {
        self.read(to, call).await.map_err(oracle_err)
    }

    /// Reserves a nonce for the next transaction. The cached nonce is taken
    /// without awaiting, so concurrent sends never share one.
    async fn next_nonce(&self) -> ManagerResult<u64> {
        if let Some(cached) = EOA_NONCE.with(|nonce| nonce.get()) {
            return Ok(reserve_nonce(cached));
        }
        let pending = get_nonce(&self.settings.rpc_canister, self.settings.eoa).await?;
        Ok(reserve_nonce(pending))
    }

    /// Waits for the receipt of `hash` and checks its status
    async fn confirm(&self, hash: B256) -> ManagerResult<()> {
        for _ in 0..RECEIPT_POLL_ATTEMPTS {
            if let Ok(Some(receipt)) = get_receipt(&self.settings.rpc_canister, hash).await {
                return receipt_outcome(hash, receipt.status.map(Nat::from));
            }
        }
        Err(ManagerError::Unconfirmed(hash.to_string()))
    }

    /// Signs and sends a transaction from the EOA, then waits until it is mined.
    /// A nonce mismatch drops the cached nonce and retries once.
    pub async fn submit<F: SolCall>(&self, to: Address, call: F) -> ManagerResult<()> {
        let data = call.abi_encode();

        for _ in 0..2 {
            let nonce = self.next_nonce().await?;
            let sent = TransactionBuilder::default()
                .to(to)
                .data(data.clone())
                .value(U256::ZERO)
                .nonce(nonce)
                .send(&self.settings)
                .await;

            let (status, hash) = match sent {
                Ok(sent) => sent,
                Err(err) => {
                    forget_nonce();
                    return Err(err);
                }
            };

            match status {
                SendRawTransactionStatus::Ok(_) => return self.confirm(hash).await,
                SendRawTransactionStatus::InsufficientFunds => {
                    forget_nonce();
                    return Err(ManagerError::Custom(
                        "Not enough balance to cover the gas fee.".to_string(),
                    ));
                }
                SendRawTransactionStatus::NonceTooLow | SendRawTransactionStatus::NonceTooHigh => {
                    forget_nonce();
                }
            }
        }

        Err(ManagerError::Custom(
            "The transaction was rejected twice because of a nonce mismatch.".to_string(),
        ))
    }
}

/// Hands out `base`, or the cached nonce if it is ahead, and caches the one after it
fn reserve_nonce(base: u64) -> u64 {
    EOA_NONCE.with(|cell| {
        let nonce = cell.get().map_or(base, |cached| cached.max(base));
        cell.set(Some(nonce + 1));
        nonce
    })
}

/// The next send reads the pending nonce from the chain
fn forget_nonce() {
    EOA_NONCE.with(|cell| cell.set(None));
}

/// Either of the two on-chain protocols
pub enum EvmVenue {
    Compound(CompoundMarket),
    Aave(AavePool),
}

impl LendingProtocol for EvmVenue {
    fn id(&self) -> ProtocolId {
        match self {
            EvmVenue::Compound(market) => market.id(),
            EvmVenue::Aave(pool) => pool.id(),
        }
    }

    async fn raw_rate(&self) -> ManagerResult<U256> {
        match self {
            EvmVenue::Compound(market) => market.raw_rate().await,
            EvmVenue::Aave(pool) => pool.raw_rate().await,
        }
    }

    async fn accrual_index(&self) -> ManagerResult<U256> {
        match self {
            EvmVenue::Compound(market) => market.accrual_index().await,
            EvmVenue::Aave(pool) => pool.accrual_index().await,
        }
    }

    async fn supply(&self, amount: U256) -> ManagerResult<()> {
        match self {
            EvmVenue::Compound(market) => market.supply(amount).await,
            EvmVenue::Aave(pool) => pool.supply(amount).await,
        }
    }

    async fn withdraw(&self, amount: U256) -> ManagerResult<U256> {
        match self {
            EvmVenue::Compound(market) => market.withdraw(amount).await,
            EvmVenue::Aave(pool) => pool.withdraw(amount).await,
        }
    }
}
