//! Transaction builder (and sender) that interacts with the EVM RPC canister

use alloy::consensus::TxEip1559;
use alloy_primitives::{Address, Bytes, TxKind, B256, U256};
use ic_exports::ic_cdk::api::management_canister::ecdsa::{EcdsaCurve, EcdsaKeyId};

use crate::{
    constants::{rpc_services, CHAIN_ID, SEND_TRANSACTION_CYCLES},
    settings::AggregatorSettings,
};

use super::{
    common::{extract_call_result, extract_multi_rpc_result},
    error::ManagerResult,
    evm_rpc::SendRawTransactionStatus,
    signer::sign_eip1559_transaction,
};

/// Transaction builder struct
#[derive(Default)]
pub struct TransactionBuilder {
    to: Address,
    data: Vec<u8>,
    value: U256,
    nonce: u64,
}

impl TransactionBuilder {
    /// Sets the `to` field
    pub fn to(mut self, to: Address) -> Self {
        self.to = to;
        self
    }

    /// Sets the `data` field
    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Sets the `value` field
    pub fn value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    /// Sets the `nonce` field
    pub fn nonce(mut self, nonce: u64) -> Self {
        self.nonce = nonce;
        self
    }

    /// Builds the EIP-1559 transaction with the static gas settings
    pub fn build(&self, settings: &AggregatorSettings) -> TxEip1559 {
        TxEip1559 {
            chain_id: CHAIN_ID,
            to: TxKind::Call(self.to),
            max_fee_per_gas: settings.max_fee_per_gas,
            max_priority_fee_per_gas: settings.max_priority_fee_per_gas,
            value: self.value,
            nonce: self.nonce,
            gas_limit: settings.gas_limit,
            access_list: Default::default(),
            input: Bytes::from(self.data.clone()),
        }
    }

    /// Builds the TransactionBuilder into a Transaction, signs it and sends it.
    /// Returns the send status and the hash to look the receipt up by.
    pub async fn send(
        self,
        settings: &AggregatorSettings,
    ) -> ManagerResult<(SendRawTransactionStatus, B256)> {
        let key_id = EcdsaKeyId {
            curve: EcdsaCurve::Secp256k1,
            name: settings.key_name.clone(),
        };

        let (signed_transaction, hash) = sign_eip1559_transaction(
            self.build(settings),
            key_id,
            settings.derivation_path.clone(),
            settings.eoa,
        )
        .await?;

        let response = settings
            .rpc_canister
            .eth_send_raw_transaction(rpc_services(), None, signed_transaction, SEND_TRANSACTION_CYCLES)
            .await;

        let status = extract_multi_rpc_result(extract_call_result(response)?)?;
        Ok((status, hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_uses_static_gas_settings() {
        let mut settings = AggregatorSettings::default();
        settings.gas(30_000_000_000, 1_500_000_000, 300_000);

        let to = Address::repeat_byte(0x11);
        let transaction = TransactionBuilder::default()
            .to(to)
            .data(vec![1, 2, 3])
            .nonce(7)
            .build(&settings);

        assert_eq!(transaction.chain_id, CHAIN_ID);
        assert_eq!(transaction.to, TxKind::Call(to));
        assert_eq!(transaction.nonce, 7);
        assert_eq!(transaction.max_fee_per_gas, 30_000_000_000);
        assert_eq!(transaction.max_priority_fee_per_gas, 1_500_000_000);
        assert_eq!(transaction.gas_limit, 300_000);
        assert_eq!(transaction.value, U256::ZERO);
        assert_eq!(transaction.input, Bytes::from(vec![1, 2, 3]));
    }
}
