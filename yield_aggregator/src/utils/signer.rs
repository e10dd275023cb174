//! Threshold ECDSA signing of EIP-1559 transactions

use alloy::{
    consensus::{SignableTransaction, TxEip1559, TxEnvelope},
    eips::eip2718::Encodable2718,
};
use alloy_primitives::{Address, Signature, B256, U256};
use ic_exports::ic_cdk::api::management_canister::ecdsa::{
    sign_with_ecdsa, EcdsaKeyId, SignWithEcdsaArgument,
};

use crate::types::DerivationPath;

use super::{
    common::extract_call_result,
    error::{ManagerError, ManagerResult},
};

/// Signs `transaction` with the threshold key and returns the raw, `0x`-prefixed
/// envelope along with the transaction hash.
/// `eoa` is the address of the key; it picks the recovery id of the signature.
pub async fn sign_eip1559_transaction(
    transaction: TxEip1559,
    key_id: EcdsaKeyId,
    derivation_path: DerivationPath,
    eoa: Address,
) -> ManagerResult<(String, B256)> {
    let message_hash = transaction.signature_hash();

    let argument = SignWithEcdsaArgument {
        message_hash: message_hash.to_vec(),
        derivation_path,
        key_id,
    };

    let response = extract_call_result(sign_with_ecdsa(argument).await)?;
    let signature = with_recovery_id(&response.signature, message_hash, eoa)?;

    let signed = transaction.into_signed(signature);
    let hash = *signed.hash();
    let envelope = TxEnvelope::from(signed);
    Ok((format!("0x{}", hex::encode(envelope.encoded_2718())), hash))
}

/// The management canister returns `r || s`. The parity that recovers `eoa` is the right one.
fn with_recovery_id(rs: &[u8], message_hash: B256, eoa: Address) -> ManagerResult<Signature> {
    if rs.len() != 64 {
        return Err(ManagerError::DecodingError(format!(
            "Expected a 64 byte signature, got {} bytes.",
            rs.len()
        )));
    }

    let r = U256::from_be_slice(&rs[..32]);
    let s = U256::from_be_slice(&rs[32..]);

    for parity in [0_u64, 1_u64] {
        let signature = Signature::from_rs_and_parity(r, s, parity)
            .map_err(|err| ManagerError::DecodingError(err.to_string()))?;
        if signature.recover_address_from_prehash(&message_hash).ok() == Some(eoa) {
            return Ok(signature);
        }
    }

    Err(ManagerError::Custom(
        "The signature does not recover to the configured EOA.".to_string(),
    ))
}
