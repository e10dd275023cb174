//! Common utility and helper functions that are used across the project

use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use alloy_sol_types::SolCall;
use candid::{Nat, Principal};
use evm_rpc_types::{
    Hex32, HttpOutcallError, MultiRpcResult, RpcConfig, RpcError, TransactionReceipt,
};
use ic_exports::ic_cdk::api::{call::CallResult, is_controller};
use num_bigint::BigUint;

use super::{error::*, evm_rpc::*};

use crate::constants::{
    rpc_services, DEFAULT_MAX_RESPONSE_BYTES, MAX_RESPONSE_BYTES_CEILING, PROVIDER_COUNT,
    PROVIDER_THRESHOLD, RECEIPT_MAX_RESPONSE_BYTES, RPC_CALL_CYCLES,
};

/// Current time in nanoseconds.
/// Inside a canister this is the IC system time.
pub fn timestamp() -> u64 {
    #[cfg(target_arch = "wasm32")]
    {
        ic_exports::ic_cdk::api::time()
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|duration| duration.as_nanos() as u64)
            .unwrap_or_default()
    }
}

/// Returns Err if the `caller` is not a controller of the canister
pub fn only_controller(caller: Principal) -> ManagerResult<()> {
    if !is_controller(&caller) {
        // only the controller should be able to call this function
        return Err(ManagerError::Unauthorized);
    }
    Ok(())
}

/// Converts String to Address and returns ManagerError on failure
pub fn string_to_address(input: String) -> ManagerResult<Address> {
    Address::from_str(&input).map_err(|err| ManagerError::DecodingError(format!("{:#?}", err)))
}

/// Converts values of type `Nat` to `U256`
pub fn nat_to_u256(n: &Nat) -> ManagerResult<U256> {
    let be_bytes = n.0.to_bytes_be();
    if be_bytes.len() > 32 {
        return Err(ManagerError::DecodingError("The `Nat` input length exceedes 32 bytes when converted to big-endian bytes representation.".to_string()));
    }
    // Ensure the byte array is exactly 32 bytes long
    let mut padded_bytes = [0u8; 32];
    let start_pos = 32 - be_bytes.len();
    padded_bytes[start_pos..].copy_from_slice(&be_bytes);

    Ok(U256::from_be_bytes(padded_bytes))
}

/// Converts values of type `U256` to `Nat`
pub fn u256_to_nat(n: &U256) -> Nat {
    Nat(BigUint::from_bytes_be(&n.to_be_bytes::<32>()))
}

/// Converts `U256` to `u128` and returns an arithmetic error if it does not fit
pub fn u256_to_u128(n: U256) -> ManagerResult<u128> {
    u128::try_from(n).map_err(|_| arithmetic_err(format!("{} does not fit in 128 bits.", n)))
}

/// Returns `T` from Solidity struct.
pub fn decode_abi_response<T, F: SolCall<Return = T>>(hex_data: String) -> ManagerResult<T> {
    let stripped_hex = match hex_data.strip_prefix("0x") {
        Some(stripped) => stripped.to_string(),
        None => hex_data,
    };
    let hex_bytes =
        hex::decode(stripped_hex).map_err(|err| ManagerError::DecodingError(err.to_string()))?;
    F::abi_decode_returns(&hex_bytes, false)
        .map_err(|err| ManagerError::DecodingError(err.to_string()))
}

fn is_response_size_error(err: &RpcError) -> bool {
    if let RpcError::HttpOutcallError(HttpOutcallError::IcError { message, .. }) = err {
        message.contains("size limit") || message.contains("length limit")
    } else {
        false
    }
}

pub fn get_rpc_config(max_response_bytes: Option<u64>) -> RpcConfig {
    RpcConfig {
        response_size_estimate: max_response_bytes,
        response_consensus: Some(evm_rpc_types::ConsensusStrategy::Threshold {
            total: Some(PROVIDER_COUNT),
            min: PROVIDER_THRESHOLD,
        }),
    }
}

/// Performs `eth_call` calls to the EVM RPC canister and doubles the max response bytes argument, if insufficient
/// Exits the loop if either of the following are satisfied:
/// A) The EVM RPC canister responds with Ok() or an error that is not related to the response size
/// B) The limit of 2MB is reached.
pub async fn call_with_dynamic_retries(
    rpc_canister: &Service,
    block: BlockTag,
    to: Address,
    data: Vec<u8>,
) -> ManagerResult<String> {
    let mut max_response_bytes = DEFAULT_MAX_RESPONSE_BYTES;
    let data_string = format!("0x{}", hex::encode(data));

    while max_response_bytes < MAX_RESPONSE_BYTES_CEILING {
        let transaction = TransactionRequest {
            to: Some(to.to_string()),
            input: Some(data_string.clone()),
            ..Default::default()
        };

        let args = CallArgs {
            transaction,
            block: Some(block.clone()),
        };

        let config = get_rpc_config(Some(max_response_bytes));
        let response = rpc_canister
            .eth_call(rpc_services(), Some(config), args, RPC_CALL_CYCLES)
            .await;

        let extracted_response = extract_call_result(response)?;
        let extracted_rpc_result = extract_multi_rpc_result(extracted_response);

        if let Err(ManagerError::RpcResponseError(err)) = &extracted_rpc_result {
            if is_response_size_error(err) {
                max_response_bytes *= 2;
                continue;
            }
        }

        // note: if the code has reached this line, it means that a response unrelated to the size was received.
        return extracted_rpc_result;
    }

    Err(ManagerError::Custom(
        "Request with dynamic retries reached its ceiling of 2 Megabytes.".to_string(),
    ))
}

/// Encodes `call`, sends it as an `eth_call` against the latest block and decodes the return data.
pub async fn eth_call<F: SolCall>(
    rpc_canister: &Service,
    to: Address,
    call: &F,
) -> ManagerResult<F::Return> {
    let response =
        call_with_dynamic_retries(rpc_canister, BlockTag::Latest, to, call.abi_encode()).await?;
    decode_abi_response::<F::Return, F>(response)
}

/// On success, returns the nonce associated with the given address
pub async fn get_nonce(rpc_canister: &Service, address: Address) -> ManagerResult<u64> {
    let args = GetTransactionCountArgs {
        address: address.to_string(),
        block: BlockTag::Pending,
    };

    let result = rpc_canister
        .eth_get_transaction_count(
            rpc_services(),
            Some(get_rpc_config(Some(10_000))),
            args,
            RPC_CALL_CYCLES,
        )
        .await;

    let wrapped_number = extract_call_result::<MultiRpcResult<Nat>>(result)?;
    let number = extract_multi_rpc_result(wrapped_number)?;
    u64::try_from(number.0).map_err(|err| ManagerError::DecodingError(format!("{:#?}", err)))
}

/// Returns the receipt of the transaction, or `None` while it is not mined
pub async fn get_receipt(
    rpc_canister: &Service,
    hash: B256,
) -> ManagerResult<Option<TransactionReceipt>> {
    let result = rpc_canister
        .eth_get_transaction_receipt(
            rpc_services(),
            Some(get_rpc_config(Some(RECEIPT_MAX_RESPONSE_BYTES))),
            Hex32::from(hash.0),
            RPC_CALL_CYCLES,
        )
        .await;

    extract_multi_rpc_result(extract_call_result(result)?)
}

/// Status 1 is success and 0 a revert. Receipts without a status predate
/// EIP-658 and are taken as mined.
pub fn receipt_outcome(hash: B256, status: Option<Nat>) -> ManagerResult<()> {
    match status {
        Some(status) if status != Nat::from(1u8) => {
            Err(ManagerError::TransactionReverted(hash.to_string()))
        }
        _ => Ok(()),
    }
}

/// Extracts the Ok or Err values of a canister call and returns them.
pub fn extract_call_result<T>(result: CallResult<(T,)>) -> ManagerResult<T> {
    result
        .map(|(success_value,)| success_value)
        .map_err(|(rejection_code, error_message)| {
            ManagerError::CallResult(rejection_code, error_message)
        })
}

/// Unwraps the result of a multi-provider call.
/// Providers that disagree are reported as `NoConsensus`.
pub fn extract_multi_rpc_result<T>(result: MultiRpcResult<T>) -> ManagerResult<T> {
    match result {
        MultiRpcResult::Consistent(response) => response.map_err(ManagerError::RpcResponseError),
        MultiRpcResult::Inconsistent(_) => Err(ManagerError::NoConsensus),
    }
}
