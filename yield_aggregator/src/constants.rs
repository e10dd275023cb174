//! Yield Aggregator's Constants

use alloy_primitives::U256;
use evm_rpc_types::RpcServices;

/// Scale used for fixed point arithmetic
pub const SCALE: u128 = 1_000_000_000_000_000_000; // e18

/// Aave's ray scale
pub const RAY: u128 = 1_000_000_000_000_000_000_000_000_000; // e27
pub fn ray() -> U256 {
    U256::from(RAY)
}

/// Roughly 4 blocks per minute
pub const BLOCKS_PER_DAY: u64 = 4 * 60 * 24;

pub const DAYS_PER_YEAR: u64 = 365;

pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Chain ID
#[cfg(feature = "sepolia")]
pub const CHAIN_ID: u64 = 11155111; // Sepolia testnet
#[cfg(not(feature = "sepolia"))]
pub const CHAIN_ID: u64 = 1; // Ethereum mainnet

/// Provider set used for every EVM RPC call
pub fn rpc_services() -> RpcServices {
    if cfg!(feature = "sepolia") {
        RpcServices::EthSepolia(None)
    } else {
        RpcServices::EthMainnet(None)
    }
}

/// Number of providers to use
pub const PROVIDER_COUNT: u8 = 3;

/// Number of providers needed to reach consensus
pub const PROVIDER_THRESHOLD: u8 = 2;

/// Default max response bytes
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 8_000;

/// There is a 2 MB limit on the response size of an HTTPS outcall
pub const MAX_RESPONSE_BYTES_CEILING: u64 = 2_000_000;

/// Cycles attached to a single EVM RPC canister call
pub const RPC_CALL_CYCLES: u128 = 10_000_000_000;

/// Cycles attached to a raw transaction submission
pub const SEND_TRANSACTION_CYCLES: u128 = 40_000_000_000;

/// Receipt lookups made after a send before the transaction counts as unconfirmed.
/// Each lookup is an HTTPS outcall and takes a few seconds.
pub const RECEIPT_POLL_ATTEMPTS: u32 = 20;

/// Receipts carry the logs of the transaction
pub const RECEIPT_MAX_RESPONSE_BYTES: u64 = 40_000;

/// Gas limit for every transaction sent by the EOA
pub const DEFAULT_GAS_LIMIT: u128 = 450_000;

/// Aave referral code passed on supply
pub const AAVE_REFERRAL_CODE: u16 = 0;

/// Number of journal collections kept in stable memory
pub const MAX_JOURNAL_COLLECTIONS: u64 = 300;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_is_e18() {
        assert_eq!(SCALE, 10_u128.pow(18));
    }

    #[test]
    fn ray_is_e27() {
        assert_eq!(RAY, 10_u128.pow(27));
        assert_eq!(ray(), U256::from(SCALE) * U256::from(1_000_000_000u64));
    }

    #[test]
    fn blocks_per_day_matches_four_blocks_a_minute() {
        assert_eq!(BLOCKS_PER_DAY, 5_760);
        assert_eq!(SECONDS_PER_YEAR, DAYS_PER_YEAR * 86_400);
    }
}
