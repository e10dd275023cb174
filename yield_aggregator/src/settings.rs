//! Settings given at initialization

use alloy_primitives::Address;
use candid::{CandidType, Nat};
use serde::Deserialize;

use crate::{
    constants::DEFAULT_GAS_LIMIT,
    types::{DerivationPath, InitArgs},
    utils::{
        common::{nat_to_u256, string_to_address, u256_to_nat, u256_to_u128},
        error::ManagerError,
        evm_rpc::Service,
    },
};

/// These settings are only set once, at initialization
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AggregatorSettings {
    /// ERC-20 asset held by the aggregator
    pub asset: Address,
    /// Aave v3 pool contract address
    pub aave_pool: Address,
    /// Compound cToken market of `asset`
    pub compound_market: Address,
    /// The EOA that holds the funds on chain
    pub eoa: Address,
    /// Name of the threshold ECDSA key
    pub key_name: String,
    /// Derivation path of the ECDSA signature
    pub derivation_path: DerivationPath,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub gas_limit: u128,
    /// RPC canister service
    pub rpc_canister: Service,
}

impl AggregatorSettings {
    /// Sets the asset address.
    pub fn asset(&mut self, asset: Address) -> &mut Self {
        self.asset = asset;
        self
    }

    /// Sets the Aave pool contract address.
    pub fn aave_pool(&mut self, aave_pool: Address) -> &mut Self {
        self.aave_pool = aave_pool;
        self
    }

    /// Sets the Compound market contract address.
    pub fn compound_market(&mut self, compound_market: Address) -> &mut Self {
        self.compound_market = compound_market;
        self
    }

    /// Sets the EOA address.
    pub fn eoa(&mut self, eoa: Address) -> &mut Self {
        self.eoa = eoa;
        self
    }

    /// Sets the threshold ECDSA key name.
    pub fn key_name(&mut self, key_name: String) -> &mut Self {
        self.key_name = key_name;
        self
    }

    /// Sets the derivation path of the ECDSA signature.
    pub fn derivation_path(&mut self, derivation_path: DerivationPath) -> &mut Self {
        self.derivation_path = derivation_path;
        self
    }

    /// Sets the static gas parameters.
    pub fn gas(
        &mut self,
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
        gas_limit: u128,
    ) -> &mut Self {
        self.max_fee_per_gas = max_fee_per_gas;
        self.max_priority_fee_per_gas = max_priority_fee_per_gas;
        self.gas_limit = gas_limit;
        self
    }

    /// Sets the RPC canister service.
    pub fn rpc_canister(&mut self, rpc_canister: Service) -> &mut Self {
        self.rpc_canister = rpc_canister;
        self
    }
}

fn nat_to_u128(n: &Nat) -> Result<u128, ManagerError> {
    u256_to_u128(nat_to_u256(n)?)
}

impl TryFrom<InitArgs> for AggregatorSettings {
    type Error = ManagerError;

    fn try_from(value: InitArgs) -> Result<Self, Self::Error> {
        let gas_limit = match &value.gas.gas_limit {
            Some(limit) => nat_to_u128(limit)?,
            None => DEFAULT_GAS_LIMIT,
        };

        if value.gas.max_priority_fee_per_gas > value.gas.max_fee_per_gas {
            return Err(ManagerError::Custom(
                "The priority fee cannot exceed the max fee per gas.".to_string(),
            ));
        }

        let mut settings = AggregatorSettings::default();
        settings
            .asset(string_to_address(value.asset)?)
            .aave_pool(string_to_address(value.aave_pool)?)
            .compound_market(string_to_address(value.compound_market)?)
            .eoa(string_to_address(value.eoa)?)
            .key_name(value.key_name)
            .derivation_path(value.derivation_path)
            .gas(
                nat_to_u128(&value.gas.max_fee_per_gas)?,
                nat_to_u128(&value.gas.max_priority_fee_per_gas)?,
                gas_limit,
            )
            .rpc_canister(Service(value.rpc_principal));
        Ok(settings)
    }
}

/// Candid view of the settings
#[derive(Clone, Debug, Default, CandidType, Deserialize)]
pub struct SettingsQuery {
    pub asset: String,
    pub aave_pool: String,
    pub compound_market: String,
    pub eoa: String,
    pub key_name: String,
    pub max_fee_per_gas: Nat,
    pub max_priority_fee_per_gas: Nat,
    pub gas_limit: Nat,
}

impl From<AggregatorSettings> for SettingsQuery {
    fn from(value: AggregatorSettings) -> Self {
        Self {
            asset: value.asset.to_string(),
            aave_pool: value.aave_pool.to_string(),
            compound_market: value.compound_market.to_string(),
            eoa: value.eoa.to_string(),
            key_name: value.key_name,
            max_fee_per_gas: u256_to_nat(&alloy_primitives::U256::from(value.max_fee_per_gas)),
            max_priority_fee_per_gas: u256_to_nat(&alloy_primitives::U256::from(
                value.max_priority_fee_per_gas,
            )),
            gas_limit: u256_to_nat(&alloy_primitives::U256::from(value.gas_limit)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GasInput;
    use candid::Principal;
    use proptest::prelude::*;

    fn init_args() -> InitArgs {
        InitArgs {
            rpc_principal: Principal::anonymous(),
            asset: "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
            aave_pool: "0x87870bca3f3fd6335c3f4ce8392d69350b4fa4e2".to_string(),
            compound_market: "0xa17581a9e3356d9a858b789d68b4d866e593ae94".to_string(),
            eoa: "0x0123456789abcdef0123456789abcdef01234567".to_string(),
            key_name: "key_1".to_string(),
            derivation_path: vec![vec![0]],
            gas: GasInput {
                max_fee_per_gas: Nat::from(30_000_000_000u64),
                max_priority_fee_per_gas: Nat::from(1_500_000_000u64),
                gas_limit: None,
            },
        }
    }

    #[test]
    fn test_settings_from_init_args() {
        let settings = AggregatorSettings::try_from(init_args()).unwrap();
        assert_eq!(
            settings.asset,
            string_to_address("0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string()).unwrap()
        );
        assert_eq!(settings.key_name, "key_1");
        assert_eq!(settings.max_fee_per_gas, 30_000_000_000);
        assert_eq!(settings.max_priority_fee_per_gas, 1_500_000_000);
        assert_eq!(settings.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(settings.rpc_canister, Service(Principal::anonymous()));
    }

    #[test]
    fn test_settings_reject_invalid_addresses() {
        let mut args = init_args();
        args.aave_pool = "not an address".to_string();
        assert!(matches!(
            AggregatorSettings::try_from(args),
            Err(ManagerError::DecodingError(_))
        ));
    }

    #[test]
    fn test_settings_reject_inverted_fees() {
        let mut args = init_args();
        args.gas.max_priority_fee_per_gas = Nat::from(40_000_000_000u64);
        assert!(matches!(
            AggregatorSettings::try_from(args),
            Err(ManagerError::Custom(_))
        ));
    }

    #[test]
    fn test_settings_query_view() {
        let settings = AggregatorSettings::try_from(init_args()).unwrap();
        let query = SettingsQuery::from(settings.clone());
        assert_eq!(query.eoa, settings.eoa.to_string());
        assert_eq!(query.gas_limit, Nat::from(DEFAULT_GAS_LIMIT));
    }

    proptest! {
        #[test]
        fn test_settings_setters_proptest(
            asset in any::<[u8; 20]>(),
            aave_pool in any::<[u8; 20]>(),
            compound_market in any::<[u8; 20]>(),
            eoa in any::<[u8; 20]>(),
            max_fee in any::<u64>(),
            gas_limit in any::<u64>(),
        ) {
            let mut settings = AggregatorSettings::default();

            let asset = Address::from_slice(&asset);
            let aave_pool = Address::from_slice(&aave_pool);
            let compound_market = Address::from_slice(&compound_market);
            let eoa = Address::from_slice(&eoa);

            settings
                .asset(asset)
                .aave_pool(aave_pool)
                .compound_market(compound_market)
                .eoa(eoa)
                .gas(max_fee as u128, (max_fee / 2) as u128, gas_limit as u128);

            prop_assert_eq!(settings.asset, asset);
            prop_assert_eq!(settings.aave_pool, aave_pool);
            prop_assert_eq!(settings.compound_market, compound_market);
            prop_assert_eq!(settings.eoa, eoa);
            prop_assert_eq!(settings.max_fee_per_gas, max_fee as u128);
            prop_assert_eq!(settings.max_priority_fee_per_gas, (max_fee / 2) as u128);
            prop_assert_eq!(settings.gas_limit, gas_limit as u128);
        }
    }
}
