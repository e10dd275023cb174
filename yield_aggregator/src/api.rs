//! Bodies of the canister endpoints

use candid::{Nat, Principal};

use crate::{
    journal::{JournalCollection, LogType},
    position::executable::ExecutablePosition,
    protocol::{
        aave::AavePool,
        compound::CompoundMarket,
        erc20::Erc20,
        evm::{EvmContext, EvmVenue},
        Venues,
    },
    settings::{AggregatorSettings, SettingsQuery},
    state::{LEDGER, SETTINGS},
    types::{DepositTarget, InitArgs, ProtocolId, ProtocolQuoteView, RebalanceReport, UserBalance},
    utils::{
        common::{nat_to_u256, only_controller, string_to_address, u256_to_nat},
        error::ManagerResult,
    },
};

/// Both protocols and the asset, reached through the EVM RPC canister
fn evm_venues() -> Venues<EvmVenue, Erc20> {
    let context = EvmContext::new(SETTINGS.with(|settings| settings.borrow().clone()));
    Venues {
        compound: EvmVenue::Compound(CompoundMarket::new(context.clone())),
        aave: EvmVenue::Aave(AavePool::new(context.clone())),
        token: Erc20::new(context),
    }
}

pub fn init(args: InitArgs) -> ManagerResult<()> {
    let settings = AggregatorSettings::try_from(args)?;
    SETTINGS.with(|cell| *cell.borrow_mut() = settings);
    Ok(())
}

pub async fn deposit(
    caller: Principal,
    user: String,
    amount: Nat,
    protocol: Option<ProtocolId>,
) -> ManagerResult<UserBalance> {
    only_controller(caller)?;
    let address = string_to_address(user.clone())?;
    let amount = nat_to_u256(&amount)?;

    let mut journal = JournalCollection::open("deposit", Some(user));
    let venues = evm_venues();
    let result = match ExecutablePosition::open(&venues, address) {
        Ok(mut position) => position
            .deposit(amount, DepositTarget::from(protocol), &mut journal)
            .await
            .map(|position| UserBalance::new(address, &position)),
        Err(err) => Err(err),
    };
    journal.append(&result, LogType::Deposit);
    result
}

pub async fn withdraw(caller: Principal, user: String) -> ManagerResult<Nat> {
    only_controller(caller)?;
    let address = string_to_address(user.clone())?;

    let mut journal = JournalCollection::open("withdraw", Some(user));
    let venues = evm_venues();
    let result = match ExecutablePosition::open(&venues, address) {
        Ok(mut position) => position.withdraw(&mut journal).await,
        Err(err) => Err(err),
    };
    journal.append(&result, LogType::Withdrawal);
    result.map(|paid| u256_to_nat(&paid))
}

pub async fn rebalance(
    caller: Principal,
    user: String,
    protocol: Option<ProtocolId>,
) -> ManagerResult<RebalanceReport> {
    only_controller(caller)?;
    let address = string_to_address(user.clone())?;

    let mut journal = JournalCollection::open("rebalance", Some(user));
    let venues = evm_venues();
    let result = match ExecutablePosition::open(&venues, address) {
        Ok(mut position) => position
            .rebalance(DepositTarget::from(protocol), &mut journal)
            .await
            .map(|decision| RebalanceReport {
                from: decision.from,
                to: decision.to,
                amount: u256_to_nat(&decision.amount),
                balance: UserBalance::new(address, &position.position()),
            }),
        Err(err) => Err(err),
    };
    journal.append(&result, LogType::Rebalance);
    result
}

pub fn get_user_balance(user: String) -> ManagerResult<UserBalance> {
    let address = string_to_address(user)?;
    let position = LEDGER.with(|ledger| ledger.borrow().position(address));
    Ok(UserBalance::new(address, &position))
}

pub async fn get_quotes() -> ManagerResult<Vec<ProtocolQuoteView>> {
    let quotes = evm_venues().quotes().await?;
    Ok(quotes.into_iter().map(ProtocolQuoteView::from).collect())
}

pub fn get_settings() -> SettingsQuery {
    SETTINGS.with(|settings| settings.borrow().clone()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{constants::ray, types::GasInput, utils::error::ManagerError};
    use alloy_primitives::{Address, U256};

    #[test]
    fn test_user_balance_of_unknown_user_is_zero() {
        let balance = get_user_balance(Address::repeat_byte(0x01).to_string()).unwrap();
        assert_eq!(balance.compound_principal, Nat::from(0u8));
        assert_eq!(balance.aave_principal, Nat::from(0u8));
        assert_eq!(balance.held, Nat::from(0u8));
    }

    #[test]
    fn test_user_balance_reads_the_ledger() {
        let user = Address::repeat_byte(0x02);
        LEDGER.with(|ledger| {
            ledger
                .borrow_mut()
                .record_deposit(user, ProtocolId::Compound, U256::from(42), ray())
                .unwrap();
        });

        let balance = get_user_balance(user.to_string()).unwrap();
        assert_eq!(balance.compound_principal, Nat::from(42u8));
        assert_eq!(balance.user, user.to_string());
    }

    #[test]
    fn test_user_balance_rejects_bad_addresses() {
        assert!(matches!(
            get_user_balance("0x1234".to_string()),
            Err(ManagerError::DecodingError(_))
        ));
    }

    #[test]
    fn test_init_stores_the_settings() {
        let args = InitArgs {
            rpc_principal: Principal::anonymous(),
            asset: Address::repeat_byte(0x11).to_string(),
            aave_pool: Address::repeat_byte(0x22).to_string(),
            compound_market: Address::repeat_byte(0x33).to_string(),
            eoa: Address::repeat_byte(0x44).to_string(),
            key_name: "dfx_test_key".to_string(),
            derivation_path: vec![],
            gas: GasInput {
                max_fee_per_gas: Nat::from(10u8),
                max_priority_fee_per_gas: Nat::from(1u8),
                gas_limit: Some(Nat::from(100_000u32)),
            },
        };
        init(args).unwrap();

        let settings = get_settings();
        assert_eq!(settings.eoa, Address::repeat_byte(0x44).to_string());
        assert_eq!(settings.key_name, "dfx_test_key");
        assert_eq!(settings.gas_limit, Nat::from(100_000u32));
    }
}
