//! External collaborators: the two lending protocols and the ERC-20 asset.
//!
//! The orchestrator only sees the traits below. The EVM implementations read
//! through `eth_call` and write with transactions signed by the canister's EOA.

#![allow(async_fn_in_trait)]

use alloy_primitives::{Address, U256};

use crate::{
    apy::{choose_protocol, quote},
    types::{ProtocolId, ProtocolQuote},
    utils::error::{oracle_err, ManagerResult},
};

pub(crate) mod aave;
pub(crate) mod compound;
pub(crate) mod erc20;
pub(crate) mod evm;
#[cfg(test)]
pub(crate) mod simulated;

/// A lending protocol the aggregator can hold funds in
pub trait LendingProtocol {
    fn id(&self) -> ProtocolId;

    /// Current raw supply rate in the protocol's own fixed-point encoding
    async fn raw_rate(&self) -> ManagerResult<U256>;

    /// Index by which supplied funds grow, used to value a user's holding
    async fn accrual_index(&self) -> ManagerResult<U256>;

    /// Supplies `amount` of the asset held by the EOA
    async fn supply(&self, amount: U256) -> ManagerResult<()>;

    /// Redeems `amount` of the asset back to the EOA. Returns the amount received.
    async fn withdraw(&self, amount: U256) -> ManagerResult<U256>;
}

/// Standard fungible-token surface, seen from the EOA
pub trait TokenCustody {
    async fn balance_of(&self, owner: Address) -> ManagerResult<U256>;

    async fn allowance(&self, owner: Address, spender: Address) -> ManagerResult<U256>;

    async fn approve(&self, spender: Address, amount: U256) -> ManagerResult<()>;

    /// Moves `amount` from `from` into the EOA. `from` must have approved the EOA.
    /// Fails with `InsufficientBalance` if the balance or the allowance is short.
    async fn pull(&self, from: Address, amount: U256) -> ManagerResult<()>;

    /// Pays `amount` out of the EOA to `to`
    async fn push(&self, to: Address, amount: U256) -> ManagerResult<()>;
}

/// Both protocols and the asset they share
pub struct Venues<P, T> {
    pub compound: P,
    pub aave: P,
    pub token: T,
}

impl<P: LendingProtocol, T: TokenCustody> Venues<P, T> {
    pub fn protocol(&self, id: ProtocolId) -> &P {
        match id {
            ProtocolId::Compound => &self.compound,
            ProtocolId::Aave => &self.aave,
        }
    }

    /// Reads the current rate of `id` and annualizes it
    pub async fn quote(&self, id: ProtocolId) -> ManagerResult<ProtocolQuote> {
        let raw_rate = self.protocol(id).raw_rate().await.map_err(oracle_err)?;
        quote(id, raw_rate).map_err(oracle_err)
    }

    /// Quotes of both protocols, Compound first.
    /// Fails with `OracleUnavailable` if either rate cannot be read.
    pub async fn quotes(&self) -> ManagerResult<[ProtocolQuote; 2]> {
        let compound = self.quote(ProtocolId::Compound).await?;
        let aave = self.quote(ProtocolId::Aave).await?;
        Ok([compound, aave])
    }

    /// The protocol currently paying the higher APY
    pub async fn best_protocol(&self) -> ManagerResult<ProtocolId> {
        let [compound, aave] = self.quotes().await?;
        Ok(choose_protocol(
            compound.annualized_percent,
            aave.annualized_percent,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::simulated::venues;
    use super::*;
    use crate::{constants::RAY, utils::error::ManagerError};

    // 5% APR on Aave against a little under 4% APY on Compound
    const AAVE_FIVE_PERCENT: u128 = RAY / 20;
    const COMPOUND_RATE: u128 = 1_000_000_000_000_000_000 / (5760 * 365 * 28);

    #[tokio::test]
    async fn test_best_protocol_follows_the_higher_apy() {
        let venues = venues(U256::from(COMPOUND_RATE), U256::from(AAVE_FIVE_PERCENT));
        assert_eq!(venues.best_protocol().await.unwrap(), ProtocolId::Aave);

        venues.aave.set_rate(U256::ZERO);
        assert_eq!(venues.best_protocol().await.unwrap(), ProtocolId::Compound);
    }

    #[tokio::test]
    async fn test_equal_rates_go_to_aave() {
        let venues = venues(U256::ZERO, U256::ZERO);
        assert_eq!(venues.best_protocol().await.unwrap(), ProtocolId::Aave);
    }

    #[tokio::test]
    async fn test_quotes_are_ordered() {
        let venues = venues(U256::from(COMPOUND_RATE), U256::from(AAVE_FIVE_PERCENT));
        let [compound, aave] = venues.quotes().await.unwrap();
        assert_eq!(compound.protocol, ProtocolId::Compound);
        assert_eq!(aave.protocol, ProtocolId::Aave);
        assert_eq!(aave.raw_rate, U256::from(AAVE_FIVE_PERCENT));
        assert!(aave.annualized_percent > 5.0);
    }

    #[tokio::test]
    async fn test_unreadable_rate_is_oracle_unavailable() {
        let venues = venues(U256::from(COMPOUND_RATE), U256::from(AAVE_FIVE_PERCENT));
        venues.compound.book.borrow_mut().fail_rates = true;
        assert!(matches!(
            venues.best_protocol().await,
            Err(ManagerError::OracleUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_absurd_rate_is_oracle_unavailable() {
        let venues = venues(U256::MAX, U256::from(AAVE_FIVE_PERCENT));
        assert!(matches!(
            venues.quote(ProtocolId::Compound).await,
            Err(ManagerError::OracleUnavailable(_))
        ));
    }
}
