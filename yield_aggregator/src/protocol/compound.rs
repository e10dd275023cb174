//! Compound v2 style cToken market

use alloy_primitives::U256;

use crate::{
    types::{
        exchangeRateCurrentCall, mintCall, redeemUnderlyingCall, supplyRatePerBlockCall, ProtocolId,
    },
    utils::error::ManagerResult,
};

use super::{erc20::Erc20, evm::EvmContext, LendingProtocol, TokenCustody};

pub struct CompoundMarket {
    context: EvmContext,
}

impl CompoundMarket {
    pub fn new(context: EvmContext) -> Self {
        Self { context }
    }
}

impl LendingProtocol for CompoundMarket {
    fn id(&self) -> ProtocolId {
        ProtocolId::Compound
    }

    /// `supplyRatePerBlock`, 1e18 scale
    async fn raw_rate(&self) -> ManagerResult<U256> {
        let market = self.context.settings.compound_market;
        Ok(self
            .context
            .read_rate(market, supplyRatePerBlockCall {})
            .await?
            ._0)
    }

    /// `exchangeRateCurrent`, simulated through `eth_call` so interest is
    /// accrued up to the latest block. Underlying per cToken.
    async fn accrual_index(&self) -> ManagerResult<U256> {
        let market = self.context.settings.compound_market;
        Ok(self
            .context
            .read_rate(market, exchangeRateCurrentCall {})
            .await?
            ._0)
    }

    async fn supply(&self, amount: U256) -> ManagerResult<()> {
        let market = self.context.settings.compound_market;
        Erc20::new(self.context.clone())
            .approve(market, amount)
            .await?;
        self.context
            .submit(market, mintCall { mintAmount: amount })
            .await
    }

    async fn withdraw(&self, amount: U256) -> ManagerResult<U256> {
        let market = self.context.settings.compound_market;
        self.context
            .submit(
                market,
                redeemUnderlyingCall {
                    redeemAmount: amount,
                },
            )
            .await?;
        Ok(amount)
    }
}
