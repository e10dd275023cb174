//! Aave v3 pool

use alloy_primitives::U256;

use crate::{
    constants::AAVE_REFERRAL_CODE,
    types::{
        getReserveDataCall, getReserveNormalizedIncomeCall, supplyCall, withdrawCall, ProtocolId,
    },
    utils::error::ManagerResult,
};

use super::{erc20::Erc20, evm::EvmContext, LendingProtocol, TokenCustody};

pub struct AavePool {
    context: EvmContext,
}

impl AavePool {
    pub fn new(context: EvmContext) -> Self {
        Self { context }
    }
}

impl LendingProtocol for AavePool {
    fn id(&self) -> ProtocolId {
        ProtocolId::Aave
    }

    /// `currentLiquidityRate` of the asset's reserve, ray scale
    async fn raw_rate(&self) -> ManagerResult<U256> {
        let settings = &self.context.settings;
        let reserve = self
            .context
            .read_rate(
                settings.aave_pool,
                getReserveDataCall {
                    asset: settings.asset,
                },
            )
            .await?
            ._0;
        Ok(U256::from(reserve.currentLiquidityRate))
    }

    /// `getReserveNormalizedIncome`: aToken balances grow with it, ray scale
    async fn accrual_index(&self) -> ManagerResult<U256> {
        let settings = &self.context.settings;
        Ok(self
            .context
            .read_rate(
                settings.aave_pool,
                getReserveNormalizedIncomeCall {
                    asset: settings.asset,
                },
            )
            .await?
            ._0)
    }

    async fn supply(&self, amount: U256) -> ManagerResult<()> {
        let settings = &self.context.settings;
        Erc20::new(self.context.clone())
            .approve(settings.aave_pool, amount)
            .await?;
        self.context
            .submit(
                settings.aave_pool,
                supplyCall {
                    asset: settings.asset,
                    amount,
                    onBehalfOf: settings.eoa,
                    referralCode: AAVE_REFERRAL_CODE,
                },
            )
            .await
    }

    async fn withdraw(&self, amount: U256) -> ManagerResult<U256> {
        let settings = &self.context.settings;
        self.context
            .submit(
                settings.aave_pool,
                withdrawCall {
                    asset: settings.asset,
                    amount,
                    to: settings.eoa,
                },
            )
            .await?;
        Ok(amount)
    }
}
