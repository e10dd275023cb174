//! The ERC-20 asset, operated by the EOA

use alloy_primitives::{Address, U256};

use crate::{
    types::{allowanceCall, approveCall, balanceOfCall, transferCall, transferFromCall},
    utils::error::{ManagerError, ManagerResult},
};

use super::{evm::EvmContext, TokenCustody};

pub struct Erc20 {
    context: EvmContext,
}

impl Erc20 {
    pub fn new(context: EvmContext) -> Self {
        Self { context }
    }
}

impl TokenCustody for Erc20 {
    async fn balance_of(&self, owner: Address) -> ManagerResult<U256> {
        let asset = self.context.settings.asset;
        Ok(self
            .context
            .read(asset, balanceOfCall { account: owner })
            .await?
            ._0)
    }

    async fn allowance(&self, owner: Address, spender: Address) -> ManagerResult<U256> {
        let asset = self.context.settings.asset;
        Ok(self
            .context
            .read(asset, allowanceCall { owner, spender })
            .await?
            ._0)
    }

    async fn approve(&self, spender: Address, amount: U256) -> ManagerResult<()> {
        let asset = self.context.settings.asset;
        self.context
            .submit(asset, approveCall { spender, amount })
            .await
    }

    async fn pull(&self, from: Address, amount: U256) -> ManagerResult<()> {
        let eoa = self.context.settings.eoa;
        if self.balance_of(from).await? < amount || self.allowance(from, eoa).await? < amount {
            return Err(ManagerError::InsufficientBalance);
        }

        let asset = self.context.settings.asset;
        self.context
            .submit(
                asset,
                transferFromCall {
                    from,
                    to: eoa,
                    amount,
                },
            )
            .await
    }

    /// A transfer the EOA cannot cover reverts, and the revert is reported
    async fn push(&self, to: Address, amount: U256) -> ManagerResult<()> {
        let asset = self.context.settings.asset;
        self.context
            .submit(asset, transferCall { to, amount })
            .await
    }
}
