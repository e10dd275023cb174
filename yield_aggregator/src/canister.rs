use candid::{Nat, Principal};
use ic_canister::{generate_idl, init, query, update, Canister, Idl, PreUpdate};
use ic_exports::ic_cdk::{api::caller, trap};

use crate::{
    api,
    journal::{self, JournalCollection},
    settings::SettingsQuery,
    types::{InitArgs, ProtocolId, ProtocolQuoteView, RebalanceReport, UserBalance},
    utils::error::ManagerResult,
};

#[derive(Canister)]
pub struct YieldAggregator {
    #[id]
    id: Principal,
}

impl PreUpdate for YieldAggregator {}

impl YieldAggregator {
    // INITIALIZATION
    #[init]
    pub fn init(&mut self, args: InitArgs) {
        if let Err(err) = api::init(args) {
            trap(&format!("Invalid init arguments: {:?}", err));
        }
    }

    /// Pulls `amount` of the asset from `user` and supplies it.
    /// `protocol` overrides the APY comparison.
    #[update]
    pub async fn deposit(
        &mut self,
        user: String,
        amount: Nat,
        protocol: Option<ProtocolId>,
    ) -> ManagerResult<UserBalance> {
        api::deposit(caller(), user, amount, protocol).await
    }

    /// Redeems and pays out the whole position of `user`
    #[update]
    pub async fn withdraw(&mut self, user: String) -> ManagerResult<Nat> {
        api::withdraw(caller(), user).await
    }

    #[update]
    pub async fn rebalance(
        &mut self,
        user: String,
        protocol: Option<ProtocolId>,
    ) -> ManagerResult<RebalanceReport> {
        api::rebalance(caller(), user, protocol).await
    }

    #[query]
    pub fn get_user_balance(&self, user: String) -> ManagerResult<UserBalance> {
        api::get_user_balance(user)
    }

    /// Reads both protocols' rates. An update call, since it makes HTTPS outcalls.
    #[update]
    pub async fn get_quotes(&self) -> ManagerResult<Vec<ProtocolQuoteView>> {
        api::get_quotes().await
    }

    #[query]
    pub fn get_logs(&self, depth: u64) -> Vec<JournalCollection> {
        journal::get_logs(depth)
    }

    #[query]
    pub fn get_settings(&self) -> SettingsQuery {
        api::get_settings()
    }

    pub fn idl() -> Idl {
        generate_idl!()
    }
}
