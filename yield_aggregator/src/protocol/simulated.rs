//! In-memory stand-ins for the protocols and the asset, driven by the tests

use std::{cell::RefCell, collections::HashMap};

use alloy_primitives::{Address, U256};

use crate::{
    constants::ray,
    types::ProtocolId,
    utils::error::{ManagerError, ManagerResult},
};

use super::{LendingProtocol, TokenCustody, Venues};

#[derive(Clone, Debug)]
pub struct ProtocolBook {
    pub raw_rate: U256,
    pub index: U256,
    /// Deposits of the EOA, scaled by the index at deposit time
    pub scaled: U256,
    pub fail_rates: bool,
    pub fail_supply: bool,
    pub fail_withdraw: bool,
    pub supply_calls: u32,
    pub withdraw_calls: u32,
}

impl Default for ProtocolBook {
    fn default() -> Self {
        Self {
            raw_rate: U256::ZERO,
            index: ray(),
            scaled: U256::ZERO,
            fail_rates: false,
            fail_supply: false,
            fail_withdraw: false,
            supply_calls: 0,
            withdraw_calls: 0,
        }
    }
}

pub struct SimulatedProtocol {
    id: ProtocolId,
    pub book: RefCell<ProtocolBook>,
}

impl SimulatedProtocol {
    pub fn new(id: ProtocolId, raw_rate: U256) -> Self {
        let book = ProtocolBook {
            raw_rate,
            ..Default::default()
        };
        Self {
            id,
            book: RefCell::new(book),
        }
    }

    pub fn set_rate(&self, raw_rate: U256) {
        self.book.borrow_mut().raw_rate = raw_rate;
    }

    /// Accrues interest: every supplied unit is now worth `index / RAY`
    pub fn set_index(&self, index: U256) {
        self.book.borrow_mut().index = index;
    }

    /// Underlying the EOA could redeem right now
    pub fn value(&self) -> U256 {
        let book = self.book.borrow();
        book.scaled * book.index / ray()
    }

    pub fn calls(&self) -> u32 {
        let book = self.book.borrow();
        book.supply_calls + book.withdraw_calls
    }
}

impl LendingProtocol for SimulatedProtocol {
    fn id(&self) -> ProtocolId {
        self.id
    }

    async fn raw_rate(&self) -> ManagerResult<U256> {
        let book = self.book.borrow();
        if book.fail_rates {
            return Err(ManagerError::OracleUnavailable(format!("{:?} is down", self.id)));
        }
        Ok(book.raw_rate)
    }

    async fn accrual_index(&self) -> ManagerResult<U256> {
        let book = self.book.borrow();
        if book.fail_rates {
            return Err(ManagerError::OracleUnavailable(format!("{:?} is down", self.id)));
        }
        Ok(book.index)
    }

    async fn supply(&self, amount: U256) -> ManagerResult<()> {
        let mut book = self.book.borrow_mut();
        book.supply_calls += 1;
        if book.fail_supply {
            return Err(ManagerError::Custom("supply reverted".to_string()));
        }
        book.scaled += amount * ray() / book.index;
        Ok(())
    }

    async fn withdraw(&self, amount: U256) -> ManagerResult<U256> {
        let value = self.value();
        let mut book = self.book.borrow_mut();
        book.withdraw_calls += 1;
        if book.fail_withdraw {
            return Err(ManagerError::Custom("withdraw reverted".to_string()));
        }
        if amount > value {
            return Err(ManagerError::InsufficientBalance);
        }
        book.scaled = book.scaled.saturating_sub(amount * ray() / book.index);
        Ok(amount)
    }
}

/// Wallet balances of the asset
#[derive(Default)]
pub struct SimulatedToken {
    pub balances: RefCell<HashMap<Address, U256>>,
    pub fail_push: RefCell<bool>,
}

impl SimulatedToken {
    pub fn mint(&self, owner: Address, amount: U256) {
        *self.balances.borrow_mut().entry(owner).or_default() += amount;
    }

    pub fn balance(&self, owner: Address) -> U256 {
        self.balances
            .borrow()
            .get(&owner)
            .copied()
            .unwrap_or_default()
    }
}

impl TokenCustody for SimulatedToken {
    async fn balance_of(&self, owner: Address) -> ManagerResult<U256> {
        Ok(self.balance(owner))
    }

    async fn allowance(&self, _owner: Address, _spender: Address) -> ManagerResult<U256> {
        Ok(U256::MAX)
    }

    async fn approve(&self, _spender: Address, _amount: U256) -> ManagerResult<()> {
        Ok(())
    }

    async fn pull(&self, from: Address, amount: U256) -> ManagerResult<()> {
        let balance = self.balance(from);
        if balance < amount {
            return Err(ManagerError::InsufficientBalance);
        }
        self.balances.borrow_mut().insert(from, balance - amount);
        Ok(())
    }

    async fn push(&self, to: Address, amount: U256) -> ManagerResult<()> {
        if *self.fail_push.borrow() {
            return Err(ManagerError::Custom("transfer reverted".to_string()));
        }
        self.mint(to, amount);
        Ok(())
    }
}

pub type SimulatedVenues = Venues<SimulatedProtocol, SimulatedToken>;

/// Both protocols at the given raw rates, and an empty token
pub fn venues(compound_rate: U256, aave_rate: U256) -> SimulatedVenues {
    Venues {
        compound: SimulatedProtocol::new(ProtocolId::Compound, compound_rate),
        aave: SimulatedProtocol::new(ProtocolId::Aave, aave_rate),
        token: SimulatedToken::default(),
    }
}
