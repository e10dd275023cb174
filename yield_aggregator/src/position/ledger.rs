//! Per-user ledger of principal held in each protocol
//!
//! The ledger mirrors what the canister's EOA holds in the external protocols on
//! behalf of each user. Every external transfer is paired with exactly one
//! mutation here, performed in the same synchronous step right after the
//! external call returned, while the user's lock is held.

use std::borrow::Cow;

use alloy_primitives::{Address, U256};
use ic_stable_structures::{storable::Bound, BTreeMap as StableBTreeMap, Memory, Storable};

use crate::{
    constants::ray,
    types::ProtocolId,
    utils::error::{arithmetic_err, ManagerError, ManagerResult},
};

/// Funds a user holds in one protocol
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Holding {
    /// Amount recorded by deposits and moves, excluding interest accrued since
    pub principal: U256,
    /// `amount * RAY / accrual_index`, summed over deposits
    pub scaled: U256,
}

impl Holding {
    /// Value of the holding, interest included, at the protocol's current accrual index
    pub fn value(&self, index: U256) -> ManagerResult<U256> {
        self.scaled
            .checked_mul(index)
            .ok_or(arithmetic_err("Holding value overflowed."))?
            .checked_div(ray())
            .ok_or(arithmetic_err("Ray was zero."))
    }

    pub fn is_empty(&self) -> bool {
        self.principal.is_zero()
    }

    fn add(&mut self, amount: U256, scaled: U256) -> ManagerResult<()> {
        self.principal = self
            .principal
            .checked_add(amount)
            .ok_or(arithmetic_err("Principal overflowed."))?;
        self.scaled = self
            .scaled
            .checked_add(scaled)
            .ok_or(arithmetic_err("Scaled balance overflowed."))?;
        Ok(())
    }
}

/// A user's position across both protocols
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserPosition {
    pub compound: Holding,
    pub aave: Holding,
    /// Withdrawn from a protocol, not yet deposited into the next one
    pub held: U256,
}

impl UserPosition {
    pub fn holding(&self, protocol: ProtocolId) -> &Holding {
        match protocol {
            ProtocolId::Compound => &self.compound,
            ProtocolId::Aave => &self.aave,
        }
    }

    fn holding_mut(&mut self, protocol: ProtocolId) -> &mut Holding {
        match protocol {
            ProtocolId::Compound => &mut self.compound,
            ProtocolId::Aave => &mut self.aave,
        }
    }

    pub fn principal(&self, protocol: ProtocolId) -> U256 {
        self.holding(protocol).principal
    }

    /// The protocol holding the user's funds, if any.
    /// Compound is reported first for positions split by older deposits.
    pub fn active_protocol(&self) -> Option<ProtocolId> {
        [ProtocolId::Compound, ProtocolId::Aave]
            .into_iter()
            .find(|protocol| !self.holding(*protocol).is_empty())
    }

    /// `true` if every unit of the position sits in `protocol`
    pub fn is_entirely_in(&self, protocol: ProtocolId) -> bool {
        !self.principal(protocol).is_zero()
            && self.principal(protocol.other()).is_zero()
            && self.held.is_zero()
    }

    pub fn is_empty(&self) -> bool {
        self.compound.is_empty() && self.aave.is_empty() && self.held.is_zero()
    }
}

const POSITION_SIZE: usize = 5 * 32;

impl Storable for UserPosition {
    fn to_bytes(&self) -> Cow<[u8]> {
        let mut bytes = Vec::with_capacity(POSITION_SIZE);
        for word in [
            self.compound.principal,
            self.compound.scaled,
            self.aave.principal,
            self.aave.scaled,
            self.held,
        ] {
            bytes.extend_from_slice(&word.to_be_bytes::<32>());
        }
        Cow::Owned(bytes)
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        let word = |i: usize| U256::from_be_slice(&bytes[i * 32..(i + 1) * 32]);
        Self {
            compound: Holding {
                principal: word(0),
                scaled: word(1),
            },
            aave: Holding {
                principal: word(2),
                scaled: word(3),
            },
            held: word(4),
        }
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: POSITION_SIZE as u32,
        is_fixed_size: true,
    };
}

/// Stable storage key of a position
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct UserKey(pub Address);

impl Storable for UserKey {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Borrowed(self.0.as_slice())
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        Self(Address::from_slice(&bytes))
    }

    const BOUND: Bound = Bound::Bounded {
        max_size: 20,
        is_fixed_size: true,
    };
}

/// `amount * RAY / index`, the share of the protocol's pool a deposit buys.
/// Fails with `InvalidAmount` if the deposit is too small to buy any share.
pub fn scaled_amount(amount: U256, index: U256) -> ManagerResult<U256> {
    let scaled = amount
        .checked_mul(ray())
        .ok_or(arithmetic_err("Scaled deposit overflowed."))?
        .checked_div(index)
        .ok_or(arithmetic_err("Accrual index was zero."))?;
    if scaled.is_zero() {
        return Err(ManagerError::InvalidAmount);
    }
    Ok(scaled)
}

/// Address-keyed record of every user's position
pub struct Ledger<M: Memory> {
    positions: StableBTreeMap<UserKey, UserPosition, M>,
}

impl<M: Memory> Ledger<M> {
    pub fn init(memory: M) -> Self {
        Self {
            positions: StableBTreeMap::init(memory),
        }
    }

    /// Current position of `user`. Unknown users have an empty position.
    pub fn position(&self, user: Address) -> UserPosition {
        self.positions.get(&UserKey(user)).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn store(&mut self, user: Address, position: UserPosition) {
        if position.is_empty() {
            self.positions.remove(&UserKey(user));
        } else {
            self.positions.insert(UserKey(user), position);
        }
    }

    /// Adds `amount`, deposited at the protocol's accrual `index`, to the user's holding
    pub fn record_deposit(
        &mut self,
        user: Address,
        protocol: ProtocolId,
        amount: U256,
        index: U256,
    ) -> ManagerResult<()> {
        let scaled = scaled_amount(amount, index)?;

        let mut position = self.position(user);
        position.holding_mut(protocol).add(amount, scaled)?;

        self.store(user, position);
        Ok(())
    }

    /// Zeroes the user's holding in `protocol` and records the `received`
    /// redemption as held, in a single write. Returns the zeroed holding.
    pub fn record_withdraw(
        &mut self,
        user: Address,
        protocol: ProtocolId,
        received: U256,
    ) -> ManagerResult<Holding> {
        if received.is_zero() {
            return Err(ManagerError::InvalidAmount);
        }

        let mut position = self.position(user);
        let holding = std::mem::take(position.holding_mut(protocol));
        if holding.is_empty() {
            return Err(ManagerError::NoFunds);
        }
        position.held = position
            .held
            .checked_add(received)
            .ok_or(arithmetic_err("Held amount overflowed."))?;

        self.store(user, position);
        Ok(holding)
    }

    /// Records funds the canister holds for `user` between two legs of a move
    pub fn record_held(&mut self, user: Address, amount: U256) -> ManagerResult<()> {
        if amount.is_zero() {
            return Err(ManagerError::InvalidAmount);
        }

        let mut position = self.position(user);
        position.held = position
            .held
            .checked_add(amount)
            .ok_or(arithmetic_err("Held amount overflowed."))?;

        self.store(user, position);
        Ok(())
    }

    /// Clears and returns the amount held for `user`
    pub fn take_held(&mut self, user: Address) -> ManagerResult<U256> {
        let mut position = self.position(user);
        let held = std::mem::take(&mut position.held);
        if held.is_zero() {
            return Err(ManagerError::NoFunds);
        }

        self.store(user, position);
        Ok(held)
    }

    /// Deposits everything held for `user` into `protocol` at `index`, in a
    /// single write. Returns the amount settled.
    pub fn settle_held(
        &mut self,
        user: Address,
        protocol: ProtocolId,
        index: U256,
    ) -> ManagerResult<U256> {
        let mut position = self.position(user);
        let held = std::mem::take(&mut position.held);
        if held.is_zero() {
            return Err(ManagerError::NoFunds);
        }
        let scaled = scaled_amount(held, index)?;
        position.holding_mut(protocol).add(held, scaled)?;

        self.store(user, position);
        Ok(held)
    }
}
