//! The executable position: deposit, withdraw and rebalance of one user.
//!
//! An `ExecutablePosition` holds the user's lock for its whole lifetime. Each
//! external effect is followed, in the same synchronous step, by exactly one
//! ledger mutation. A failure between the two legs of a move leaves the funds
//! recorded as `held`, and the next rebalance or withdraw settles them.

use alloy_primitives::{Address, U256};

use crate::{
    apy::choose_protocol,
    journal::{JournalCollection, LogType},
    protocol::{LendingProtocol, TokenCustody, Venues},
    state::LEDGER,
    types::{DepositTarget, ProtocolId, RebalanceDecision},
    utils::{
        common::u256_to_nat,
        error::{oracle_err, ManagerError, ManagerResult},
    },
};

use super::{
    ledger::{scaled_amount, UserPosition},
    lock::UserGuard,
};

/// Where a rebalance currently is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RebalanceStage {
    #[default]
    Idle,
    Withdrawing,
    Depositing,
}

pub struct ExecutablePosition<'a, P, T> {
    venues: &'a Venues<P, T>,
    guard: UserGuard,
    stage: RebalanceStage,
}

impl<'a, P: LendingProtocol, T: TokenCustody> ExecutablePosition<'a, P, T> {
    /// Locks `user` for the lifetime of the returned position.
    /// Fails with `Locked` if another operation holds the user.
    pub fn open(venues: &'a Venues<P, T>, user: Address) -> ManagerResult<Self> {
        Ok(Self {
            venues,
            guard: UserGuard::acquire(user)?,
            stage: RebalanceStage::Idle,
        })
    }

    pub fn user(&self) -> Address {
        self.guard.user()
    }

    /// Stage reached by the last rebalance. `Idle` once a move completed.
    pub fn stage(&self) -> RebalanceStage {
        self.stage
    }

    pub fn position(&self) -> UserPosition {
        LEDGER.with(|ledger| ledger.borrow().position(self.user()))
    }

    async fn accrual_index(&self, protocol: ProtocolId) -> ManagerResult<U256> {
        self.venues
            .protocol(protocol)
            .accrual_index()
            .await
            .map_err(oracle_err)
    }

    /// Resolves the protocol a deposit goes to. A position never spans both protocols.
    async fn deposit_target(
        &self,
        position: &UserPosition,
        target: DepositTarget,
    ) -> ManagerResult<ProtocolId> {
        match (target, position.active_protocol()) {
            (DepositTarget::Explicit(requested), Some(active)) if requested != active => {
                Err(ManagerError::SplitPosition)
            }
            (DepositTarget::Explicit(requested), _) => Ok(requested),
            (DepositTarget::Auto, Some(active)) => Ok(active),
            (DepositTarget::Auto, None) => self.venues.best_protocol().await,
        }
    }

    /// Pulls `amount` from the user and supplies it to the target protocol.
    pub async fn deposit(
        &mut self,
        amount: U256,
        target: DepositTarget,
        journal: &mut JournalCollection,
    ) -> ManagerResult<UserPosition> {
        if amount.is_zero() {
            return Err(ManagerError::InvalidAmount);
        }

        let user = self.user();
        let position = self.position();
        if !position.held.is_zero() {
            return Err(ManagerError::FundsInLimbo(u256_to_nat(&position.held)));
        }

        let protocol = self.deposit_target(&position, target).await?;
        let index = self.accrual_index(protocol).await?;
        scaled_amount(amount, index)?;
        journal.append_note(
            Ok(()),
            LogType::Deposit,
            format!("Depositing {} into {:?} at index {}.", amount, protocol, index),
        );

        self.venues.token.pull(user, amount).await?;

        if let Err(err) = self.venues.protocol(protocol).supply(amount).await {
            journal.append_note(
                Err(err),
                LogType::Deposit,
                format!("Supply failed, holding {} for the user.", amount),
            );
            LEDGER.with(|ledger| ledger.borrow_mut().record_held(user, amount))?;
            return Err(ManagerError::FundsInLimbo(u256_to_nat(&amount)));
        }

        LEDGER.with(|ledger| {
            ledger
                .borrow_mut()
                .record_deposit(user, protocol, amount, index)
        })?;
        journal.append_note(Ok(()), LogType::Deposit, "Deposit recorded.");

        Ok(self.position())
    }

    /// Redeems the user's holding in `protocol`, interest included, into `held`
    async fn redeem(
        &self,
        protocol: ProtocolId,
        journal: &mut JournalCollection,
    ) -> ManagerResult<U256> {
        let user = self.user();
        let holding = *self.position().holding(protocol);
        let index = self.accrual_index(protocol).await?;
        let value = holding.value(index)?;
        if value.is_zero() {
            return Err(ManagerError::InvalidAmount);
        }

        let received = self.venues.protocol(protocol).withdraw(value).await?;

        LEDGER.with(|ledger| {
            ledger
                .borrow_mut()
                .record_withdraw(user, protocol, received)
        })?;
        journal.append_note(
            Ok(()),
            LogType::Withdrawal,
            format!(
                "Redeemed {} from {:?} against a principal of {}.",
                received, protocol, holding.principal
            ),
        );
        Ok(received)
    }

    /// Redeems everything the user holds and pays it out.
    /// Returns the amount paid, interest included.
    pub async fn withdraw(&mut self, journal: &mut JournalCollection) -> ManagerResult<U256> {
        let user = self.user();
        let position = self.position();
        if position.is_empty() {
            return Err(ManagerError::NoFunds);
        }

        for protocol in [ProtocolId::Compound, ProtocolId::Aave] {
            if !position.holding(protocol).is_empty() {
                self.redeem(protocol, journal).await?;
            }
        }

        let held = self.position().held;
        if let Err(err) = self.venues.token.push(user, held).await {
            journal.append_note(
                Err(err),
                LogType::Withdrawal,
                format!("Transfer of {} to the user failed.", held),
            );
            return Err(ManagerError::FundsInLimbo(u256_to_nat(&held)));
        }

        let paid = LEDGER.with(|ledger| ledger.borrow_mut().take_held(user))?;
        journal.append_note(
            Ok(()),
            LogType::Withdrawal,
            format!("Paid {} to the user.", paid),
        );
        Ok(paid)
    }

    /// Moves the whole position into the target protocol.
    ///
    /// `Idle -> Withdrawing -> Depositing -> Idle`. A failed withdrawal leaves the
    /// ledger untouched. A failed deposit leaves the funds `held`, and calling
    /// `rebalance` again completes the move.
    pub async fn rebalance(
        &mut self,
        target: DepositTarget,
        journal: &mut JournalCollection,
    ) -> ManagerResult<RebalanceDecision> {
        let user = self.user();
        let position = self.position();

        let target = match target {
            DepositTarget::Explicit(protocol) => protocol,
            DepositTarget::Auto if position.is_empty() => return Err(ManagerError::NoFunds),
            DepositTarget::Auto => {
                let [compound, aave] = self.venues.quotes().await?;
                journal.append_note(
                    Ok(()),
                    LogType::Quote,
                    format!(
                        "Compound {:.4}%, Aave {:.4}%.",
                        compound.annualized_percent, aave.annualized_percent
                    ),
                );
                choose_protocol(compound.annualized_percent, aave.annualized_percent)
            }
        };

        if position.is_entirely_in(target) {
            return Err(ManagerError::AlreadyOptimal);
        }
        if position.is_empty() {
            return Err(ManagerError::NoFunds);
        }

        let source = target.other();
        let from = if position.holding(source).is_empty() {
            None
        } else {
            self.stage = RebalanceStage::Withdrawing;
            self.redeem(source, journal).await?;
            Some(source)
        };

        self.stage = RebalanceStage::Depositing;
        let held = self.position().held;
        let limbo = || ManagerError::FundsInLimbo(u256_to_nat(&held));

        let protocol = self.venues.protocol(target);
        let index = match protocol.accrual_index().await {
            Ok(index) => index,
            Err(err) => {
                journal.append_note(
                    Err(err),
                    LogType::Rebalance,
                    "Could not read the target index.",
                );
                return Err(limbo());
            }
        };
        if let Err(err) = scaled_amount(held, index) {
            journal.append_note(
                Err(err.clone()),
                LogType::Rebalance,
                format!("{} is too small to supply to {:?}.", held, target),
            );
            return Err(err);
        }
        if let Err(err) = protocol.supply(held).await {
            journal.append_note(
                Err(err),
                LogType::Rebalance,
                format!("Supply of {} to {:?} failed.", held, target),
            );
            return Err(limbo());
        }

        LEDGER.with(|ledger| ledger.borrow_mut().settle_held(user, target, index))?;
        self.stage = RebalanceStage::Idle;

        journal.append_note(
            Ok(()),
            LogType::Rebalance,
            format!("Moved {} from {:?} to {:?}.", held, from, target),
        );
        Ok(RebalanceDecision {
            from,
            to: target,
            amount: held,
        })
    }
}
