//! Per-User Locking System
//!
//! Serializes operations on the same user across the `await` points of an
//! operation. Operations on different users never contend.
//!
//! ```plain
//! Lock State Machine:
//!
//!         ┌──────────┐
//!    ┌────► Unlocked │
//!    │    └──────────┘
//!    │         │
//!  drop     try_lock
//!  guard       │
//!    │         ▼
//!    │    ┌─────────┐
//!    └────┤ Locked  │
//!         └─────────┘
//! ```
//!
//! There is no timeout. An external call that never returns keeps the user
//! locked until the canister is upgraded.

use alloy_primitives::Address;

use crate::{
    state::USER_LOCKS,
    utils::error::{ManagerError, ManagerResult},
};

/// Lock of a single user
#[derive(Clone, Debug, Default)]
pub struct Lock {
    /// Current lock state
    pub is_locked: bool,
}

impl Lock {
    /// Attempts to acquire the lock.
    ///
    /// # Returns
    /// * `Ok(())` - Lock successfully acquired
    /// * `Err(ManagerError::Locked)` - Lock unavailable
    pub fn try_lock(&mut self) -> ManagerResult<()> {
        if self.is_locked {
            return Err(ManagerError::Locked);
        }

        self.is_locked = true;
        Ok(())
    }
}

/// Exclusive access to one user's position.
/// The lock is released when the guard is dropped, which also happens when the
/// future holding it is dropped after a trap.
#[derive(Debug)]
pub struct UserGuard {
    user: Address,
}

impl UserGuard {
    /// Locks `user` or fails with `Locked`
    pub fn acquire(user: Address) -> ManagerResult<Self> {
        USER_LOCKS.with(|locks| locks.borrow_mut().entry(user).or_default().try_lock())?;
        Ok(Self { user })
    }

    pub fn user(&self) -> Address {
        self.user
    }
}

impl Drop for UserGuard {
    fn drop(&mut self) {
        USER_LOCKS.with(|locks| {
            locks.borrow_mut().remove(&self.user);
        });
    }
}

/// Returns `true` if an operation currently holds `user`'s lock
#[cfg(test)]
pub fn is_locked(user: Address) -> bool {
    USER_LOCKS.with(|locks| {
        locks
            .borrow()
            .get(&user)
            .map_or(false, |lock| lock.is_locked)
    })
}
