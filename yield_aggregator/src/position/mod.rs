//! User positions: the ledger, the per-user lock, and the operations that move funds

pub(crate) mod executable;
pub(crate) mod ledger;
pub(crate) mod lock;
