//! Journal of the operations run by the canister.
//!
//! Every operation opens a `JournalCollection`, appends entries while it runs,
//! and the collection is committed to stable memory when it is dropped. Only the
//! newest `MAX_JOURNAL_COLLECTIONS` collections are kept.

use std::borrow::Cow;

use candid::{CandidType, Decode, Encode};
use ic_stable_structures::{storable::Bound, Storable};
use serde::Deserialize;

use crate::{
    constants::MAX_JOURNAL_COLLECTIONS,
    state::JOURNAL,
    utils::{common::timestamp, error::ManagerResult},
};

#[derive(CandidType, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogType {
    Deposit,
    Withdrawal,
    Rebalance,
    Quote,
}

/// Journal entry
#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub struct JournalEntry {
    pub timestamp: u64,
    pub entry: ManagerResult<()>,
    pub log_type: LogType,
    pub note: Option<String>,
}

/// Entries of one operation
#[derive(CandidType, Deserialize, Clone, Debug, PartialEq)]
pub struct JournalCollection {
    pub start_date_and_time: u64,
    pub end_date_and_time: u64,
    pub operation: String,
    /// The user the operation ran for, if any
    pub user: Option<String>,
    pub entries: Vec<JournalEntry>,
}

impl JournalCollection {
    /// Opens a new collection. It is committed when dropped.
    pub fn open<S: AsRef<str>>(operation: S, user: Option<String>) -> Self {
        let now = timestamp();
        Self {
            start_date_and_time: now,
            end_date_and_time: now,
            operation: operation.as_ref().to_string(),
            user,
            entries: vec![],
        }
    }

    /// Appends an entry with a note
    pub fn append_note<S: AsRef<str>>(
        &mut self,
        entry: ManagerResult<()>,
        log_type: LogType,
        note: S,
    ) {
        self.entries.push(JournalEntry {
            timestamp: timestamp(),
            entry,
            log_type,
            note: Some(note.as_ref().to_string()),
        });
    }

    /// Appends the outcome of a step, without a note
    pub fn append<T>(&mut self, result: &ManagerResult<T>, log_type: LogType) {
        self.entries.push(JournalEntry {
            timestamp: timestamp(),
            entry: result.as_ref().map(|_| ()).map_err(Clone::clone),
            log_type,
            note: None,
        });
    }
}

impl Drop for JournalCollection {
    fn drop(&mut self) {
        if self.entries.is_empty() {
            return;
        }
        self.end_date_and_time = timestamp();
        insert_journal_collection(self.clone());
    }
}

impl Storable for JournalCollection {
    fn to_bytes(&self) -> Cow<[u8]> {
        Cow::Owned(Encode!(self).unwrap())
    }

    fn from_bytes(bytes: Cow<[u8]>) -> Self {
        Decode!(bytes.as_ref(), Self).unwrap()
    }

    const BOUND: Bound = Bound::Unbounded;
}

/// Appends a collection and drops the oldest ones beyond the capacity
fn insert_journal_collection(collection: JournalCollection) {
    JOURNAL.with(|journal| {
        let mut journal = journal.borrow_mut();
        let key = journal
            .last_key_value()
            .map_or(0, |(last, _)| last + 1);
        journal.insert(key, collection);

        while journal.len() > MAX_JOURNAL_COLLECTIONS {
            match journal.first_key_value() {
                Some((oldest, _)) => {
                    journal.remove(&oldest);
                }
                None => break,
            }
        }
    });
}

/// The newest `depth` collections, newest first
pub fn get_logs(depth: u64) -> Vec<JournalCollection> {
    JOURNAL.with(|journal| {
        let journal = journal.borrow();
        let Some((last, _)) = journal.last_key_value() else {
            return vec![];
        };
        let first = (last + 1).saturating_sub(depth);
        let mut logs: Vec<JournalCollection> = journal
            .range(first..)
            .map(|(_, collection)| collection)
            .collect();
        logs.reverse();
        logs
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::ManagerError;

    #[test]
    fn test_collection_is_committed_on_drop() {
        {
            let mut journal = JournalCollection::open("deposit", Some("0xabc".to_string()));
            journal.append_note(Ok(()), LogType::Deposit, "Pulled 10 units.");
            journal.append_note(Err(ManagerError::Locked), LogType::Deposit, "Busy.");
        }

        let logs = get_logs(10);
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].operation, "deposit");
        assert_eq!(logs[0].user.as_deref(), Some("0xabc"));
        assert_eq!(logs[0].entries.len(), 2);
        assert_eq!(logs[0].entries[1].entry, Err(ManagerError::Locked));
        assert!(logs[0].end_date_and_time >= logs[0].start_date_and_time);
    }

    #[test]
    fn test_empty_collections_are_not_committed() {
        drop(JournalCollection::open("quote", None));
        assert!(get_logs(10).is_empty());
    }

    #[test]
    fn test_logs_are_newest_first_and_limited() {
        for i in 0..5 {
            let mut journal = JournalCollection::open(format!("op{i}"), None);
            let result: ManagerResult<u8> = Ok(i);
            journal.append(&result, LogType::Quote);
        }

        let logs = get_logs(2);
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].operation, "op4");
        assert_eq!(logs[1].operation, "op3");
        assert_eq!(get_logs(100).len(), 5);
    }

    #[test]
    fn test_journal_is_pruned() {
        for _ in 0..(MAX_JOURNAL_COLLECTIONS + 3) {
            let mut journal = JournalCollection::open("rebalance", None);
            journal.append_note(Ok(()), LogType::Rebalance, "Moved.");
        }

        assert_eq!(
            JOURNAL.with(|journal| journal.borrow().len()),
            MAX_JOURNAL_COLLECTIONS
        );
        assert_eq!(
            get_logs(u64::MAX).len() as u64,
            MAX_JOURNAL_COLLECTIONS
        );
    }

    #[test]
    fn test_storable_roundtrip() {
        let mut collection = JournalCollection::open("withdraw", None);
        collection.append_note(Ok(()), LogType::Withdrawal, "Paid out.");
        let bytes = collection.to_bytes();
        let decoded = JournalCollection::from_bytes(bytes);
        assert_eq!(decoded, collection);
    }
}
