use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
};

use alloy_primitives::Address;
use ic_stable_structures::{
    memory_manager::{MemoryId, MemoryManager, VirtualMemory},
    BTreeMap as StableBTreeMap, DefaultMemoryImpl,
};

use crate::{
    journal::JournalCollection,
    position::{ledger::Ledger, lock::Lock},
    settings::AggregatorSettings,
};

pub type StableMemory = VirtualMemory<DefaultMemoryImpl>;

const LEDGER_MEMORY_ID: MemoryId = MemoryId::new(0);
const JOURNAL_MEMORY_ID: MemoryId = MemoryId::new(1);

thread_local! {
    static MEMORY_MANAGER: RefCell<MemoryManager<DefaultMemoryImpl>> =
        RefCell::new(MemoryManager::init(DefaultMemoryImpl::default()));

    /// Positions of every user
    pub static LEDGER: RefCell<Ledger<StableMemory>> = RefCell::new(Ledger::init(
        MEMORY_MANAGER.with(|manager| manager.borrow().get(LEDGER_MEMORY_ID)),
    ));

    pub static JOURNAL: RefCell<StableBTreeMap<u64, JournalCollection, StableMemory>> =
        RefCell::new(StableBTreeMap::init(
            MEMORY_MANAGER.with(|manager| manager.borrow().get(JOURNAL_MEMORY_ID)),
        ));

    /// Users with an operation in flight
    pub static USER_LOCKS: RefCell<HashMap<Address, Lock>> = RefCell::new(HashMap::new());

    /// Next nonce of the EOA, `None` until read from the chain
    pub static EOA_NONCE: Cell<Option<u64>> = const { Cell::new(None) };

    pub static SETTINGS: RefCell<AggregatorSettings> = RefCell::new(AggregatorSettings::default());
}
