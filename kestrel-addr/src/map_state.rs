use std::{
    sync::{Arc, OnceLock},
    time::SystemTime,
};

use parking_lot::RwLock;

use crate::{
    address_map::{AddressMap, Expiry},
    error::PatternError,
    rewrite::Rewrite,
};

/// Shared handle to the active address map.
///
/// Readers take a snapshot and rewrite without holding the lock. Every change
/// builds a new table and swaps it in whole, so a reader sees either the old
/// table or the new one.
#[derive(Clone, Default)]
pub struct AddressMapState {
    table: Arc<RwLock<Arc<AddressMap>>>,
}

impl AddressMapState {
    pub fn new() -> Self {
        Self {
            table: Arc::new(RwLock::new(Arc::new(AddressMap::new()))),
        }
    }

    /// The process-wide instance.
    pub fn global() -> &'static AddressMapState {
        static GLOBAL: OnceLock<AddressMapState> = OnceLock::new();
        GLOBAL.get_or_init(AddressMapState::new)
    }

    pub fn snapshot(&self) -> Arc<AddressMap> {
        self.table.read().clone()
    }

    pub fn swap(&self, map: AddressMap) -> Arc<AddressMap> {
        std::mem::replace(&mut *self.table.write(), Arc::new(map))
    }

    /// Replaces the whole table with one built from `MapAddress` values.
    pub fn load<I, S>(&self, directives: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = AddressMap::new();
        let accepted = map.load(directives);
        self.swap(map);

        log::info!("Loaded {} address mappings", accepted);
        accepted
    }

    pub fn register(&self, pattern: &str, target: &str, expiry: Expiry) -> Result<(), PatternError> {
        let mut table = self.table.write();

        let mut next = AddressMap::clone(&table);
        next.register(pattern, target, expiry)?;
        *table = Arc::new(next);

        Ok(())
    }

    pub fn clear(&self) {
        self.swap(AddressMap::new());
    }

    pub fn list(&self) -> Vec<(String, String)> {
        self.snapshot().list()
    }

    pub fn rewrite(&self, address: &str) -> Rewrite {
        self.snapshot().rewrite(address, SystemTime::now())
    }
}
