//! An in-memory `KeyRegistryStore`, for tests and for processes that keep no durable state.

use crate::common::errors::StoreError;
use crate::registry::{KeyId, KeyRecord};
use crate::storage::traits::KeyRegistryStore;
use dashmap::DashMap;

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<KeyId, KeyRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// A copy of the stored record, as the backend sees it.
    pub fn get(&self, key_id: &KeyId) -> Option<KeyRecord> {
        self.records.get(key_id).map(|entry| entry.value().clone())
    }
}

impl KeyRegistryStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<KeyRecord>, StoreError> {
        Ok(self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    fn save(&self, record: &KeyRecord) -> Result<(), StoreError> {
        self.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn remove(&self, key_id: &KeyId) -> Result<(), StoreError> {
        self.records.remove(key_id);
        Ok(())
    }
}
