// In-memory record store
// Records keyed by (namespace, set, user key), honouring the write policy's exists action

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use distlock_common::StoreError;

use crate::record::{Bin, RecordExistsAction, RecordKey, RecordStore, WritePolicy};

struct StoredRecord {
    bins: HashMap<String, String>,
    generation: u32,
    expires_at: Option<Instant>,
}

impl StoredRecord {
    fn new(policy: &WritePolicy, bins: &[Bin]) -> Self {
        Self {
            bins: bins
                .iter()
                .map(|bin| (bin.name.clone(), bin.value.clone()))
                .collect(),
            generation: 1,
            expires_at: policy.expiration.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<DashMap<RecordKey, StoredRecord>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bins of a live record
    pub fn get_bins(&self, key: &RecordKey) -> Option<HashMap<String, String>> {
        self.records.remove_if(key, |_, record| record.is_expired());
        self.records.get(key).map(|record| record.bins.clone())
    }

    /// Write count of a live record
    pub fn generation(&self, key: &RecordKey) -> Option<u32> {
        self.records.remove_if(key, |_, record| record.is_expired());
        self.records.get(key).map(|record| record.generation)
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put_bins(
        &self,
        policy: &WritePolicy,
        key: &RecordKey,
        bins: &[Bin],
    ) -> Result<(), StoreError> {
        self.records.remove_if(key, |_, record| record.is_expired());

        match self.records.entry(key.clone()) {
            Entry::Vacant(vacant) => match policy.record_exists_action {
                RecordExistsAction::UpdateOnly | RecordExistsAction::ReplaceOnly => {
                    Err(StoreError::KeyNotFound(key.to_string()))
                }
                _ => {
                    vacant.insert(StoredRecord::new(policy, bins));
                    Ok(())
                }
            },
            Entry::Occupied(mut occupied) => match policy.record_exists_action {
                RecordExistsAction::CreateOnly => Err(StoreError::KeyExists(key.to_string())),
                RecordExistsAction::Update | RecordExistsAction::UpdateOnly => {
                    let record = occupied.get_mut();
                    for bin in bins {
                        record.bins.insert(bin.name.clone(), bin.value.clone());
                    }
                    record.generation += 1;
                    record.expires_at = policy.expiration.map(|ttl| Instant::now() + ttl);
                    Ok(())
                }
                RecordExistsAction::Replace | RecordExistsAction::ReplaceOnly => {
                    let generation = occupied.get().generation + 1;
                    let mut record = StoredRecord::new(policy, bins);
                    record.generation = generation;
                    occupied.insert(record);
                    Ok(())
                }
            },
        }
    }

    async fn delete(&self, _policy: &WritePolicy, key: &RecordKey) -> Result<bool, StoreError> {
        Ok(self
            .records
            .remove(key)
            .is_some_and(|(_, record)| !record.is_expired()))
    }
}
