// Build a lock handle for the backend named in settings

use std::sync::Arc;

use distlock_common::BackendKind;
use distlock_store::memory::{
    MemoryKvCache, MemoryMutexService, MemoryRecordStore, MemorySession, MemoryTxnStore,
};
use distlock_store::{KvCache, LeaseSession, MutexService, RecordStore};

use crate::cache::CacheLock;
use crate::handle::LockHandle;
use crate::lock::DistLock;
use crate::mutex::MutexLock;
use crate::record::RecordLock;
use crate::revision::RevisionLock;
use crate::settings::LockSettings;

/// Backend clients available to [`open_lock`]. Only the one matching the
/// configured backend is used.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub session: Option<Arc<dyn LeaseSession>>,
    pub cache: Option<Arc<dyn KvCache>>,
    pub records: Option<Arc<dyn RecordStore>>,
    pub mutexes: Option<Arc<dyn MutexService>>,
}

impl Collaborators {
    /// In-memory backends for every variant, sharing `store` for the revision
    /// lock. The session lease uses `revision.session_ttl_secs` and is kept
    /// alive until the session is dropped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn in_memory(settings: &LockSettings, store: &MemoryTxnStore) -> Self {
        let session = MemorySession::new(store, settings.revision.session_ttl()).with_keep_alive();
        Self {
            session: Some(Arc::new(session)),
            cache: Some(Arc::new(MemoryKvCache::new())),
            records: Some(Arc::new(MemoryRecordStore::new())),
            mutexes: Some(Arc::new(MemoryMutexService::new())),
        }
    }
}

/// Lock handle for `settings.backend`.
///
/// Validation is deferred: a missing collaborator surfaces as a configuration
/// error on the first lock or unlock call.
pub fn open_lock(settings: &LockSettings, collaborators: Collaborators) -> Arc<dyn DistLock> {
    match settings.backend {
        BackendKind::Revision => Arc::new(LockHandle::new(RevisionLock::from_settings(
            &settings.revision,
            collaborators.session,
        ))),
        BackendKind::Cache => Arc::new(LockHandle::new(CacheLock::from_settings(
            &settings.cache,
            collaborators.cache,
        ))),
        BackendKind::Record => Arc::new(LockHandle::new(RecordLock::from_settings(
            &settings.record,
            collaborators.records,
        ))),
        BackendKind::Mutex => Arc::new(LockHandle::new(MutexLock::from_settings(
            &settings.mutex,
            collaborators.mutexes,
        ))),
    }
}
