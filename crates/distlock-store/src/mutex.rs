//! Coordination-service mutex interface
//!
//! The primitive is blocking: `lock_with_data` parks the calling thread until
//! the participant holds the node. Callers on an async runtime must run it on
//! the blocking pool.

use std::sync::Arc;

use distlock_common::StoreError;

/// Hands out mutex participants for node paths
pub trait MutexService: Send + Sync {
    /// A new participant contending on `path`
    fn mutex(&self, path: &str) -> Arc<dyn DistributedMutex>;
}

/// One participant of a path-keyed distributed mutex
pub trait DistributedMutex: Send + Sync {
    /// Block until this participant holds the mutex, attaching `data` to its node.
    /// Fails with `Deadlock` if the participant already holds it.
    fn lock_with_data(&self, data: &[u8]) -> Result<(), StoreError>;

    /// Release the mutex. Fails with `NotLocked` if this participant does not hold it.
    fn unlock(&self) -> Result<(), StoreError>;
}
