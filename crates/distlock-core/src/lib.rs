//! distlock core - distributed mutual exclusion over pluggable backends
//!
//! This crate provides:
//! - `DistLock`: non-blocking lock/unlock keyed by name, guarded by a secret
//! - `RevisionLock`: earliest-claim-wins locking on a revision store with lease sessions
//! - `CacheLock`, `RecordLock`, `MutexLock`: the same contract over a key-value
//!   cache, a record store and a coordination-service mutex
//! - `LockHandle`: one-time validation, deadlines, logging and metrics around a backend
//! - `LockSettings`: file and environment configuration

pub mod backends;
pub mod cache;
pub mod deadline;
pub mod handle;
pub mod key;
pub mod lock;
pub mod mutex;
pub mod record;
pub mod revision;
pub mod settings;

pub use backends::{Collaborators, open_lock};
pub use cache::CacheLock;
pub use deadline::Deadline;
pub use handle::{HandleState, LOCK_COUNTER, LockHandle, UNLOCK_COUNTER};
pub use key::{LockKeys, session_key};
pub use lock::{DistLock, LockBackend};
pub use mutex::MutexLock;
pub use record::RecordLock;
pub use revision::{Claim, RevisionLock, RevisionLockOptions};
pub use settings::{CacheSettings, LockSettings, MutexSettings, RecordSettings, RevisionSettings};

pub use distlock_common::{BackendKind, ConfigError, LockError, Result, StoreError};
