//! distlock store - coordination backend interfaces
//!
//! This crate provides the collaborator interfaces the lock protocol runs on:
//! - Transactional revision store with leases (`TxnClient`, `LeaseSession`)
//! - Key-value cache with conditional set and delete (`KvCache`)
//! - Record store with create-only writes (`RecordStore`)
//! - Coordination-service mutex (`MutexService`)
//!
//! The `memory` module carries in-memory implementations of each.

pub mod cache;
pub mod lease;
pub mod memory;
pub mod mutex;
pub mod record;
pub mod revision;

pub use cache::KvCache;
pub use lease::LeaseSession;
pub use mutex::{DistributedMutex, MutexService};
pub use record::{Bin, CommitLevel, RecordExistsAction, RecordKey, RecordStore, WritePolicy};
pub use revision::{
    Compare, CompareOp, CompareTarget, KeyValue, LeaseId, NO_LEASE, Op, OpResponse, RangeScope,
    Revision, Txn, TxnClient, TxnResponse,
};
