//! In-memory coordination backends
//!
//! Reference implementations of every collaborator interface, used by tests
//! and by embedders that need locking within a single process.

mod cache;
mod mutex;
mod record;
mod session;
mod txn;

pub use cache::MemoryKvCache;
pub use mutex::MemoryMutexService;
pub use record::MemoryRecordStore;
pub use session::MemorySession;
pub use txn::MemoryTxnStore;
