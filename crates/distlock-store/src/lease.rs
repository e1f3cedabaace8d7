//! Lease-backed sessions on a revision store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use distlock_common::StoreError;

use crate::revision::{LeaseId, TxnClient};

/// One participant's time-bounded identity on a revision store.
///
/// Keys written with the session's lease disappear when the lease expires or
/// the session is closed. A lock believed held is silently lost at that point.
#[async_trait]
pub trait LeaseSession: Send + Sync {
    /// Lease id scoping this session's keys
    fn lease(&self) -> LeaseId;

    /// Transaction client the session was opened on
    fn client(&self) -> Arc<dyn TxnClient>;

    /// Time the lease survives without a keep-alive
    fn ttl(&self) -> Duration;

    /// Extend the lease by another TTL
    async fn keep_alive(&self) -> Result<(), StoreError>;

    /// Revoke the lease, deleting every key bound to it
    async fn close(&self) -> Result<(), StoreError>;
}
