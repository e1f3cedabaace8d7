//! Lease sessions on the in-memory revision store

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use distlock_common::StoreError;

use crate::lease::LeaseSession;
use crate::memory::txn::MemoryTxnStore;
use crate::revision::{LeaseId, TxnClient};

/// A session holding one lease on a [`MemoryTxnStore`]
pub struct MemorySession {
    store: MemoryTxnStore,
    lease: LeaseId,
    ttl: Duration,
    /// Stops the keep-alive task, if one was started
    shutdown: CancellationToken,
}

impl MemorySession {
    /// Grant a fresh lease on `store`
    pub fn new(store: &MemoryTxnStore, ttl: Duration) -> Self {
        let lease = store.grant_lease(ttl);
        debug!(lease = %format!("{:x}", lease), ttl_ms = ttl.as_millis() as u64, "Session opened");
        Self {
            store: store.clone(),
            lease,
            ttl,
            shutdown: CancellationToken::new(),
        }
    }

    /// Renew the lease at a third of its TTL until the session is closed.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_keep_alive(self) -> Self {
        let store = self.store.clone();
        let lease = self.lease;
        let shutdown = self.shutdown.clone();
        let period = (self.ttl / 3).max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if let Err(e) = store.keep_alive_lease(lease) {
                            warn!("Session keep-alive failed for lease {:x}: {}", lease, e);
                            break;
                        }
                    }
                    _ = shutdown.cancelled() => break,
                }
            }
        });

        self
    }

    pub fn store(&self) -> &MemoryTxnStore {
        &self.store
    }
}

#[async_trait]
impl LeaseSession for MemorySession {
    fn lease(&self) -> LeaseId {
        self.lease
    }

    fn client(&self) -> Arc<dyn TxnClient> {
        Arc::new(self.store.clone())
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn keep_alive(&self) -> Result<(), StoreError> {
        self.store.keep_alive_lease(self.lease).map(|_| ())
    }

    async fn close(&self) -> Result<(), StoreError> {
        self.shutdown.cancel();
        let removed = self.store.revoke_lease(self.lease)?;
        debug!(lease = %format!("{:x}", self.lease), removed, "Session closed");
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
