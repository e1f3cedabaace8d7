//! Key-value cache lock
//!
//! The key is held by whoever set it first; the stored value is the secret.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use distlock_common::{BackendKind, ConfigError, LockError, Result};
use distlock_store::KvCache;

use crate::lock::LockBackend;
use crate::settings::CacheSettings;

#[derive(Clone, Default)]
pub struct CacheLock {
    client: Option<Arc<dyn KvCache>>,
    ttl: Option<Duration>,
}

impl CacheLock {
    pub fn new(client: Arc<dyn KvCache>) -> Self {
        Self {
            client: Some(client),
            ttl: None,
        }
    }

    pub fn from_settings(settings: &CacheSettings, client: Option<Arc<dyn KvCache>>) -> Self {
        Self {
            client,
            ttl: settings.ttl(),
        }
    }

    /// Expire held keys after `ttl`; zero means never
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = (!ttl.is_zero()).then_some(ttl);
        self
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn client(&self) -> std::result::Result<&Arc<dyn KvCache>, ConfigError> {
        self.client.as_ref().ok_or(ConfigError::NoClient)
    }
}

#[async_trait]
impl LockBackend for CacheLock {
    fn kind(&self) -> BackendKind {
        BackendKind::Cache
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.client().map(|_| ())
    }

    async fn acquire(&self, key: &str, secret: &str) -> Result<()> {
        if self.client()?.set_nx(key, secret, self.ttl).await? {
            Ok(())
        } else {
            Err(LockError::Locked)
        }
    }

    async fn release(&self, key: &str, secret: &str) -> Result<()> {
        if self.client()?.delete_if_equals(key, secret).await? {
            Ok(())
        } else {
            Err(LockError::NotOwned)
        }
    }
}
