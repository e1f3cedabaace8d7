//! Record store lock
//!
//! Acquisition creates a record named by the lock key, storing the secret in
//! every configured bin. The write policy must be create-only so that a second
//! writer fails instead of overwriting the holder.

use std::sync::Arc;

use async_trait::async_trait;

use distlock_common::{BackendKind, ConfigError, LockError, Result, StoreError};
use distlock_store::{Bin, RecordExistsAction, RecordKey, RecordStore, WritePolicy};

use crate::lock::LockBackend;
use crate::settings::RecordSettings;

#[derive(Clone, Default)]
pub struct RecordLock {
    pub namespace: String,
    pub set_name: String,
    /// Bins the secret is written to
    pub bins: Vec<String>,
    pub policy: Option<WritePolicy>,
    pub client: Option<Arc<dyn RecordStore>>,
}

impl RecordLock {
    pub fn from_settings(settings: &RecordSettings, client: Option<Arc<dyn RecordStore>>) -> Self {
        Self {
            namespace: settings.namespace.clone(),
            set_name: settings.set_name.clone(),
            bins: settings.bins.clone(),
            policy: Some(settings.write_policy()),
            client,
        }
    }

    fn parts(&self) -> std::result::Result<(&WritePolicy, &Arc<dyn RecordStore>), ConfigError> {
        let policy = self.policy.as_ref().ok_or(ConfigError::NoPolicy)?;
        let client = self.client.as_ref().ok_or(ConfigError::NoClient)?;
        Ok((policy, client))
    }

    fn record_key(&self, key: &str) -> Result<RecordKey> {
        Ok(RecordKey::new(&self.namespace, &self.set_name, key)?)
    }
}

#[async_trait]
impl LockBackend for RecordLock {
    fn kind(&self) -> BackendKind {
        BackendKind::Record
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.namespace.is_empty() {
            return Err(ConfigError::NoNamespace);
        }
        if self.set_name.is_empty() {
            return Err(ConfigError::NoSetName);
        }
        if self.bins.is_empty() {
            return Err(ConfigError::NoBins);
        }
        let policy = self.policy.as_ref().ok_or(ConfigError::NoPolicy)?;
        if policy.record_exists_action != RecordExistsAction::CreateOnly {
            return Err(ConfigError::PolicyFlag);
        }
        if self.client.is_none() {
            return Err(ConfigError::NoClient);
        }
        Ok(())
    }

    async fn acquire(&self, key: &str, secret: &str) -> Result<()> {
        let (policy, client) = self.parts()?;
        let record_key = self.record_key(key)?;
        let bins: Vec<Bin> = self.bins.iter().map(|name| Bin::new(name, secret)).collect();

        match client.put_bins(policy, &record_key, &bins).await {
            Ok(()) => Ok(()),
            Err(StoreError::KeyExists(_)) => Err(LockError::Locked),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes the record without checking the secret; record stores offer no
    /// compare-and-delete.
    async fn release(&self, key: &str, _secret: &str) -> Result<()> {
        let (policy, client) = self.parts()?;
        let record_key = self.record_key(key)?;

        if client.delete(policy, &record_key).await? {
            Ok(())
        } else {
            Err(LockError::NotOwned)
        }
    }
}
