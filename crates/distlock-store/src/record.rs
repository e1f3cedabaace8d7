//! Record store interface
//!
//! Records are addressed by `(namespace, set, user key)` and hold named bins.
//! Write behaviour on an existing record is chosen per call by a `WritePolicy`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use distlock_common::StoreError;

/// What a write does when the record already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordExistsAction {
    /// Create or merge bins into the existing record
    #[default]
    Update,
    /// Merge bins, fail if the record does not exist
    UpdateOnly,
    /// Create or replace the whole record
    Replace,
    /// Replace the whole record, fail if it does not exist
    ReplaceOnly,
    /// Create the record, fail if it already exists
    CreateOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitLevel {
    #[default]
    CommitAll,
    CommitMaster,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WritePolicy {
    pub record_exists_action: RecordExistsAction,
    pub commit_level: CommitLevel,
    /// Record time-to-live; `None` keeps the record until deleted
    pub expiration: Option<Duration>,
}

impl WritePolicy {
    pub fn new(expiration: Option<Duration>) -> Self {
        Self {
            expiration,
            ..Default::default()
        }
    }

    pub fn create_only(mut self) -> Self {
        self.record_exists_action = RecordExistsAction::CreateOnly;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub namespace: String,
    pub set_name: String,
    pub user_key: String,
}

impl RecordKey {
    pub fn new(
        namespace: impl Into<String>,
        set_name: impl Into<String>,
        user_key: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let key = Self {
            namespace: namespace.into(),
            set_name: set_name.into(),
            user_key: user_key.into(),
        };
        if key.namespace.is_empty() {
            return Err(StoreError::Internal("record key namespace is empty".to_string()));
        }
        Ok(key)
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.set_name, self.user_key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bin {
    pub name: String,
    pub value: String,
}

impl Bin {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Write bins to a record, honouring the policy's record exists action.
    /// A create-only write on an existing record fails with `KeyExists`.
    async fn put_bins(
        &self,
        policy: &WritePolicy,
        key: &RecordKey,
        bins: &[Bin],
    ) -> Result<(), StoreError>;

    /// Delete a record. Returns whether it existed.
    async fn delete(&self, policy: &WritePolicy, key: &RecordKey) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_key_requires_namespace() {
        assert!(RecordKey::new("", "locks", "job").is_err());
        let key = RecordKey::new("test", "locks", "job").unwrap();
        assert_eq!(key.to_string(), "test:locks:job");
    }

    #[test]
    fn test_write_policy_create_only() {
        let policy = WritePolicy::new(Some(Duration::from_secs(3600))).create_only();
        assert_eq!(policy.record_exists_action, RecordExistsAction::CreateOnly);
        assert_eq!(WritePolicy::default().record_exists_action, RecordExistsAction::Update);
    }
}
