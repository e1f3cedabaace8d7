//! Key-value cache interface

use std::time::Duration;

use async_trait::async_trait;

use distlock_common::StoreError;

/// A cache offering atomic conditional writes and deletes
#[async_trait]
pub trait KvCache: Send + Sync {
    /// Store `value` under `key` unless the key already exists.
    /// A `ttl` of `None` keeps the key until deleted.
    async fn set_nx(&self, key: &str, value: &str, ttl: Option<Duration>)
    -> Result<bool, StoreError>;

    /// Delete `key` only if it currently holds `expected`, atomically.
    /// Returns whether a key was deleted.
    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, StoreError>;
}
