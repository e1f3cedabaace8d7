// Lock traits
// DistLock is the caller-facing contract; LockBackend is what each variant implements

use async_trait::async_trait;

use distlock_common::{BackendKind, ConfigError, Result};

use crate::deadline::Deadline;

/// Non-blocking distributed lock keyed by name.
///
/// `Ok(true)` from a lock call means the caller holds `key`. Every other
/// outcome is an error:
/// [`LockError::Locked`](distlock_common::LockError::Locked) when another holder
/// won, [`LockError::NotOwned`](distlock_common::LockError::NotOwned) when an
/// unlock did not match. `Ok(false)` is never returned.
#[async_trait]
pub trait DistLock: Send + Sync {
    /// Try once to acquire `key`, storing `secret` as proof of ownership
    async fn lock(&self, key: &str, secret: &str) -> Result<bool> {
        self.lock_with_deadline(&Deadline::none(), key, secret).await
    }

    async fn lock_with_deadline(&self, deadline: &Deadline, key: &str, secret: &str)
    -> Result<bool>;

    /// Release `key` if it is held with `secret`
    async fn unlock(&self, key: &str, secret: &str) -> Result<()> {
        self.unlock_with_deadline(&Deadline::none(), key, secret).await
    }

    async fn unlock_with_deadline(
        &self,
        deadline: &Deadline,
        key: &str,
        secret: &str,
    ) -> Result<()>;
}

/// One coordination backend's acquire and release primitives.
///
/// Wrapped by [`LockHandle`](crate::LockHandle), which validates the backend
/// once, applies deadlines and records outcomes.
#[async_trait]
pub trait LockBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Check every collaborator and setting the backend needs
    fn validate(&self) -> std::result::Result<(), ConfigError>;

    async fn acquire(&self, key: &str, secret: &str) -> Result<()>;

    async fn release(&self, key: &str, secret: &str) -> Result<()>;
}
