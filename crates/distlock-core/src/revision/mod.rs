//! Revision-store lock
//!
//! Acquisition and release are each a single conditional transaction on the
//! store. Ownership goes to the session whose claim under the logical key was
//! created first; claims are bound to the session lease and vanish with it.

mod acquire;
mod release;

use std::sync::Arc;

use async_trait::async_trait;

use distlock_common::{BackendKind, ConfigError, Result};
use distlock_store::LeaseSession;

use crate::lock::LockBackend;
use crate::settings::RevisionSettings;

pub use acquire::{Claim, acquisition_txn, resolve_claim, withdrawal_txn};
pub use release::release_txn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevisionLockOptions {
    /// Leave a losing claim in the store instead of withdrawing it.
    ///
    /// A retained claim queues behind the owner and wins by itself once every
    /// earlier claim is gone.
    pub retain_losing_claims: bool,
}

impl RevisionLockOptions {
    pub fn retain_losing_claims(mut self, retain: bool) -> Self {
        self.retain_losing_claims = retain;
        self
    }
}

/// Lock backend over a lease session on a revision store
#[derive(Clone, Default)]
pub struct RevisionLock {
    session: Option<Arc<dyn LeaseSession>>,
    options: RevisionLockOptions,
}

impl RevisionLock {
    pub fn new(session: Arc<dyn LeaseSession>) -> Self {
        Self {
            session: Some(session),
            options: RevisionLockOptions::default(),
        }
    }

    pub fn from_settings(settings: &RevisionSettings, session: Option<Arc<dyn LeaseSession>>) -> Self {
        Self {
            session,
            options: RevisionLockOptions::default()
                .retain_losing_claims(settings.retain_losing_claims),
        }
    }

    pub fn with_options(mut self, options: RevisionLockOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> RevisionLockOptions {
        self.options
    }

    pub fn session(&self) -> Option<&Arc<dyn LeaseSession>> {
        self.session.as_ref()
    }

    fn bound_session(&self) -> std::result::Result<&Arc<dyn LeaseSession>, ConfigError> {
        self.session.as_ref().ok_or(ConfigError::NoSession)
    }
}

#[async_trait]
impl LockBackend for RevisionLock {
    fn kind(&self) -> BackendKind {
        BackendKind::Revision
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.bound_session().map(|_| ())
    }

    async fn acquire(&self, key: &str, secret: &str) -> Result<()> {
        acquire::acquire(&**self.bound_session()?, &self.options, key, secret).await
    }

    async fn release(&self, key: &str, secret: &str) -> Result<()> {
        release::release(&**self.bound_session()?, key, secret).await
    }
}
