//! Error types for distlock
//!
//! This module defines:
//! - `LockError`: outcome taxonomy returned by every lock operation
//! - `ConfigError`: settings or collaborators a lock handle cannot work without
//! - `StoreError`: failures surfaced by a coordination backend

/// A required collaborator or setting is missing or inconsistent.
///
/// Detected once per lock handle and fatal for its lifetime.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no session provided")]
    NoSession,

    #[error("no client provided")]
    NoClient,

    #[error("no namespace provided")]
    NoNamespace,

    #[error("no set name provided")]
    NoSetName,

    #[error("no bins list provided")]
    NoBins,

    #[error("no write policy provided")]
    NoPolicy,

    #[error("write policy record exists action must be create_only")]
    PolicyFlag,

    #[error("no mutex path provided")]
    NoPath,

    #[error("invalid setting '{0}': {1}")]
    Invalid(String, String),
}

/// Failures reported by a coordination backend.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),

    #[error("requested lease {0:x} not found")]
    LeaseNotFound(i64),

    #[error("key '{0}' already exists")]
    KeyExists(String),

    #[error("key '{0}' not found")]
    KeyNotFound(String),

    #[error("not locked")]
    NotLocked,

    #[error("attempt to acquire a lock already held by this participant")]
    Deadlock,

    #[error("transaction rejected: {0}")]
    TxnRejected(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

/// Outcome of a failed lock or unlock call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("locked in another session")]
    Locked,

    #[error("lock is not held with this secret")]
    NotOwned,

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("backend error: {0}")]
    Store(#[from] StoreError),
}

impl LockError {
    /// Another holder won the key; an expected, non-fatal outcome.
    pub fn is_contention(&self) -> bool {
        matches!(self, LockError::Locked)
    }

    /// The caller's deadline or cancellation token fired first.
    /// The remote side effect of the call is unknown.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, LockError::Cancelled | LockError::DeadlineExceeded)
    }

    pub fn is_config(&self) -> bool {
        matches!(self, LockError::Config(_))
    }

    /// Short label used for log fields and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            LockError::Config(_) => "config",
            LockError::Locked => "locked",
            LockError::NotOwned => "not_owned",
            LockError::Cancelled => "cancelled",
            LockError::DeadlineExceeded => "deadline_exceeded",
            LockError::Store(_) => "store",
        }
    }
}

pub type Result<T, E = LockError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(LockError::Locked.is_contention());
        assert!(!LockError::NotOwned.is_contention());
        assert!(LockError::Cancelled.is_cancellation());
        assert!(LockError::DeadlineExceeded.is_cancellation());
        assert!(LockError::from(ConfigError::NoSession).is_config());
        assert!(!LockError::from(StoreError::NotLocked).is_config());
    }

    #[test]
    fn test_store_error_passes_through() {
        let err = LockError::from(StoreError::Network("connection reset".to_string()));
        assert_eq!(err.kind(), "store");
        assert_eq!(err.to_string(), "backend error: network error: connection reset");
    }

    #[test]
    fn test_lease_not_found_renders_hex() {
        let err = StoreError::LeaseNotFound(0x694d7b1c);
        assert_eq!(err.to_string(), "requested lease 694d7b1c not found");
    }
}
