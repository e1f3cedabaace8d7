//! distlock common - shared error types and constants
//!
//! This crate provides the foundational types used across distlock crates:
//! - Error taxonomy for lock, configuration and backend failures
//! - Backend kind identifiers

pub mod error;

pub use error::{ConfigError, LockError, Result, StoreError};

use serde::{Deserialize, Serialize};

/// Environment variable prefix read by the settings loader
pub const ENV_PREFIX: &str = "DISTLOCK";

/// Default lease TTL for revision-store sessions, in seconds
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60;

/// Default record expiration for the record-store variant, in seconds
pub const DEFAULT_RECORD_TTL_SECS: u64 = 3600;

/// Coordination backend a lock handle speaks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Revision,
    Cache,
    Record,
    Mutex,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Revision => "revision",
            BackendKind::Cache => "cache",
            BackendKind::Record => "record",
            BackendKind::Mutex => "mutex",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "revision" => Ok(BackendKind::Revision),
            "cache" => Ok(BackendKind::Cache),
            "record" => Ok(BackendKind::Record),
            "mutex" => Ok(BackendKind::Mutex),
            _ => Err(format!("Invalid backend kind: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_kind() {
        assert_eq!(BackendKind::default(), BackendKind::Revision);
        assert_eq!(BackendKind::Cache.as_str(), "cache");
        assert_eq!("record".parse::<BackendKind>().unwrap(), BackendKind::Record);
        assert_eq!(BackendKind::Mutex.to_string(), "mutex");
        assert!("zookeeper".parse::<BackendKind>().is_err());
    }
}
