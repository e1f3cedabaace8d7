// Lock settings
// Loaded from an optional config file overlaid with DISTLOCK__* environment variables

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use distlock_common::{
    BackendKind, ConfigError, DEFAULT_RECORD_TTL_SECS, DEFAULT_SESSION_TTL_SECS, ENV_PREFIX,
};
use distlock_store::{CommitLevel, RecordExistsAction, WritePolicy};

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LockSettings {
    /// Backend a handle built from these settings speaks to
    pub backend: BackendKind,
    pub revision: RevisionSettings,
    pub cache: CacheSettings,
    pub record: RecordSettings,
    pub mutex: MutexSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RevisionSettings {
    /// Lease TTL for sessions opened on the revision store
    pub session_ttl_secs: u64,
    pub retain_losing_claims: bool,
}

impl Default for RevisionSettings {
    fn default() -> Self {
        Self {
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            retain_losing_claims: false,
        }
    }
}

impl RevisionSettings {
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Held keys expire after this many milliseconds; 0 keeps them until released
    pub ttl_ms: u64,
}

impl CacheSettings {
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_ms > 0).then(|| Duration::from_millis(self.ttl_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RecordSettings {
    pub namespace: String,
    pub set_name: String,
    pub bins: Vec<String>,
    /// Record expiration; 0 keeps the record until released
    pub ttl_secs: u64,
    pub record_exists_action: RecordExistsAction,
    pub commit_level: CommitLevel,
}

impl Default for RecordSettings {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            set_name: String::new(),
            bins: Vec::new(),
            ttl_secs: DEFAULT_RECORD_TTL_SECS,
            record_exists_action: RecordExistsAction::CreateOnly,
            commit_level: CommitLevel::CommitMaster,
        }
    }
}

impl RecordSettings {
    pub fn write_policy(&self) -> WritePolicy {
        WritePolicy {
            record_exists_action: self.record_exists_action,
            commit_level: self.commit_level,
            expiration: (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MutexSettings {
    /// Parent path of the per-key mutex nodes
    pub path: String,
}

impl Default for MutexSettings {
    fn default() -> Self {
        Self {
            path: "/distlock".to_string(),
        }
    }
}

impl LockSettings {
    /// Load settings from `path` (format inferred from the extension), then
    /// apply overrides such as `DISTLOCK__RECORD__SET_NAME=locks`.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("record.bins")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ConfigError::Invalid("source".to_string(), e.to_string()))?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let settings: Self = config
            .clone()
            .try_deserialize()
            .map_err(|e| ConfigError::Invalid("settings".to_string(), e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values no backend can run with. Missing collaborators and
    /// backend-specific requirements are checked by the lock handle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.revision.session_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "revision.session_ttl_secs".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
