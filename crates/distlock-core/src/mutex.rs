//! Coordination-service mutex lock
//!
//! Each lock key maps to a mutex node at `path/key`. The handle keeps one
//! participant per key, so a second acquire through the same handle reports
//! the key as held rather than blocking on itself. A participant is dropped
//! after a successful release unless an acquire on it is still in flight.
//! Service calls are blocking and run on the blocking pool.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use distlock_common::{BackendKind, ConfigError, LockError, Result, StoreError};
use distlock_store::{DistributedMutex, MutexService};

use crate::lock::LockBackend;
use crate::settings::MutexSettings;

#[derive(Default)]
pub struct MutexLock {
    service: Option<Arc<dyn MutexService>>,
    path: String,
    participants: DashMap<String, Arc<dyn DistributedMutex>>,
}

impl MutexLock {
    pub fn new(service: Arc<dyn MutexService>, path: impl Into<String>) -> Self {
        Self {
            service: Some(service),
            path: path.into(),
            participants: DashMap::new(),
        }
    }

    pub fn from_settings(settings: &MutexSettings, service: Option<Arc<dyn MutexService>>) -> Self {
        Self {
            service,
            path: settings.path.clone(),
            participants: DashMap::new(),
        }
    }

    /// Keys with a live participant on this handle
    pub fn tracked_keys(&self) -> usize {
        self.participants.len()
    }

    /// Mutex node backing `key`
    pub fn node_path(&self, key: &str) -> String {
        format!("{}/{}", self.path.trim_end_matches('/'), key)
    }

    fn participant(&self, key: &str) -> Result<Arc<dyn DistributedMutex>> {
        let service = self.service.as_ref().ok_or(ConfigError::NoClient)?;
        let mutex = self
            .participants
            .entry(key.to_string())
            .or_insert_with(|| service.mutex(&self.node_path(key)))
            .value()
            .clone();
        Ok(mutex)
    }
}

async fn run_blocking<F>(call: F) -> Result<()>
where
    F: FnOnce() -> std::result::Result<(), StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| StoreError::Internal(format!("mutex call aborted: {}", e)))?
        .map_err(LockError::from)
}

#[async_trait]
impl LockBackend for MutexLock {
    fn kind(&self) -> BackendKind {
        BackendKind::Mutex
    }

    fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.service.is_none() {
            return Err(ConfigError::NoClient);
        }
        if self.path.is_empty() {
            return Err(ConfigError::NoPath);
        }
        Ok(())
    }

    /// Blocks while another participant holds the node. The secret is not
    /// stored; the key itself is attached as node data.
    async fn acquire(&self, key: &str, _secret: &str) -> Result<()> {
        let mutex = self.participant(key)?;
        let data = key.as_bytes().to_vec();

        match run_blocking(move || mutex.lock_with_data(&data)).await {
            Err(LockError::Store(StoreError::Deadlock)) => Err(LockError::Locked),
            other => other,
        }
    }

    async fn release(&self, key: &str, _secret: &str) -> Result<()> {
        let Some(mutex) = self.participants.get(key).map(|m| m.value().clone()) else {
            return Err(LockError::NotOwned);
        };

        match run_blocking(move || mutex.unlock()).await {
            Ok(()) => {
                // Only the map's reference left: no acquire is waiting on it
                self.participants
                    .remove_if(key, |_, m| Arc::strong_count(m) == 1);
                Ok(())
            }
            Err(LockError::Store(StoreError::NotLocked)) => Err(LockError::NotOwned),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use distlock_store::memory::MemoryMutexService;

    use super::*;

    #[test]
    fn test_node_path() {
        let lock = MutexLock::new(Arc::new(MemoryMutexService::new()), "/locks/");
        assert_eq!(lock.node_path("job:1"), "/locks/job:1");
    }

    #[test]
    fn test_validation() {
        assert_eq!(MutexLock::default().validate(), Err(ConfigError::NoClient));
        let lock = MutexLock::new(Arc::new(MemoryMutexService::new()), "");
        assert_eq!(lock.validate(), Err(ConfigError::NoPath));
    }

    #[tokio::test]
    async fn test_second_acquire_on_same_handle_is_locked() {
        let service = MemoryMutexService::new();
        let lock = MutexLock::new(Arc::new(service.clone()), "/locks");

        lock.acquire("job:1", "").await.unwrap();
        assert_eq!(lock.acquire("job:1", "").await, Err(LockError::Locked));
        assert_eq!(service.holder_data("/locks/job:1").unwrap(), b"job:1");

        lock.release("job:1", "").await.unwrap();
        assert!(!service.is_locked("/locks/job:1"));
        assert_eq!(lock.release("job:1", "").await, Err(LockError::NotOwned));
    }

    #[tokio::test]
    async fn test_released_keys_are_forgotten() {
        let lock = MutexLock::new(Arc::new(MemoryMutexService::new()), "/locks");

        for i in 0..10 {
            let key = format!("job:{}", i);
            lock.acquire(&key, "").await.unwrap();
            lock.release(&key, "").await.unwrap();
        }
        lock.acquire("held", "").await.unwrap();

        assert_eq!(lock.tracked_keys(), 1);
        lock.release("held", "").await.unwrap();
        assert_eq!(lock.tracked_keys(), 0);
        lock.acquire("held", "").await.unwrap();
        assert_eq!(lock.tracked_keys(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiting_participant_tracked_until_released() {
        let service = MemoryMutexService::new();
        let outside = service.mutex("/locks/job:1");
        outside.lock_with_data(b"").unwrap();

        let lock = Arc::new(MutexLock::new(Arc::new(service.clone()), "/locks"));
        let waiting = {
            let lock = lock.clone();
            tokio::spawn(async move { lock.acquire("job:1", "").await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(lock.tracked_keys(), 1);

        outside.unlock().unwrap();
        waiting.await.unwrap().unwrap();
        lock.release("job:1", "").await.unwrap();
        assert_eq!(lock.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_release_unknown_key_is_not_owned() {
        let lock = MutexLock::new(Arc::new(MemoryMutexService::new()), "/locks");
        assert_eq!(lock.release("never", "").await, Err(LockError::NotOwned));
    }
}
