//! Lock handle lifecycle
//!
//! A handle validates its backend on first use and caches the verdict. A
//! handle that failed validation keeps returning the same configuration error
//! without contacting the backend again.

use std::sync::OnceLock;

use async_trait::async_trait;
use tracing::{debug, warn};

use distlock_common::{BackendKind, ConfigError, LockError, Result};

use crate::deadline::Deadline;
use crate::lock::{DistLock, LockBackend};

/// Counter of lock calls, labelled by backend and outcome
pub const LOCK_COUNTER: &str = "distlock_lock_total";
/// Counter of unlock calls, labelled by backend and outcome
pub const UNLOCK_COUNTER: &str = "distlock_unlock_total";

/// Validation state of a [`LockHandle`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleState {
    /// Not yet used
    Unconfigured,
    Ready,
    /// Validation failed; every call returns this error
    Failed(ConfigError),
}

pub struct LockHandle<B> {
    backend: B,
    readiness: OnceLock<std::result::Result<(), ConfigError>>,
}

impl<B: LockBackend> LockHandle<B> {
    /// Wrap `backend`; validation is deferred to the first call
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            readiness: OnceLock::new(),
        }
    }

    /// Wrap `backend` and validate it immediately
    pub fn try_new(backend: B) -> Result<Self> {
        let handle = Self::new(backend);
        handle.ensure_ready()?;
        Ok(handle)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn state(&self) -> HandleState {
        match self.readiness.get() {
            None => HandleState::Unconfigured,
            Some(Ok(())) => HandleState::Ready,
            Some(Err(e)) => HandleState::Failed(e.clone()),
        }
    }

    fn ensure_ready(&self) -> Result<()> {
        self.readiness
            .get_or_init(|| {
                let verdict = self.backend.validate();
                if let Err(ref e) = verdict {
                    warn!(backend = %self.backend.kind(), "Lock handle configuration rejected: {}", e);
                }
                verdict
            })
            .clone()
            .map_err(LockError::from)
    }
}

fn record_outcome(counter: &'static str, backend: BackendKind, result: &Result<()>) {
    let outcome = match result {
        Ok(()) => "ok",
        Err(e) => e.kind(),
    };
    metrics::counter!(counter, "backend" => backend.as_str(), "outcome" => outcome).increment(1);
}

#[async_trait]
impl<B: LockBackend> DistLock for LockHandle<B> {
    async fn lock_with_deadline(
        &self,
        deadline: &Deadline,
        key: &str,
        secret: &str,
    ) -> Result<bool> {
        let backend = self.backend.kind();
        let result = match self.ensure_ready() {
            Ok(()) => deadline.run(self.backend.acquire(key, secret)).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => debug!(backend = %backend, key = %key, "Lock acquired"),
            Err(e) => debug!(backend = %backend, key = %key, outcome = e.kind(), "Lock not acquired: {}", e),
        }
        record_outcome(LOCK_COUNTER, backend, &result);

        result.map(|()| true)
    }

    async fn unlock_with_deadline(
        &self,
        deadline: &Deadline,
        key: &str,
        secret: &str,
    ) -> Result<()> {
        let backend = self.backend.kind();
        let result = match self.ensure_ready() {
            Ok(()) => deadline.run(self.backend.release(key, secret)).await,
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => debug!(backend = %backend, key = %key, "Lock released"),
            Err(e) => debug!(backend = %backend, key = %key, outcome = e.kind(), "Lock not released: {}", e),
        }
        record_outcome(UNLOCK_COUNTER, backend, &result);

        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct CountingBackend {
        config: std::result::Result<(), ConfigError>,
        validations: AtomicUsize,
        acquisitions: AtomicUsize,
    }

    impl CountingBackend {
        fn new(config: std::result::Result<(), ConfigError>) -> Self {
            Self {
                config,
                validations: AtomicUsize::new(0),
                acquisitions: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LockBackend for CountingBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Cache
        }

        fn validate(&self) -> std::result::Result<(), ConfigError> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            self.config.clone()
        }

        async fn acquire(&self, _key: &str, secret: &str) -> Result<()> {
            self.acquisitions.fetch_add(1, Ordering::SeqCst);
            if secret == "held" {
                return Err(LockError::Locked);
            }
            Ok(())
        }

        async fn release(&self, _key: &str, _secret: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_validates_once() {
        let handle = LockHandle::new(CountingBackend::new(Ok(())));
        assert_eq!(handle.state(), HandleState::Unconfigured);

        assert_eq!(handle.lock("a", "s").await, Ok(true));
        assert_eq!(handle.unlock("a", "s").await, Ok(()));
        assert_eq!(handle.lock("a", "held").await, Err(LockError::Locked));

        assert_eq!(handle.state(), HandleState::Ready);
        assert_eq!(handle.backend().validations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_config_error_is_sticky() {
        let handle = LockHandle::new(CountingBackend::new(Err(ConfigError::NoClient)));

        for _ in 0..3 {
            assert_eq!(
                handle.lock("a", "s").await,
                Err(LockError::Config(ConfigError::NoClient))
            );
        }
        assert_eq!(
            handle.unlock("a", "s").await,
            Err(LockError::Config(ConfigError::NoClient))
        );

        let backend = handle.backend();
        assert_eq!(backend.validations.load(Ordering::SeqCst), 1);
        assert_eq!(backend.acquisitions.load(Ordering::SeqCst), 0);
        assert_eq!(handle.state(), HandleState::Failed(ConfigError::NoClient));
    }

    #[tokio::test]
    async fn test_try_new_validates_eagerly() {
        let err = LockHandle::try_new(CountingBackend::new(Err(ConfigError::NoPath)))
            .err()
            .unwrap();
        assert_eq!(err, LockError::Config(ConfigError::NoPath));

        let handle = LockHandle::try_new(CountingBackend::new(Ok(()))).unwrap();
        assert_eq!(handle.state(), HandleState::Ready);
    }

    #[test]
    fn test_outcomes_are_counted_per_backend() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let metrics = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async {
                let handle = LockHandle::new(CountingBackend::new(Ok(())));
                assert_eq!(handle.lock("a", "s").await, Ok(true));
                assert_eq!(handle.lock("a", "held").await, Err(LockError::Locked));
                assert_eq!(handle.lock("a", "held").await, Err(LockError::Locked));
                assert_eq!(handle.unlock("a", "s").await, Ok(()));

                let broken = LockHandle::new(CountingBackend::new(Err(ConfigError::NoClient)));
                assert!(broken.unlock("a", "s").await.is_err());
            });
        });

        let rendered = metrics.render();
        let samples: Vec<&str> = rendered.lines().filter(|l| !l.starts_with('#')).collect();
        assert!(samples.contains(&r#"distlock_lock_total{backend="cache",outcome="ok"} 1"#));
        assert!(samples.contains(&r#"distlock_lock_total{backend="cache",outcome="locked"} 2"#));
        assert!(samples.contains(&r#"distlock_unlock_total{backend="cache",outcome="ok"} 1"#));
        assert!(samples.contains(&r#"distlock_unlock_total{backend="cache",outcome="config"} 1"#));
    }

    #[tokio::test]
    async fn test_expired_deadline_skips_backend() {
        let handle = LockHandle::new(CountingBackend::new(Ok(())));
        let deadline = Deadline::at(tokio::time::Instant::now() - std::time::Duration::from_millis(1));

        assert_eq!(
            handle.lock_with_deadline(&deadline, "a", "s").await,
            Err(LockError::DeadlineExceeded)
        );
        assert_eq!(handle.backend().acquisitions.load(Ordering::SeqCst), 0);
    }
}
