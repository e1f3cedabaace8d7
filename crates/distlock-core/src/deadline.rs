//! Per-call deadlines and cancellation

use std::future::{Future, pending};
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

use distlock_common::{LockError, Result};

/// Bounds how long a lock call may wait on its backend.
///
/// Either bound may be absent; the default waits forever. When a bound fires,
/// the in-flight backend future is dropped and the remote outcome is unknown.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    at: Option<Instant>,
    token: Option<CancellationToken>,
}

impl Deadline {
    /// No bound
    pub fn none() -> Self {
        Self::default()
    }

    pub fn at(at: Instant) -> Self {
        Self {
            at: Some(at),
            token: None,
        }
    }

    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    pub fn cancelled_by(token: CancellationToken) -> Self {
        Self {
            at: None,
            token: Some(token),
        }
    }

    /// Also abort when `token` is cancelled
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Time left before the deadline, `None` if unbounded
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Fail if either bound has already fired
    pub fn check(&self) -> Result<()> {
        if self.token.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(LockError::Cancelled);
        }
        if self.at.is_some_and(|at| at <= Instant::now()) {
            return Err(LockError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Drive `fut` until it completes or a bound fires.
    ///
    /// A bound that already fired returns without polling `fut` at all.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;

        let expired = async {
            match self.at {
                Some(at) => sleep_until(at).await,
                None => pending::<()>().await,
            }
        };
        let cancelled = async {
            match &self.token {
                Some(token) => token.cancelled().await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(LockError::Cancelled),
            _ = expired => Err(LockError::DeadlineExceeded),
            result = fut => result,
        }
    }
}
