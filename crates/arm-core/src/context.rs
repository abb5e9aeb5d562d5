//! Operation context: cancellation, deadlines, and process-wide settings.
//!
//! Every I/O-bearing operation takes an [`OpContext`]. It is cheap to clone;
//! clones share the same cancellation token, so cancelling the root context
//! aborts everything derived from it.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::credentials::{CredentialResolver, EnvCredentials};
use crate::error::{ArmError, Result};
use crate::paths;

/// Cancellation and deadline carried through every operation.
#[derive(Debug, Clone, Default)]
pub struct OpContext {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl OpContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive a context that also expires after `timeout`.
    ///
    /// The earlier of the existing and new deadline wins.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            cancel: self.cancel.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fail fast if the operation should stop.
    pub fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ArmError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(ArmError::Timeout);
        }
        Ok(())
    }

    /// Drive `fut` to completion unless cancelled or past the deadline.
    ///
    /// Dropping `fut` on cancellation releases whatever it holds (child
    /// processes spawned with `kill_on_drop`, open connections).
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        let deadline = self.deadline;
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(ArmError::Cancelled),
            () = sleep_until(deadline) => Err(ArmError::Timeout),
            res = fut => res,
        }
    }

    /// Sleep for `dur`, waking early on cancellation.
    pub async fn sleep(&self, dur: Duration) -> Result<()> {
        self.run(async {
            tokio::time::sleep(dur).await;
            Ok(())
        })
        .await
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}

/// Process-wide configuration shared by every command.
#[derive(Clone)]
pub struct ArmConfig {
    /// Cache root (`ARM_CACHE_DIR` or `~/.arm`).
    pub cache_dir: PathBuf,
    /// Token lookup for HTTP registries.
    pub credentials: Arc<dyn CredentialResolver>,
    /// Shared HTTP client.
    pub client: reqwest::Client,
}

impl fmt::Debug for ArmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArmConfig")
            .field("cache_dir", &self.cache_dir)
            .finish_non_exhaustive()
    }
}

impl ArmConfig {
    /// Configuration from the environment.
    ///
    /// # Errors
    ///
    /// Fails when neither `ARM_CACHE_DIR` nor a home directory is available,
    /// or when the HTTP client cannot be built.
    pub fn from_env() -> Result<Self> {
        let cache_dir = paths::try_arm_home().ok_or_else(|| {
            ArmError::config("cannot determine cache directory: set ARM_CACHE_DIR or HOME")
        })?;
        Self::with_cache_dir(cache_dir)
    }

    /// Configuration rooted at an explicit cache directory.
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()?;
        Ok(Self {
            cache_dir: cache_dir.into(),
            credentials: Arc::new(EnvCredentials),
            client,
        })
    }

    /// Replace the credential resolver.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialResolver>) -> Self {
        self.credentials = credentials;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancelled_context_aborts_pending_work() {
        let ctx = OpContext::new();
        let child = ctx.clone();
        ctx.cancel();
        let res = child.run(std::future::pending::<Result<()>>()).await;
        assert!(matches!(res, Err(ArmError::Cancelled)));
    }

    #[tokio::test]
    async fn deadline_expires() {
        let ctx = OpContext::new().with_timeout(Duration::from_millis(10));
        let res = ctx.run(std::future::pending::<Result<()>>()).await;
        assert!(matches!(res, Err(ArmError::Timeout)));
    }

    #[tokio::test]
    async fn completes_normally() {
        let ctx = OpContext::new();
        let v = ctx.run(async { Ok(7) }).await.unwrap();
        assert_eq!(v, 7);
    }

    #[test]
    fn earlier_deadline_wins() {
        let ctx = OpContext::new().with_timeout(Duration::from_millis(1));
        let longer = ctx.with_timeout(Duration::from_secs(60));
        assert_eq!(longer.deadline, ctx.deadline);
    }
}
