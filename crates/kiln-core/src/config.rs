//! Engine configuration, collected once per invocation.

use std::time::Duration;

use crate::paths::CacheDir;

/// Bounded retry policy for cache writes that may collide with a sibling
/// process writing the same entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// No waiting between attempts. Used by tests.
    pub const fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 10,
            backoff: Duration::from_secs(5),
        }
    }
}

/// Configuration threaded through every engine component.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub cache: CacheDir,
    pub write_retry: RetryPolicy,
    pub user_agent: String,
}

impl EngineConfig {
    /// Configuration rooted at an explicit cache directory.
    pub fn new(cache: CacheDir) -> Self {
        Self {
            cache,
            write_retry: RetryPolicy::default(),
            user_agent: crate::USER_AGENT.to_string(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `KILN_CACHE_DIR` / `KILN_HOME` pick the cache, `KILN_WRITE_RETRIES`
    /// and `KILN_WRITE_BACKOFF_SECS` tune the write retry policy. Returns
    /// `None` if no cache directory can be determined.
    pub fn from_env() -> Option<Self> {
        Some(Self::from_env_at(CacheDir::resolve()?))
    }

    /// Like [`EngineConfig::from_env`], with an explicit cache directory.
    pub fn from_env_at(cache: CacheDir) -> Self {
        let mut config = Self::new(cache);

        if let Some(attempts) = env_number("KILN_WRITE_RETRIES") {
            config.write_retry.attempts = attempts.max(1) as u32;
        }
        if let Some(secs) = env_number("KILN_WRITE_BACKOFF_SECS") {
            config.write_retry.backoff = Duration::from_secs(secs);
        }

        config
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.write_retry = retry;
        self
    }
}

fn env_number(name: &str) -> Option<u64> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!("Ignoring {name}={raw}: not a number");
            None
        }
    }
}
