//! Fixed-window attempt counting over a shared counter store.
//!
//! Counters live in an injected [`CounterStore`] rather than process memory so
//! several API instances can share one budget (Redis behind the `redis`
//! feature).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::{ServiceError, ServiceResult};
use crate::store::StoreError;

/// Counter state after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    pub count: u64,
    pub resets_in: Duration,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key`, starting a new window of `window` when none is open.
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, StoreError>;
}

/// Process-local counters with per-key expiry.
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: Mutex<HashMap<String, (u64, Instant)>>,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, StoreError> {
        let now = Instant::now();
        let mut counters = self
            .counters
            .lock()
            .map_err(|_| StoreError::Backend("counter lock poisoned".to_string()))?;

        // Expired windows are dropped lazily.
        counters.retain(|_, (_, expires_at)| *expires_at > now);

        let entry = counters
            .entry(key.to_string())
            .or_insert((0, now + window));
        entry.0 += 1;
        Ok(WindowCount {
            count: entry.0,
            resets_in: entry.1.saturating_duration_since(now),
        })
    }
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisCounterStore;

#[cfg(feature = "redis")]
mod redis_store {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{CounterStore, WindowCount};
    use crate::store::StoreError;

    const KEY_PREFIX: &str = "agrolog:ratelimit:";

    /// Redis counters: `SET NX EX` opens the window, `INCR` counts, `TTL` reports
    /// the remaining window. All three run in one MULTI block.
    #[derive(Debug, Clone)]
    pub struct RedisCounterStore {
        client: redis::Client,
    }

    impl RedisCounterStore {
        pub fn new(redis_url: impl AsRef<str>) -> Result<Self, StoreError> {
            let client = redis::Client::open(redis_url.as_ref())
                .map_err(|e| StoreError::Backend(format!("redis connection error: {e}")))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl CounterStore for RedisCounterStore {
        async fn increment(&self, key: &str, window: Duration) -> Result<WindowCount, StoreError> {
            let mut conn = self
                .client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| StoreError::Backend(format!("redis connection error: {e}")))?;

            let key = format!("{KEY_PREFIX}{key}");
            let (count, ttl): (u64, i64) = redis::pipe()
                .atomic()
                .cmd("SET")
                .arg(&key)
                .arg(0)
                .arg("EX")
                .arg(window.as_secs().max(1))
                .arg("NX")
                .ignore()
                .cmd("INCR")
                .arg(&key)
                .cmd("TTL")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .map_err(|e| StoreError::Backend(format!("redis command error: {e}")))?;

            Ok(WindowCount {
                count,
                resets_in: Duration::from_secs(ttl.max(0) as u64),
            })
        }
    }
}

/// Allows at most `limit` attempts per key within `window`.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    limit: u64,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, limit: u64, window: Duration) -> Self {
        Self {
            store,
            limit,
            window,
        }
    }

    /// Count one attempt for `key`; `RateLimited` once the window's budget is spent.
    pub async fn check(&self, key: &str) -> ServiceResult<()> {
        let current = self.store.increment(key, self.window).await?;
        if current.count > self.limit {
            tracing::info!(key, count = current.count, limit = self.limit, "rate limit exceeded");
            return Err(ServiceError::RateLimited {
                retry_after_secs: current.resets_in.as_secs().max(1),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u64, window: Duration) -> RateLimiter {
        RateLimiter::new(Arc::new(InMemoryCounterStore::new()), limit, window)
    }

    #[tokio::test]
    async fn allows_up_to_limit_then_rejects() {
        let limiter = limiter(3, Duration::from_secs(60));
        for _ in 0..3 {
            limiter.check("a@example.com").await.unwrap();
        }
        let err = limiter.check("a@example.com").await.unwrap_err();
        match err {
            ServiceError::RateLimited { retry_after_secs } => assert!(retry_after_secs <= 60),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn keys_are_counted_separately() {
        let limiter = limiter(1, Duration::from_secs(60));
        limiter.check("a").await.unwrap();
        limiter.check("b").await.unwrap();
        assert!(limiter.check("a").await.is_err());
    }

    #[tokio::test]
    async fn window_expiry_resets_the_count() {
        let limiter = limiter(1, Duration::from_millis(30));
        limiter.check("k").await.unwrap();
        assert!(limiter.check("k").await.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;
        limiter.check("k").await.unwrap();
    }
}
