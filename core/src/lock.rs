//! Sweep exclusivity strategies.
//!
//! The primary cleanup scheduler coordinates through a Redis lease so only one
//! service instance sweeps per tick; the fallback runs with no coordination at
//! all. Both are safe because `finish_session` is idempotent — coordination
//! only avoids redundant work, it is not needed for correctness.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Client;
use std::time::Duration;
use uuid::Uuid;

/// How a sweep worker obtains (or declines to obtain) exclusivity for a tick.
#[async_trait]
pub trait SweepCoordinator: Send + Sync {
    /// Try to become the sweeper for this tick.
    ///
    /// `Ok(false)` means another instance holds the lease; skip the tick.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Coordination`] when the coordination backend is
    /// unreachable; the caller skips the tick and relies on the fallback.
    async fn try_acquire(&self) -> Result<bool>;

    /// Give the lease back after the sweep. Best effort: an unreleased lease
    /// simply expires.
    async fn release(&self);

    /// Short label for logs.
    fn describe(&self) -> &'static str;
}

/// No coordination: every tick proceeds. Used by the fallback sweeper, which
/// must depend on nothing but the database.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCoordination;

#[async_trait]
impl SweepCoordinator for NoCoordination {
    async fn try_acquire(&self) -> Result<bool> {
        Ok(true)
    }

    async fn release(&self) {}

    fn describe(&self) -> &'static str {
        "none"
    }
}

/// Compare-and-delete so we never drop a lease a slower sweep already lost to
/// expiry and someone else re-acquired.
const RELEASE_SCRIPT: &str = r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
";

/// Redis-backed sweep lease: `SET key token NX PX lease`.
///
/// Each service instance carries its own random token, so release only deletes
/// a lease this instance actually holds.
#[derive(Clone)]
pub struct RedisSweepLock {
    conn_manager: ConnectionManager,
    key: String,
    token: String,
    lease: Duration,
}

impl RedisSweepLock {
    /// Connect to Redis and prepare the lease.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Coordination`] if the client cannot be created or
    /// the connection manager cannot reach the server — the caller is expected
    /// to tolerate this and fall back to the uncoordinated sweeper.
    pub async fn connect(redis_url: &str, key: &str, lease: Duration) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StoreError::Coordination(format!("Failed to create Redis client: {e}")))?;
        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StoreError::Coordination(format!("Failed to connect Redis connection manager: {e}"))
        })?;
        Ok(Self {
            conn_manager,
            key: key.to_string(),
            token: Uuid::new_v4().to_string(),
            lease,
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn lease_millis(&self) -> u64 {
        self.lease.as_millis().max(1) as u64
    }
}

#[async_trait]
impl SweepCoordinator for RedisSweepLock {
    async fn try_acquire(&self) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(&self.key)
            .arg(&self.token)
            .arg("NX")
            .arg("PX")
            .arg(self.lease_millis())
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Coordination(format!("Failed to acquire sweep lease: {e}")))?;
        Ok(reply.is_some())
    }

    async fn release(&self) {
        let mut conn = self.conn_manager.clone();
        let script = redis::Script::new(RELEASE_SCRIPT);
        let released: std::result::Result<i64, redis::RedisError> = script
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut conn)
            .await;
        if let Err(e) = released {
            tracing::warn!(error = %e, key = %self.key, "Failed to release sweep lease; it will expire on its own");
        }
    }

    fn describe(&self) -> &'static str {
        "redis-lease"
    }
}
