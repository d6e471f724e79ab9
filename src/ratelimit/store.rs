//! Counter stores backing the rate limiter.
//!
//! A store increments a named counter and reports how long until that
//! counter's window resets. The increment, the expiry and the TTL read happen
//! as one atomic step so concurrent callers can never both pass a limit.
use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::Script;
use tokio::sync::Mutex;

use crate::error::AppResult;

/// Result of one increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub count: u64,
    pub reset_in: Duration,
}

#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `key`, opening a new window of `window` if the key is absent
    /// or expired.
    async fn hit(&self, key: &str, window: Duration) -> AppResult<WindowHit>;
}

const HIT_SCRIPT: &str = r#"
local current = redis.call('INCR', KEYS[1])
if current == 1 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('PTTL', KEYS[1])
if ttl < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {current, ttl}
"#;

/// Redis-backed store shared by every gateway instance.
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    script: Script,
}

impl RedisCounterStore {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(RedisCounterStore { conn, script: Script::new(HIT_SCRIPT) })
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> AppResult<WindowHit> {
        let mut conn = self.conn.clone();
        let (count, ttl_ms): (i64, i64) = self
            .script
            .key(key)
            .arg(window.as_millis() as u64)
            .invoke_async(&mut conn)
            .await?;
        Ok(WindowHit {
            count: count.max(0) as u64,
            reset_in: Duration::from_millis(ttl_ms.max(0) as u64),
        })
    }
}

struct Counter {
    count: u64,
    expires_at: Instant,
}

/// In-process store for tests and single-instance development.
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<String, Counter>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn hit(&self, key: &str, window: Duration) -> AppResult<WindowHit> {
        let now = Instant::now();
        let mut counters = self.counters.lock().await;
        // Prune expired windows while we hold the lock
        counters.retain(|_, c| c.expires_at > now);
        let counter = counters
            .entry(key.to_string())
            .or_insert(Counter { count: 0, expires_at: now + window });
        counter.count += 1;
        Ok(WindowHit { count: counter.count, reset_in: counter.expires_at - now })
    }
}
