use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;

use crate::error::{AppError, AppResult};
use crate::ratelimit::store::CounterStore;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
const KEY_PREFIX: &str = "ratelimit";

/// At most `limit` requests per `duration`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub limit: u64,
    pub duration: Duration,
}

impl Window {
    pub const fn per_seconds(limit: u64, seconds: u64) -> Self {
        Window { limit, duration: Duration::from_secs(seconds) }
    }
}

/// Checks requests against sets of windows kept in a shared counter store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        RateLimiter { store }
    }

    /// Count one request from `identity` against every window in order.
    ///
    /// All windows must pass; the first one that rejects stops the check, so
    /// windows after it are not charged for the request.
    pub async fn check(&self, identity: &str, windows: &[Window]) -> AppResult<()> {
        for window in windows {
            let key = format!(
                "{}:{}:{}:{}",
                KEY_PREFIX,
                identity,
                window.limit,
                window.duration.as_millis()
            );
            let hit = self.store.hit(&key, window.duration).await?;
            if hit.count > window.limit {
                let retry_after = retry_after_secs(hit.reset_in);
                tracing::warn!(
                    identity,
                    limit = window.limit,
                    window_secs = window.duration.as_secs(),
                    retry_after,
                    "rate limit exceeded"
                );
                return Err(AppError::RateLimited { retry_after });
            }
        }
        Ok(())
    }
}

/// Whole seconds until reset, rounded up.
pub fn retry_after_secs(reset_in: Duration) -> u64 {
    let millis = reset_in.as_millis() as u64;
    (millis + 999) / 1000
}

/// `{client}:{route}` where client is the first `X-Forwarded-For` entry, else
/// the peer address. `route` is the matched route template when there is one.
pub fn client_identity(headers: &HeaderMap, peer: Option<IpAddr>, route: &str) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let client = match (forwarded, peer) {
        (Some(f), _) => f.to_string(),
        (None, Some(ip)) => ip.to_string(),
        (None, None) => "unknown".to_string(),
    };
    format!("{}:{}", client, route)
}
