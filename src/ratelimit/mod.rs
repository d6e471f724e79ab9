//! Per-client, per-route request limits over one or more windows.
pub mod limiter;
pub mod store;

pub use limiter::{client_identity, RateLimiter, Window};
pub use store::{CounterStore, MemoryCounterStore, RedisCounterStore, WindowHit};
