//! Replicate gateway library
//!
//! Modules:
//! - `api`: Axum router, API-key gate, rate-limit middleware and handlers.
//! - `replicate`: Thin client and wire types for the Replicate REST API.
//! - `predictions`: Gateway rules over the provider and client-facing views.
//! - `ratelimit`: Multi-window request limiter over a shared counter store.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
//!
//! Re-exports are provided for common types: `Config`, `ReplicateClient`,
//! `PredictionService`, and `RateLimiter`.
pub mod api;
pub mod config;
pub mod error;
pub mod predictions;
pub mod ratelimit;
pub mod replicate;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use predictions::PredictionService;
pub use ratelimit::RateLimiter;
pub use replicate::ReplicateClient;
