//! Prediction operations exposed by the gateway.
//!
//! `PredictionSource` is the provider seam: `ReplicateClient` implements it
//! over HTTP, tests implement it in memory. `PredictionService` layers the
//! gateway's own rules on top (trigger words, pagination, filtering) and
//! `views` shapes the records for clients.
use async_trait::async_trait;
use axum::body::Bytes;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::AppResult;
use crate::replicate::{Prediction, PredictionPage};

pub mod service;
pub mod views;

pub use service::PredictionService;

/// Body of an output file, chunk by chunk as the provider sends it.
pub type ByteStream = BoxStream<'static, AppResult<Bytes>>;

#[async_trait]
pub trait PredictionSource: Send + Sync {
    /// Submit a prediction for the configured model version.
    async fn create(&self, input: &Value) -> AppResult<Prediction>;

    /// Fetch the first page (`None`) or the page behind a `next` cursor.
    async fn list_page(&self, cursor: Option<&str>) -> AppResult<PredictionPage>;

    /// Fetch one prediction; `AppError::NotFound` when the provider has no such id.
    async fn get(&self, id: &str) -> AppResult<Prediction>;

    /// Start downloading a single output file. Errors before the first byte
    /// (transport failure, non-success status) are returned here.
    async fn fetch_file(&self, url: &str) -> AppResult<ByteStream>;
}
