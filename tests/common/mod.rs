use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Bytes;
use futures::{stream, StreamExt};
use replicate_gateway::api::auth::ApiKey;
use replicate_gateway::api::{create_app, AppState, GatewaySettings};
use replicate_gateway::predictions::{ByteStream, PredictionSource};
use replicate_gateway::ratelimit::MemoryCounterStore;
use replicate_gateway::replicate::{Prediction, PredictionPage};
use replicate_gateway::{AppError, AppResult, PredictionService, RateLimiter};
use serde_json::{json, Value};

pub const ACCESS_KEY: &str = "test-access-key";
pub const MODEL: &str = "owner/portrait";
pub const VERSION: &str = "v1";

/// In-memory provider with call counters.
#[derive(Default)]
pub struct FakeSource {
    pub predictions: HashMap<String, Prediction>,
    pub files: HashMap<String, Vec<u8>>,
    pub calls: AtomicUsize,
}

impl FakeSource {
    pub fn with(predictions: Vec<Prediction>) -> Self {
        FakeSource {
            predictions: predictions.into_iter().map(|p| (p.id.clone(), p)).collect(),
            ..Default::default()
        }
    }

    pub fn file(mut self, url: &str, bytes: &[u8]) -> Self {
        self.files.insert(url.to_string(), bytes.to_vec());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn prediction(id: &str, status: &str, outputs: &[&str]) -> Prediction {
    serde_json::from_value(json!({
        "id": id,
        "model": MODEL,
        "version": VERSION,
        "status": status,
        "created_at": "2024-03-01T10:00:00Z",
        "started_at": "2024-03-01T10:00:01Z",
        "input": {"prompt": "TOK", "num_outputs": outputs.len()},
        "output": outputs,
    }))
    .unwrap()
}

#[async_trait]
impl PredictionSource for FakeSource {
    async fn create(&self, input: &Value) -> AppResult<Prediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let prompt = input["prompt"].as_str().unwrap_or_default();
        Ok(prediction(&format!("gen-{}", prompt.len()), "starting", &[]))
    }

    async fn list_page(&self, _cursor: Option<&str>) -> AppResult<PredictionPage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut results: Vec<Prediction> = self.predictions.values().cloned().collect();
        results.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(PredictionPage { previous: None, next: None, results })
    }

    async fn get(&self, id: &str) -> AppResult<Prediction> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if id == "boom" {
            return Err(AppError::Upstream("Failed to get prediction. Status: 502".to_string()));
        }
        self.predictions
            .get(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Prediction {} not found", id)))
    }

    async fn fetch_file(&self, url: &str) -> AppResult<ByteStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let bytes = self
            .files
            .get(url)
            .ok_or_else(|| AppError::Upstream(format!("Failed to get file: {}", url)))?;
        // Two chunks so the response body is assembled from a real stream
        let (head, tail) = bytes.split_at(bytes.len() / 2);
        let chunks = vec![Ok(Bytes::copy_from_slice(head)), Ok(Bytes::copy_from_slice(tail))];
        Ok(stream::iter(chunks).boxed())
    }
}

pub fn app_with(source: Arc<FakeSource>) -> axum::Router {
    let state = AppState {
        predictions: PredictionService::new(source),
        limiter: RateLimiter::new(Arc::new(MemoryCounterStore::new())),
        api_key: ApiKey::new(ACCESS_KEY),
        settings: GatewaySettings {
            model: MODEL.to_string(),
            version: VERSION.to_string(),
            trigger_word: "TOK".to_string(),
            require_trigger_word: true,
            list_max_results: 500,
        },
    };
    create_app(Arc::new(state))
}
