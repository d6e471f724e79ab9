//! Static API-key gate applied in front of every route.
use std::sync::Arc;

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::{AppError, AppResult};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        ApiKey(key.into())
    }

    pub fn matches(&self, presented: Option<&str>) -> bool {
        presented == Some(&*self.0)
    }
}

pub async fn require_api_key<B>(
    State(key): State<ApiKey>,
    req: Request<B>,
    next: Next<B>,
) -> AppResult<Response> {
    let presented = req.headers().get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    if !key.matches(presented) {
        tracing::debug!(path = %req.uri().path(), "rejected request with invalid API key");
        return Err(AppError::Forbidden);
    }
    Ok(next.run(req).await)
}
