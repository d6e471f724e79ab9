//! Common error type and alias.
//!
//! Every fallible path in the gateway returns `AppResult<T>`; the HTTP layer
//! turns an `AppError` into a status code and a `{"detail": ...}` body via
//! `IntoResponse`.
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

pub const FORBIDDEN_DETAIL: &str = "Invalid Key, try again.";
pub const RATE_LIMITED_DETAIL: &str = "Too Many Requests, try again soon.";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Replicate error: {0}")]
    Upstream(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{}", FORBIDDEN_DETAIL)]
    Forbidden,

    #[error("{} (retry after {retry_after}s)", RATE_LIMITED_DETAIL)]
    RateLimited { retry_after: u64 },

    #[error("Counter store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(#[from] hyper::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // Trigger-word failures have always been reported as 500.
            AppError::Validation(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::HttpClient(_)
            | AppError::Upstream(_)
            | AppError::Store(_)
            | AppError::Config(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn detail(&self) -> String {
        match self {
            AppError::RateLimited { .. } => RATE_LIMITED_DETAIL.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (status, Json(json!({ "detail": self.detail() }))).into_response();
        if let AppError::RateLimited { retry_after } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}
