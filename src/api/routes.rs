//! Router setup and shared state for the HTTP API.
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::auth::{require_api_key, ApiKey};
use crate::api::handlers;
use crate::api::limits::{
    enforce_rate_limit, RoutePolicy, GENERATE_WINDOWS, LISTING_WINDOWS, ROOT_WINDOWS,
};
use crate::predictions::PredictionService;
use crate::ratelimit::{RateLimiter, Window};

/// Settings the handlers need on every request.
#[derive(Clone, Debug)]
pub struct GatewaySettings {
    pub model: String,
    pub version: String,
    pub trigger_word: String,
    pub require_trigger_word: bool,
    pub list_max_results: usize,
}

pub struct AppState {
    pub predictions: PredictionService,
    pub limiter: RateLimiter,
    pub api_key: ApiKey,
    pub settings: GatewaySettings,
}

pub fn create_app(state: Arc<AppState>) -> Router {
    let limiter = state.limiter.clone();
    let limited = |windows: &'static [Window]| {
        from_fn_with_state(RoutePolicy::new(limiter.clone(), windows), enforce_rate_limit)
    };

    Router::new()
        .route("/", get(handlers::root).route_layer(limited(ROOT_WINDOWS)))
        .route("/generate", post(handlers::generate).route_layer(limited(GENERATE_WINDOWS)))
        .route("/processing", get(handlers::processing).route_layer(limited(LISTING_WINDOWS)))
        .route(
            "/predictions",
            get(handlers::list_predictions).route_layer(limited(LISTING_WINDOWS)),
        )
        .route(
            "/predictions/:id",
            get(handlers::prediction_detail).route_layer(limited(LISTING_WINDOWS)),
        )
        .route(
            "/predictions/:id/files/:file",
            get(handlers::prediction_file).route_layer(limited(LISTING_WINDOWS)),
        )
        .layer(from_fn_with_state(state.api_key.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
