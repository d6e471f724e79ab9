//! Axum request handlers for the HTTP API.
use std::sync::Arc;

use axum::body::StreamBody;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::routes::AppState;
use crate::error::{AppError, AppResult};
use crate::predictions::views::{CreatedView, DetailView, FileName, ListItemView};
use crate::replicate::PredictionStatus;

#[derive(Debug, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub status: Option<PredictionStatus>,
}

pub async fn root() -> Json<Value> {
    Json(json!({"Hello": "World"}))
}

pub async fn generate(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GenerationRequest>,
) -> AppResult<Json<CreatedView>> {
    let settings = &state.settings;
    state
        .predictions
        .create_prediction(&payload.prompt, settings.require_trigger_word, &settings.trigger_word)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to create prediction: {}", e);
            e
        })
}

pub async fn processing(
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<Vec<ListItemView>>> {
    list(&state, Some(PredictionStatus::Processing)).await
}

pub async fn list_predictions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ListItemView>>> {
    list(&state, query.status).await
}

async fn list(
    state: &AppState,
    status: Option<PredictionStatus>,
) -> AppResult<Json<Vec<ListItemView>>> {
    let settings = &state.settings;
    state
        .predictions
        .list_predictions(&settings.model, &settings.version, status, settings.list_max_results)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::error!("Failed to list predictions: {}", e);
            e
        })
}

pub async fn prediction_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> AppResult<Json<DetailView>> {
    state.predictions.get_prediction_detail(&id).await.map(Json).map_err(|e| {
        if !matches!(e, AppError::NotFound(_)) {
            tracing::error!("Failed to get prediction {}: {}", id, e);
        }
        e
    })
}

pub async fn prediction_file(
    State(state): State<Arc<AppState>>,
    Path((id, file)): Path<(String, String)>,
) -> AppResult<impl IntoResponse> {
    let file = FileName::parse(&file)
        .ok_or_else(|| AppError::NotFound(format!("File {} not found", file)))?;
    let body = state.predictions.fetch_prediction_file(&id, &file).await.map_err(|e| {
        if !matches!(e, AppError::NotFound(_)) {
            tracing::error!("Failed to fetch file {} of {}: {}", file.index, id, e);
        }
        e
    })?;
    Ok(([(header::CONTENT_TYPE, file.content_type())], StreamBody::new(body)))
}
