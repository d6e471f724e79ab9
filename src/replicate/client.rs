//! Thin HTTP client for the Replicate REST API.
//!
//! - `connect` resolves the configured model version once.
//! - `create` posts to `/predictions`.
//! - `list_page` fetches `/predictions` or a `next` cursor URL.
//! - `get` fetches `/predictions/{id}`.
//! - `fetch_file` streams the body of an output URL.
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{AppError, AppResult};
use crate::predictions::{ByteStream, PredictionSource};
use crate::replicate::types::{CreatePrediction, ModelVersion, Prediction, PredictionPage};

const USER_AGENT: &str = concat!("replicate-gateway/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct ReplicateClient {
    client: Client,
    base_url: String,
    api_token: String,
    version: ModelVersion,
}

impl ReplicateClient {
    /// Build the client and resolve `model`/`version` against the provider.
    pub async fn connect(
        base_url: String,
        api_token: String,
        model: &str,
        version: &str,
    ) -> AppResult<Self> {
        let base = base_url.trim_end_matches('/').to_string();
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(AppError::HttpClient)?;
        let url = format!("{}/models/{}/versions/{}", base, model, version);
        tracing::info!("Resolving model version at URL: {}", url);
        let request = client.get(&url).bearer_auth(&api_token);
        let resolved: ModelVersion = send_json(request, "resolve model version").await?;
        tracing::info!("Resolved {}:{}", model, resolved.id);
        Ok(ReplicateClient { client, base_url: base, api_token, version: resolved })
    }

    pub fn version(&self) -> &ModelVersion {
        &self.version
    }

    fn get_url(&self, url: &str) -> RequestBuilder {
        self.client.get(url).bearer_auth(&self.api_token)
    }
}

#[async_trait]
impl PredictionSource for ReplicateClient {
    async fn create(&self, input: &Value) -> AppResult<Prediction> {
        let url = format!("{}/predictions", self.base_url);
        tracing::info!("Creating prediction at URL: {}", url);
        tracing::debug!("Prediction input: {:?}", input);
        let body = CreatePrediction { version: &self.version.id, input };
        let request = self.client.post(&url).bearer_auth(&self.api_token).json(&body);
        let prediction: Prediction = send_json(request, "create prediction").await?;
        tracing::info!("Created prediction {} ({})", prediction.id, prediction.status);
        Ok(prediction)
    }

    async fn list_page(&self, cursor: Option<&str>) -> AppResult<PredictionPage> {
        let url = match cursor {
            Some(next) => next.to_string(),
            None => format!("{}/predictions", self.base_url),
        };
        tracing::debug!("Listing predictions at URL: {}", url);
        send_json(self.get_url(&url), "list predictions").await
    }

    async fn get(&self, id: &str) -> AppResult<Prediction> {
        let url = format!("{}/predictions/{}", self.base_url, id);
        let response = self.get_url(&url).send().await.map_err(AppError::HttpClient)?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("Prediction {} not found", id)));
        }
        decode(response, "get prediction").await
    }

    async fn fetch_file(&self, url: &str) -> AppResult<ByteStream> {
        let response = self.client.get(url).send().await.map_err(AppError::HttpClient)?;
        if response.status().is_success() {
            Ok(response.bytes_stream().map_err(AppError::HttpClient).boxed())
        } else {
            Err(AppError::Upstream(format!("Failed to get file: {:?}", response.status())))
        }
    }
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder, action: &str) -> AppResult<T> {
    let response = request.send().await.map_err(AppError::HttpClient)?;
    decode(response, action).await
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response, action: &str) -> AppResult<T> {
    if response.status().is_success() {
        response.json().await.map_err(AppError::HttpClient)
    } else {
        let status = response.status();
        let error_body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error body".to_string());
        let error_message =
            format!("Failed to {}. Status: {}, Body: {}", action, status, error_body);
        tracing::error!("{}", error_message);
        Err(AppError::Upstream(error_message))
    }
}
