//! Wire types for the Replicate predictions API.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Lifecycle state of a prediction. Values the gateway does not know are
/// kept verbatim in `Other` so they round-trip to clients unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Other(String),
}

impl PredictionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            PredictionStatus::Starting => "starting",
            PredictionStatus::Processing => "processing",
            PredictionStatus::Succeeded => "succeeded",
            PredictionStatus::Failed => "failed",
            PredictionStatus::Canceled => "canceled",
            PredictionStatus::Other(s) => s,
        }
    }
}

impl From<String> for PredictionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "starting" => PredictionStatus::Starting,
            "processing" => PredictionStatus::Processing,
            "succeeded" => PredictionStatus::Succeeded,
            "failed" => PredictionStatus::Failed,
            "canceled" => PredictionStatus::Canceled,
            _ => PredictionStatus::Other(s),
        }
    }
}

impl From<PredictionStatus> for String {
    fn from(status: PredictionStatus) -> Self {
        match status {
            PredictionStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PredictionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A prediction record as returned by the provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    pub status: PredictionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl Prediction {
    /// Output locations in provider order. A single string output counts as
    /// one file; anything that is not a string is skipped.
    pub fn output_urls(&self) -> Vec<String> {
        match &self.output {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// The `num_outputs` the prediction was created with, 0 when absent.
    pub fn requested_outputs(&self) -> u64 {
        self.input
            .get("num_outputs")
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }
}

/// One page of `GET /predictions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictionPage {
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub results: Vec<Prediction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelVersion {
    pub id: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Body of `POST /predictions`.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePrediction<'a> {
    pub version: &'a str,
    pub input: &'a Value,
}
