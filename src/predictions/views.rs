//! Client-facing projections of a provider `Prediction`.
//!
//! URLs are always derived from the prediction id: `/predictions/{id}` for the
//! record and `/predictions/{id}/files/{index}{.ext}` for each output.
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::replicate::{Prediction, PredictionStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatedView {
    pub id: String,
    pub url: String,
    pub status: PredictionStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListItemView {
    pub id: String,
    pub url: String,
    pub status: PredictionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub id: String,
    pub url: String,
    pub model: Option<String>,
    pub version: Option<String>,
    pub status: PredictionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub files: Vec<String>,
    pub num_outputs: u64,
}

pub fn prediction_url(id: &str) -> String {
    format!("/predictions/{}", id)
}

impl From<&Prediction> for CreatedView {
    fn from(p: &Prediction) -> Self {
        CreatedView { id: p.id.clone(), url: prediction_url(&p.id), status: p.status.clone() }
    }
}

impl From<&Prediction> for ListItemView {
    fn from(p: &Prediction) -> Self {
        ListItemView {
            id: p.id.clone(),
            url: prediction_url(&p.id),
            status: p.status.clone(),
            created_at: p.created_at,
            started_at: p.started_at,
            completed_at: p.completed_at,
        }
    }
}

impl From<&Prediction> for DetailView {
    fn from(p: &Prediction) -> Self {
        let url = prediction_url(&p.id);
        let files = p
            .output_urls()
            .iter()
            .enumerate()
            .map(|(idx, output)| match file_extension(output) {
                Some(ext) => format!("{}/files/{}.{}", url, idx, ext),
                None => format!("{}/files/{}", url, idx),
            })
            .collect();
        DetailView {
            id: p.id.clone(),
            url,
            model: p.model.clone(),
            version: p.version.clone(),
            status: p.status.clone(),
            created_at: p.created_at,
            completed_at: p.completed_at,
            files,
            num_outputs: p.requested_outputs(),
        }
    }
}

/// Extension of the last path segment of `location`, ignoring any query or
/// fragment. `None` when the segment has no dot or ends with one.
pub fn file_extension(location: &str) -> Option<&str> {
    let path = location.split(['?', '#']).next().unwrap_or(location);
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}

/// The `{index}.{ext}` segment of a file download path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName {
    pub index: usize,
    pub extension: Option<String>,
}

impl FileName {
    pub fn parse(segment: &str) -> Option<Self> {
        let (index, extension) = match segment.split_once('.') {
            Some((index, ext)) => (index, Some(ext.to_string())),
            None => (segment, None),
        };
        let index = index.parse().ok()?;
        Some(FileName { index, extension })
    }

    pub fn content_type(&self) -> &'static str {
        content_type_for(self.extension.as_deref())
    }
}

pub fn content_type_for(extension: Option<&str>) -> &'static str {
    match extension.map(str::to_ascii_lowercase).as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
