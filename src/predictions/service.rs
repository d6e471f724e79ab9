use std::sync::Arc;

use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::predictions::views::{CreatedView, DetailView, FileName, ListItemView};
use crate::predictions::{ByteStream, PredictionSource};
use crate::replicate::{Prediction, PredictionStatus};

/// Outputs requested for every generation.
pub const NUM_OUTPUTS: u32 = 2;
pub const OUTPUT_FORMAT: &str = "jpg";

/// Shared, process-wide handle on the provider plus the gateway's rules.
#[derive(Clone)]
pub struct PredictionService {
    source: Arc<dyn PredictionSource>,
}

impl PredictionService {
    pub fn new(source: Arc<dyn PredictionSource>) -> Self {
        PredictionService { source }
    }

    /// Validate the prompt and submit a generation.
    pub async fn create_prediction(
        &self,
        prompt: &str,
        require_trigger_word: bool,
        trigger_word: &str,
    ) -> AppResult<CreatedView> {
        if require_trigger_word && !prompt.contains(trigger_word) {
            return Err(AppError::Validation(format!("{} was not included", trigger_word)));
        }
        let input = json!({
            "prompt": prompt,
            "num_outputs": NUM_OUTPUTS,
            "output_format": OUTPUT_FORMAT,
        });
        let prediction = self.source.create(&input).await?;
        Ok(CreatedView::from(&prediction))
    }

    /// Walk the provider listing and keep predictions of `model`/`version`.
    ///
    /// Paging stops once more than `max_results` records were collected, so
    /// the scan can overshoot by up to one page.
    pub async fn list_predictions(
        &self,
        model: &str,
        version: &str,
        status: Option<PredictionStatus>,
        max_results: usize,
    ) -> AppResult<Vec<ListItemView>> {
        let mut results: Vec<Prediction> = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        loop {
            let page = self.source.list_page(cursor.as_deref()).await?;
            pages += 1;
            results.extend(page.results);
            if results.len() > max_results {
                break;
            }
            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        tracing::debug!("Scanned {} predictions over {} pages", results.len(), pages);

        Ok(results
            .iter()
            .filter(|p| p.model.as_deref() == Some(model) && p.version.as_deref() == Some(version))
            .filter(|p| status.as_ref().map_or(true, |s| &p.status == s))
            .map(ListItemView::from)
            .collect())
    }

    pub async fn get_prediction_detail(&self, id: &str) -> AppResult<DetailView> {
        let prediction = self.source.get(id).await?;
        Ok(DetailView::from(&prediction))
    }

    pub async fn fetch_output_file(&self, url: &str) -> AppResult<ByteStream> {
        self.source.fetch_file(url).await
    }

    /// Resolve `file` against the outputs of prediction `id` and download it.
    pub async fn fetch_prediction_file(
        &self,
        id: &str,
        file: &FileName,
    ) -> AppResult<ByteStream> {
        let prediction = self.source.get(id).await?;
        let outputs = prediction.output_urls();
        let url = outputs
            .get(file.index)
            .ok_or_else(|| AppError::NotFound(format!("File {} not found", file.index)))?;
        self.fetch_output_file(url).await
    }
}
