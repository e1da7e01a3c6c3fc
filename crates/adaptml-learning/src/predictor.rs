//! Prediction serving from persisted artifacts.

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info};

use crate::artifact::ArtifactStore;
use crate::error::Result;
use crate::types::{ModelMetadata, PredictionBatch};

/// Loads artifacts on demand and scores rows against them.
///
/// Nothing is cached: every call reads its artifact from the store.
#[derive(Debug, Clone)]
pub struct Predictor<S: ArtifactStore> {
    store: S,
}

impl<S: ArtifactStore> Predictor<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Score `rows` (JSON objects keyed by feature name) with the model
    /// stored under `model_id`.
    ///
    /// Rows must supply every feature the model was trained on; extra
    /// fields are dropped and key order is irrelevant.
    ///
    /// # Errors
    ///
    /// - [`ModelNotFound`](crate::LearningError::ModelNotFound) /
    ///   [`InconsistentArtifact`](crate::LearningError::InconsistentArtifact)
    /// - [`MissingFeatures`](crate::LearningError::MissingFeatures): exactly
    ///   the absent features, in training order
    /// - [`InvalidData`](crate::LearningError::InvalidData): empty batch or
    ///   malformed rows
    /// - [`InferenceError`](crate::LearningError::InferenceError): values the
    ///   fitted preprocessing cannot read
    pub fn predict(&self, model_id: &str, rows: &[Value]) -> Result<PredictionBatch> {
        let artifact = self.store.load(model_id)?;
        debug!(model_id, rows = rows.len(), "scoring batch");
        let predictions = artifact.pipeline.predict_rows(rows)?;
        info!(model_id, predictions = predictions.len(), "prediction complete");
        Ok(PredictionBatch {
            model_id: artifact.model_id,
            predictions,
            predicted_at: Utc::now(),
        })
    }

    /// Metadata of a stored model, without its fitted pipeline.
    pub fn model_summary(&self, model_id: &str) -> Result<ModelMetadata> {
        self.store.metadata(model_id)
    }
}
