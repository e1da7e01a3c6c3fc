//! Prose summaries of trained models.
//!
//! Facts come from persisted metadata only; the [`Summarizer`] may rephrase
//! them through a text generator and falls back to templates otherwise.

use adaptml_processing::ai::{ModelFacts, ProjectInsights, Summarizer};
use serde::{Deserialize, Serialize};

use crate::types::ModelMetadata;

/// Summary and advice for one stored model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReport {
    pub model_id: String,
    pub summary: String,
    pub insights: ProjectInsights,
}

/// Summary facts for a model. `dataset_rows` counts training and test rows.
pub fn model_facts(metadata: &ModelMetadata) -> ModelFacts {
    ModelFacts {
        algorithm: metadata.algorithm.as_str().to_string(),
        problem_type: metadata.problem_type.as_str().to_string(),
        target_column: metadata.target_column.clone(),
        feature_count: metadata.feature_names.len(),
        dataset_rows: metadata.training_rows + metadata.test_rows,
        completeness: metadata.data_completeness,
        metrics: metadata.evaluation_metrics.headline(metadata.problem_type),
    }
}

pub fn model_report(summarizer: &Summarizer, metadata: &ModelMetadata) -> ModelReport {
    let facts = model_facts(metadata);
    ModelReport {
        model_id: metadata.model_id.clone(),
        summary: summarizer.model_summary(&facts),
        insights: summarizer.insights(&facts),
    }
}
