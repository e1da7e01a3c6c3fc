//! Common types used throughout the adaptml-learning crate.
//!
//! This module defines result types, metrics, and other data structures
//! returned by training and prediction.
//!
//! # Overview
//!
//! - [`TrainingResult`]: Complete result from [`Trainer::train()`](crate::Trainer::train)
//! - [`EvaluationMetrics`]: Held-out metrics (classification or regression)
//! - [`ModelMetadata`]: Everything persisted next to a fitted pipeline
//! - [`PredictionResult`]: One scored row from [`Predictor::predict()`](crate::Predictor::predict)
//!
//! Every float in these types is finite; values that could not be computed
//! are `None` and serialize as `null`.

use std::collections::BTreeMap;

use adaptml_processing::{PlanInfo, ProblemType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{Algorithm, Hyperparameters};

/// Metrics from evaluating a model on the held-out partition.
///
/// Only the fields for the model's problem type are populated.
///
/// # Classification Metrics
///
/// - `accuracy`: fraction of correct predictions
/// - `precision`, `recall`, `f1_score`: weighted by class support; a class
///   with no predicted (or no true) rows contributes 0 instead of failing
/// - `confusion_matrix`: rows are true classes, columns predicted classes,
///   only for binary targets
///
/// # Regression Metrics
///
/// - `rmse`, `mae`: in target units, lower is better
/// - `r2_score`: coefficient of determination, 1.0 is perfect
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub precision: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recall: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub f1_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confusion_matrix: Option<Vec<Vec<usize>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rmse: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mae: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r2_score: Option<f64>,
}

impl EvaluationMetrics {
    /// Accuracy for classification, R² for regression.
    pub fn primary(&self, problem_type: ProblemType) -> Option<f64> {
        match problem_type {
            ProblemType::Classification => self.accuracy,
            ProblemType::Regression => self.r2_score,
        }
    }

    /// Headline metrics as prose, e.g. `Accuracy: 91.0%, F1-Score: 0.905`.
    pub fn headline(&self, problem_type: ProblemType) -> Option<String> {
        match problem_type {
            ProblemType::Classification => {
                let accuracy = self.accuracy?;
                let mut text = format!("Accuracy: {:.1}%", accuracy * 100.0);
                if let Some(f1) = self.f1_score {
                    text.push_str(&format!(", F1-Score: {f1:.3}"));
                }
                Some(text)
            }
            ProblemType::Regression => {
                let r2 = self.r2_score?;
                let mut text = format!("R² Score: {r2:.3}");
                if let Some(rmse) = self.rmse {
                    text.push_str(&format!(", RMSE: {rmse:.3}"));
                }
                Some(text)
            }
        }
    }
}

/// Sizes and settings of one training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingInfo {
    /// Columns after preprocessing.
    pub features_count: usize,
    pub target_column: String,
    pub problem_type: ProblemType,
    pub algorithm: Algorithm,
    pub test_size: f64,
    pub training_samples: usize,
    pub test_samples: usize,
}

/// Result of [`Trainer::train()`](crate::Trainer::train).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResult {
    pub model_id: String,
    pub session_id: String,
    pub problem_type: ProblemType,
    pub algorithm: Algorithm,
    pub training_info: TrainingInfo,
    pub evaluation_metrics: EvaluationMetrics,
    /// Top features by importance, descending. Empty when the estimator
    /// exposes neither importances nor coefficients.
    pub feature_importance: Vec<(String, f64)>,
    pub hyperparameters: Hyperparameters,
    pub preprocessing_info: PlanInfo,
    pub trained_at: DateTime<Utc>,
}

/// Everything persisted beside the fitted pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub session_id: String,
    pub algorithm: Algorithm,
    pub problem_type: ProblemType,
    pub target_column: String,
    /// Original (pre-transform) feature names in training order. Prediction
    /// rows must supply every one of them.
    pub feature_names: Vec<String>,
    pub feature_names_out: Vec<String>,
    /// Class labels in index order, classification only.
    pub class_labels: Option<Vec<String>>,
    pub evaluation_metrics: EvaluationMetrics,
    pub feature_importance: Vec<(String, f64)>,
    pub hyperparameters: Hyperparameters,
    pub training_rows: usize,
    pub test_rows: usize,
    /// Share of non-missing cells in the training dataset, 0.0 - 1.0.
    pub data_completeness: f64,
    pub trained_at: DateTime<Utc>,
    pub preprocessing_info: PlanInfo,
}

/// A scored input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Class label (a number when the label is numeric) or regression value.
    pub prediction: serde_json::Value,

    /// Confidence in `[0, 1]`.
    ///
    /// Classification: the largest class probability, or 0.5 when the
    /// estimator has no probability output. Regression: a heuristic from the
    /// spread of the batch's own predictions, in `[0.1, 0.9]`, 0.8 when the
    /// spread is zero.
    pub confidence: f64,

    /// Probability per class label, classification only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probabilities: Option<BTreeMap<String, f64>>,
}

/// Predictions for one request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionBatch {
    pub model_id: String,
    pub predictions: Vec<PredictionResult>,
    pub predicted_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headline_per_problem_type() {
        let metrics = EvaluationMetrics {
            accuracy: Some(0.91),
            f1_score: Some(0.905),
            ..Default::default()
        };
        assert_eq!(
            metrics.headline(ProblemType::Classification).unwrap(),
            "Accuracy: 91.0%, F1-Score: 0.905"
        );
        assert_eq!(metrics.headline(ProblemType::Regression), None);
    }

    #[test]
    fn test_unset_metrics_are_omitted() {
        let metrics = EvaluationMetrics {
            rmse: Some(1.5),
            ..Default::default()
        };
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json, serde_json::json!({"rmse": 1.5}));
    }
}
