//! Fitted pipeline for inference and serialization.
//!
//! A [`TrainedModel`] bundles the fitted preprocessor with the fitted
//! estimator, so raw feature rows can be scored without re-deriving the
//! preprocessing plan:
//!
//! - **Batch prediction** from a DataFrame via [`predict_batch()`](TrainedModel::predict_batch)
//! - **Row prediction** from JSON objects via [`predict_rows()`](TrainedModel::predict_rows)
//!   and [`predict()`](TrainedModel::predict)
//! - **Serialization** via [`to_bytes()`](TrainedModel::to_bytes) and
//!   [`from_bytes()`](TrainedModel::from_bytes)
//!
//! # Lifecycle
//!
//! Created by [`Trainer::train()`](crate::Trainer::train), persisted inside a
//! [`ModelArtifact`](crate::ModelArtifact) and never mutated afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use adaptml_learning::{ArtifactStore, FileArtifactStore};
//!
//! let artifact = FileArtifactStore::new("models").load("model_session1_20250101_120000")?;
//! let result = artifact.pipeline.predict(&serde_json::json!({"age": 41, "city": "Paris"}))?;
//! println!("{} ({:.2})", result.prediction, result.confidence);
//! ```

use std::collections::BTreeMap;

use adaptml_processing::{FittedPreprocessor, ProblemType};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::Algorithm;
use crate::error::{LearningError, Result};
use crate::estimators::{Estimator, Model, argmax, to_array};
use crate::types::PredictionResult;

/// Confidence for classifiers without probability output.
const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Regression confidence when the batch predictions do not spread.
const FLAT_BATCH_CONFIDENCE: f64 = 0.8;

/// A fitted preprocessing plan and estimator, ready for inference.
///
/// Cheap to share: every method takes `&self`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    algorithm: Algorithm,
    problem_type: ProblemType,
    target_column: String,
    /// Class label per class index, classification only.
    class_labels: Option<Vec<String>>,
    preprocessor: FittedPreprocessor,
    estimator: Model,
}

impl TrainedModel {
    pub(crate) fn new(
        algorithm: Algorithm,
        problem_type: ProblemType,
        target_column: String,
        class_labels: Option<Vec<String>>,
        preprocessor: FittedPreprocessor,
        estimator: Model,
    ) -> Self {
        Self {
            algorithm,
            problem_type,
            target_column,
            class_labels,
            preprocessor,
            estimator,
        }
    }

    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    #[must_use]
    pub fn problem_type(&self) -> ProblemType {
        self.problem_type
    }

    #[must_use]
    pub fn target_column(&self) -> &str {
        &self.target_column
    }

    /// Original feature names in training order. Every prediction row must
    /// supply all of them.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        self.preprocessor.input_features()
    }

    /// Columns produced by the preprocessor.
    #[must_use]
    pub fn feature_names_out(&self) -> &[String] {
        self.preprocessor.feature_names_out()
    }

    #[must_use]
    pub fn class_labels(&self) -> Option<&[String]> {
        self.class_labels.as_deref()
    }

    #[must_use]
    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    #[must_use]
    pub fn estimator(&self) -> &Model {
        &self.estimator
    }

    /// Importance per output feature, highest first. Empty when the
    /// estimator exposes no importances or coefficients.
    #[must_use]
    pub fn feature_importance(&self) -> Vec<(String, f64)> {
        let Some(scores) = self.estimator.importance() else {
            return Vec::new();
        };
        let mut ranked: Vec<(String, f64)> = self
            .feature_names_out()
            .iter()
            .cloned()
            .zip(scores)
            .filter(|(_, score)| score.is_finite())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    /// Features in training order that are not among `columns`.
    pub fn missing_features<'a>(&self, columns: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        let present: Vec<&str> = columns.into_iter().collect();
        self.feature_names()
            .iter()
            .filter(|f| !present.contains(&f.as_str()))
            .cloned()
            .collect()
    }

    /// Score one JSON object.
    pub fn predict(&self, row: &Value) -> Result<PredictionResult> {
        let mut results = self.predict_rows(std::slice::from_ref(row))?;
        results
            .pop()
            .ok_or_else(|| LearningError::InferenceError("no prediction produced".to_string()))
    }

    /// Score a batch of JSON objects.
    ///
    /// Every object must carry all [`feature_names()`](Self::feature_names);
    /// extra fields are ignored and key order does not matter.
    ///
    /// # Errors
    ///
    /// - [`InvalidData`](LearningError::InvalidData): empty batch, a row
    ///   that is not an object, or a non-scalar value
    /// - [`MissingFeatures`](LearningError::MissingFeatures): the union of
    ///   absent features across the batch, in training order
    /// - [`InferenceError`](LearningError::InferenceError): a value cannot
    ///   be read as the type the feature was trained with
    pub fn predict_rows(&self, rows: &[Value]) -> Result<Vec<PredictionResult>> {
        if rows.is_empty() {
            return Err(LearningError::InvalidData(
                "prediction batch is empty".to_string(),
            ));
        }
        let objects = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.as_object().ok_or_else(|| {
                    LearningError::InvalidData(format!("row {i} is not a JSON object"))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let missing: Vec<String> = self
            .feature_names()
            .iter()
            .filter(|f| objects.iter().any(|o| !o.contains_key(f.as_str())))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(LearningError::MissingFeatures { features: missing });
        }

        let df = rows_to_frame(self.feature_names(), &objects)?;
        self.predict_batch(&df)
    }

    /// Score every row of `df`. Columns outside the training features are
    /// ignored.
    pub fn predict_batch(&self, df: &DataFrame) -> Result<Vec<PredictionResult>> {
        if df.height() == 0 {
            return Err(LearningError::InvalidData(
                "prediction batch is empty".to_string(),
            ));
        }
        let missing = self.missing_features(df.get_column_names().into_iter().map(|c| c.as_str()));
        if !missing.is_empty() {
            return Err(LearningError::MissingFeatures { features: missing });
        }

        let matrix = self
            .preprocessor
            .transform(df)
            .map_err(|e| LearningError::InferenceError(e.to_string()))?;
        let x = to_array(&matrix);
        let predictions = self.estimator.predict(&x)?;

        match self.problem_type {
            ProblemType::Classification => {
                let probabilities = if self.estimator.supports_probabilities() {
                    self.estimator.probabilities(&x)?
                } else {
                    None
                };
                Ok(self.classification_results(&predictions.to_vec(), probabilities.as_ref()))
            }
            ProblemType::Regression => Ok(regression_results(&predictions.to_vec())),
        }
    }

    fn label(&self, class: usize) -> String {
        self.class_labels
            .as_ref()
            .and_then(|labels| labels.get(class).cloned())
            .unwrap_or_else(|| class.to_string())
    }

    fn classification_results(
        &self,
        predictions: &[f64],
        probabilities: Option<&Array2<f64>>,
    ) -> Vec<PredictionResult> {
        predictions
            .iter()
            .enumerate()
            .map(|(i, &class)| match probabilities {
                Some(proba) => {
                    let row: Vec<f64> = proba.row(i).to_vec();
                    let best = argmax(&row);
                    let by_label: BTreeMap<String, f64> = row
                        .iter()
                        .enumerate()
                        .map(|(k, p)| (self.label(k), if p.is_finite() { *p } else { 0.0 }))
                        .collect();
                    PredictionResult {
                        prediction: label_value(&self.label(best)),
                        confidence: row
                            .get(best)
                            .copied()
                            .filter(|p| p.is_finite())
                            .unwrap_or(NEUTRAL_CONFIDENCE),
                        probabilities: Some(by_label),
                    }
                }
                None => PredictionResult {
                    prediction: label_value(&self.label(class as usize)),
                    confidence: NEUTRAL_CONFIDENCE,
                    probabilities: None,
                },
            })
            .collect()
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Batch-relative confidence: `1 / (1 + std)` of the batch's own
/// predictions, clamped to `[0.1, 0.9]`.
fn regression_results(predictions: &[f64]) -> Vec<PredictionResult> {
    let n = predictions.len() as f64;
    let mean = predictions.iter().sum::<f64>() / n;
    let std = (predictions.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / n).sqrt();
    let confidence = if std > 0.0 && std.is_finite() {
        (1.0 / (1.0 + std)).clamp(0.1, 0.9)
    } else {
        FLAT_BATCH_CONFIDENCE
    };

    predictions
        .iter()
        .map(|&p| PredictionResult {
            prediction: serde_json::Number::from_f64(p).map_or(Value::Null, Value::Number),
            confidence,
            probabilities: None,
        })
        .collect()
}

/// Numeric labels come back as JSON numbers, everything else as strings.
fn label_value(label: &str) -> Value {
    if let Ok(int) = label.parse::<i64>() {
        return Value::from(int);
    }
    label
        .parse::<f64>()
        .ok()
        .and_then(serde_json::Number::from_f64)
        .map_or_else(|| Value::String(label.to_string()), Value::Number)
}

/// One column per feature, in `features` order. A column whose values are
/// all integers (or all numbers, or all booleans) keeps that type; anything
/// mixed is read as text.
fn rows_to_frame(features: &[String], rows: &[&serde_json::Map<String, Value>]) -> Result<DataFrame> {
    let mut columns = Vec::with_capacity(features.len());
    for feature in features {
        let values: Vec<&Value> = rows.iter().map(|r| r.get(feature).unwrap_or(&Value::Null)).collect();
        if let Some(bad) = values.iter().find(|v| v.is_array() || v.is_object()) {
            return Err(LearningError::InvalidData(format!(
                "feature '{feature}' has a non-scalar value: {bad}"
            )));
        }
        columns.push(json_column(feature, &values).into_column());
    }
    Ok(DataFrame::new(columns)?)
}

fn json_column(name: &str, values: &[&Value]) -> Series {
    let present: Vec<&&Value> = values.iter().filter(|v| !v.is_null()).collect();
    let name = PlSmallStr::from(name);

    if !present.is_empty() && present.iter().all(|v| v.is_i64()) {
        let ints: Vec<Option<i64>> = values.iter().map(|v| v.as_i64()).collect();
        return Series::new(name, ints);
    }
    if !present.is_empty() && present.iter().all(|v| v.is_number()) {
        let floats: Vec<Option<f64>> = values.iter().map(|v| v.as_f64()).collect();
        return Series::new(name, floats);
    }
    if !present.is_empty() && present.iter().all(|v| v.is_boolean()) {
        let bools: Vec<Option<bool>> = values.iter().map(|v| v.as_bool()).collect();
        return Series::new(name, bools);
    }
    let text: Vec<Option<String>> = values
        .iter()
        .map(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect();
    Series::new(name, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_value_prefers_numbers() {
        assert_eq!(label_value("1"), json!(1));
        assert_eq!(label_value("2.5"), json!(2.5));
        assert_eq!(label_value("yes"), json!("yes"));
        assert_eq!(label_value("nan"), json!("nan"));
    }

    #[test]
    fn test_regression_confidence_from_batch_spread() {
        let single = regression_results(&[3.0]);
        assert_eq!(single[0].confidence, 0.8);

        // std 1.0 -> 0.5
        let spread = regression_results(&[1.0, 3.0]);
        assert!((spread[0].confidence - 0.5).abs() < 1e-12);
        assert_eq!(spread[1].prediction, json!(3.0));

        let wide = regression_results(&[0.0, 1000.0]);
        assert_eq!(wide[0].confidence, 0.1);
    }

    #[test]
    fn test_rows_to_frame_column_types() {
        let a = json!({"n": 1, "x": 1.5, "c": "red", "b": true, "mixed": 3});
        let b = json!({"n": 2, "x": 2, "c": null, "b": false, "mixed": "three"});
        let rows = vec![a.as_object().unwrap(), b.as_object().unwrap()];
        let features: Vec<String> = ["n", "x", "c", "b", "mixed"].iter().map(|s| s.to_string()).collect();
        let df = rows_to_frame(&features, &rows).unwrap();

        assert_eq!(df.column("n").unwrap().dtype(), &DataType::Int64);
        assert_eq!(df.column("x").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("c").unwrap().dtype(), &DataType::String);
        assert_eq!(df.column("c").unwrap().null_count(), 1);
        assert_eq!(df.column("b").unwrap().dtype(), &DataType::Boolean);
        assert_eq!(df.column("mixed").unwrap().dtype(), &DataType::String);
    }

    #[test]
    fn test_rows_to_frame_rejects_nested_values() {
        let row = json!({"a": [1, 2]});
        let err = rows_to_frame(&["a".to_string()], &[row.as_object().unwrap()]).unwrap_err();
        assert!(matches!(err, LearningError::InvalidData(_)));
    }
}
