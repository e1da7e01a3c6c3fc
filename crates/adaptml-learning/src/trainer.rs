//! Training and evaluation.
//!
//! [`Trainer::train()`] runs one training request end to end:
//!
//! 1. **Preparing** - resolve the problem type, encode the target, split the
//!    rows (stratified for classification) and fit the preprocessing plan
//!    on the training partition only
//! 2. **Algorithm selection** - when no algorithm was requested, take the
//!    recommender's top candidate
//! 3. **Training** - fit the estimator on the transformed training rows
//! 4. **Evaluation** - held-out metrics and feature importance
//! 5. **Saving** - persist the pipeline and metadata as one artifact
//!
//! Nothing is persisted unless every earlier step succeeded.
//!
//! # Example
//!
//! ```rust,ignore
//! use adaptml_learning::{FileArtifactStore, Trainer, TrainingConfig};
//!
//! let trainer = Trainer::builder().store(FileArtifactStore::new("models")).build()?;
//! let config = TrainingConfig::builder()
//!     .target_column("churned")
//!     .algorithm("random_forest")
//!     .session_id("a1b2c3d4e5")
//!     .build()?;
//!
//! let result = trainer.train(&df, &config)?;
//! println!("{} -> {:?}", result.model_id, result.evaluation_metrics.accuracy);
//! ```

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use adaptml_processing::{
    AdaptivePreprocessor, DataProfiler, DatasetCharacterizer, FittedPreprocessor, PlanInfo, ProblemType,
};
use adaptml_processing::utils::{strict_numeric_values, string_values};
use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactStore, ModelArtifact};
use crate::config::{Algorithm, TrainingConfig};
use crate::error::{LearningError, Result};
use crate::estimators::{Estimator, Model, Task, build_model, to_array};
use crate::metrics::{classification_metrics, regression_metrics};
use crate::model::TrainedModel;
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use crate::recommend::ModelRecommender;
use crate::split::{random_split, stratified_split};
use crate::types::{EvaluationMetrics, ModelMetadata, TrainingInfo, TrainingResult};

/// Features reported in a training result.
const TOP_FEATURES: usize = 10;

/// Suffixes tried when a model id is already taken.
const MAX_ID_ATTEMPTS: usize = 100;

/// A dataset split, encoded and preprocessed for one training request.
pub(crate) struct Prepared {
    pub(crate) problem_type: ProblemType,
    pub(crate) task: Task,
    pub(crate) class_labels: Option<Vec<String>>,
    pub(crate) preprocessor: FittedPreprocessor,
    pub(crate) plan_info: PlanInfo,
    /// Training partition before preprocessing; cross-validation refits
    /// the plan on each fold from these rows.
    pub(crate) train_df: DataFrame,
    pub(crate) x_train: Array2<f64>,
    pub(crate) y_train: Array1<f64>,
    pub(crate) x_test: Array2<f64>,
    pub(crate) y_test: Array1<f64>,
    /// Share of non-missing cells in the whole dataset.
    pub(crate) completeness: f64,
}

/// Encoded target for the rows that have one.
#[derive(Debug)]
struct EncodedTarget {
    /// Row positions in the original frame.
    rows: Vec<usize>,
    values: Vec<f64>,
    class_labels: Option<Vec<String>>,
}

/// Labels sort numerically when every label is a number, else as text.
fn sort_labels(labels: BTreeSet<String>) -> Vec<String> {
    let numeric: Option<Vec<(f64, String)>> = labels
        .iter()
        .map(|l| l.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| (v, l.clone())))
        .collect();
    match numeric {
        Some(mut pairs) => {
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            pairs.into_iter().map(|(_, l)| l).collect()
        }
        None => labels.into_iter().collect(),
    }
}

fn encode_target(series: &Series, target: &str, problem_type: ProblemType) -> Result<EncodedTarget> {
    let encoded = match problem_type {
        ProblemType::Classification => {
            let mut rows = Vec::new();
            let mut raw = Vec::new();
            for (i, value) in string_values(series)?.into_iter().enumerate() {
                if let Some(text) = value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()) {
                    rows.push(i);
                    raw.push(text);
                }
            }
            let labels = sort_labels(raw.iter().cloned().collect());
            if !rows.is_empty() && labels.len() < 2 {
                return Err(LearningError::InvalidData(format!(
                    "target column '{target}' has a single class; classification needs at least two"
                )));
            }
            let index: HashMap<&str, usize> = labels.iter().enumerate().map(|(i, l)| (l.as_str(), i)).collect();
            let values = raw.iter().map(|l| index.get(l.as_str()).copied().unwrap_or(0) as f64).collect();
            EncodedTarget {
                rows,
                values,
                class_labels: Some(labels),
            }
        }
        ProblemType::Regression => {
            let numbers = strict_numeric_values(series)?.map_err(|bad| {
                LearningError::InvalidData(format!(
                    "target column '{target}' has non-numeric value '{bad}'; regression needs numbers"
                ))
            })?;
            let (rows, values) = numbers
                .into_iter()
                .enumerate()
                .filter_map(|(i, v)| v.map(|v| (i, v)))
                .unzip();
            EncodedTarget {
                rows,
                values,
                class_labels: None,
            }
        }
    };

    if encoded.rows.is_empty() {
        return Err(LearningError::InvalidData(format!(
            "target column '{target}' has no values"
        )));
    }
    let dropped = series.len() - encoded.rows.len();
    if dropped > 0 {
        warn!(target, dropped, "rows without a target value dropped");
    }
    Ok(encoded)
}

pub(crate) fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("rows".into(), rows.iter().map(|&r| r as IdxSize).collect());
    Ok(df.take(&idx)?)
}

fn completeness(df: &DataFrame) -> f64 {
    let cells = df.height() * df.width();
    if cells == 0 {
        return 0.0;
    }
    let missing: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
    1.0 - missing as f64 / cells as f64
}

/// Resolve the problem type, encode the target, split and fit the
/// preprocessing plan on the training partition.
pub(crate) fn prepare(df: &DataFrame, config: &TrainingConfig) -> Result<Prepared> {
    let target = config.target_column.as_str();
    let column = df
        .column(target)
        .map_err(|_| LearningError::TargetNotFound(target.to_string()))?;

    let problem_type = match config.problem_type {
        Some(problem_type) => problem_type,
        None => {
            let detected = DatasetCharacterizer::default().detect_problem_type(df, target)?;
            info!(target, problem_type = %detected, "problem type detected");
            detected
        }
    };

    let encoded = encode_target(column.as_materialized_series(), target, problem_type)?;
    let split = match problem_type {
        ProblemType::Classification => {
            let labels: Vec<usize> = encoded.values.iter().map(|v| *v as usize).collect();
            stratified_split(&labels, config.test_size, config.random_seed)?
        }
        ProblemType::Regression => random_split(encoded.rows.len(), config.test_size, config.random_seed)?,
    };

    let original_rows = |positions: &[usize]| -> Vec<usize> { positions.iter().map(|&p| encoded.rows[p]).collect() };
    let train_df = take_rows(df, &original_rows(&split.train))?;
    let test_df = take_rows(df, &original_rows(&split.test))?;
    let y_train: Vec<f64> = split.train.iter().map(|&p| encoded.values[p]).collect();
    let y_test: Vec<f64> = split.test.iter().map(|&p| encoded.values[p]).collect();

    let (preprocessor, plan_info) =
        AdaptivePreprocessor::new(config.preprocessing.clone()).fit(&train_df, target, problem_type, &y_train)?;
    let x_train = to_array(&preprocessor.transform(&train_df)?);
    let x_test = to_array(&preprocessor.transform(&test_df)?);
    debug!(
        train_rows = x_train.nrows(),
        test_rows = x_test.nrows(),
        features = x_train.ncols(),
        "dataset prepared"
    );

    let task = match &encoded.class_labels {
        Some(labels) => Task::Classification { n_classes: labels.len() },
        None => Task::Regression,
    };

    Ok(Prepared {
        problem_type,
        task,
        class_labels: encoded.class_labels,
        preprocessor,
        plan_info,
        train_df,
        x_train,
        y_train: Array1::from(y_train),
        x_test,
        y_test: Array1::from(y_test),
        completeness: completeness(df),
    })
}

/// Held-out metrics for a fitted model.
pub(crate) fn evaluate(model: &Model, task: Task, x: &Array2<f64>, y: &Array1<f64>) -> Result<EvaluationMetrics> {
    let predictions = model.predict(x)?;
    Ok(match task {
        Task::Classification { .. } => {
            let truth: Vec<usize> = y.iter().map(|v| *v as usize).collect();
            let predicted: Vec<usize> = predictions.iter().map(|v| *v as usize).collect();
            classification_metrics(&truth, &predicted)
        }
        Task::Regression => regression_metrics(&y.to_vec(), &predictions.to_vec()),
    })
}

/// `model_{first 8 chars of session}_{YYYYmmdd_HHMMSS}`.
pub fn model_id(session_id: &str, trained_at: DateTime<Utc>) -> String {
    let prefix: String = session_id.chars().take(8).collect();
    format!("model_{prefix}_{}", trained_at.format("%Y%m%d_%H%M%S"))
}

/// Trains, evaluates and persists models.
///
/// Holds no per-request state: one `Trainer` can serve concurrent requests.
pub struct Trainer<S: ArtifactStore> {
    store: S,
    recommender: ModelRecommender,
    profiler: DataProfiler,
    characterizer: DatasetCharacterizer,
    progress_callback: Option<ProgressCallback>,
}

impl<S: ArtifactStore + std::fmt::Debug> std::fmt::Debug for Trainer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("store", &self.store)
            .field("recommender", &self.recommender)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl<S: ArtifactStore> Trainer<S> {
    #[must_use]
    pub fn builder() -> TrainerBuilder<S> {
        TrainerBuilder::default()
    }

    /// A trainer with default services and no progress callback.
    pub fn new(store: S) -> Self {
        Self {
            store,
            recommender: ModelRecommender::default(),
            profiler: DataProfiler::default(),
            characterizer: DatasetCharacterizer::default(),
            progress_callback: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn report(&self, stage: TrainingStage, message: impl Into<String>, algorithm: Option<Algorithm>) {
        if let Some(callback) = &self.progress_callback {
            callback(ProgressUpdate {
                stage,
                progress: stage.progress(),
                message: message.into(),
                algorithm: algorithm.map(|a| a.as_str().to_string()),
            });
        }
    }

    /// Train a model on `df` and persist it.
    ///
    /// # Errors
    ///
    /// - [`InvalidConfig`](LearningError::InvalidConfig): out-of-range
    ///   `test_size`, unknown hyperparameter
    /// - [`TargetNotFound`](LearningError::TargetNotFound): the target
    ///   column is not in `df`
    /// - [`UnsupportedAlgorithm`](LearningError::UnsupportedAlgorithm): the
    ///   algorithm has no estimator for the problem type
    /// - [`InvalidData`](LearningError::InvalidData): too few rows, a
    ///   single-class target, a non-numeric regression target
    /// - [`TrainingFailed`](LearningError::TrainingFailed): fitting or
    ///   evaluation failed
    ///
    /// No artifact is written when any of these is returned.
    pub fn train(&self, df: &DataFrame, config: &TrainingConfig) -> Result<TrainingResult> {
        let result = self.run(df, config);
        if let Err(e) = &result {
            warn!(code = e.error_code(), "training failed: {e}");
            self.report(TrainingStage::Failed, e.to_string(), config.algorithm);
        }
        result
    }

    fn run(&self, df: &DataFrame, config: &TrainingConfig) -> Result<TrainingResult> {
        config.validate()?;
        info!(
            target = %config.target_column,
            rows = df.height(),
            columns = df.width(),
            "training started"
        );

        self.report(TrainingStage::Preparing, "Preparing dataset", config.algorithm);
        let data = prepare(df, config)?;

        let algorithm = match config.algorithm {
            Some(algorithm) => algorithm,
            None => {
                self.report(TrainingStage::AlgorithmSelection, "Selecting algorithm", None);
                self.select_algorithm(df, config, data.problem_type)?
            }
        };
        algorithm.ensure_supports(data.problem_type)?;

        self.report(TrainingStage::Training, format!("Training {algorithm}"), Some(algorithm));
        let mut model = build_model(algorithm, data.task, &config.hyperparameters, config.random_seed)?;
        model
            .fit(&data.x_train, &data.y_train)
            .map_err(LearningError::training)?;

        self.report(TrainingStage::Evaluation, "Evaluating on held-out rows", Some(algorithm));
        let metrics = evaluate(&model, data.task, &data.x_test, &data.y_test).map_err(LearningError::training)?;
        if let Some(headline) = metrics.headline(data.problem_type) {
            info!(algorithm = %algorithm, "{headline}");
        }

        let pipeline = TrainedModel::new(
            algorithm,
            data.problem_type,
            config.target_column.clone(),
            data.class_labels.clone(),
            data.preprocessor,
            model,
        );
        let mut feature_importance = pipeline.feature_importance();
        feature_importance.truncate(TOP_FEATURES);

        let trained_at = Utc::now();
        let training_info = TrainingInfo {
            features_count: pipeline.feature_names_out().len(),
            target_column: config.target_column.clone(),
            problem_type: data.problem_type,
            algorithm,
            test_size: config.test_size,
            training_samples: data.x_train.nrows(),
            test_samples: data.x_test.nrows(),
        };
        let metadata = ModelMetadata {
            model_id: String::new(),
            session_id: config.session_id.clone(),
            algorithm,
            problem_type: data.problem_type,
            target_column: config.target_column.clone(),
            feature_names: pipeline.feature_names().to_vec(),
            feature_names_out: pipeline.feature_names_out().to_vec(),
            class_labels: data.class_labels,
            evaluation_metrics: metrics.clone(),
            feature_importance: feature_importance.clone(),
            hyperparameters: config.hyperparameters.clone(),
            training_rows: training_info.training_samples,
            test_rows: training_info.test_samples,
            data_completeness: data.completeness,
            trained_at,
            preprocessing_info: data.plan_info.clone(),
        };

        self.report(TrainingStage::Saving, "Saving model", Some(algorithm));
        let model_id = self.persist(pipeline, metadata, &config.session_id, trained_at)?;
        self.report(TrainingStage::Complete, format!("Model {model_id} ready"), Some(algorithm));
        info!(model_id = %model_id, algorithm = %algorithm, "training complete");

        Ok(TrainingResult {
            model_id,
            session_id: config.session_id.clone(),
            problem_type: data.problem_type,
            algorithm,
            training_info,
            evaluation_metrics: metrics,
            feature_importance,
            hyperparameters: config.hyperparameters.clone(),
            preprocessing_info: data.plan_info,
            trained_at,
        })
    }

    fn select_algorithm(&self, df: &DataFrame, config: &TrainingConfig, problem_type: ProblemType) -> Result<Algorithm> {
        let profile = self.profiler.profile(df);
        let characteristics = self
            .characterizer
            .characteristics(&profile, Some(config.target_column.as_str()));
        let best = self
            .recommender
            .recommend(&characteristics, problem_type, &config.preferences)
            .into_iter()
            .next()
            .ok_or_else(|| LearningError::InvalidConfig(format!("no algorithm available for {problem_type}")))?;
        info!(algorithm = %best.algorithm, score = best.score, "algorithm selected");
        Ok(best.algorithm)
    }

    /// Save under the generated id, appending `_2`, `_3`, ... while the id
    /// is taken.
    fn persist(
        &self,
        pipeline: TrainedModel,
        mut metadata: ModelMetadata,
        session_id: &str,
        trained_at: DateTime<Utc>,
    ) -> Result<String> {
        let base = model_id(session_id, trained_at);
        let mut artifact = ModelArtifact {
            model_id: base.clone(),
            pipeline,
            metadata: {
                metadata.model_id = base.clone();
                metadata
            },
        };
        for attempt in 1..=MAX_ID_ATTEMPTS {
            if attempt > 1 {
                let id = format!("{base}_{attempt}");
                artifact.model_id = id.clone();
                artifact.metadata.model_id = id;
            }
            match self.store.save(&artifact) {
                Ok(()) => return Ok(artifact.model_id),
                Err(LearningError::ArtifactExists(id)) => debug!(model_id = %id, "model id taken"),
                Err(e) => return Err(e),
            }
        }
        Err(LearningError::ArtifactExists(base))
    }
}

/// Builder for [`Trainer`].
///
/// # Required Configuration
///
/// - [`store()`](Self::store): where artifacts are written
///
/// # Optional Configuration
///
/// - [`recommender()`](Self::recommender): used when no algorithm is requested
/// - [`on_progress()`](Self::on_progress): progress callback
pub struct TrainerBuilder<S: ArtifactStore> {
    store: Option<S>,
    recommender: Option<ModelRecommender>,
    progress_callback: Option<ProgressCallback>,
}

impl<S: ArtifactStore> Default for TrainerBuilder<S> {
    fn default() -> Self {
        Self {
            store: None,
            recommender: None,
            progress_callback: None,
        }
    }
}

impl<S: ArtifactStore> TrainerBuilder<S> {
    #[must_use]
    pub fn store(mut self, store: S) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn recommender(mut self, recommender: ModelRecommender) -> Self {
        self.recommender = Some(recommender);
        self
    }

    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// # Errors
    ///
    /// [`InvalidConfig`](LearningError::InvalidConfig) when no store was set.
    pub fn build(self) -> Result<Trainer<S>> {
        let store = self
            .store
            .ok_or_else(|| LearningError::InvalidConfig("an artifact store is required".to_string()))?;
        let mut trainer = Trainer::new(store);
        if let Some(recommender) = self.recommender {
            trainer.recommender = recommender;
        }
        trainer.progress_callback = self.progress_callback;
        Ok(trainer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn frame() -> DataFrame {
        df!(
            "x" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0],
            "label" => [Some("b"), Some("a"), None, Some("b"), Some("a"), Some(" "), Some("b"), Some("a"), Some("b"), Some("a")]
        )
        .unwrap()
    }

    #[test]
    fn test_model_id_format() {
        let at = Utc.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(model_id("abcdefghijk", at), "model_abcdefgh_20250309_140507");
        assert_eq!(model_id("s1", at), "model_s1_20250309_140507");
    }

    #[test]
    fn test_labels_sort_numerically_when_possible() {
        let numeric: BTreeSet<String> = ["10", "2", "1"].iter().map(|s| s.to_string()).collect();
        assert_eq!(sort_labels(numeric), vec!["1", "2", "10"]);
        let text: BTreeSet<String> = ["b", "10", "a"].iter().map(|s| s.to_string()).collect();
        assert_eq!(sort_labels(text), vec!["10", "a", "b"]);
    }

    #[test]
    fn test_blank_targets_are_dropped() {
        let df = frame();
        let encoded = encode_target(
            df.column("label").unwrap().as_materialized_series(),
            "label",
            ProblemType::Classification,
        )
        .unwrap();
        assert_eq!(encoded.rows, vec![0, 1, 3, 4, 6, 7, 8, 9]);
        assert_eq!(encoded.class_labels.unwrap(), vec!["a", "b"]);
        assert_eq!(encoded.values[0], 1.0);
    }

    #[test]
    fn test_single_class_target_is_rejected() {
        let df = df!("y" => ["yes", "yes", "yes"]).unwrap();
        let err = encode_target(df.column("y").unwrap().as_materialized_series(), "y", ProblemType::Classification)
            .unwrap_err();
        assert!(matches!(err, LearningError::InvalidData(_)));
    }

    #[test]
    fn test_text_regression_target_is_rejected() {
        let df = df!("y" => ["1.5", "high"]).unwrap();
        let err = encode_target(df.column("y").unwrap().as_materialized_series(), "y", ProblemType::Regression)
            .unwrap_err();
        assert!(err.to_string().contains("high"));
    }

    #[test]
    fn test_prepare_splits_before_preprocessing() {
        let config = TrainingConfig::builder()
            .target_column("label")
            .problem_type(ProblemType::Classification)
            .test_size(0.25)
            .build()
            .unwrap();
        let data = prepare(&frame(), &config).unwrap();
        assert_eq!(data.x_train.nrows() + data.x_test.nrows(), 8);
        assert_eq!(data.x_train.nrows(), data.y_train.len());
        assert_eq!(data.task, Task::Classification { n_classes: 2 });
        // one null among 20 cells
        assert!((data.completeness - 0.95).abs() < 1e-12);
    }

    #[test]
    fn test_prepare_missing_target() {
        let config = TrainingConfig::builder().target_column("nope").build().unwrap();
        let err = prepare(&frame(), &config).err().unwrap();
        assert!(matches!(err, LearningError::TargetNotFound(_)));
    }

    #[test]
    fn test_builder_requires_store() {
        let err = Trainer::<crate::FileArtifactStore>::builder().build().unwrap_err();
        assert!(matches!(err, LearningError::InvalidConfig(_)));
    }
}
