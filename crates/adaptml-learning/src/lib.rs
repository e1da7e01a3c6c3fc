//! adaptml-learning: model recommendation, native training and prediction
//! serving for tabular datasets.
//!
//! Builds on [`adaptml_processing`] for profiling and preprocessing. Every
//! estimator is implemented natively on `ndarray`; fitted pipelines are
//! persisted as JSON artifacts and reloaded for prediction.
//!
//! # Features
//!
//! - **Recommendation**: candidate algorithms scored against the dataset's
//!   characteristics and the caller's preferences
//! - **Training**: stratified split, preprocessing fitted on the training
//!   partition only, held-out metrics and feature importance
//! - **Search**: grid search and model comparison by k-fold cross-validation
//! - **Prediction**: raw JSON rows scored through the persisted pipeline,
//!   with confidence and class probabilities
//! - **Summaries**: template-backed (optionally generated) model reports
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use adaptml_learning::{FileArtifactStore, Predictor, Trainer, TrainingConfig};
//!
//! let trainer = Trainer::builder()
//!     .store(FileArtifactStore::new("models"))
//!     .on_progress(|u| println!("{:.0}% - {}", u.progress * 100.0, u.message))
//!     .build()?;
//!
//! let config = TrainingConfig::builder()
//!     .target_column("Survived")
//!     .algorithm("auto")
//!     .session_id("titanic01")
//!     .build()?;
//! let result = trainer.train(&dataframe, &config)?;
//!
//! let predictor = Predictor::new(FileArtifactStore::new("models"));
//! let batch = predictor.predict(&result.model_id, &[serde_json::json!({"Age": 25, "Sex": "male"})])?;
//! ```
//!
//! # Architecture
//!
//! ```text
//! DataFrame ──► prepare ──► Estimator::fit ──► evaluate ──► ArtifactStore::save
//!   (split, FittedPreprocessor)                                   │
//!                                                                 ▼
//! JSON rows ──► Predictor ──► TrainedModel (transform + predict) ──► PredictionBatch
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, LearningError>`]. Each error
//! carries an [`ErrorKind`](adaptml_processing::ErrorKind):
//!
//! - Validation: [`LearningError::InvalidConfig`], [`LearningError::TargetNotFound`],
//!   [`LearningError::UnsupportedAlgorithm`], [`LearningError::MissingFeatures`]
//! - Not found: [`LearningError::ModelNotFound`], [`LearningError::InconsistentArtifact`]
//! - Computation: [`LearningError::TrainingFailed`], [`LearningError::InferenceError`]
//!
//! # Thread Safety
//!
//! [`Trainer`], [`Predictor`], [`TrainedModel`] and the stores are
//! `Send + Sync`; requests share no mutable state.

mod artifact;
mod config;
mod error;
pub mod estimators;
pub mod insights;
pub mod metrics;
mod model;
mod predictor;
mod progress;
pub mod recommend;
pub mod split;
mod trainer;
mod types;

// Configuration types
pub use config::{
    Algorithm, DEFAULT_SESSION, Hyperparameters, Level, MAX_TEST_SIZE, MIN_TEST_SIZE, ModelPreferences,
    ParamGrid, TrainingConfig, TrainingConfigBuilder, TrainingSpeed,
};
// Error types
pub use error::{LearningError, Result};
// Artifacts and models
pub use artifact::{ArtifactStore, FileArtifactStore, ModelArtifact, validate_model_id};
pub use model::TrainedModel;
// Training and prediction
pub use predictor::Predictor;
pub use trainer::{Trainer, TrainerBuilder, model_id};
// Progress reporting types
pub use progress::{ParseTrainingStageError, ProgressCallback, ProgressUpdate, TrainingStage};
// Recommendation
pub use recommend::{
    ModelComparison, ModelRecommendation, ModelRecommender, SearchResult, compare_models,
    optimize_hyperparameters,
};
// Result types
pub use types::{
    EvaluationMetrics, ModelMetadata, PredictionBatch, PredictionResult, TrainingInfo, TrainingResult,
};

pub use adaptml_processing::ProblemType;

// Services and artifacts are shared across request threads.
static_assertions::assert_impl_all!(Trainer<FileArtifactStore>: Send, Sync);
static_assertions::assert_impl_all!(Predictor<FileArtifactStore>: Send, Sync);
static_assertions::assert_impl_all!(FileArtifactStore: Send, Sync);
static_assertions::assert_impl_all!(TrainedModel: Send, Sync);
static_assertions::assert_impl_all!(ModelArtifact: Send, Sync);
static_assertions::assert_impl_all!(ModelRecommender: Send, Sync);
static_assertions::assert_impl_all!(LearningError: Send, Sync);
