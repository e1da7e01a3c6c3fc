//! Tabular dataset profiling and adaptive preprocessing
//!
//! The analysis half of an AutoML workflow, built on Polars.
//!
//! # Overview
//!
//! - **Profiling**: semantic type inference, per-column statistics, outliers,
//!   correlations, leakage signals and a four-part data-quality score
//! - **Characterization**: ranked target-column recommendations, problem-type
//!   detection, quality issues and feature/preprocessing suggestions
//! - **Adaptive preprocessing**: imputation, outlier capping, scaling,
//!   encoding and datetime extraction chosen from the data, fitted once and
//!   reused unchanged at prediction time
//! - **Storage**: session-to-file resolution for CSV and Parquet uploads
//! - **Summaries**: prose summaries through an optional text generator, with
//!   deterministic templates as the fallback
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use adaptml_processing::{AdaptivePreprocessor, DataProfiler, DatasetCharacterizer};
//! use adaptml_processing::storage::{DatasetStore, DirectoryStore};
//!
//! let df = DirectoryStore::new("uploads").load("session-42")?;
//!
//! let profile = DataProfiler::default().profile(&df);
//! println!("quality: {:.1}", profile.data_quality.score);
//!
//! let targets = DatasetCharacterizer::default().recommend_targets(&df);
//! let target = &targets[0].column;
//! let problem = targets[0].problem_type.unwrap_or(ProblemType::Regression);
//!
//! let (plan, features, info) = AdaptivePreprocessor::default().build_plan(&df, target, problem)?;
//! ```
//!
//! # Errors
//!
//! Every fallible operation returns [`ProcessingError`], which carries an
//! [`ErrorKind`] (validation, not found, computation) fixed where the error
//! is raised.

pub mod ai;
pub mod analyzer;
pub mod config;
pub mod error;
pub mod imputers;
pub mod preprocessing;
pub mod profiler;
pub mod quality;
pub mod storage;
pub mod types;
pub mod utils;

pub use analyzer::{DatasetCharacterizer, detect_problem_type};
pub use config::{
    AnalyzerConfig, CategoricalStrategy, ConfigValidationError, EncodingStrategy, NumericStrategy,
    OutlierStrategy, PreprocessingConfig, PreprocessingConfigBuilder, ProfilerConfig,
    ProfilerConfigBuilder, ScalingStrategy,
};
pub use error::{ErrorKind, ProcessingError, Result, ResultExt};
pub use imputers::{CategoricalImputer, KNNImputer, StatisticalImputer};
pub use preprocessing::{
    AdaptivePreprocessor, FeatureMatrix, FittedPreprocessor, PlanInfo, PreprocessingPlan,
};
pub use profiler::{DataProfiler, validate_structure};
pub use quality::DataQualityAnalyzer;
pub use storage::{DataFormat, DatasetHandle, DatasetStore, DirectoryStore};
pub use types::{
    ColumnKind, ColumnProfile, DataQuality, DatasetAnalysis, DatasetCharacteristics,
    DatasetProfile, DatasetSize, ProblemType, QualityGrade, StructureReport, TargetRecommendation,
};

// Services are shared across request threads.
static_assertions::assert_impl_all!(DataProfiler: Send, Sync);
static_assertions::assert_impl_all!(DatasetCharacterizer: Send, Sync);
static_assertions::assert_impl_all!(AdaptivePreprocessor: Send, Sync);
static_assertions::assert_impl_all!(FittedPreprocessor: Send, Sync);
static_assertions::assert_impl_all!(DirectoryStore: Send, Sync);
static_assertions::assert_impl_all!(ai::Summarizer: Send, Sync);
static_assertions::assert_impl_all!(ProcessingError: Send, Sync);
