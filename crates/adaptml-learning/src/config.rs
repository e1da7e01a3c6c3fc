//! Configuration types for training and model recommendation.
//!
//! This module provides [`TrainingConfig`] and its builder, the closed
//! [`Algorithm`] token set, and the [`ModelPreferences`] used to rank
//! candidate algorithms.
//!
//! # Example
//!
//! ```
//! use adaptml_learning::{Algorithm, TrainingConfig};
//!
//! let config = TrainingConfig::builder()
//!     .target_column("churn")
//!     .algorithm("random_forest")
//!     .test_size(0.25)
//!     .session_id("a1b2c3d4e5")
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.algorithm, Some(Algorithm::RandomForest));
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use adaptml_processing::{PreprocessingConfig, ProblemType};
use serde::{Deserialize, Serialize};

use crate::error::LearningError;

/// Smallest accepted held-out fraction.
pub const MIN_TEST_SIZE: f64 = 0.1;
/// Largest accepted held-out fraction.
pub const MAX_TEST_SIZE: f64 = 0.5;
/// Session token used when the caller supplies none.
pub const DEFAULT_SESSION: &str = "enhanced";

/// Hyperparameter values keyed by name, e.g. `{"n_estimators": 100}`.
///
/// `null` is a real value for some keys (`max_depth: null` grows trees
/// until the leaves are pure).
pub type Hyperparameters = BTreeMap<String, serde_json::Value>;

/// Candidate values per hyperparameter.
pub type ParamGrid = BTreeMap<String, Vec<serde_json::Value>>;

/// A trainable algorithm.
///
/// Tokens are the lowercase snake_case names (`random_forest`, `xgboost`,
/// ...). Not every algorithm serves both problem types; see
/// [`supports`](Self::supports).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Logistic regression; ordinary least squares for regression targets.
    LogisticRegression,
    LinearRegression,
    RidgeRegression,
    LassoRegression,
    RandomForest,
    /// Gradient-boosted trees.
    Xgboost,
    /// Linear support vector machine.
    Svm,
    Knn,
    /// Gaussian naive Bayes.
    NaiveBayes,
    DecisionTree,
}

impl Algorithm {
    pub const ALL: [Algorithm; 10] = [
        Algorithm::LogisticRegression,
        Algorithm::LinearRegression,
        Algorithm::RidgeRegression,
        Algorithm::LassoRegression,
        Algorithm::RandomForest,
        Algorithm::Xgboost,
        Algorithm::Svm,
        Algorithm::Knn,
        Algorithm::NaiveBayes,
        Algorithm::DecisionTree,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LogisticRegression => "logistic_regression",
            Self::LinearRegression => "linear_regression",
            Self::RidgeRegression => "ridge_regression",
            Self::LassoRegression => "lasso_regression",
            Self::RandomForest => "random_forest",
            Self::Xgboost => "xgboost",
            Self::Svm => "svm",
            Self::Knn => "knn",
            Self::NaiveBayes => "naive_bayes",
            Self::DecisionTree => "decision_tree",
        }
    }

    /// Whether the algorithm can be trained for `problem_type`.
    ///
    /// `logistic_regression` accepts regression targets and trains ordinary
    /// least squares for them.
    #[must_use]
    pub fn supports(&self, problem_type: ProblemType) -> bool {
        match self {
            Self::LinearRegression | Self::RidgeRegression | Self::LassoRegression => {
                problem_type == ProblemType::Regression
            }
            Self::NaiveBayes => problem_type == ProblemType::Classification,
            _ => true,
        }
    }

    /// Check [`supports`](Self::supports), as a validation error.
    pub fn ensure_supports(&self, problem_type: ProblemType) -> Result<(), LearningError> {
        if self.supports(problem_type) {
            Ok(())
        } else {
            Err(LearningError::UnsupportedAlgorithm {
                algorithm: self.as_str().to_string(),
                problem_type: problem_type.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        let algorithm = match token.as_str() {
            "logistic_regression" | "logistic" => Self::LogisticRegression,
            "linear_regression" | "linear" => Self::LinearRegression,
            "ridge_regression" | "ridge" => Self::RidgeRegression,
            "lasso_regression" | "lasso" => Self::LassoRegression,
            "random_forest" => Self::RandomForest,
            "xgboost" | "gradient_boosting" => Self::Xgboost,
            "svm" => Self::Svm,
            "knn" => Self::Knn,
            "naive_bayes" => Self::NaiveBayes,
            "decision_tree" => Self::DecisionTree,
            _ => {
                return Err(LearningError::UnsupportedAlgorithm {
                    algorithm: s.to_string(),
                    problem_type: "any problem type".to_string(),
                });
            }
        };
        Ok(algorithm)
    }
}

/// A low / medium / high preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for Level {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(LearningError::InvalidConfig(format!(
                "unknown preference level '{other}' (expected low, medium or high)"
            ))),
        }
    }
}

/// Training-time tier, fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrainingSpeed {
    VeryFast,
    Fast,
    #[default]
    Medium,
    Slow,
}

impl TrainingSpeed {
    /// Ordinal rank, 1 (very fast) to 4 (slow).
    pub fn rank(&self) -> i32 {
        match self {
            Self::VeryFast => 1,
            Self::Fast => 2,
            Self::Medium => 3,
            Self::Slow => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VeryFast => "very_fast",
            Self::Fast => "fast",
            Self::Medium => "medium",
            Self::Slow => "slow",
        }
    }
}

impl FromStr for TrainingSpeed {
    type Err = LearningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "very_fast" => Ok(Self::VeryFast),
            "fast" => Ok(Self::Fast),
            "medium" => Ok(Self::Medium),
            "slow" => Ok(Self::Slow),
            other => Err(LearningError::InvalidConfig(format!(
                "unknown training time '{other}' (expected very_fast, fast, medium or slow)"
            ))),
        }
    }
}

/// What the caller values when algorithms are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelPreferences {
    pub interpretability: Level,
    pub training_time: TrainingSpeed,
    pub performance: Level,
}

impl Default for ModelPreferences {
    fn default() -> Self {
        Self {
            interpretability: Level::Medium,
            training_time: TrainingSpeed::Medium,
            performance: Level::High,
        }
    }
}

/// Configuration for one training run.
///
/// Use [`TrainingConfig::builder()`] to construct a validated configuration.
/// The fields are public so a deserialized config can be inspected;
/// [`Trainer::train`](crate::Trainer::train) re-validates before doing any
/// work.
///
/// # Validation
///
/// - `target_column` must be non-empty
/// - `test_size` must be in `[0.1, 0.5]`
/// - `cv_folds` must be at least 2
/// - `session_id` must be a valid session token
/// - `algorithm` must be a known token (or `auto`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Column to predict.
    pub target_column: String,

    /// Forced problem type. `None` detects it from the target values.
    pub problem_type: Option<ProblemType>,

    /// Algorithm to train. `None` trains the top-ranked recommendation.
    pub algorithm: Option<Algorithm>,

    /// Fraction of rows held out for evaluation (default: 0.2).
    pub test_size: f64,

    /// Seed for the split and for randomized estimators (default: 42).
    pub random_seed: u64,

    /// Session the dataset belongs to; prefixes the model id.
    pub session_id: String,

    /// Overrides for the adaptive preprocessor.
    pub preprocessing: PreprocessingConfig,

    /// Explicit hyperparameters; missing keys take the estimator defaults.
    pub hyperparameters: Hyperparameters,

    /// Folds used by hyperparameter search and model comparison (default: 5).
    pub cv_folds: usize,

    /// Ranking preferences when `algorithm` is `None`.
    pub preferences: ModelPreferences,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            target_column: String::new(),
            problem_type: None,
            algorithm: Some(Algorithm::RandomForest),
            test_size: 0.2,
            random_seed: 42,
            session_id: DEFAULT_SESSION.to_string(),
            preprocessing: PreprocessingConfig::default(),
            hyperparameters: Hyperparameters::new(),
            cv_folds: 5,
            preferences: ModelPreferences::default(),
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    /// Check every constraint listed on the type.
    pub fn validate(&self) -> Result<(), LearningError> {
        if self.target_column.trim().is_empty() {
            return Err(LearningError::InvalidConfig(
                "target_column must not be empty".to_string(),
            ));
        }
        if !(MIN_TEST_SIZE..=MAX_TEST_SIZE).contains(&self.test_size) {
            return Err(LearningError::InvalidConfig(format!(
                "test_size must be between {MIN_TEST_SIZE} and {MAX_TEST_SIZE}, got {}",
                self.test_size
            )));
        }
        if self.cv_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }
        adaptml_processing::storage::validate_session_id(&self.session_id)?;
        self.preprocessing.validate()?;
        if let (Some(algorithm), Some(problem_type)) = (self.algorithm, self.problem_type) {
            algorithm.ensure_supports(problem_type)?;
        }
        Ok(())
    }
}

/// Builder for [`TrainingConfig`].
///
/// All setters return `self` to allow chaining; nothing is checked until
/// [`build()`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
    algorithm_token: Option<String>,
}

impl TrainingConfigBuilder {
    #[must_use]
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.config.target_column = column.into();
        self
    }

    /// Force the problem type instead of detecting it.
    #[must_use]
    pub fn problem_type(mut self, problem_type: ProblemType) -> Self {
        self.config.problem_type = Some(problem_type);
        self
    }

    /// Algorithm token, e.g. `random_forest`. `auto` trains the top
    /// recommendation.
    #[must_use]
    pub fn algorithm(mut self, token: impl Into<String>) -> Self {
        self.algorithm_token = Some(token.into());
        self
    }

    /// Held-out fraction (default: 0.2).
    ///
    /// [`build()`](Self::build) rejects values outside `[0.1, 0.5]`.
    #[must_use]
    pub fn test_size(mut self, size: f64) -> Self {
        self.config.test_size = size;
        self
    }

    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    #[must_use]
    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.config.session_id = session_id.into();
        self
    }

    #[must_use]
    pub fn preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.config.preprocessing = preprocessing;
        self
    }

    #[must_use]
    pub fn hyperparameters(mut self, params: Hyperparameters) -> Self {
        self.config.hyperparameters = params;
        self
    }

    /// Set one hyperparameter.
    #[must_use]
    pub fn hyperparameter(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.config.hyperparameters.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    #[must_use]
    pub fn preferences(mut self, preferences: ModelPreferences) -> Self {
        self.config.preferences = preferences;
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// [`LearningError::InvalidConfig`] for out-of-range values and
    /// [`LearningError::UnsupportedAlgorithm`] for an unknown token or one
    /// the forced problem type cannot use.
    pub fn build(mut self) -> Result<TrainingConfig, LearningError> {
        if let Some(token) = self.algorithm_token.take() {
            self.config.algorithm = if token.trim().eq_ignore_ascii_case("auto") {
                None
            } else {
                Some(token.parse()?)
            };
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use adaptml_processing::ErrorKind;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.algorithm, Some(Algorithm::RandomForest));
        assert_eq!(config.test_size, 0.2);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.session_id, "enhanced");
        assert_eq!(config.cv_folds, 5);
    }

    #[test]
    fn test_test_size_bounds() {
        for size in [0.1, 0.3, 0.5] {
            assert!(
                TrainingConfig::builder()
                    .target_column("y")
                    .test_size(size)
                    .build()
                    .is_ok()
            );
        }
        for size in [0.0, 0.05, 0.6, 1.0] {
            let err = TrainingConfig::builder()
                .target_column("y")
                .test_size(size)
                .build()
                .unwrap_err();
            assert!(err.to_string().contains("test_size"));
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn test_algorithm_tokens() {
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.as_str().parse::<Algorithm>().unwrap(), algorithm);
        }
        assert_eq!("Ridge".parse::<Algorithm>().unwrap(), Algorithm::RidgeRegression);
        assert!(matches!(
            "deep_forest".parse::<Algorithm>(),
            Err(LearningError::UnsupportedAlgorithm { .. })
        ));
    }

    #[test]
    fn test_auto_algorithm() {
        let config = TrainingConfig::builder()
            .target_column("y")
            .algorithm("auto")
            .build()
            .unwrap();
        assert_eq!(config.algorithm, None);
    }

    #[test]
    fn test_forced_problem_type_must_fit_algorithm() {
        let err = TrainingConfig::builder()
            .target_column("y")
            .problem_type(ProblemType::Regression)
            .algorithm("naive_bayes")
            .build()
            .unwrap_err();
        assert!(matches!(err, LearningError::UnsupportedAlgorithm { .. }));
        assert!(Algorithm::LogisticRegression.supports(ProblemType::Regression));
    }

    #[test]
    fn test_invalid_session_and_target() {
        assert!(TrainingConfig::builder().build().is_err());
        let err = TrainingConfig::builder()
            .target_column("y")
            .session_id("../etc")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_preference_parsing() {
        assert_eq!("HIGH".parse::<Level>().unwrap(), Level::High);
        assert_eq!("very_fast".parse::<TrainingSpeed>().unwrap().rank(), 1);
        assert!("quick".parse::<TrainingSpeed>().is_err());
        let prefs = ModelPreferences::default();
        assert_eq!(prefs.performance, Level::High);
    }
}
