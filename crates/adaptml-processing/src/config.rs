//! Configuration types for profiling, characterization and preprocessing.
//!
//! Every service in this crate is stateless: it is constructed from one of
//! these configs and each call is a pure function of its inputs plus the
//! config. Use the builders for validated construction.

use serde::{Deserialize, Serialize};

// =============================================================================
// Profiler
// =============================================================================

/// Thresholds used by [`crate::DataProfiler`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfilerConfig {
    /// unique/total above this marks a column as high-cardinality.
    /// Default: 0.8
    pub high_cardinality_ratio: f64,

    /// Share of the most frequent value above this marks a column constant.
    /// Default: 0.95
    pub constant_ratio: f64,

    /// Only correlations with |r| strictly above this are reported.
    /// Default: 0.3
    pub correlation_threshold: f64,

    /// |r| with the target above this is reported as leakage.
    /// Default: 0.95
    pub leakage_threshold: f64,

    /// IQR fence multiplier for outlier detection.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Number of sample values kept per column.
    /// Default: 5
    pub sample_size: usize,

    /// Number of values probed when testing a text column for dates.
    /// Default: 10
    pub datetime_probe_size: usize,

    /// Size of the categorical top-value histogram.
    /// Default: 10
    pub top_values: usize,

    /// Outlier indices kept per column in the profile.
    /// Default: 5
    pub max_outlier_indices: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            high_cardinality_ratio: 0.8,
            constant_ratio: 0.95,
            correlation_threshold: 0.3,
            leakage_threshold: 0.95,
            iqr_multiplier: 1.5,
            sample_size: 5,
            datetime_probe_size: 10,
            top_values: 10,
            max_outlier_indices: 5,
        }
    }
}

impl ProfilerConfig {
    pub fn builder() -> ProfilerConfigBuilder {
        ProfilerConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, value) in [
            ("high_cardinality_ratio", self.high_cardinality_ratio),
            ("constant_ratio", self.constant_ratio),
            ("correlation_threshold", self.correlation_threshold),
            ("leakage_threshold", self.leakage_threshold),
        ] {
            check_unit_interval(field, value)?;
        }
        if self.iqr_multiplier <= 0.0 || !self.iqr_multiplier.is_finite() {
            return Err(ConfigValidationError::InvalidValue {
                field: "iqr_multiplier".to_string(),
                reason: format!("{} must be a positive number", self.iqr_multiplier),
            });
        }
        if self.datetime_probe_size == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "datetime_probe_size".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Builder for [`ProfilerConfig`].
#[derive(Debug, Default)]
pub struct ProfilerConfigBuilder {
    high_cardinality_ratio: Option<f64>,
    constant_ratio: Option<f64>,
    correlation_threshold: Option<f64>,
    leakage_threshold: Option<f64>,
    iqr_multiplier: Option<f64>,
    sample_size: Option<usize>,
    top_values: Option<usize>,
}

impl ProfilerConfigBuilder {
    pub fn high_cardinality_ratio(mut self, ratio: f64) -> Self {
        self.high_cardinality_ratio = Some(ratio);
        self
    }

    pub fn constant_ratio(mut self, ratio: f64) -> Self {
        self.constant_ratio = Some(ratio);
        self
    }

    pub fn correlation_threshold(mut self, threshold: f64) -> Self {
        self.correlation_threshold = Some(threshold);
        self
    }

    pub fn leakage_threshold(mut self, threshold: f64) -> Self {
        self.leakage_threshold = Some(threshold);
        self
    }

    pub fn iqr_multiplier(mut self, multiplier: f64) -> Self {
        self.iqr_multiplier = Some(multiplier);
        self
    }

    pub fn sample_size(mut self, size: usize) -> Self {
        self.sample_size = Some(size);
        self
    }

    pub fn top_values(mut self, n: usize) -> Self {
        self.top_values = Some(n);
        self
    }

    /// Build the configuration, validating every threshold.
    pub fn build(self) -> Result<ProfilerConfig, ConfigValidationError> {
        let defaults = ProfilerConfig::default();
        let config = ProfilerConfig {
            high_cardinality_ratio: self
                .high_cardinality_ratio
                .unwrap_or(defaults.high_cardinality_ratio),
            constant_ratio: self.constant_ratio.unwrap_or(defaults.constant_ratio),
            correlation_threshold: self
                .correlation_threshold
                .unwrap_or(defaults.correlation_threshold),
            leakage_threshold: self.leakage_threshold.unwrap_or(defaults.leakage_threshold),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            sample_size: self.sample_size.unwrap_or(defaults.sample_size),
            top_values: self.top_values.unwrap_or(defaults.top_values),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Characterizer
// =============================================================================

/// Thresholds used by [`crate::DatasetCharacterizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Profiling thresholds shared with the characterizer.
    pub profiler: ProfilerConfig,

    /// A top suitability score strictly above this means the dataset has a
    /// clear target. Default: 70
    pub clear_target_threshold: f64,

    /// Minimum suitability score for a column to be a usable target.
    /// Default: 20
    pub suitable_threshold: f64,

    /// Number of ranked target recommendations returned. Default: 5
    pub max_recommendations: usize,

    /// Majority/minority class ratio above which a column is imbalanced.
    /// Default: 5
    pub imbalance_ratio: f64,

    /// Share of outliers above which a numeric column gets a quality issue.
    /// Default: 0.05
    pub outlier_issue_ratio: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            profiler: ProfilerConfig::default(),
            clear_target_threshold: 70.0,
            suitable_threshold: 20.0,
            max_recommendations: 5,
            imbalance_ratio: 5.0,
            outlier_issue_ratio: 0.05,
        }
    }
}

// =============================================================================
// Preprocessor
// =============================================================================

/// Imputation strategy for numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NumericStrategy {
    /// Decide from missing-data severity and dataset size.
    #[default]
    Auto,
    Mean,
    Median,
    Knn,
}

/// Imputation strategy for categorical columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalStrategy {
    /// Most frequent value.
    #[default]
    Auto,
    MostFrequent,
    /// Fill with [`PreprocessingConfig::missing_fill_value`].
    Constant,
}

/// Scaling applied to the numeric block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalingStrategy {
    /// Robust when outliers are prevalent, standard otherwise.
    #[default]
    Auto,
    Standard,
    Robust,
    #[serde(rename = "minmax")]
    MinMax,
    None,
}

/// Encoding applied to categorical columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EncodingStrategy {
    /// Chosen from the maximum column cardinality.
    #[default]
    Auto,
    #[serde(rename = "onehot")]
    OneHot,
    Target,
    Frequency,
}

/// Outlier treatment for numeric columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutlierStrategy {
    /// IQR capping when the average outlier rate exceeds the threshold.
    #[default]
    Auto,
    Iqr,
    None,
}

/// Preprocessing overrides for [`crate::AdaptivePreprocessor`].
///
/// Every strategy defaults to `Auto`, in which case the preprocessor decides
/// from the data.
///
/// # Example
///
/// ```rust,ignore
/// use adaptml_processing::config::{PreprocessingConfig, ScalingStrategy};
///
/// let config = PreprocessingConfig::builder()
///     .scaling(ScalingStrategy::Robust)
///     .feature_engineering(false)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    pub numeric_imputation: NumericStrategy,
    pub categorical_imputation: CategoricalStrategy,
    pub scaling: ScalingStrategy,
    pub encoding: EncodingStrategy,
    pub outlier_treatment: OutlierStrategy,

    /// Any categorical column above this cardinality forces frequency
    /// encoding. Default: 50
    pub max_categorical_cardinality: usize,

    /// One-hot encoding is used when every categorical column is at or
    /// below this cardinality. Default: 10
    pub onehot_max_cardinality: usize,

    /// Average outlier rate (0-1) above which IQR capping is applied.
    /// Default: 0.05
    pub outlier_threshold: f64,

    /// Whether squared features are derived for numeric columns.
    /// Default: true
    pub feature_engineering: bool,

    /// Neighbors used by KNN imputation. Default: 5
    pub knn_neighbors: usize,

    /// At most this many numeric columns get a squared feature. Default: 5
    pub max_polynomial_features: usize,

    /// Sentinel used by constant categorical imputation. Default: "missing"
    pub missing_fill_value: String,

    /// Prior weight for target encoding. Default: 10
    pub target_smoothing: f64,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            numeric_imputation: NumericStrategy::default(),
            categorical_imputation: CategoricalStrategy::default(),
            scaling: ScalingStrategy::default(),
            encoding: EncodingStrategy::default(),
            outlier_treatment: OutlierStrategy::default(),
            max_categorical_cardinality: 50,
            onehot_max_cardinality: 10,
            outlier_threshold: 0.05,
            feature_engineering: true,
            knn_neighbors: 5,
            max_polynomial_features: 5,
            missing_fill_value: "missing".to_string(),
            target_smoothing: 10.0,
        }
    }
}

impl PreprocessingConfig {
    pub fn builder() -> PreprocessingConfigBuilder {
        PreprocessingConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        check_unit_interval("outlier_threshold", self.outlier_threshold)?;

        if self.knn_neighbors == 0 {
            return Err(ConfigValidationError::InvalidKnnNeighbors(self.knn_neighbors));
        }

        if self.onehot_max_cardinality > self.max_categorical_cardinality {
            return Err(ConfigValidationError::InvalidValue {
                field: "onehot_max_cardinality".to_string(),
                reason: format!(
                    "{} exceeds max_categorical_cardinality {}",
                    self.onehot_max_cardinality, self.max_categorical_cardinality
                ),
            });
        }

        if self.target_smoothing < 0.0 || !self.target_smoothing.is_finite() {
            return Err(ConfigValidationError::InvalidValue {
                field: "target_smoothing".to_string(),
                reason: "must be a non-negative number".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for [`PreprocessingConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct PreprocessingConfigBuilder {
    numeric_imputation: Option<NumericStrategy>,
    categorical_imputation: Option<CategoricalStrategy>,
    scaling: Option<ScalingStrategy>,
    encoding: Option<EncodingStrategy>,
    outlier_treatment: Option<OutlierStrategy>,
    max_categorical_cardinality: Option<usize>,
    outlier_threshold: Option<f64>,
    feature_engineering: Option<bool>,
    knn_neighbors: Option<usize>,
    max_polynomial_features: Option<usize>,
    missing_fill_value: Option<String>,
}

impl PreprocessingConfigBuilder {
    pub fn numeric_imputation(mut self, strategy: NumericStrategy) -> Self {
        self.numeric_imputation = Some(strategy);
        self
    }

    pub fn categorical_imputation(mut self, strategy: CategoricalStrategy) -> Self {
        self.categorical_imputation = Some(strategy);
        self
    }

    pub fn scaling(mut self, strategy: ScalingStrategy) -> Self {
        self.scaling = Some(strategy);
        self
    }

    pub fn encoding(mut self, strategy: EncodingStrategy) -> Self {
        self.encoding = Some(strategy);
        self
    }

    pub fn outlier_treatment(mut self, strategy: OutlierStrategy) -> Self {
        self.outlier_treatment = Some(strategy);
        self
    }

    /// Set the cardinality above which frequency encoding is forced.
    pub fn max_categorical_cardinality(mut self, max: usize) -> Self {
        self.max_categorical_cardinality = Some(max);
        self
    }

    /// Set the average outlier rate (0.0 - 1.0) that triggers capping.
    pub fn outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier_threshold = Some(threshold);
        self
    }

    pub fn feature_engineering(mut self, enable: bool) -> Self {
        self.feature_engineering = Some(enable);
        self
    }

    pub fn knn_neighbors(mut self, k: usize) -> Self {
        self.knn_neighbors = Some(k);
        self
    }

    pub fn max_polynomial_features(mut self, max: usize) -> Self {
        self.max_polynomial_features = Some(max);
        self
    }

    pub fn missing_fill_value(mut self, value: impl Into<String>) -> Self {
        self.missing_fill_value = Some(value.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `PreprocessingConfig` or an error if validation fails.
    pub fn build(self) -> Result<PreprocessingConfig, ConfigValidationError> {
        let defaults = PreprocessingConfig::default();
        let config = PreprocessingConfig {
            numeric_imputation: self.numeric_imputation.unwrap_or_default(),
            categorical_imputation: self.categorical_imputation.unwrap_or_default(),
            scaling: self.scaling.unwrap_or_default(),
            encoding: self.encoding.unwrap_or_default(),
            outlier_treatment: self.outlier_treatment.unwrap_or_default(),
            max_categorical_cardinality: self
                .max_categorical_cardinality
                .unwrap_or(defaults.max_categorical_cardinality),
            outlier_threshold: self.outlier_threshold.unwrap_or(defaults.outlier_threshold),
            feature_engineering: self
                .feature_engineering
                .unwrap_or(defaults.feature_engineering),
            knn_neighbors: self.knn_neighbors.unwrap_or(defaults.knn_neighbors),
            max_polynomial_features: self
                .max_polynomial_features
                .unwrap_or(defaults.max_polynomial_features),
            missing_fill_value: self
                .missing_fill_value
                .unwrap_or(defaults.missing_fill_value.clone()),
            ..defaults
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid threshold for '{field}': {value} (must be between 0.0 and 1.0)")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid KNN neighbors: {0} (must be at least 1)")]
    InvalidKnnNeighbors(usize),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

fn check_unit_interval(field: &str, value: f64) -> Result<(), ConfigValidationError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigValidationError::InvalidThreshold {
            field: field.to_string(),
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preprocessing_config() {
        let config = PreprocessingConfig::default();
        assert_eq!(config.max_categorical_cardinality, 50);
        assert_eq!(config.outlier_threshold, 0.05);
        assert_eq!(config.knn_neighbors, 5);
        assert_eq!(config.max_polynomial_features, 5);
        assert!(config.feature_engineering);
        assert_eq!(config.numeric_imputation, NumericStrategy::Auto);
    }

    #[test]
    fn test_builder_custom_values() {
        let config = PreprocessingConfig::builder()
            .scaling(ScalingStrategy::Robust)
            .encoding(EncodingStrategy::Frequency)
            .knn_neighbors(3)
            .feature_engineering(false)
            .build()
            .unwrap();

        assert_eq!(config.scaling, ScalingStrategy::Robust);
        assert_eq!(config.encoding, EncodingStrategy::Frequency);
        assert_eq!(config.knn_neighbors, 3);
        assert!(!config.feature_engineering);
    }

    #[test]
    fn test_validation_invalid_outlier_threshold() {
        let result = PreprocessingConfig::builder().outlier_threshold(1.5).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_invalid_knn_neighbors() {
        let result = PreprocessingConfig::builder().knn_neighbors(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidKnnNeighbors(0)
        ));
    }

    #[test]
    fn test_profiler_builder_rejects_bad_ratio() {
        assert!(ProfilerConfig::builder().constant_ratio(2.0).build().is_err());
        assert!(ProfilerConfig::builder().iqr_multiplier(0.0).build().is_err());
        let config = ProfilerConfig::builder()
            .correlation_threshold(0.5)
            .build()
            .unwrap();
        assert_eq!(config.correlation_threshold, 0.5);
        assert_eq!(config.high_cardinality_ratio, 0.8);
    }

    #[test]
    fn test_strategy_tokens() {
        let json = serde_json::to_string(&EncodingStrategy::OneHot).unwrap();
        assert_eq!(json, "\"onehot\"");
        let parsed: CategoricalStrategy = serde_json::from_str("\"most_frequent\"").unwrap();
        assert_eq!(parsed, CategoricalStrategy::MostFrequent);
    }

    #[test]
    fn test_config_deserializes_partial_overrides() {
        let config: PreprocessingConfig =
            serde_json::from_str(r#"{"scaling": "minmax", "knn_neighbors": 7}"#).unwrap();
        assert_eq!(config.scaling, ScalingStrategy::MinMax);
        assert_eq!(config.knn_neighbors, 7);
        assert_eq!(config.max_categorical_cardinality, 50);
    }
}
