use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ProcessingError;

// ============================================================================
// Column kinds and problem types
// ============================================================================

/// Semantic type of a column, decided by type inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numerical,
    Categorical,
    Boolean,
    Datetime,
    /// No non-null values to infer from.
    Unknown,
}

impl ColumnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Numerical => "numerical",
            Self::Categorical => "categorical",
            Self::Boolean => "boolean",
            Self::Datetime => "datetime",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of supervised learning problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProblemType {
    Classification,
    Regression,
}

impl ProblemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Regression => "regression",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemType {
    type Err = ProcessingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classification" => Ok(Self::Classification),
            "regression" => Ok(Self::Regression),
            other => Err(ProcessingError::InvalidInput(format!(
                "unsupported problem type '{other}' (expected classification or regression)"
            ))),
        }
    }
}

// ============================================================================
// Column profiles
// ============================================================================

/// Shape of a numeric distribution judged from its skewness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    Normal,
    ModeratelySkewed,
    HighlySkewed,
}

impl Distribution {
    pub fn from_skewness(skewness: f64) -> Self {
        let abs = skewness.abs();
        if abs < 0.5 {
            Self::Normal
        } else if abs < 1.0 {
            Self::ModeratelySkewed
        } else {
            Self::HighlySkewed
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericStats {
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
    pub skewness: Option<f64>,
    pub outlier_count: usize,
    /// Row positions of the first detected outliers.
    pub outlier_indices: Vec<usize>,
    pub distribution: Option<Distribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoricalStats {
    pub top_values: Vec<ValueCount>,
    pub most_frequent: Option<String>,
    pub frequency_of_top: usize,
    /// Shannon entropy in bits.
    pub entropy: Option<f64>,
    /// Most frequent count over least frequent count.
    pub imbalance_ratio: Option<f64>,
    pub average_length: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub dtype: String,
    pub inferred_type: ColumnKind,
    pub unique_count: usize,
    pub missing_count: usize,
    pub null_percentage: f64,
    pub is_high_cardinality: bool,
    pub is_constant: bool,
    pub sample_values: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub numeric: Option<NumericStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categorical: Option<CategoricalStats>,
}

impl ColumnProfile {
    /// Fraction (0-1) of rows that are missing.
    pub fn missing_ratio(&self) -> f64 {
        self.null_percentage / 100.0
    }

    /// Outlier share among the rows of the column, 0 when not numeric.
    pub fn outlier_ratio(&self, rows: usize) -> f64 {
        match (&self.numeric, rows) {
            (Some(stats), n) if n > 0 => stats.outlier_count as f64 / n as f64,
            _ => 0.0,
        }
    }
}

// ============================================================================
// Dataset profile
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub rows: usize,
    pub columns: usize,
    pub memory_usage_bytes: usize,
    pub missing_values_total: usize,
    pub duplicate_rows: usize,
    pub numerical_columns: usize,
    pub categorical_columns: usize,
    pub datetime_columns: usize,
    pub boolean_columns: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityGrade {
    /// Grade for a composite 0-100 score.
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::Excellent
        } else if score >= 75.0 {
            Self::Good
        } else if score >= 60.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

/// Data-quality sub-scores (0-100) and their weighted composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    /// Non-missing cells over all cells, as a fraction (0-1).
    pub completeness_ratio: f64,
    pub completeness: f64,
    pub uniqueness: f64,
    pub consistency: f64,
    pub validity: f64,
    pub score: f64,
    pub grade: QualityGrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeakageReason {
    HighCorrelation,
    IdenticalValues,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakageWarning {
    pub column: String,
    pub target: String,
    pub reason: LeakageReason,
    pub correlation: Option<f64>,
    pub message: String,
}

/// Result of structural validation. A malformed dataset is reported here,
/// never raised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructureReport {
    pub is_valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    pub dataset_info: DatasetInfo,
    /// Profiles in dataset column order.
    pub column_profiles: Vec<ColumnProfile>,
    /// [`pair_key`](crate::profiler::pair_key)`(a, b)` for each numeric pair a<b (column order)
    /// with |r| over the threshold.
    pub correlations: BTreeMap<String, f64>,
    pub data_quality: DataQuality,
    pub leakage_warnings: Vec<LeakageWarning>,
    pub structure: StructureReport,
    /// Non-fatal problems hit while profiling (a column or step fell back).
    pub warnings: Vec<String>,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.column_profiles.iter().find(|p| p.name == name)
    }

    pub fn columns_of_kind(&self, kind: ColumnKind) -> Vec<&ColumnProfile> {
        self.column_profiles
            .iter()
            .filter(|p| p.inferred_type == kind)
            .collect()
    }
}

// ============================================================================
// Characterization
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRecommendation {
    pub column: String,
    pub suitability_score: f64,
    pub is_suitable: bool,
    /// `None` only for unsuitable columns with no type signal.
    pub problem_type: Option<ProblemType>,
    pub confidence: f64,
    pub reasons: Vec<String>,
    pub unique_values: usize,
    pub missing_percentage: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityIssueType {
    MissingValues,
    DuplicateRows,
    ConstantColumns,
    HighCardinalityCategorical,
    Outliers,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityIssue {
    pub issue_type: QualityIssueType,
    pub severity: Severity,
    pub description: String,
    pub affected_columns: Vec<String>,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl QualityLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Excellent
        } else if score >= 60.0 {
            Self::Good
        } else if score >= 40.0 {
            Self::Fair
        } else {
            Self::Poor
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub overall_quality_score: f64,
    pub quality_level: QualityLevel,
    pub issues: Vec<QualityIssue>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSuggestionType {
    DatetimeFeatures,
    NumericCombinations,
    CategoricalEncoding,
    TextFeatures,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSuggestion {
    pub suggestion_type: FeatureSuggestionType,
    pub columns: Vec<String>,
    pub suggestion: String,
    pub potential_features: Vec<String>,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreprocessingAction {
    RemoveColumn,
    MeanImputation,
    MedianImputation,
    ModeImputation,
    StandardScaling,
    IqrCapping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessingSuggestion {
    pub action: PreprocessingAction,
    pub columns: Vec<String>,
    pub reason: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Minimal,
    Low,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetSize {
    Small,
    Medium,
    Large,
}

impl DatasetSize {
    pub fn from_rows(rows: usize) -> Self {
        if rows < 1_000 {
            Self::Small
        } else if rows < 10_000 {
            Self::Medium
        } else {
            Self::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
        }
    }
}

/// Dataset summary consumed by model recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetCharacteristics {
    pub n_samples: usize,
    /// Columns other than the target.
    pub n_features: usize,
    pub size: DatasetSize,
    pub numeric_features: usize,
    pub categorical_features: usize,
    /// Missing cells over all cells (0-1).
    pub missing_ratio: f64,
    /// Average numeric-column outlier rate (0-1).
    pub outlier_ratio: f64,
}

/// Everything the characterizer derives from a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetAnalysis {
    pub target_recommendations: Vec<TargetRecommendation>,
    pub total_target_candidates: usize,
    pub has_clear_target: bool,
    pub quality: QualityAssessment,
    pub feature_suggestions: Vec<FeatureSuggestion>,
    pub preprocessing_suggestions: Vec<PreprocessingSuggestion>,
    pub preprocessing_complexity: Complexity,
    pub characteristics: DatasetCharacteristics,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_grade_thresholds() {
        assert_eq!(QualityGrade::from_score(95.0), QualityGrade::Excellent);
        assert_eq!(QualityGrade::from_score(90.0), QualityGrade::Excellent);
        assert_eq!(QualityGrade::from_score(75.0), QualityGrade::Good);
        assert_eq!(QualityGrade::from_score(60.0), QualityGrade::Fair);
        assert_eq!(QualityGrade::from_score(59.9), QualityGrade::Poor);
    }

    #[test]
    fn test_quality_level_thresholds() {
        assert_eq!(QualityLevel::from_score(80.0), QualityLevel::Excellent);
        assert_eq!(QualityLevel::from_score(61.0), QualityLevel::Good);
        assert_eq!(QualityLevel::from_score(40.0), QualityLevel::Fair);
        assert_eq!(QualityLevel::from_score(10.0), QualityLevel::Poor);
    }

    #[test]
    fn test_problem_type_parsing() {
        assert_eq!(
            "Classification".parse::<ProblemType>().unwrap(),
            ProblemType::Classification
        );
        assert!("clustering".parse::<ProblemType>().is_err());
    }

    #[test]
    fn test_dataset_size() {
        assert_eq!(DatasetSize::from_rows(999), DatasetSize::Small);
        assert_eq!(DatasetSize::from_rows(1_000), DatasetSize::Medium);
        assert_eq!(DatasetSize::from_rows(10_000), DatasetSize::Large);
    }

    #[test]
    fn test_distribution_from_skewness() {
        assert_eq!(Distribution::from_skewness(0.2), Distribution::Normal);
        assert_eq!(Distribution::from_skewness(-0.7), Distribution::ModeratelySkewed);
        assert_eq!(Distribution::from_skewness(2.0), Distribution::HighlySkewed);
    }

    #[test]
    fn test_column_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ColumnKind::Numerical).unwrap();
        assert_eq!(json, "\"numerical\"");
    }
}
