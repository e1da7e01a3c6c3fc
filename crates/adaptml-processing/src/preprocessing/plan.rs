//! Preprocessing plan: the resolved strategy per column group.
//!
//! A plan never carries an `auto` strategy; every choice is resolved from
//! the data (or a caller override) when the plan is built.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::{
    CategoricalStrategy, EncodingStrategy, NumericStrategy, OutlierStrategy, PreprocessingConfig,
    ScalingStrategy,
};
use crate::types::ProblemType;

/// Dataset size above which KNN imputation becomes the automatic choice.
const KNN_MIN_ROWS: usize = 1000;
/// Average missing percentage above which the median is preferred.
const MEDIAN_MISSING_PCT: f64 = 20.0;
/// Average missing percentage above which KNN is preferred on large data.
const KNN_MISSING_PCT: f64 = 5.0;
/// Outlier percentage marking a column as outlier-heavy for scaling.
const ROBUST_OUTLIER_PCT: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericImputation {
    Mean,
    Median,
    Knn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalImputation {
    MostFrequent,
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMethod {
    Standard,
    Robust,
    #[serde(rename = "minmax")]
    MinMax,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncodingMethod {
    #[serde(rename = "onehot")]
    OneHot,
    Target,
    Frequency,
}

macro_rules! display_via_serde_name {
    ($($ty:ty => { $($variant:path => $name:literal),+ $(,)? }),+ $(,)?) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(match self { $($variant => $name),+ })
            }
        })+
    };
}

display_via_serde_name! {
    NumericImputation => {
        NumericImputation::Mean => "mean",
        NumericImputation::Median => "median",
        NumericImputation::Knn => "knn",
    },
    CategoricalImputation => {
        CategoricalImputation::MostFrequent => "most_frequent",
        CategoricalImputation::Constant => "constant",
    },
    ScalingMethod => {
        ScalingMethod::Standard => "standard",
        ScalingMethod::Robust => "robust",
        ScalingMethod::MinMax => "minmax",
        ScalingMethod::None => "none",
    },
    EncodingMethod => {
        EncodingMethod::OneHot => "onehot",
        EncodingMethod::Target => "target",
        EncodingMethod::Frequency => "frequency",
    },
}

/// Steps for the numeric column group, applied in field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericPlan {
    pub columns: Vec<String>,
    pub imputation: NumericImputation,
    pub knn_neighbors: usize,
    pub cap_outliers: bool,
    /// Leading numeric columns that also get a `{name}_squared` feature.
    pub polynomial_columns: Vec<String>,
    pub scaling: ScalingMethod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalPlan {
    pub columns: Vec<String>,
    /// Boolean-token columns are lowercased before encoding.
    pub boolean_columns: Vec<String>,
    pub imputation: CategoricalImputation,
    pub fill_value: String,
    pub encoding: EncodingMethod,
    pub target_smoothing: f64,
}

/// Ordered, per-column-group transformation plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingPlan {
    pub target_column: String,
    pub problem_type: ProblemType,
    /// Every non-target column in dataset order; prediction input must
    /// supply all of them.
    pub input_features: Vec<String>,
    pub numeric: Option<NumericPlan>,
    pub categorical: Option<CategoricalPlan>,
    pub datetime_columns: Vec<String>,
    /// Columns with no values to learn from.
    pub dropped_columns: Vec<String>,
}

impl PreprocessingPlan {
    /// Human-readable steps in execution order.
    pub fn steps(&self) -> Vec<String> {
        let mut steps = Vec::new();
        if let Some(numeric) = &self.numeric {
            steps.push(format!("Numeric imputation: {}", numeric.imputation));
            if numeric.cap_outliers {
                steps.push("Outlier treatment: iqr".to_string());
            }
            if !numeric.polynomial_columns.is_empty() {
                steps.push(format!(
                    "Numeric feature engineering: squared terms for {}",
                    numeric.polynomial_columns.join(", ")
                ));
            }
            steps.push(format!("Scaling: {}", numeric.scaling));
        }
        if let Some(categorical) = &self.categorical {
            steps.push(format!("Categorical imputation: {}", categorical.imputation));
            steps.push(format!("Categorical encoding: {}", categorical.encoding));
        }
        if !self.datetime_columns.is_empty() {
            steps.push("DateTime feature engineering applied".to_string());
        }
        if !self.dropped_columns.is_empty() {
            steps.push(format!("Dropped empty columns: {}", self.dropped_columns.join(", ")));
        }
        steps
    }
}

/// What the plan was decided from, reported alongside it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanInfo {
    pub numeric_features: Vec<String>,
    pub categorical_features: Vec<String>,
    pub datetime_features: Vec<String>,
    pub dropped_features: Vec<String>,
    pub total_features_before: usize,
    pub total_features_after: usize,
    pub missing_percentages: BTreeMap<String, f64>,
    pub outlier_percentages: BTreeMap<String, f64>,
    pub cardinalities: BTreeMap<String, usize>,
    pub steps: Vec<String>,
    pub config_used: PreprocessingConfig,
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Median for heavy missingness, KNN for large data with moderate
/// missingness, mean otherwise.
pub fn choose_numeric_imputation(
    strategy: NumericStrategy,
    missing_pcts: &[f64],
    rows: usize,
) -> NumericImputation {
    match strategy {
        NumericStrategy::Mean => NumericImputation::Mean,
        NumericStrategy::Median => NumericImputation::Median,
        NumericStrategy::Knn => NumericImputation::Knn,
        NumericStrategy::Auto => {
            let avg_missing = average(missing_pcts);
            if avg_missing > MEDIAN_MISSING_PCT {
                NumericImputation::Median
            } else if rows > KNN_MIN_ROWS && avg_missing > KNN_MISSING_PCT {
                NumericImputation::Knn
            } else {
                NumericImputation::Mean
            }
        }
    }
}

pub fn choose_categorical_imputation(strategy: CategoricalStrategy) -> CategoricalImputation {
    match strategy {
        CategoricalStrategy::Auto | CategoricalStrategy::MostFrequent => {
            CategoricalImputation::MostFrequent
        }
        CategoricalStrategy::Constant => CategoricalImputation::Constant,
    }
}

/// IQR capping when the average outlier percentage exceeds the threshold.
pub fn choose_outlier_capping(strategy: OutlierStrategy, outlier_pcts: &[f64], threshold: f64) -> bool {
    match strategy {
        OutlierStrategy::Iqr => true,
        OutlierStrategy::None => false,
        OutlierStrategy::Auto => average(outlier_pcts) > threshold * 100.0,
    }
}

/// Robust scaling when more than half the numeric columns are
/// outlier-heavy, standard otherwise.
pub fn choose_scaling(strategy: ScalingStrategy, outlier_pcts: &[f64]) -> ScalingMethod {
    match strategy {
        ScalingStrategy::Standard => ScalingMethod::Standard,
        ScalingStrategy::Robust => ScalingMethod::Robust,
        ScalingStrategy::MinMax => ScalingMethod::MinMax,
        ScalingStrategy::None => ScalingMethod::None,
        ScalingStrategy::Auto => {
            let heavy = outlier_pcts.iter().filter(|p| **p > ROBUST_OUTLIER_PCT).count();
            if heavy as f64 > outlier_pcts.len() as f64 * 0.5 {
                ScalingMethod::Robust
            } else {
                ScalingMethod::Standard
            }
        }
    }
}

/// Frequency encoding if any column is over the cardinality limit, one-hot
/// if every column is small, target encoding in between.
pub fn choose_encoding(strategy: EncodingStrategy, cardinalities: &[usize], config: &PreprocessingConfig) -> EncodingMethod {
    match strategy {
        EncodingStrategy::OneHot => EncodingMethod::OneHot,
        EncodingStrategy::Target => EncodingMethod::Target,
        EncodingStrategy::Frequency => EncodingMethod::Frequency,
        EncodingStrategy::Auto => {
            let max = cardinalities.iter().copied().max().unwrap_or(0);
            if max > config.max_categorical_cardinality {
                EncodingMethod::Frequency
            } else if max <= config.onehot_max_cardinality {
                EncodingMethod::OneHot
            } else {
                EncodingMethod::Target
            }
        }
    }
}
