//! Adaptive preprocessing.
//!
//! [`AdaptivePreprocessor`] inspects a dataset, resolves a
//! [`PreprocessingPlan`] per column group and fits it. The result is a
//! [`FittedPreprocessor`], a plain serializable value whose `transform`
//! never refits: applying it twice to the same frame gives the same matrix.
//!
//! Output column order is numeric features (originals, then squared terms),
//! encoded categorical features, then datetime parts.

mod datetime;
mod encoders;
mod outliers;
mod plan;
mod scalers;

pub use datetime::{DATETIME_PARTS, DatetimeExtractor};
pub use encoders::FittedEncoder;
pub use outliers::IqrCapper;
pub use plan::{
    CategoricalImputation, CategoricalPlan, EncodingMethod, NumericImputation, NumericPlan,
    PlanInfo, PreprocessingPlan, ScalingMethod, choose_categorical_imputation, choose_encoding,
    choose_numeric_imputation, choose_outlier_capping, choose_scaling,
};
pub use scalers::FittedScaler;

use chrono::NaiveDateTime;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use crate::config::PreprocessingConfig;
use crate::error::{ProcessingError, Result};
use crate::imputers::{CategoricalImputer, KNNImputer, StatisticalImputer};
use crate::profiler::{infer_column_kind, statistics};
use crate::types::{ColumnKind, ProblemType};
use crate::utils::{datetime_values, round_to, strict_numeric_values, string_values};

/// Tukey fence multiplier used for outlier rates and capping.
const IQR_MULTIPLIER: f64 = 1.5;
/// Leading values parsed when testing a text column for dates.
const DATETIME_PROBE: usize = 10;

// =============================================================================
// Feature matrix
// =============================================================================

/// Dense, column-major numeric output of a fitted preprocessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub columns: Vec<Vec<f64>>,
    pub n_rows: usize,
}

impl FeatureMatrix {
    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, index: usize) -> Vec<f64> {
        self.columns.iter().map(|c| c[index]).collect()
    }

    /// Row-major copy of the values.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_rows).map(|i| self.row(i)).collect()
    }

    /// Keep only the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|c| indices.iter().map(|&i| c[i]).collect())
                .collect(),
            n_rows: indices.len(),
        }
    }
}

// =============================================================================
// Column readers
// =============================================================================

fn column_series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|c| c.as_materialized_series())
        .map_err(|_| ProcessingError::ColumnNotFound(name.to_string()))
}

/// Numeric values of a fitted numeric column; text that does not parse is
/// an error rather than a silent null.
fn read_numeric(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    match strict_numeric_values(column_series(df, name)?)? {
        Ok(values) => Ok(values),
        Err(bad) => Err(ProcessingError::TypeConversionFailed {
            column: name.to_string(),
            target_type: "numerical".to_string(),
            reason: format!("value '{bad}' is not a number"),
        }),
    }
}

fn read_text(df: &DataFrame, name: &str, lowercase: bool) -> Result<Vec<Option<String>>> {
    Ok(string_values(column_series(df, name)?)?
        .into_iter()
        .map(|v| {
            v.filter(|s| !s.trim().is_empty())
                .map(|s| if lowercase { s.trim().to_lowercase() } else { s })
        })
        .collect())
}

fn read_datetime(df: &DataFrame, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
    Ok(datetime_values(column_series(df, name)?)?)
}

fn missing_percentage(series: &Series) -> f64 {
    if series.is_empty() {
        return 0.0;
    }
    round_to(series.null_count() as f64 / series.len() as f64 * 100.0, 2)
}

/// Distinct non-blank labels of a classification target.
fn target_class_count(df: &DataFrame, target: &str) -> Result<usize> {
    let labels: BTreeSet<String> = read_text(df, target, false)?
        .into_iter()
        .flatten()
        .map(|label| label.trim().to_string())
        .collect();
    Ok(labels.len())
}

/// Sorted distinct values of an encoded classification target.
fn distinct_classes(target_values: &[f64]) -> Vec<f64> {
    let mut classes: Vec<f64> = target_values.iter().copied().filter(|v| v.is_finite()).collect();
    classes.sort_by(f64::total_cmp);
    classes.dedup();
    classes
}

// =============================================================================
// Fitted pieces
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum NumericImputer {
    Statistical(StatisticalImputer),
    Knn(KNNImputer),
}

impl NumericImputer {
    fn transform(&self, columns: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
        match self {
            Self::Statistical(imputer) => imputer.transform(columns),
            Self::Knn(imputer) => imputer.transform(columns),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedNumeric {
    imputer: NumericImputer,
    capper: Option<IqrCapper>,
    /// Indices into the numeric columns that get a squared term.
    polynomial: Vec<usize>,
    scaler: FittedScaler,
}

impl FittedNumeric {
    fn fit(plan: &NumericPlan, raw: &[Vec<Option<f64>>]) -> Self {
        let imputer = match plan.imputation {
            NumericImputation::Mean => NumericImputer::Statistical(StatisticalImputer::fit_mean(raw)),
            NumericImputation::Median => {
                NumericImputer::Statistical(StatisticalImputer::fit_median(raw))
            }
            NumericImputation::Knn => NumericImputer::Knn(KNNImputer::fit(plan.knn_neighbors, raw)),
        };
        let mut columns = imputer.transform(raw);

        let capper = plan.cap_outliers.then(|| IqrCapper::fit(&columns, IQR_MULTIPLIER));
        if let Some(capper) = &capper {
            let capped = capper.transform(&mut columns);
            debug!("Capped {} numeric values at the IQR fences", capped);
        }

        let polynomial: Vec<usize> = plan
            .polynomial_columns
            .iter()
            .filter_map(|name| plan.columns.iter().position(|c| c == name))
            .collect();
        append_squares(&mut columns, &polynomial);

        let scaler = FittedScaler::fit(plan.scaling, &columns);

        Self {
            imputer,
            capper,
            polynomial,
            scaler,
        }
    }

    fn transform(&self, raw: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
        let mut columns = self.imputer.transform(raw);
        if let Some(capper) = &self.capper {
            capper.transform(&mut columns);
        }
        append_squares(&mut columns, &self.polynomial);
        self.scaler.transform(&mut columns);
        columns
    }
}

fn append_squares(columns: &mut Vec<Vec<f64>>, indices: &[usize]) {
    for &i in indices {
        let squared = columns[i].iter().map(|v| v * v).collect();
        columns.push(squared);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct FittedCategorical {
    imputer: CategoricalImputer,
    encoder: FittedEncoder,
}

// =============================================================================
// Preprocessor
// =============================================================================

/// Builds and fits preprocessing plans. Holds only configuration, so one
/// instance can serve any number of datasets.
#[derive(Debug, Clone, Default)]
pub struct AdaptivePreprocessor {
    config: PreprocessingConfig,
}

impl AdaptivePreprocessor {
    pub fn new(config: PreprocessingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }

    /// Resolve the plan for `df` and report the output feature names it
    /// would produce if fitted on this data.
    pub fn build_plan(
        &self,
        df: &DataFrame,
        target: &str,
        problem_type: ProblemType,
    ) -> Result<(PreprocessingPlan, Vec<String>, PlanInfo)> {
        self.config.validate()?;
        if df.column(target).is_err() {
            return Err(ProcessingError::ColumnNotFound(target.to_string()));
        }

        let mut input_features = Vec::new();
        let mut numeric = Vec::new();
        let mut categorical = Vec::new();
        let mut boolean = Vec::new();
        let mut datetime_columns = Vec::new();
        let mut dropped = Vec::new();
        let mut missing_percentages = BTreeMap::new();
        let mut outlier_percentages = BTreeMap::new();
        let mut cardinalities = BTreeMap::new();

        for column in df.get_columns() {
            let name = column.name().to_string();
            if name == target {
                continue;
            }
            input_features.push(name.clone());
            let series = column.as_materialized_series();
            missing_percentages.insert(name.clone(), missing_percentage(series));

            match infer_column_kind(series, DATETIME_PROBE)? {
                ColumnKind::Numerical => {
                    let values: Vec<f64> = read_numeric(df, &name)?.into_iter().flatten().collect();
                    let pct = statistics::outlier_percentage(&values, IQR_MULTIPLIER);
                    outlier_percentages.insert(name.clone(), round_to(pct, 2));
                    numeric.push(name);
                }
                kind @ (ColumnKind::Categorical | ColumnKind::Boolean) => {
                    let is_boolean = kind == ColumnKind::Boolean;
                    let values = read_text(df, &name, is_boolean)?;
                    let distinct: BTreeSet<&String> = values.iter().flatten().collect();
                    cardinalities.insert(name.clone(), distinct.len());
                    if is_boolean {
                        boolean.push(name.clone());
                    }
                    categorical.push(name);
                }
                ColumnKind::Datetime => datetime_columns.push(name),
                ColumnKind::Unknown => dropped.push(name),
            }
        }

        let numeric_plan = (!numeric.is_empty()).then(|| {
            let missing: Vec<f64> = numeric.iter().map(|c| missing_percentages[c]).collect();
            let outliers: Vec<f64> = numeric.iter().map(|c| outlier_percentages[c]).collect();
            let polynomial_columns = if self.config.feature_engineering {
                numeric
                    .iter()
                    .take(self.config.max_polynomial_features)
                    .cloned()
                    .collect()
            } else {
                Vec::new()
            };
            NumericPlan {
                imputation: choose_numeric_imputation(
                    self.config.numeric_imputation,
                    &missing,
                    df.height(),
                ),
                knn_neighbors: self.config.knn_neighbors,
                cap_outliers: choose_outlier_capping(
                    self.config.outlier_treatment,
                    &outliers,
                    self.config.outlier_threshold,
                ),
                polynomial_columns,
                scaling: choose_scaling(self.config.scaling, &outliers),
                columns: numeric.clone(),
            }
        });

        let categorical_plan = (!categorical.is_empty()).then(|| {
            let cards: Vec<usize> = categorical.iter().map(|c| cardinalities[c]).collect();
            CategoricalPlan {
                imputation: choose_categorical_imputation(self.config.categorical_imputation),
                fill_value: self.config.missing_fill_value.clone(),
                encoding: choose_encoding(self.config.encoding, &cards, &self.config),
                target_smoothing: self.config.target_smoothing,
                boolean_columns: boolean,
                columns: categorical.clone(),
            }
        });

        let plan = PreprocessingPlan {
            target_column: target.to_string(),
            problem_type,
            input_features,
            numeric: numeric_plan,
            categorical: categorical_plan,
            datetime_columns: datetime_columns.clone(),
            dropped_columns: dropped.clone(),
        };

        let names = self.planned_feature_names(df, &plan)?;
        let steps = plan.steps();
        info!(
            "Preprocessing plan for '{}': {} numeric, {} categorical, {} datetime, {} dropped -> {} features",
            target,
            numeric.len(),
            categorical.len(),
            datetime_columns.len(),
            dropped.len(),
            names.len()
        );
        for step in &steps {
            debug!("Plan step: {}", step);
        }

        let info = PlanInfo {
            numeric_features: numeric,
            categorical_features: categorical,
            datetime_features: datetime_columns,
            dropped_features: dropped,
            total_features_before: plan.input_features.len(),
            total_features_after: names.len(),
            missing_percentages,
            outlier_percentages,
            cardinalities,
            steps,
            config_used: self.config.clone(),
        };
        Ok((plan, names, info))
    }

    fn planned_feature_names(&self, df: &DataFrame, plan: &PreprocessingPlan) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let per_class_outputs = match plan.problem_type {
            ProblemType::Classification => target_class_count(df, &plan.target_column)?,
            ProblemType::Regression => 0,
        };
        if let Some(numeric) = &plan.numeric {
            names.extend(numeric.columns.iter().cloned());
            names.extend(numeric.polynomial_columns.iter().map(|c| format!("{c}_squared")));
        }
        if let Some(categorical) = &plan.categorical {
            for column in &categorical.columns {
                if categorical.encoding == EncodingMethod::OneHot {
                    let is_boolean = categorical.boolean_columns.contains(column);
                    let mut values = read_text(df, column, is_boolean)?;
                    if values.iter().any(Option::is_none) {
                        let fill = match categorical.imputation {
                            CategoricalImputation::MostFrequent => {
                                CategoricalImputer::fit_most_frequent(
                                    std::slice::from_ref(&values),
                                    &categorical.fill_value,
                                )
                                .fill_values()[0]
                                    .clone()
                            }
                            CategoricalImputation::Constant => categorical.fill_value.clone(),
                        };
                        values.iter_mut().for_each(|v| {
                            v.get_or_insert_with(|| fill.clone());
                        });
                    }
                    let present: Vec<String> = values.into_iter().flatten().collect();
                    names.extend(
                        encoders::onehot_categories(&present)
                            .into_iter()
                            .map(|c| format!("{column}_{c}")),
                    );
                } else if categorical.encoding == EncodingMethod::Target && per_class_outputs > 2 {
                    names.extend((0..per_class_outputs).map(|k| format!("{column}_{k}")));
                } else {
                    names.push(column.clone());
                }
            }
        }
        names.extend(datetime::output_names(&plan.datetime_columns));
        Ok(names)
    }

    /// Build the plan from `df` (the training partition) and fit every step
    /// on it. `target_values` is the numeric target per row, used by target
    /// encoding.
    pub fn fit(
        &self,
        df: &DataFrame,
        target: &str,
        problem_type: ProblemType,
        target_values: &[f64],
    ) -> Result<(FittedPreprocessor, PlanInfo)> {
        if df.height() == 0 {
            return Err(ProcessingError::EmptyDataset);
        }
        if target_values.len() != df.height() {
            return Err(ProcessingError::InvalidInput(format!(
                "expected {} target values, got {}",
                df.height(),
                target_values.len()
            )));
        }

        let (plan, _, mut info) = self.build_plan(df, target, problem_type)?;

        let numeric = match &plan.numeric {
            Some(numeric_plan) => {
                let raw = numeric_plan
                    .columns
                    .iter()
                    .map(|c| read_numeric(df, c))
                    .collect::<Result<Vec<_>>>()?;
                Some(FittedNumeric::fit(numeric_plan, &raw))
            }
            None => None,
        };

        let categorical = match &plan.categorical {
            Some(categorical_plan) => {
                let raw = read_categorical(df, categorical_plan)?;
                let imputer = match categorical_plan.imputation {
                    CategoricalImputation::MostFrequent => {
                        CategoricalImputer::fit_most_frequent(&raw, &categorical_plan.fill_value)
                    }
                    CategoricalImputation::Constant => {
                        CategoricalImputer::constant(raw.len(), &categorical_plan.fill_value)
                    }
                };
                let filled = imputer.transform(&raw);
                let classes = match problem_type {
                    ProblemType::Classification => distinct_classes(target_values),
                    ProblemType::Regression => Vec::new(),
                };
                let encoder = FittedEncoder::fit(
                    categorical_plan.encoding,
                    &filled,
                    target_values,
                    &classes,
                    categorical_plan.target_smoothing,
                );
                Some(FittedCategorical { imputer, encoder })
            }
            None => None,
        };

        let datetime = if plan.datetime_columns.is_empty() {
            None
        } else {
            let raw = plan
                .datetime_columns
                .iter()
                .map(|c| read_datetime(df, c))
                .collect::<Result<Vec<_>>>()?;
            Some(DatetimeExtractor::fit(&raw))
        };

        let mut fitted = FittedPreprocessor {
            plan,
            numeric,
            categorical,
            datetime,
            feature_names_out: Vec::new(),
        };
        fitted.feature_names_out = fitted.output_names();
        info.total_features_after = fitted.feature_names_out.len();
        info!(
            "Fitted preprocessing on {} rows -> {} features",
            df.height(),
            fitted.feature_names_out.len()
        );
        Ok((fitted, info))
    }
}

fn read_categorical(df: &DataFrame, plan: &CategoricalPlan) -> Result<Vec<Vec<Option<String>>>> {
    plan.columns
        .iter()
        .map(|c| read_text(df, c, plan.boolean_columns.contains(c)))
        .collect()
}

// =============================================================================
// Fitted preprocessor
// =============================================================================

/// A plan together with everything learned while fitting it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    plan: PreprocessingPlan,
    numeric: Option<FittedNumeric>,
    categorical: Option<FittedCategorical>,
    datetime: Option<DatetimeExtractor>,
    feature_names_out: Vec<String>,
}

impl FittedPreprocessor {
    pub fn plan(&self) -> &PreprocessingPlan {
        &self.plan
    }

    /// Columns a frame must supply, in training order.
    pub fn input_features(&self) -> &[String] {
        &self.plan.input_features
    }

    pub fn feature_names_out(&self) -> &[String] {
        &self.feature_names_out
    }

    fn output_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if let Some(numeric) = &self.plan.numeric {
            names.extend(numeric.columns.iter().cloned());
            if let Some(fitted) = &self.numeric {
                names.extend(
                    fitted
                        .polynomial
                        .iter()
                        .map(|&i| format!("{}_squared", numeric.columns[i])),
                );
            }
        }
        if let (Some(plan), Some(fitted)) = (&self.plan.categorical, &self.categorical) {
            names.extend(fitted.encoder.output_names(&plan.columns));
        }
        names.extend(datetime::output_names(&self.plan.datetime_columns));
        names
    }

    /// Apply the fitted steps to `df`. Extra columns (including the target)
    /// are ignored.
    pub fn transform(&self, df: &DataFrame) -> Result<FeatureMatrix> {
        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.feature_names_out.len());

        if let (Some(plan), Some(fitted)) = (&self.plan.numeric, &self.numeric) {
            let raw = plan
                .columns
                .iter()
                .map(|c| read_numeric(df, c))
                .collect::<Result<Vec<_>>>()?;
            columns.extend(fitted.transform(&raw));
        }

        if let (Some(plan), Some(fitted)) = (&self.plan.categorical, &self.categorical) {
            let raw = read_categorical(df, plan)?;
            let filled = fitted.imputer.transform(&raw);
            columns.extend(fitted.encoder.transform(&filled));
        }

        if let Some(extractor) = &self.datetime {
            let raw = self
                .plan
                .datetime_columns
                .iter()
                .map(|c| read_datetime(df, c))
                .collect::<Result<Vec<_>>>()?;
            columns.extend(extractor.transform(&raw));
        }

        if columns.len() != self.feature_names_out.len() {
            return Err(ProcessingError::step(
                "transform",
                format!(
                    "produced {} columns, expected {}",
                    columns.len(),
                    self.feature_names_out.len()
                ),
            ));
        }

        Ok(FeatureMatrix {
            names: self.feature_names_out.clone(),
            columns,
            n_rows: df.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncodingStrategy, NumericStrategy, ScalingStrategy};

    fn training_frame() -> DataFrame {
        df! {
            "age" => [Some(25.0), Some(32.0), None, Some(41.0), Some(29.0), Some(35.0)],
            "city" => [Some("paris"), Some("rome"), Some("paris"), None, Some("oslo"), Some("rome")],
            "member" => ["YES", "no", "yes", "NO", "yes", "no"],
            "joined" => ["2024-01-01", "2024-02-10", "2024-03-16", "2024-04-01", "2024-05-05", "2024-06-30"],
            "empty" => [None::<&str>, None, None, None, None, None],
            "label" => [1, 0, 1, 0, 1, 0],
        }
        .unwrap()
    }

    fn labels() -> Vec<f64> {
        vec![1.0, 0.0, 1.0, 0.0, 1.0, 0.0]
    }

    #[test]
    fn test_build_plan_groups_columns() {
        let df = training_frame();
        let (plan, names, info) = AdaptivePreprocessor::default()
            .build_plan(&df, "label", ProblemType::Classification)
            .unwrap();

        assert_eq!(plan.input_features, vec!["age", "city", "member", "joined", "empty"]);
        assert_eq!(info.numeric_features, vec!["age"]);
        assert_eq!(info.categorical_features, vec!["city", "member"]);
        assert_eq!(info.datetime_features, vec!["joined"]);
        assert_eq!(info.dropped_features, vec!["empty"]);

        let categorical = plan.categorical.as_ref().unwrap();
        assert_eq!(categorical.encoding, EncodingMethod::OneHot);
        assert_eq!(categorical.boolean_columns, vec!["member"]);

        // "oslo" sorts first and is the dropped one-hot level
        assert_eq!(
            names,
            vec![
                "age",
                "age_squared",
                "city_paris",
                "city_rome",
                "member_yes",
                "joined_year",
                "joined_month",
                "joined_day",
                "joined_weekday",
                "joined_hour",
                "joined_is_weekend",
            ]
        );
    }

    #[test]
    fn test_fit_names_match_plan_names() {
        let df = training_frame();
        let preprocessor = AdaptivePreprocessor::default();
        let (_, planned, _) = preprocessor
            .build_plan(&df, "label", ProblemType::Classification)
            .unwrap();
        let (fitted, info) = preprocessor
            .fit(&df, "label", ProblemType::Classification, &labels())
            .unwrap();

        assert_eq!(fitted.feature_names_out(), planned.as_slice());
        assert_eq!(info.total_features_after, planned.len());
    }

    #[test]
    fn test_transform_is_idempotent() {
        let df = training_frame();
        let (fitted, _) = AdaptivePreprocessor::default()
            .fit(&df, "label", ProblemType::Classification, &labels())
            .unwrap();

        let first = fitted.transform(&df).unwrap();
        let second = fitted.transform(&df).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.n_rows, 6);
        assert!(first.columns.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_unknown_category_and_missing_numeric_at_transform() {
        let df = training_frame();
        let (fitted, _) = AdaptivePreprocessor::default()
            .fit(&df, "label", ProblemType::Classification, &labels())
            .unwrap();

        let new_rows = df! {
            "age" => [None::<f64>],
            "city" => ["tokyo"],
            "member" => ["YES"],
            "joined" => ["not a date"],
            "empty" => [None::<&str>],
        }
        .unwrap();
        let out = fitted.transform(&new_rows).unwrap();
        let row = out.row(0);
        let city = out.names.iter().position(|n| n == "city_rome").unwrap();
        let member = out.names.iter().position(|n| n == "member_yes").unwrap();
        assert_eq!(row[city], 0.0);
        assert_eq!(row[member], 1.0);
        assert!(row.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_non_numeric_value_is_conversion_error() {
        let df = training_frame();
        let (fitted, _) = AdaptivePreprocessor::default()
            .fit(&df, "label", ProblemType::Classification, &labels())
            .unwrap();

        let bad = df! {
            "age" => ["forty"],
            "city" => ["rome"],
            "member" => ["no"],
            "joined" => ["2024-01-01"],
        }
        .unwrap();
        let err = fitted.transform(&bad).unwrap_err();
        assert_eq!(err.error_code(), "TYPE_CONVERSION_FAILED");
    }

    #[test]
    fn test_missing_column_at_transform() {
        let df = training_frame();
        let (fitted, _) = AdaptivePreprocessor::default()
            .fit(&df, "label", ProblemType::Classification, &labels())
            .unwrap();
        let partial = df.drop("city").unwrap();
        assert!(matches!(
            fitted.transform(&partial),
            Err(ProcessingError::ColumnNotFound(c)) if c == "city"
        ));
    }

    #[test]
    fn test_overrides_are_respected() {
        let df = training_frame();
        let config = PreprocessingConfig::builder()
            .numeric_imputation(NumericStrategy::Median)
            .scaling(ScalingStrategy::None)
            .encoding(EncodingStrategy::Frequency)
            .feature_engineering(false)
            .build()
            .unwrap();
        let (fitted, _) = AdaptivePreprocessor::new(config)
            .fit(&df, "label", ProblemType::Classification, &labels())
            .unwrap();

        let plan = fitted.plan();
        let numeric = plan.numeric.as_ref().unwrap();
        assert_eq!(numeric.imputation, NumericImputation::Median);
        assert_eq!(numeric.scaling, ScalingMethod::None);
        assert!(numeric.polynomial_columns.is_empty());

        let out = fitted.transform(&df).unwrap();
        // unscaled median of [25, 32, 41, 29, 35] fills the missing age
        assert_eq!(out.columns[0][2], 32.0);
        // frequency of "rome" in training
        assert_eq!(out.columns[1][1], 2.0);
    }

    #[test]
    fn test_multiclass_target_encoding_emits_column_per_class() {
        let df = df! {
            "size" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "city" => ["paris", "rome", "oslo", "paris", "rome", "oslo"],
            "label" => ["a", "b", "c", "a", "b", "c"],
        }
        .unwrap();
        let targets = [0.0, 1.0, 2.0, 0.0, 1.0, 2.0];
        let config = PreprocessingConfig::builder()
            .encoding(EncodingStrategy::Target)
            .build()
            .unwrap();
        let preprocessor = AdaptivePreprocessor::new(config);

        let (_, planned, _) = preprocessor
            .build_plan(&df, "label", ProblemType::Classification)
            .unwrap();
        let (fitted, _) = preprocessor
            .fit(&df, "label", ProblemType::Classification, &targets)
            .unwrap();
        assert_eq!(fitted.feature_names_out(), planned.as_slice());
        for k in 0..3 {
            assert!(planned.contains(&format!("city_{k}")));
        }

        let out = fitted.transform(&df).unwrap();
        let class_a = out.names.iter().position(|n| n == "city_0").unwrap();
        // paris rows are always class "a", rome rows never are
        assert!(out.columns[class_a][0] > out.columns[class_a][1]);
        assert_eq!(out.columns[class_a][0], out.columns[class_a][3]);
    }

    #[test]
    fn test_target_not_found() {
        let df = training_frame();
        let err = AdaptivePreprocessor::default()
            .build_plan(&df, "nope", ProblemType::Regression)
            .unwrap_err();
        assert!(matches!(err, ProcessingError::ColumnNotFound(_)));
    }

    #[test]
    fn test_fitted_preprocessor_survives_json() {
        let df = training_frame();
        let (fitted, _) = AdaptivePreprocessor::default()
            .fit(&df, "label", ProblemType::Classification, &labels())
            .unwrap();
        let json = serde_json::to_string(&fitted).unwrap();
        let restored: FittedPreprocessor = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.transform(&df).unwrap(), fitted.transform(&df).unwrap());
    }
}
