//! Data profiling module for dataset analysis.
//!
//! This module provides functionality for profiling datasets, including:
//! - Type inference for columns
//! - Per-column statistics, outliers and value histograms
//! - Pairwise correlations and target leakage detection
//! - Structural validation and the data-quality composite
//!
//! Profiling never aborts because of one bad column: a column whose
//! statistics fail falls back to a minimal profile and the failure is
//! recorded in [`DatasetProfile::warnings`].

mod correlation;
pub mod statistics;
mod structure;
mod type_inference;

pub use correlation::pair_key;
pub use structure::{MAX_COLUMNS, unreadable, validate_structure};
pub use type_inference::infer_column_kind;

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::config::ProfilerConfig;
use crate::error::{ProcessingError, Result};
use crate::quality::{CellCounts, DataQualityAnalyzer};
use crate::types::{
    CategoricalStats, ColumnKind, ColumnProfile, DatasetInfo, DatasetProfile, Distribution,
    NumericStats, ValueCount,
};
use crate::utils::{
    collect_sample_values, numeric_values, parse_datetime, round_to, sorted_value_counts,
    string_values,
};

/// Values read from a column once and shared by the dataset-level steps.
struct ColumnScan {
    text: Vec<Option<String>>,
    numeric: Option<Vec<Option<f64>>>,
    invalid: usize,
}

/// Data profiler for analyzing dataset structure and characteristics.
///
/// Stateless apart from its thresholds; one instance can profile any number
/// of datasets concurrently.
#[derive(Debug, Clone, Default)]
pub struct DataProfiler {
    config: ProfilerConfig,
}

impl DataProfiler {
    pub fn new(config: ProfilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProfilerConfig {
        &self.config
    }

    /// Profile a dataset without leakage detection.
    pub fn profile(&self, df: &DataFrame) -> DatasetProfile {
        self.profile_columns(df, None)
    }

    /// Profile a dataset and check every other column for leakage into
    /// `target`.
    pub fn profile_with_target(&self, df: &DataFrame, target: Option<&str>) -> Result<DatasetProfile> {
        if let Some(name) = target
            && df.column(name).is_err()
        {
            return Err(ProcessingError::ColumnNotFound(name.to_string()));
        }
        Ok(self.profile_columns(df, target))
    }

    /// Infer the semantic kind of a single column.
    pub fn infer_type(&self, series: &Series) -> Result<ColumnKind> {
        Ok(infer_column_kind(series, self.config.datetime_probe_size)?)
    }

    fn profile_columns(&self, df: &DataFrame, target: Option<&str>) -> DatasetProfile {
        info!(rows = df.height(), columns = df.width(), "Profiling dataset");

        let structure = validate_structure(df);
        if !structure.is_valid {
            warn!(issues = ?structure.issues, "Dataset has structural issues");
        }

        let mut warnings = Vec::new();
        let mut column_profiles = Vec::with_capacity(df.width());
        let mut scans = Vec::with_capacity(df.width());

        for column in df.get_columns() {
            let series = column.as_materialized_series();
            match self.profile_column(series, df.height()) {
                Ok((profile, scan)) => {
                    column_profiles.push(profile);
                    scans.push(Some(scan));
                }
                Err(e) => {
                    warn!(column = %series.name(), error = %e, "Column statistics failed, using minimal profile");
                    warnings.push(format!("Column '{}': {e}", series.name()));
                    column_profiles.push(minimal_profile(series, df.height()));
                    scans.push(None);
                }
            }
        }

        let duplicate_rows = match count_duplicates(df) {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Duplicate detection failed");
                warnings.push(format!("Duplicate detection: {e}"));
                0
            }
        };

        let numeric_columns: Vec<(String, Vec<Option<f64>>)> = column_profiles
            .iter()
            .zip(&scans)
            .filter(|(p, _)| p.inferred_type == ColumnKind::Numerical)
            .filter_map(|(p, scan)| {
                let values = scan.as_ref()?.numeric.clone()?;
                Some((p.name.clone(), values))
            })
            .collect();
        let correlations =
            correlation::numeric_correlations(&numeric_columns, self.config.correlation_threshold);
        debug!(pairs = correlations.len(), "Correlations computed");

        let leakage_warnings = match target {
            Some(target) => self.leakage(target, &column_profiles, &scans, &mut warnings),
            None => Vec::new(),
        };

        let missing_values_total: usize = column_profiles.iter().map(|p| p.missing_count).sum();
        let counts = CellCounts {
            rows: df.height(),
            columns: df.width(),
            missing: missing_values_total,
            duplicate_rows,
            invalid: scans.iter().flatten().map(|s| s.invalid).sum(),
        };
        let data_quality = DataQualityAnalyzer::score(counts, &column_profiles);

        let count_kind = |kind: ColumnKind| {
            column_profiles
                .iter()
                .filter(|p| p.inferred_type == kind)
                .count()
        };
        let dataset_info = DatasetInfo {
            rows: df.height(),
            columns: df.width(),
            memory_usage_bytes: df.estimated_size(),
            missing_values_total,
            duplicate_rows,
            numerical_columns: count_kind(ColumnKind::Numerical),
            categorical_columns: count_kind(ColumnKind::Categorical),
            datetime_columns: count_kind(ColumnKind::Datetime),
            boolean_columns: count_kind(ColumnKind::Boolean),
        };

        info!(
            quality = round_to(data_quality.score, 1),
            grade = ?data_quality.grade,
            leakage = leakage_warnings.len(),
            "Profiling complete"
        );

        DatasetProfile {
            dataset_info,
            column_profiles,
            correlations,
            data_quality,
            leakage_warnings,
            structure,
            warnings,
        }
    }

    fn profile_column(&self, series: &Series, rows: usize) -> Result<(ColumnProfile, ColumnScan)> {
        let inferred_type = self.infer_type(series)?;
        let text = string_values(series)?;
        let counts = sorted_value_counts(&text);

        let missing_count = series.null_count();
        let present = rows.saturating_sub(missing_count);
        let unique_count = counts.len();
        let top_count = counts.first().map(|(_, c)| *c).unwrap_or(0);

        let is_constant =
            present == 0 || top_count as f64 / present as f64 > self.config.constant_ratio;
        let is_high_cardinality =
            rows > 0 && unique_count as f64 / rows as f64 > self.config.high_cardinality_ratio;

        let mut numeric = None;
        let mut numeric_stats = None;
        let mut categorical = None;
        let mut invalid = 0;

        match inferred_type {
            ColumnKind::Numerical => {
                let values = numeric_values(series)?;
                let finite = values.iter().flatten().count();
                invalid = present.saturating_sub(finite);
                numeric_stats = Some(self.numeric_stats(&values));
                numeric = Some(values);
            }
            ColumnKind::Categorical | ColumnKind::Boolean => {
                categorical = Some(self.categorical_stats(&text, &counts));
            }
            ColumnKind::Datetime => {
                if series.dtype().is_string() {
                    invalid = text
                        .iter()
                        .flatten()
                        .filter(|v| parse_datetime(v).is_none())
                        .count();
                }
            }
            ColumnKind::Unknown => {}
        }

        let profile = ColumnProfile {
            name: series.name().to_string(),
            dtype: format!("{:?}", series.dtype()),
            inferred_type,
            unique_count,
            missing_count,
            null_percentage: null_percentage(missing_count, rows),
            is_high_cardinality,
            is_constant,
            sample_values: collect_sample_values(series, self.config.sample_size),
            numeric: numeric_stats,
            categorical,
        };

        Ok((profile, ColumnScan { text, numeric, invalid }))
    }

    fn numeric_stats(&self, values: &[Option<f64>]) -> NumericStats {
        let present: Vec<f64> = values.iter().flatten().copied().collect();
        let sorted = statistics::sorted(&present);
        let skewness = statistics::skewness(&present);
        let outliers = statistics::detect_outliers(values, self.config.iqr_multiplier);

        NumericStats {
            mean: statistics::mean(&present),
            std: statistics::std_dev(&present),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            median: statistics::quantile_sorted(&sorted, 0.5),
            q1: statistics::quantile_sorted(&sorted, 0.25),
            q3: statistics::quantile_sorted(&sorted, 0.75),
            skewness,
            outlier_count: outliers.len(),
            outlier_indices: outliers
                .into_iter()
                .take(self.config.max_outlier_indices)
                .collect(),
            distribution: skewness.map(Distribution::from_skewness),
        }
    }

    fn categorical_stats(&self, text: &[Option<String>], counts: &[(String, usize)]) -> CategoricalStats {
        let frequencies: Vec<usize> = counts.iter().map(|(_, c)| *c).collect();
        let imbalance_ratio = match (frequencies.first(), frequencies.last()) {
            (Some(max), Some(min)) if *min > 0 => Some(*max as f64 / *min as f64),
            _ => None,
        };
        let lengths: Vec<f64> = text
            .iter()
            .flatten()
            .map(|v| v.chars().count() as f64)
            .collect();

        CategoricalStats {
            top_values: counts
                .iter()
                .take(self.config.top_values)
                .map(|(value, count)| ValueCount {
                    value: value.clone(),
                    count: *count,
                })
                .collect(),
            most_frequent: counts.first().map(|(v, _)| v.clone()),
            frequency_of_top: frequencies.first().copied().unwrap_or(0),
            entropy: statistics::entropy(&frequencies),
            imbalance_ratio,
            average_length: statistics::mean(&lengths),
        }
    }

    fn leakage(
        &self,
        target: &str,
        profiles: &[ColumnProfile],
        scans: &[Option<ColumnScan>],
        warnings: &mut Vec<String>,
    ) -> Vec<crate::types::LeakageWarning> {
        let Some(target_index) = profiles.iter().position(|p| p.name == target) else {
            return Vec::new();
        };
        let Some(target_scan) = &scans[target_index] else {
            warnings.push(format!("Leakage detection skipped: target '{target}' could not be read"));
            return Vec::new();
        };

        let candidates: Vec<(String, Vec<Option<String>>, Option<Vec<Option<f64>>>)> = profiles
            .iter()
            .zip(scans)
            .filter(|(p, _)| p.name != target)
            .filter_map(|(p, scan)| {
                let scan = scan.as_ref()?;
                Some((p.name.clone(), scan.text.clone(), scan.numeric.clone()))
            })
            .collect();

        let found = correlation::detect_leakage(
            target,
            &target_scan.text,
            target_scan.numeric.as_deref(),
            &candidates,
            self.config.leakage_threshold,
        );
        for warning in &found {
            warn!(column = %warning.column, target, "Potential target leakage");
        }
        found
    }
}

fn null_percentage(missing: usize, rows: usize) -> f64 {
    if rows == 0 {
        0.0
    } else {
        missing as f64 / rows as f64 * 100.0
    }
}

fn count_duplicates(df: &DataFrame) -> PolarsResult<usize> {
    if df.width() == 0 {
        return Ok(0);
    }
    let unique = df.unique::<&str, &str>(None, UniqueKeepStrategy::First, None)?;
    Ok(df.height() - unique.height())
}

/// Profile carrying only what can be read without statistics.
fn minimal_profile(series: &Series, rows: usize) -> ColumnProfile {
    let missing_count = series.null_count();
    ColumnProfile {
        name: series.name().to_string(),
        dtype: format!("{:?}", series.dtype()),
        inferred_type: ColumnKind::Unknown,
        unique_count: series.n_unique().unwrap_or(0),
        missing_count,
        null_percentage: null_percentage(missing_count, rows),
        is_high_cardinality: false,
        is_constant: false,
        sample_values: Vec::new(),
        numeric: None,
        categorical: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::QualityGrade;

    fn profiler() -> DataProfiler {
        DataProfiler::default()
    }

    #[test]
    fn test_profile_basic_shape() {
        let df = df!(
            "age" => &[25i64, 32, 47, 51, 62],
            "city" => &["NY", "LA", "NY", "SF", "NY"]
        )
        .unwrap();
        let profile = profiler().profile(&df);

        assert_eq!(profile.dataset_info.rows, 5);
        assert_eq!(profile.dataset_info.numerical_columns, 1);
        assert_eq!(profile.dataset_info.categorical_columns, 1);
        assert_eq!(profile.column_profiles[0].name, "age");
        assert!(profile.structure.is_valid);

        let city = profile.column("city").unwrap();
        let stats = city.categorical.as_ref().unwrap();
        assert_eq!(stats.most_frequent.as_deref(), Some("NY"));
        assert_eq!(stats.frequency_of_top, 3);
    }

    #[test]
    fn test_unique_count_excludes_nulls() {
        let df = df!("x" => &[Some("a"), None, Some("b"), None]).unwrap();
        let profile = profiler().profile(&df);
        let col = &profile.column_profiles[0];
        assert_eq!(col.unique_count, 2);
        assert_eq!(col.missing_count, 2);
        assert_eq!(col.null_percentage, 50.0);
    }

    #[test]
    fn test_constant_and_all_null_columns() {
        let constant: Vec<&str> = vec!["X"; 100];
        let empty: Vec<Option<&str>> = vec![None; 100];
        let df = df!("c" => constant, "e" => empty).unwrap();
        let profile = profiler().profile(&df);

        assert!(profile.column("c").unwrap().is_constant);
        let e = profile.column("e").unwrap();
        assert!(e.is_constant);
        assert_eq!(e.inferred_type, ColumnKind::Unknown);
        assert_eq!(profile.data_quality.consistency, 0.0);
    }

    #[test]
    fn test_outlier_indices_and_skew() {
        let df = df!("v" => &[1.0f64, 2.0, 3.0, 4.0, 100.0]).unwrap();
        let profile = profiler().profile(&df);
        let stats = profile.column_profiles[0].numeric.as_ref().unwrap();

        assert_eq!(stats.outlier_indices, vec![4]);
        assert_eq!(stats.outlier_count, 1);
        assert!(stats.skewness.unwrap().is_finite());
        assert_eq!(stats.distribution, Some(Distribution::HighlySkewed));
    }

    #[test]
    fn test_correlations_exclude_self_pairs() {
        let df = df!(
            "a" => &[1.0f64, 2.0, 3.0, 4.0, 5.0],
            "b" => &[2.0f64, 4.1, 6.0, 8.2, 10.0],
            "c" => &[5.0f64, 3.0, 4.0, 1.0, 2.0]
        )
        .unwrap();
        let profile = profiler().profile(&df);
        assert!(profile.correlations.contains_key(&pair_key("a", "b")));
        assert!(!profile.correlations.contains_key(&pair_key("b", "a")));
        assert!(profile.correlations.keys().all(|k| *k != pair_key("a", "a")));
        assert!(profile.correlations.values().all(|r| r.abs() > 0.3));
    }

    #[test]
    fn test_quality_complete_dataset() {
        let df = df!("a" => &[1i64, 2, 3], "b" => &["x", "y", "z"]).unwrap();
        let profile = profiler().profile(&df);
        assert_eq!(profile.data_quality.completeness_ratio, 1.0);
        assert_eq!(profile.data_quality.grade, QualityGrade::Excellent);
    }

    #[test]
    fn test_quality_nan_reduces_validity() {
        let df = df!("a" => &[1.0f64, f64::NAN, 3.0, 4.0]).unwrap();
        let profile = profiler().profile(&df);
        assert!(profile.data_quality.validity < 100.0);
        // NaN is not a missing cell
        assert_eq!(profile.data_quality.completeness_ratio, 1.0);
    }

    #[test]
    fn test_profile_with_unknown_target() {
        let df = df!("a" => &[1i64, 2]).unwrap();
        let err = profiler().profile_with_target(&df, Some("nope")).unwrap_err();
        assert!(matches!(err, ProcessingError::ColumnNotFound(_)));
    }

    #[test]
    fn test_leakage_detected_for_copy_of_target() {
        let df = df!(
            "y" => &["a", "b", "a", "b"],
            "y_copy" => &["a", "b", "a", "b"],
            "x" => &[1i64, 5, 2, 8]
        )
        .unwrap();
        let profile = profiler().profile_with_target(&df, Some("y")).unwrap();
        assert_eq!(profile.leakage_warnings.len(), 1);
        assert_eq!(profile.leakage_warnings[0].column, "y_copy");
    }

    #[test]
    fn test_duplicate_rows_counted() {
        let df = df!("a" => &[1i64, 1, 2], "b" => &["x", "x", "y"]).unwrap();
        let profile = profiler().profile(&df);
        assert_eq!(profile.dataset_info.duplicate_rows, 1);
        assert!(profile.data_quality.uniqueness < 100.0);
    }
}
