//! Dataset characterization: target recommendations, problem-type
//! detection, quality issues and preprocessing suggestions.
//!
//! Everything here is derived from a [`DatasetProfile`]; the characterizer
//! profiles the dataset itself when handed a raw frame.

mod suggestions;
mod target;

pub use target::{
    CLASSIFICATION_UNIQUE_RATIO, MAX_CLASSIFICATION_LEVELS, is_identifier_name,
    keyword_problem_type, problem_type_for,
};

use polars::prelude::*;
use tracing::{debug, info};

use crate::config::AnalyzerConfig;
use crate::error::{ProcessingError, Result};
use crate::profiler::DataProfiler;
use crate::quality::DataQualityAnalyzer;
use crate::types::{
    ColumnKind, DatasetAnalysis, DatasetCharacteristics, DatasetProfile, DatasetSize,
    ProblemType, TargetRecommendation,
};
use crate::utils::{string_values, value_counts};

/// Turns a dataset profile into recommendations.
#[derive(Debug, Clone, Default)]
pub struct DatasetCharacterizer {
    config: AnalyzerConfig,
    profiler: DataProfiler,
}

impl DatasetCharacterizer {
    pub fn new(config: AnalyzerConfig) -> Self {
        let profiler = DataProfiler::new(config.profiler.clone());
        Self { config, profiler }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Profile and characterize a dataset in one pass.
    pub fn characterize(&self, df: &DataFrame) -> Result<DatasetAnalysis> {
        if df.height() == 0 || df.width() == 0 {
            return Err(ProcessingError::EmptyDataset);
        }
        let profile = self.profiler.profile(df);
        Ok(self.characterize_profile(&profile, None))
    }

    /// Characterize an existing profile. `target`, when given, is excluded
    /// from the feature counts of the returned characteristics.
    pub fn characterize_profile(&self, profile: &DatasetProfile, target: Option<&str>) -> DatasetAnalysis {
        let (target_recommendations, total_target_candidates) = self.rank_targets(profile);
        let has_clear_target = target_recommendations
            .first()
            .is_some_and(|r| r.suitability_score > self.config.clear_target_threshold);

        let quality = DataQualityAnalyzer::assess(profile, self.config.outlier_issue_ratio);
        let feature_suggestions = suggestions::feature_suggestions(profile);
        let preprocessing_suggestions =
            suggestions::preprocessing_suggestions(profile, self.config.outlier_issue_ratio);
        let preprocessing_complexity = suggestions::complexity(&preprocessing_suggestions);

        info!(
            candidates = total_target_candidates,
            has_clear_target,
            quality = quality.overall_quality_score,
            complexity = ?preprocessing_complexity,
            "Dataset characterized"
        );

        DatasetAnalysis {
            target_recommendations,
            total_target_candidates,
            has_clear_target,
            quality,
            feature_suggestions,
            preprocessing_suggestions,
            preprocessing_complexity,
            characteristics: self.characteristics(profile, target),
        }
    }

    /// Ranked suitable target columns, best first.
    ///
    /// Equal scores keep dataset column order.
    pub fn recommend_targets(&self, df: &DataFrame) -> Vec<TargetRecommendation> {
        let profile = self.profiler.profile(df);
        self.rank_targets(&profile).0
    }

    /// Score every column of a profile as a target, suitable or not, in
    /// column order.
    pub fn score_targets(&self, profile: &DatasetProfile) -> Vec<TargetRecommendation> {
        let rows = profile.dataset_info.rows;
        profile
            .column_profiles
            .iter()
            .map(|col| {
                let mut rec = target::assess_target(col, rows, self.config.suitable_threshold);
                if let Some(ratio) = col.categorical.as_ref().and_then(|c| c.imbalance_ratio)
                    && rec.is_suitable
                    && ratio > self.config.imbalance_ratio
                {
                    rec.reasons
                        .push(format!("Classes are imbalanced ({ratio:.1}:1)"));
                }
                rec
            })
            .collect()
    }

    fn rank_targets(&self, profile: &DatasetProfile) -> (Vec<TargetRecommendation>, usize) {
        let mut suitable: Vec<TargetRecommendation> = self
            .score_targets(profile)
            .into_iter()
            .filter(|r| r.is_suitable)
            .collect();
        let total = suitable.len();
        suitable.sort_by(|a, b| b.suitability_score.total_cmp(&a.suitability_score));
        suitable.truncate(self.config.max_recommendations);
        for rec in &suitable {
            debug!(column = %rec.column, score = rec.suitability_score, "Target candidate");
        }
        (suitable, total)
    }

    /// Classification or regression for `target`, judged from its values.
    pub fn detect_problem_type(&self, df: &DataFrame, target: &str) -> Result<ProblemType> {
        detect_problem_type(df, target, self.config.profiler.datetime_probe_size)
    }

    /// Summary of a profile consumed by model recommendation.
    pub fn characteristics(&self, profile: &DatasetProfile, target: Option<&str>) -> DatasetCharacteristics {
        let info = &profile.dataset_info;
        let features: Vec<_> = profile
            .column_profiles
            .iter()
            .filter(|c| Some(c.name.as_str()) != target)
            .collect();

        let numeric: Vec<_> = features
            .iter()
            .filter(|c| c.inferred_type == ColumnKind::Numerical)
            .collect();
        let categorical_features = features
            .iter()
            .filter(|c| matches!(c.inferred_type, ColumnKind::Categorical | ColumnKind::Boolean))
            .count();

        let cells = info.rows * info.columns;
        let missing_ratio = if cells == 0 {
            0.0
        } else {
            info.missing_values_total as f64 / cells as f64
        };
        let outlier_ratio = if numeric.is_empty() {
            0.0
        } else {
            numeric.iter().map(|c| c.outlier_ratio(info.rows)).sum::<f64>() / numeric.len() as f64
        };

        DatasetCharacteristics {
            n_samples: info.rows,
            n_features: features.len(),
            size: DatasetSize::from_rows(info.rows),
            numeric_features: numeric.len(),
            categorical_features,
            missing_ratio,
            outlier_ratio,
        }
    }
}

/// Classification iff the target is non-numeric, numeric with at most ten
/// distinct values, or numeric with a distinct ratio under 5%.
pub fn detect_problem_type(df: &DataFrame, target: &str, datetime_probe: usize) -> Result<ProblemType> {
    let column = df
        .column(target)
        .map_err(|_| ProcessingError::ColumnNotFound(target.to_string()))?;
    let series = column.as_materialized_series();
    let non_null = series.len() - series.null_count();
    if non_null == 0 {
        return Err(ProcessingError::InvalidInput(format!(
            "Target column '{target}' has no values"
        )));
    }
    let kind = crate::profiler::infer_column_kind(series, datetime_probe)?;
    let distinct = value_counts(&string_values(series)?).len();
    Ok(problem_type_for(kind, distinct, non_null))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn students() -> DataFrame {
        df!(
            "age" => &[23i64, 35, 41, 29, 52, 33, 47, 38, 26, 44, 31, 58, 36, 40, 27],
            "income" => &[32000.0f64, 54000.0, 61000.0, 45000.0, 88000.0, 50000.0, 72000.0,
                          58000.0, 39000.0, 67000.0, 48000.0, 93000.0, 55000.0, 64000.0, 41000.0],
            "education" => &["hs", "bsc", "msc", "bsc", "phd", "bsc", "msc", "bsc", "hs", "msc",
                             "bsc", "phd", "bsc", "msc", "hs"],
            "target" => &[0i64, 1, 1, 0, 1, 0, 1, 1, 0, 1, 0, 1, 0, 1, 0]
        )
        .unwrap()
    }

    #[test]
    fn test_recommend_binary_target() {
        let characterizer = DatasetCharacterizer::default();
        let recs = characterizer.recommend_targets(&students());
        let target = recs.iter().find(|r| r.column == "target").unwrap();

        assert!(target.is_suitable);
        assert!(target.suitability_score >= 50.0);
        assert_eq!(target.problem_type, Some(ProblemType::Classification));
        assert!(target.reasons.iter().any(|r| r.contains("Binary")));
        assert!(recs.len() <= 5);
    }

    #[test]
    fn test_ranking_is_descending_and_stable() {
        let df = df!(
            "first" => &["a", "b", "a", "c"],
            "second" => &["a", "b", "a", "c"]
        )
        .unwrap();
        let recs = DatasetCharacterizer::default().recommend_targets(&df);
        assert_eq!(recs[0].column, "first");
        assert_eq!(recs[1].column, "second");
        assert!(recs.windows(2).all(|w| w[0].suitability_score >= w[1].suitability_score));
    }

    #[test]
    fn test_detect_problem_type() {
        let df = students();
        let characterizer = DatasetCharacterizer::default();
        assert_eq!(
            characterizer.detect_problem_type(&df, "target").unwrap(),
            ProblemType::Classification
        );
        assert_eq!(
            characterizer.detect_problem_type(&df, "income").unwrap(),
            ProblemType::Regression
        );
        assert_eq!(
            characterizer.detect_problem_type(&df, "education").unwrap(),
            ProblemType::Classification
        );
        assert!(matches!(
            characterizer.detect_problem_type(&df, "missing"),
            Err(ProcessingError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn test_characterize_bundle() {
        let analysis = DatasetCharacterizer::default()
            .characterize(&students())
            .unwrap();
        assert_eq!(analysis.characteristics.n_samples, 15);
        assert_eq!(analysis.characteristics.size, DatasetSize::Small);
        assert!(analysis.total_target_candidates >= analysis.target_recommendations.len());
        assert!(analysis
            .feature_suggestions
            .iter()
            .any(|s| s.columns.contains(&"education".to_string())));
    }

    #[test]
    fn test_characteristics_exclude_target() {
        let characterizer = DatasetCharacterizer::default();
        let profile = DataProfiler::default().profile(&students());
        let c = characterizer.characteristics(&profile, Some("target"));
        assert_eq!(c.n_features, 3);
        assert_eq!(c.numeric_features, 2);
        assert_eq!(c.categorical_features, 1);
    }

    #[test]
    fn test_empty_dataset_rejected() {
        let result = DatasetCharacterizer::default().characterize(&DataFrame::empty());
        assert!(matches!(result, Err(ProcessingError::EmptyDataset)));
    }
}
