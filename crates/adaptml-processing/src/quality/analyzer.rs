use crate::types::{
    ColumnKind, ColumnProfile, DataQuality, DatasetProfile, QualityAssessment, QualityGrade,
    QualityIssue, QualityIssueType, QualityLevel, Severity,
};

const COMPLETENESS_WEIGHT: f64 = 0.3;
const UNIQUENESS_WEIGHT: f64 = 0.2;
const CONSISTENCY_WEIGHT: f64 = 0.3;
const VALIDITY_WEIGHT: f64 = 0.2;

/// Cell-level counts gathered while profiling, input to [`DataQualityAnalyzer::score`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CellCounts {
    pub rows: usize,
    pub columns: usize,
    pub missing: usize,
    pub duplicate_rows: usize,
    /// Non-null cells that do not conform to their column's kind.
    pub invalid: usize,
}

pub struct DataQualityAnalyzer;

impl DataQualityAnalyzer {
    /// Weighted composite of completeness, uniqueness, consistency and
    /// validity. Every sub-score is in 0-100.
    pub fn score(counts: CellCounts, profiles: &[ColumnProfile]) -> DataQuality {
        let cells = counts.rows * counts.columns;
        let completeness_ratio = if cells == 0 {
            1.0
        } else {
            1.0 - counts.missing as f64 / cells as f64
        };

        let uniqueness = if counts.rows == 0 {
            100.0
        } else {
            (counts.rows - counts.duplicate_rows.min(counts.rows)) as f64 / counts.rows as f64
                * 100.0
        };

        let consistency = if counts.columns == 0 {
            100.0
        } else {
            let empty = profiles
                .iter()
                .filter(|p| p.inferred_type == ColumnKind::Unknown)
                .count();
            let constant = profiles
                .iter()
                .filter(|p| p.is_constant && p.inferred_type != ColumnKind::Unknown)
                .count();
            ((1.0 - (empty + constant) as f64 / counts.columns as f64) * 100.0).max(0.0)
        };

        let non_null = cells.saturating_sub(counts.missing);
        let validity = if non_null == 0 {
            100.0
        } else {
            (non_null - counts.invalid.min(non_null)) as f64 / non_null as f64 * 100.0
        };

        let completeness = completeness_ratio * 100.0;
        let score = (completeness * COMPLETENESS_WEIGHT
            + uniqueness * UNIQUENESS_WEIGHT
            + consistency * CONSISTENCY_WEIGHT
            + validity * VALIDITY_WEIGHT)
            .clamp(0.0, 100.0);

        DataQuality {
            completeness_ratio,
            completeness,
            uniqueness,
            consistency,
            validity,
            score,
            grade: QualityGrade::from_score(score),
        }
    }

    /// Issue list and penalty-based quality score used by the characterizer.
    pub fn assess(profile: &DatasetProfile, outlier_issue_ratio: f64) -> QualityAssessment {
        let info = &profile.dataset_info;
        let mut issues = Vec::new();
        let mut score = 100.0_f64;

        let missing_cols: Vec<String> = profile
            .column_profiles
            .iter()
            .filter(|p| p.missing_count > 0)
            .map(|p| p.name.clone())
            .collect();
        if !missing_cols.is_empty() {
            let cells = (info.rows * info.columns).max(1);
            let pct = info.missing_values_total as f64 / cells as f64 * 100.0;
            issues.push(QualityIssue {
                issue_type: QualityIssueType::MissingValues,
                severity: severity(pct, 20.0, 5.0),
                description: format!(
                    "Missing values in {} columns ({:.1}% total)",
                    missing_cols.len(),
                    pct
                ),
                affected_columns: missing_cols.into_iter().take(10).collect(),
                recommendation: "Consider imputation strategies or removal of high-missing columns"
                    .to_string(),
            });
            score -= pct.min(30.0);
        }

        if info.duplicate_rows > 0 && info.rows > 0 {
            let pct = info.duplicate_rows as f64 / info.rows as f64 * 100.0;
            issues.push(QualityIssue {
                issue_type: QualityIssueType::DuplicateRows,
                severity: severity(pct, 10.0, 2.0),
                description: format!("{} duplicate rows ({:.1}%)", info.duplicate_rows, pct),
                affected_columns: Vec::new(),
                recommendation: "Remove duplicate rows before training".to_string(),
            });
            score -= pct.min(20.0);
        }

        let constant_cols: Vec<String> = profile
            .column_profiles
            .iter()
            .filter(|p| p.is_constant)
            .map(|p| p.name.clone())
            .collect();
        if !constant_cols.is_empty() {
            score -= constant_cols.len() as f64 * 2.0;
            issues.push(QualityIssue {
                issue_type: QualityIssueType::ConstantColumns,
                severity: Severity::Medium,
                description: format!("{} columns with constant values", constant_cols.len()),
                affected_columns: constant_cols,
                recommendation: "Remove constant columns as they provide no information"
                    .to_string(),
            });
        }

        let high_cardinality: Vec<String> = profile
            .column_profiles
            .iter()
            .filter(|p| {
                p.inferred_type == ColumnKind::Categorical
                    && p.unique_count as f64 > info.rows as f64 * 0.8
            })
            .map(|p| p.name.clone())
            .collect();
        if !high_cardinality.is_empty() {
            score -= high_cardinality.len() as f64 * 3.0;
            issues.push(QualityIssue {
                issue_type: QualityIssueType::HighCardinalityCategorical,
                severity: Severity::Medium,
                description: format!(
                    "{} categorical columns with very high cardinality",
                    high_cardinality.len()
                ),
                affected_columns: high_cardinality,
                recommendation:
                    "Consider feature engineering or removal of high-cardinality categorical features"
                        .to_string(),
            });
        }

        let outlier_cols: Vec<String> = profile
            .column_profiles
            .iter()
            .filter(|p| has_many_outliers(p, info.rows, outlier_issue_ratio))
            .map(|p| p.name.clone())
            .collect();
        if !outlier_cols.is_empty() {
            score -= outlier_cols.len() as f64;
            issues.push(QualityIssue {
                issue_type: QualityIssueType::Outliers,
                severity: Severity::Low,
                description: format!(
                    "Potential outliers detected in {} numeric columns",
                    outlier_cols.len()
                ),
                affected_columns: outlier_cols.into_iter().take(10).collect(),
                recommendation: "Review outliers and consider outlier treatment methods"
                    .to_string(),
            });
        }

        let overall = score.clamp(0.0, 100.0);
        let recommendations = issues.iter().map(|i| recommendation_for(i.issue_type)).collect();

        QualityAssessment {
            overall_quality_score: overall,
            quality_level: QualityLevel::from_score(overall),
            issues,
            recommendations,
        }
    }
}

/// Numeric column whose outliers exceed `ratio` of its non-null values.
/// Columns with fewer than four values never qualify.
pub(crate) fn has_many_outliers(profile: &ColumnProfile, rows: usize, ratio: f64) -> bool {
    let Some(stats) = &profile.numeric else {
        return false;
    };
    let present = rows.saturating_sub(profile.missing_count);
    present >= 4 && stats.outlier_count as f64 > present as f64 * ratio
}

fn severity(pct: f64, high: f64, medium: f64) -> Severity {
    if pct > high {
        Severity::High
    } else if pct > medium {
        Severity::Medium
    } else {
        Severity::Low
    }
}

fn recommendation_for(issue: QualityIssueType) -> String {
    match issue {
        QualityIssueType::MissingValues => "Handle missing values through imputation or removal",
        QualityIssueType::DuplicateRows => "Remove duplicate rows to avoid data leakage",
        QualityIssueType::ConstantColumns => {
            "Remove constant columns as they provide no predictive value"
        }
        QualityIssueType::HighCardinalityCategorical => {
            "Apply feature engineering to high-cardinality categorical variables"
        }
        QualityIssueType::Outliers => "Review and treat outliers appropriately",
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DatasetInfo, NumericStats, StructureReport};
    use std::collections::BTreeMap;

    fn column(name: &str, kind: ColumnKind, missing: usize, unique: usize) -> ColumnProfile {
        ColumnProfile {
            name: name.to_string(),
            dtype: "str".to_string(),
            inferred_type: kind,
            unique_count: unique,
            missing_count: missing,
            null_percentage: 0.0,
            is_high_cardinality: false,
            is_constant: false,
            sample_values: Vec::new(),
            numeric: None,
            categorical: None,
        }
    }

    fn profile(rows: usize, columns: Vec<ColumnProfile>, duplicates: usize) -> DatasetProfile {
        let missing = columns.iter().map(|c| c.missing_count).sum();
        let counts = CellCounts {
            rows,
            columns: columns.len(),
            missing,
            duplicate_rows: duplicates,
            invalid: 0,
        };
        DatasetProfile {
            dataset_info: DatasetInfo {
                rows,
                columns: columns.len(),
                missing_values_total: missing,
                duplicate_rows: duplicates,
                ..Default::default()
            },
            data_quality: DataQualityAnalyzer::score(counts, &columns),
            column_profiles: columns,
            correlations: BTreeMap::new(),
            leakage_warnings: Vec::new(),
            structure: StructureReport {
                is_valid: true,
                issues: Vec::new(),
            },
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_perfect_dataset_scores_full() {
        let cols = vec![column("a", ColumnKind::Numerical, 0, 10)];
        let quality = DataQualityAnalyzer::score(
            CellCounts {
                rows: 10,
                columns: 1,
                ..Default::default()
            },
            &cols,
        );
        assert_eq!(quality.completeness_ratio, 1.0);
        assert_eq!(quality.score, 100.0);
        assert_eq!(quality.grade, QualityGrade::Excellent);
    }

    #[test]
    fn test_constant_column_penalizes_consistency() {
        let mut constant = column("c", ColumnKind::Categorical, 0, 1);
        constant.is_constant = true;
        let cols = vec![column("a", ColumnKind::Numerical, 0, 10), constant];
        let quality = DataQualityAnalyzer::score(
            CellCounts {
                rows: 10,
                columns: 2,
                ..Default::default()
            },
            &cols,
        );
        assert_eq!(quality.consistency, 50.0);
        assert!(quality.score < 100.0);
    }

    #[test]
    fn test_missing_values_reduce_completeness() {
        let quality = DataQualityAnalyzer::score(
            CellCounts {
                rows: 10,
                columns: 2,
                missing: 5,
                ..Default::default()
            },
            &[],
        );
        assert!((quality.completeness_ratio - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_assess_missing_and_duplicates() {
        let cols = vec![
            column("a", ColumnKind::Numerical, 3, 7),
            column("b", ColumnKind::Categorical, 0, 2),
        ];
        let assessment = DataQualityAnalyzer::assess(&profile(10, cols, 1), 0.05);

        // 3 of 20 cells missing (15%), 1 of 10 rows duplicated (10%)
        assert_eq!(assessment.issues.len(), 2);
        assert_eq!(assessment.issues[0].issue_type, QualityIssueType::MissingValues);
        assert_eq!(assessment.issues[0].severity, Severity::Medium);
        assert_eq!(assessment.issues[1].severity, Severity::Medium);
        assert!((assessment.overall_quality_score - 75.0).abs() < 1e-9);
        assert_eq!(assessment.quality_level, QualityLevel::Good);
        assert_eq!(assessment.recommendations.len(), 2);
    }

    #[test]
    fn test_assess_outliers_need_enough_values() {
        let mut col = column("x", ColumnKind::Numerical, 0, 5);
        col.numeric = Some(NumericStats {
            outlier_count: 1,
            ..Default::default()
        });
        assert!(has_many_outliers(&col, 5, 0.05));
        assert!(!has_many_outliers(&col, 3, 0.05));
    }

    #[test]
    fn test_high_cardinality_categorical_issue() {
        let cols = vec![column("id", ColumnKind::Categorical, 0, 10)];
        let assessment = DataQualityAnalyzer::assess(&profile(10, cols, 0), 0.05);
        assert!(assessment
            .issues
            .iter()
            .any(|i| i.issue_type == QualityIssueType::HighCardinalityCategorical));
        assert_eq!(assessment.overall_quality_score, 97.0);
    }
}
