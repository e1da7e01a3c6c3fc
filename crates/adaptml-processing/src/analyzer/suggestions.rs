use crate::quality::has_many_outliers;
use crate::types::{
    ColumnKind, Complexity, DatasetProfile, FeatureSuggestion, FeatureSuggestionType, Priority,
    PreprocessingAction, PreprocessingSuggestion,
};

const ONEHOT_MAX_LEVELS: usize = 10;
const TARGET_ENCODING_MAX_LEVELS: usize = 50;
const TEXT_MIN_AVERAGE_LENGTH: f64 = 20.0;
const MAX_COMBINATION_COLUMNS: usize = 5;

pub(crate) const DATETIME_PARTS: [&str; 6] = ["year", "month", "day", "weekday", "hour", "is_weekend"];

pub(crate) fn feature_suggestions(profile: &DatasetProfile) -> Vec<FeatureSuggestion> {
    let mut suggestions = Vec::new();

    for col in profile.columns_of_kind(ColumnKind::Datetime) {
        suggestions.push(FeatureSuggestion {
            suggestion_type: FeatureSuggestionType::DatetimeFeatures,
            columns: vec![col.name.clone()],
            suggestion: "Extract date components (year, month, day, weekday, hour)".to_string(),
            potential_features: DATETIME_PARTS.iter().map(|p| p.to_string()).collect(),
            priority: Priority::High,
        });
    }

    let numeric = profile.columns_of_kind(ColumnKind::Numerical);
    if numeric.len() >= 2 {
        suggestions.push(FeatureSuggestion {
            suggestion_type: FeatureSuggestionType::NumericCombinations,
            columns: numeric
                .iter()
                .take(MAX_COMBINATION_COLUMNS)
                .map(|c| c.name.clone())
                .collect(),
            suggestion: "Create ratio, difference, and interaction features".to_string(),
            potential_features: ["ratios", "differences", "products", "polynomial_features"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            priority: Priority::Medium,
        });
    }

    let categorical = profile.columns_of_kind(ColumnKind::Categorical);
    for col in &categorical {
        let (encoding, priority) = match col.unique_count {
            n if n <= ONEHOT_MAX_LEVELS => ("one_hot", Priority::High),
            n if n <= TARGET_ENCODING_MAX_LEVELS => ("target_encoding", Priority::Medium),
            _ => ("frequency_encoding", Priority::Low),
        };
        suggestions.push(FeatureSuggestion {
            suggestion_type: FeatureSuggestionType::CategoricalEncoding,
            columns: vec![col.name.clone()],
            suggestion: format!(
                "Apply {encoding} encoding ({} distinct values)",
                col.unique_count
            ),
            potential_features: Vec::new(),
            priority,
        });
    }

    for col in categorical {
        let long_text = col
            .categorical
            .as_ref()
            .and_then(|c| c.average_length)
            .is_some_and(|len| len > TEXT_MIN_AVERAGE_LENGTH);
        if long_text {
            suggestions.push(FeatureSuggestion {
                suggestion_type: FeatureSuggestionType::TextFeatures,
                columns: vec![col.name.clone()],
                suggestion: "Extract text features (length, word count, sentiment)".to_string(),
                potential_features: ["text_length", "word_count", "char_count", "sentiment_score"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                priority: Priority::Medium,
            });
        }
    }

    suggestions
}

pub(crate) fn preprocessing_suggestions(
    profile: &DatasetProfile,
    outlier_ratio: f64,
) -> Vec<PreprocessingSuggestion> {
    let mut suggestions = Vec::new();

    for col in profile.column_profiles.iter().filter(|c| c.missing_count > 0) {
        let pct = col.null_percentage;
        let action = if pct > 50.0 {
            PreprocessingAction::RemoveColumn
        } else if col.inferred_type == ColumnKind::Numerical {
            if pct > 10.0 {
                PreprocessingAction::MedianImputation
            } else {
                PreprocessingAction::MeanImputation
            }
        } else {
            PreprocessingAction::ModeImputation
        };
        suggestions.push(PreprocessingSuggestion {
            action,
            columns: vec![col.name.clone()],
            reason: format!("{pct:.1}% missing values"),
            priority: if pct > 20.0 {
                Priority::High
            } else {
                Priority::Medium
            },
        });
    }

    let numeric = profile.columns_of_kind(ColumnKind::Numerical);
    if numeric.len() > 1 {
        let scales_vary = numeric.iter().any(|c| {
            let Some(stats) = &c.numeric else {
                return false;
            };
            match (stats.min, stats.max) {
                (Some(min), Some(max)) => {
                    let range = max - min;
                    range > 1000.0 || range < 0.01
                }
                _ => false,
            }
        });
        if scales_vary {
            suggestions.push(PreprocessingSuggestion {
                action: PreprocessingAction::StandardScaling,
                columns: numeric.iter().map(|c| c.name.clone()).collect(),
                reason: "Features have different scales".to_string(),
                priority: Priority::High,
            });
        }
    }

    let rows = profile.dataset_info.rows;
    for col in numeric {
        if has_many_outliers(col, rows, outlier_ratio) {
            suggestions.push(PreprocessingSuggestion {
                action: PreprocessingAction::IqrCapping,
                columns: vec![col.name.clone()],
                reason: "Outliers detected".to_string(),
                priority: Priority::Medium,
            });
        }
    }

    suggestions
}

pub(crate) fn complexity(suggestions: &[PreprocessingSuggestion]) -> Complexity {
    let high = suggestions
        .iter()
        .filter(|s| s.priority == Priority::High)
        .count();
    match suggestions.len() {
        0 => Complexity::Minimal,
        n if high == 0 && n <= 3 => Complexity::Low,
        n if high <= 2 && n <= 6 => Complexity::Moderate,
        _ => Complexity::High,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suggestion(priority: Priority) -> PreprocessingSuggestion {
        PreprocessingSuggestion {
            action: PreprocessingAction::MeanImputation,
            columns: vec!["a".to_string()],
            reason: String::new(),
            priority,
        }
    }

    #[test]
    fn test_complexity_levels() {
        assert_eq!(complexity(&[]), Complexity::Minimal);
        assert_eq!(complexity(&[suggestion(Priority::Medium)]), Complexity::Low);
        assert_eq!(
            complexity(&[suggestion(Priority::High), suggestion(Priority::Medium)]),
            Complexity::Moderate
        );
        let many: Vec<_> = (0..7).map(|_| suggestion(Priority::Medium)).collect();
        assert_eq!(complexity(&many), Complexity::High);
    }
}
