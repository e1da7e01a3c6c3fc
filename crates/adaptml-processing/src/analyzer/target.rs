//! Target column scoring and problem-type detection.

use crate::types::{ColumnKind, ColumnProfile, ProblemType, TargetRecommendation};
use crate::utils::round_to;

const CLASSIFICATION_KEYWORDS: &[&str] = &[
    "target", "label", "class", "category", "type", "status", "outcome", "result", "decision",
    "classification", "predict", "churn", "fraud", "spam", "sentiment", "approved", "rejected",
    "success", "failure", "positive", "negative", "yes", "no", "true", "false", "win", "lose",
];

const REGRESSION_KEYWORDS: &[&str] = &[
    "price", "cost", "amount", "value", "score", "rating", "revenue", "sales", "profit",
    "income", "salary", "age", "weight", "height", "temperature", "distance", "time",
    "duration", "count", "quantity", "percentage", "rate", "ratio", "index", "measure",
    "metric",
];

const IDENTIFIER_KEYWORDS: &[&str] = &[
    "id",
    "index",
    "key",
    "identifier",
    "uuid",
    "guid",
    "timestamp",
    "created_at",
    "updated_at",
    "date_created",
    "date_modified",
];

/// Keywords up to this length only match a whole name token, so `id`
/// matches `customer_id` but not `valid`.
const SHORT_KEYWORD_LEN: usize = 3;

const KEYWORD_BONUS: i32 = 30;
const IDENTIFIER_PENALTY: i32 = 50;
const HIGH_CARDINALITY_NUMERIC_BONUS: i32 = 25;
const LOW_CARDINALITY_BONUS: i32 = 20;
const MEDIUM_CARDINALITY_NUMERIC_BONUS: i32 = 15;
const BINARY_BONUS: i32 = 15;
const MANY_CLASSES_PENALTY: i32 = 10;

/// Distinct-value ceiling for a numeric column to read as class labels.
pub const MAX_CLASSIFICATION_LEVELS: usize = 10;
/// Below this distinct/non-null ratio a numeric target is treated as labels.
pub const CLASSIFICATION_UNIQUE_RATIO: f64 = 0.05;

/// Split a column name into lowercase tokens at separators and camelCase
/// boundaries.
pub(crate) fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;

    for c in name.chars() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if c.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        current.extend(c.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn matches_any(name: &str, keywords: &[&str]) -> bool {
    let lower = name.to_lowercase();
    let tokens = name_tokens(name);
    keywords.iter().any(|keyword| {
        if keyword.len() <= SHORT_KEYWORD_LEN {
            tokens.iter().any(|t| t == keyword)
        } else {
            lower.contains(keyword)
        }
    })
}

/// Column name reads like an identifier or bookkeeping field.
pub fn is_identifier_name(name: &str) -> bool {
    matches_any(name, IDENTIFIER_KEYWORDS)
}

/// Problem type suggested by the column name alone.
pub fn keyword_problem_type(name: &str) -> Option<ProblemType> {
    if matches_any(name, CLASSIFICATION_KEYWORDS) {
        Some(ProblemType::Classification)
    } else if matches_any(name, REGRESSION_KEYWORDS) {
        Some(ProblemType::Regression)
    } else {
        None
    }
}

/// Classification iff the target is non-numeric, or numeric with few
/// distinct values, or numeric with a very low distinct ratio.
pub fn problem_type_for(kind: ColumnKind, distinct: usize, non_null: usize) -> ProblemType {
    if kind != ColumnKind::Numerical {
        return ProblemType::Classification;
    }
    let unique_ratio = if non_null == 0 {
        0.0
    } else {
        distinct as f64 / non_null as f64
    };
    if distinct <= MAX_CLASSIFICATION_LEVELS || unique_ratio < CLASSIFICATION_UNIQUE_RATIO {
        ProblemType::Classification
    } else {
        ProblemType::Regression
    }
}

fn unsuitable(
    profile: &ColumnProfile,
    score: i32,
    reasons: Vec<String>,
) -> TargetRecommendation {
    TargetRecommendation {
        column: profile.name.clone(),
        suitability_score: score.clamp(0, 100) as f64,
        is_suitable: false,
        problem_type: None,
        confidence: 0.0,
        reasons,
        unique_values: profile.unique_count,
        missing_percentage: profile.null_percentage,
    }
}

/// Additive suitability score of one column as a prediction target.
pub(crate) fn assess_target(
    profile: &ColumnProfile,
    rows: usize,
    suitable_threshold: f64,
) -> TargetRecommendation {
    let mut score = 0i32;
    let mut reasons = Vec::new();
    let mut problem_type = None;
    let mut confidence = 0.0f64;

    if let Some(guess) = keyword_problem_type(&profile.name) {
        score += KEYWORD_BONUS;
        reasons.push(format!("Column name suggests {guess} problem"));
        problem_type = Some(guess);
        confidence += 0.3;
    }

    if is_identifier_name(&profile.name) {
        reasons.push("Column appears to be an identifier or metadata".to_string());
        return unsuitable(profile, score - IDENTIFIER_PENALTY, reasons);
    }

    let non_null = rows.saturating_sub(profile.missing_count);
    if non_null == 0 || profile.inferred_type == ColumnKind::Unknown {
        return unsuitable(profile, 0, vec!["Column has no data".to_string()]);
    }

    if profile.unique_count <= 1 {
        return unsuitable(profile, 0, vec!["Column has constant values".to_string()]);
    }

    let unique = profile.unique_count;
    let unique_ratio = unique as f64 / rows.max(1) as f64;

    match profile.inferred_type {
        ColumnKind::Numerical => {
            if unique_ratio > 0.9 {
                score += HIGH_CARDINALITY_NUMERIC_BONUS;
                reasons.push("High cardinality numeric suggests regression target".to_string());
                if problem_type.is_none() {
                    problem_type = Some(ProblemType::Regression);
                    confidence += 0.25;
                }
            } else if unique <= MAX_CLASSIFICATION_LEVELS {
                score += LOW_CARDINALITY_BONUS;
                reasons.push("Low cardinality numeric could be classification target".to_string());
                if problem_type.is_none() {
                    problem_type = Some(ProblemType::Classification);
                    confidence += 0.2;
                }
            } else {
                score += MEDIUM_CARDINALITY_NUMERIC_BONUS;
                reasons.push("Medium cardinality numeric suggests regression target".to_string());
                if problem_type.is_none() {
                    problem_type = Some(ProblemType::Regression);
                    confidence += 0.15;
                }
            }
        }
        ColumnKind::Categorical | ColumnKind::Boolean => {
            if unique <= 20 {
                score += LOW_CARDINALITY_BONUS;
                reasons.push("Categorical with reasonable number of classes".to_string());
                if problem_type.is_none() {
                    problem_type = Some(ProblemType::Classification);
                    confidence += 0.2;
                }
            } else {
                score -= MANY_CLASSES_PENALTY;
                reasons.push("Too many categories for typical classification".to_string());
            }
        }
        ColumnKind::Datetime | ColumnKind::Unknown => {}
    }

    if unique == 2 {
        score += BINARY_BONUS;
        reasons.push("Binary target is ideal for classification".to_string());
        problem_type = Some(ProblemType::Classification);
        confidence += 0.15;
    }

    let missing_ratio = profile.missing_ratio();
    if missing_ratio > 0.5 {
        score -= 30;
        reasons.push("Too many missing values for target variable".to_string());
    } else if missing_ratio > 0.1 {
        score -= 10;
        reasons.push("Some missing values in target".to_string());
    }

    let suitability_score = score.clamp(0, 100) as f64;
    TargetRecommendation {
        column: profile.name.clone(),
        suitability_score,
        is_suitable: suitability_score >= suitable_threshold,
        problem_type,
        confidence: round_to(confidence.min(1.0), 2),
        reasons,
        unique_values: unique,
        missing_percentage: profile.null_percentage,
    }
}
