//! Algorithm recommendation, hyperparameter search and model comparison.
//!
//! [`ModelRecommender`] ranks the catalog for a problem type against the
//! dataset's characteristics and the caller's [`ModelPreferences`]. The
//! search helpers in [`search`] cross-validate candidates on a dataset.
//!
//! # Scoring
//!
//! | Signal | Points |
//! |--------|--------|
//! | best-fit dataset size | +25 (or +15 for a complexity-appropriate mismatch) |
//! | more than 50 features and `high_dimensional` | +20 |
//! | fewer than 10 features and low complexity | +10 |
//! | performance preference | +20 (high) / +10 (medium) |
//! | interpretability preference | +15 / +10 / +5 |
//! | training time at or under the preferred tier | 15 - 3 per tier of distance |
//! | >20% missing or >10% outliers, tree ensembles | +10 each |
//!
//! Totals are clamped to `[0, 100]`.

pub mod catalog;
pub mod search;

use std::collections::BTreeMap;

use adaptml_processing::{DatasetCharacteristics, DatasetSize, ProblemType};
use serde::{Deserialize, Serialize};

use crate::config::{Algorithm, Level, ModelPreferences, ParamGrid, TrainingSpeed};
use catalog::{CatalogEntry, catalog, interpretability, recommended_grid};

pub use search::{ModelComparison, RankedModel, SearchResult, compare_models, optimize_hyperparameters};

/// One ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRecommendation {
    pub algorithm: Algorithm,
    /// 0-100
    pub score: u32,
    pub reasons: Vec<String>,
    /// Rating per scoring signal, e.g. `dataset_size: excellent`.
    pub suitability_factors: BTreeMap<String, String>,
    pub complexity: Level,
    pub training_time: TrainingSpeed,
    pub best_for: Vec<String>,
    /// Search space adjusted for the dataset size.
    pub recommended_params: ParamGrid,
}

/// Ranks candidate algorithms. Stateless; share freely.
#[derive(Debug, Clone)]
pub struct ModelRecommender {
    top_k: usize,
}

impl Default for ModelRecommender {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

impl ModelRecommender {
    pub fn new(top_k: usize) -> Self {
        Self { top_k: top_k.max(1) }
    }

    /// Top candidates for `problem_type`, best first. Ties keep catalog
    /// order.
    pub fn recommend(
        &self,
        characteristics: &DatasetCharacteristics,
        problem_type: ProblemType,
        preferences: &ModelPreferences,
    ) -> Vec<ModelRecommendation> {
        let mut ranked: Vec<ModelRecommendation> = catalog(problem_type)
            .iter()
            .map(|entry| score_entry(entry, characteristics, preferences))
            .collect();
        ranked.sort_by(|a, b| b.score.cmp(&a.score));
        ranked.truncate(self.top_k);

        for rec in &ranked {
            tracing::debug!(algorithm = %rec.algorithm, score = rec.score, "model candidate scored");
        }
        if let Some(best) = ranked.first() {
            tracing::info!(
                problem_type = %problem_type,
                best = %best.algorithm,
                score = best.score,
                "models recommended"
            );
        }
        ranked
    }
}

fn score_entry(
    entry: &CatalogEntry,
    characteristics: &DatasetCharacteristics,
    preferences: &ModelPreferences,
) -> ModelRecommendation {
    let mut score: i32 = 0;
    let mut reasons = Vec::new();
    let mut factors = BTreeMap::new();
    let mut factor = |name: &str, rating: &str| {
        factors.insert(name.to_string(), rating.to_string());
    };

    let size = DatasetSize::from_rows(characteristics.n_samples);
    if entry.is_best_for(&format!("{}_data", size.as_str())) {
        score += 25;
        reasons.push(format!("Well-suited for {} datasets", size.as_str()));
        factor("dataset_size", "excellent");
    } else if size == DatasetSize::Small && entry.complexity == Level::Low {
        score += 15;
        reasons.push("Simple model appropriate for small dataset".to_string());
        factor("dataset_size", "good");
    } else if size == DatasetSize::Large && entry.complexity == Level::High {
        score += 15;
        reasons.push("Complex model can leverage large dataset".to_string());
        factor("dataset_size", "good");
    } else {
        factor("dataset_size", "fair");
    }

    let features = characteristics.n_features;
    if features > 50 && entry.is_best_for("high_dimensional") {
        score += 20;
        reasons.push("Handles high-dimensional data well".to_string());
        factor("feature_dimensionality", "excellent");
    } else if features < 10 && entry.complexity == Level::Low {
        score += 10;
        reasons.push("Appropriate for low-dimensional data".to_string());
        factor("feature_dimensionality", "good");
    } else {
        factor("feature_dimensionality", "fair");
    }

    if preferences.performance == Level::High && entry.is_best_for("high_performance") {
        score += 20;
        reasons.push("High-performance model".to_string());
        factor("performance_potential", "excellent");
    } else if preferences.performance == Level::Medium && entry.complexity == Level::Medium {
        score += 10;
        factor("performance_potential", "good");
    } else {
        factor("performance_potential", "fair");
    }

    let rating = interpretability(entry.algorithm);
    match preferences.interpretability {
        Level::High if rating >= 8 => {
            score += 15;
            reasons.push("Highly interpretable model".to_string());
            factor("interpretability", "excellent");
        }
        Level::Medium if rating >= 5 => {
            score += 10;
            factor("interpretability", "good");
        }
        Level::Low => {
            score += 5;
            factor("interpretability", "not_prioritized");
        }
        _ => factor("interpretability", "poor"),
    }

    let model_rank = entry.training_time.rank();
    let preferred_rank = preferences.training_time.rank();
    if model_rank <= preferred_rank {
        let points = 15 - (preferred_rank - model_rank) * 3;
        score += points;
        reasons.push(format!(
            "Training time ({}) matches preference",
            entry.training_time.as_str()
        ));
        factor("training_time", if points >= 12 { "excellent" } else { "good" });
    } else {
        factor("training_time", "poor");
    }

    let tree_ensemble = matches!(entry.algorithm, Algorithm::RandomForest | Algorithm::Xgboost);
    if tree_ensemble && characteristics.missing_ratio > 0.2 {
        score += 10;
        reasons.push("Handles missing values well".to_string());
        factor("missing_data_handling", "excellent");
    }
    if tree_ensemble && characteristics.outlier_ratio > 0.1 {
        score += 10;
        reasons.push("Robust to outliers".to_string());
        factor("outlier_robustness", "excellent");
    }

    ModelRecommendation {
        algorithm: entry.algorithm,
        score: score.clamp(0, 100) as u32,
        reasons,
        suitability_factors: factors,
        complexity: entry.complexity,
        training_time: entry.training_time,
        best_for: entry.best_for.iter().map(|s| s.to_string()).collect(),
        recommended_params: recommended_grid(entry.algorithm, characteristics.n_samples),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn characteristics(n_samples: usize, n_features: usize) -> DatasetCharacteristics {
        DatasetCharacteristics {
            n_samples,
            n_features,
            size: DatasetSize::from_rows(n_samples),
            numeric_features: n_features,
            categorical_features: 0,
            missing_ratio: 0.0,
            outlier_ratio: 0.0,
        }
    }

    #[test]
    fn test_small_classification_scores() {
        let recs = ModelRecommender::default().recommend(
            &characteristics(500, 5),
            ProblemType::Classification,
            &ModelPreferences::default(),
        );
        assert_eq!(recs.len(), 5);

        // logistic: size 25 + dims 10 + interpretability 10 + time 15 - 3
        let logistic = recs
            .iter()
            .find(|r| r.algorithm == Algorithm::LogisticRegression)
            .unwrap();
        assert_eq!(logistic.score, 57);
        assert_eq!(logistic.suitability_factors["dataset_size"], "excellent");

        // knn has the same profile and comes later in the catalog
        assert_eq!(recs[0].algorithm, Algorithm::LogisticRegression);
        assert_eq!(recs[1].algorithm, Algorithm::Knn);
    }

    #[test]
    fn test_ensembles_gain_for_messy_data() {
        let mut chars = characteristics(20_000, 60);
        chars.missing_ratio = 0.3;
        chars.outlier_ratio = 0.2;
        let recs = ModelRecommender::default().recommend(
            &chars,
            ProblemType::Regression,
            &ModelPreferences::default(),
        );
        let xgb = recs.iter().find(|r| r.algorithm == Algorithm::Xgboost).unwrap();
        // size 25 + performance 20 + missing 10 + outliers 10
        assert_eq!(xgb.score, 65);
        assert_eq!(recs[0].algorithm, Algorithm::Xgboost);
        assert_eq!(xgb.recommended_params["n_estimators"].len(), 3);
    }

    #[test]
    fn test_scores_are_bounded() {
        let prefs = ModelPreferences {
            interpretability: Level::Low,
            training_time: TrainingSpeed::Slow,
            performance: Level::Low,
        };
        for problem in [ProblemType::Classification, ProblemType::Regression] {
            for rec in ModelRecommender::new(10).recommend(&characteristics(10, 100), problem, &prefs) {
                assert!(rec.score <= 100);
            }
        }
    }
}
