//! Candidate algorithms per problem type and their search spaces.

use adaptml_processing::ProblemType;
use serde_json::{Value, json};

use crate::config::{Algorithm, Level, ParamGrid, TrainingSpeed};

/// What the recommender knows about one candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CatalogEntry {
    pub algorithm: Algorithm,
    /// Tags such as `small_data`, `high_dimensional`, `high_performance`.
    pub best_for: &'static [&'static str],
    pub complexity: Level,
    pub training_time: TrainingSpeed,
}

impl CatalogEntry {
    pub fn is_best_for(&self, tag: &str) -> bool {
        self.best_for.contains(&tag)
    }
}

const fn entry(
    algorithm: Algorithm,
    best_for: &'static [&'static str],
    complexity: Level,
    training_time: TrainingSpeed,
) -> CatalogEntry {
    CatalogEntry {
        algorithm,
        best_for,
        complexity,
        training_time,
    }
}

const RANDOM_FOREST: CatalogEntry = entry(
    Algorithm::RandomForest,
    &["medium_data", "non_linear", "feature_importance"],
    Level::Medium,
    TrainingSpeed::Medium,
);
const XGBOOST: CatalogEntry = entry(
    Algorithm::Xgboost,
    &["large_data", "high_performance", "competitions"],
    Level::High,
    TrainingSpeed::Slow,
);
const KNN: CatalogEntry = entry(
    Algorithm::Knn,
    &["small_data", "local_patterns", "simple_baseline"],
    Level::Low,
    TrainingSpeed::Fast,
);
const DECISION_TREE: CatalogEntry = entry(
    Algorithm::DecisionTree,
    &["interpretable", "rule_based", "baseline"],
    Level::Low,
    TrainingSpeed::Fast,
);

static CLASSIFICATION: [CatalogEntry; 7] = [
    entry(
        Algorithm::LogisticRegression,
        &["small_data", "interpretable", "linear_relationships"],
        Level::Low,
        TrainingSpeed::Fast,
    ),
    RANDOM_FOREST,
    XGBOOST,
    entry(
        Algorithm::Svm,
        &["small_data", "high_dimensional", "clear_margins"],
        Level::Medium,
        TrainingSpeed::Slow,
    ),
    KNN,
    entry(
        Algorithm::NaiveBayes,
        &["small_data", "text_classification", "baseline"],
        Level::Low,
        TrainingSpeed::VeryFast,
    ),
    DECISION_TREE,
];

static REGRESSION: [CatalogEntry; 8] = [
    entry(
        Algorithm::LinearRegression,
        &["small_data", "interpretable", "linear_relationships"],
        Level::Low,
        TrainingSpeed::VeryFast,
    ),
    entry(
        Algorithm::RidgeRegression,
        &["small_data", "regularization", "multicollinearity"],
        Level::Low,
        TrainingSpeed::Fast,
    ),
    entry(
        Algorithm::LassoRegression,
        &["feature_selection", "sparse_data", "regularization"],
        Level::Low,
        TrainingSpeed::Fast,
    ),
    RANDOM_FOREST,
    XGBOOST,
    entry(
        Algorithm::Svm,
        &["small_data", "high_dimensional", "non_linear"],
        Level::Medium,
        TrainingSpeed::Slow,
    ),
    KNN,
    DECISION_TREE,
];

/// Candidates for a problem type, in catalog order.
pub fn catalog(problem_type: ProblemType) -> &'static [CatalogEntry] {
    match problem_type {
        ProblemType::Classification => &CLASSIFICATION,
        ProblemType::Regression => &REGRESSION,
    }
}

/// Interpretability on a 1-10 scale.
pub fn interpretability(algorithm: Algorithm) -> u8 {
    match algorithm {
        Algorithm::LinearRegression => 10,
        Algorithm::RidgeRegression | Algorithm::LassoRegression | Algorithm::LogisticRegression => 9,
        Algorithm::DecisionTree => 8,
        Algorithm::NaiveBayes => 7,
        Algorithm::Knn => 6,
        Algorithm::Svm => 4,
        Algorithm::RandomForest => 3,
        Algorithm::Xgboost => 2,
    }
}

fn grid(pairs: &[(&str, Vec<Value>)]) -> ParamGrid {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

/// Full search space for an algorithm, restricted to the hyperparameters
/// its estimator accepts.
pub fn base_grid(algorithm: Algorithm) -> ParamGrid {
    let split_and_leaf = [
        ("min_samples_split", vec![json!(2), json!(5), json!(10)]),
        ("min_samples_leaf", vec![json!(1), json!(2), json!(4)]),
    ];
    match algorithm {
        Algorithm::LogisticRegression => grid(&[
            ("C", vec![json!(0.1), json!(1.0), json!(10.0), json!(100.0)]),
            ("max_iter", vec![json!(1000)]),
        ]),
        Algorithm::RidgeRegression | Algorithm::LassoRegression => {
            grid(&[("alpha", vec![json!(0.1), json!(1.0), json!(10.0), json!(100.0)])])
        }
        Algorithm::RandomForest => {
            let mut g = grid(&[
                ("n_estimators", vec![json!(50), json!(100), json!(200)]),
                ("max_depth", vec![Value::Null, json!(10), json!(20), json!(30)]),
            ]);
            g.extend(grid(&split_and_leaf));
            g
        }
        Algorithm::Xgboost => grid(&[
            ("n_estimators", vec![json!(100), json!(200), json!(300)]),
            ("max_depth", vec![json!(3), json!(6), json!(9)]),
            ("learning_rate", vec![json!(0.01), json!(0.1), json!(0.2)]),
            ("subsample", vec![json!(0.8), json!(0.9), json!(1.0)]),
        ]),
        Algorithm::Svm => grid(&[("C", vec![json!(0.1), json!(1.0), json!(10.0)])]),
        Algorithm::Knn => grid(&[
            ("n_neighbors", vec![json!(3), json!(5), json!(7), json!(9)]),
            ("weights", vec![json!("uniform"), json!("distance")]),
            ("metric", vec![json!("euclidean"), json!("manhattan")]),
        ]),
        Algorithm::DecisionTree => {
            let mut g = grid(&[("max_depth", vec![Value::Null, json!(5), json!(10), json!(20)])]);
            g.extend(grid(&split_and_leaf));
            g
        }
        Algorithm::LinearRegression | Algorithm::NaiveBayes => ParamGrid::new(),
    }
}

/// [`base_grid`] narrowed or widened for the number of rows.
pub fn recommended_grid(algorithm: Algorithm, n_rows: usize) -> ParamGrid {
    let mut g = base_grid(algorithm);
    let mut set = |key: &str, values: Vec<Value>| {
        g.insert(key.to_string(), values);
    };
    match algorithm {
        Algorithm::RandomForest if n_rows < 1_000 => {
            set("n_estimators", vec![json!(50), json!(100)]);
            set("max_depth", vec![json!(5), json!(10), Value::Null]);
        }
        Algorithm::RandomForest if n_rows > 10_000 => {
            set("n_estimators", vec![json!(100), json!(200), json!(300)]);
            set("max_depth", vec![json!(10), json!(20), json!(30), Value::Null]);
        }
        Algorithm::Xgboost if n_rows < 1_000 => {
            set("n_estimators", vec![json!(50), json!(100)]);
            set("learning_rate", vec![json!(0.1), json!(0.2)]);
        }
        Algorithm::Xgboost if n_rows > 10_000 => {
            set("n_estimators", vec![json!(200), json!(300), json!(500)]);
            set("learning_rate", vec![json!(0.01), json!(0.05), json!(0.1)]);
        }
        Algorithm::Knn if n_rows < 100 => set("n_neighbors", vec![json!(3), json!(5)]),
        Algorithm::Knn if n_rows > 1_000 => {
            set("n_neighbors", vec![json!(5), json!(7), json!(9), json!(11)]);
        }
        _ => {}
    }
    g
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalogs_only_hold_supported_algorithms() {
        for problem in [ProblemType::Classification, ProblemType::Regression] {
            for entry in catalog(problem) {
                assert!(entry.algorithm.supports(problem), "{}", entry.algorithm);
            }
        }
        assert_eq!(catalog(ProblemType::Classification).len(), 7);
        assert_eq!(catalog(ProblemType::Regression).len(), 8);
    }

    #[test]
    fn test_grid_adjusts_for_size() {
        let small = recommended_grid(Algorithm::RandomForest, 500);
        assert_eq!(small["n_estimators"], vec![json!(50), json!(100)]);
        let medium = recommended_grid(Algorithm::RandomForest, 5_000);
        assert_eq!(medium["n_estimators"].len(), 3);
        let knn = recommended_grid(Algorithm::Knn, 50);
        assert_eq!(knn["n_neighbors"], vec![json!(3), json!(5)]);
        assert!(recommended_grid(Algorithm::NaiveBayes, 50).is_empty());
    }
}
