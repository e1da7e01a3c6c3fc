//! Native estimators.
//!
//! Every algorithm token maps to one estimator here, all trained on dense
//! `f64` matrices produced by the fitted preprocessor. Classification
//! targets are class indices stored as `f64` (`0.0 .. n_classes`).
//!
//! [`Model`] is the serializable union persisted inside artifacts;
//! [`build_model`] turns an algorithm token plus hyperparameters into an
//! unfitted `Model`.

mod boosting;
mod forest;
mod knn;
mod linear;
mod naive_bayes;
mod params;
mod svm;
mod tree;

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::RandomForest;
pub use knn::{DistanceMetric, KNearestNeighbors, NeighborWeights};
pub use linear::{Lasso, LinearRegression, LogisticRegression};
pub use naive_bayes::GaussianNaiveBayes;
pub use svm::LinearSvm;
pub use tree::{DecisionTree, TreeParams};

use adaptml_processing::{FeatureMatrix, ProblemType};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::config::{Algorithm, Hyperparameters};
use crate::error::{LearningError, Result};
use params::Params;

/// What the estimator predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    Classification { n_classes: usize },
    Regression,
}

impl Task {
    pub fn problem_type(&self) -> ProblemType {
        match self {
            Task::Classification { .. } => ProblemType::Classification,
            Task::Regression => ProblemType::Regression,
        }
    }
}

/// Trait for all estimators.
///
/// Capabilities an estimator may lack are queried, not assumed:
/// [`supports_importance`](Self::supports_importance) and
/// [`supports_probabilities`](Self::supports_probabilities).
pub trait Estimator {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Class indices (as `f64`) or regression values, one per row.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    fn supports_importance(&self) -> bool {
        false
    }

    /// One non-negative score per input column.
    fn importance(&self) -> Option<Vec<f64>> {
        None
    }

    fn supports_probabilities(&self) -> bool {
        false
    }

    /// `(rows, n_classes)` probabilities, rows summing to 1.
    fn probabilities(&self, _x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        Ok(None)
    }
}

/// A fitted (or ready-to-fit) estimator of any supported kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "estimator", rename_all = "snake_case")]
pub enum Model {
    DecisionTree(DecisionTree),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    LinearRegression(LinearRegression),
    Lasso(Lasso),
    LogisticRegression(LogisticRegression),
    LinearSvm(LinearSvm),
    Knn(KNearestNeighbors),
    NaiveBayes(GaussianNaiveBayes),
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            Model::DecisionTree($inner) => $body,
            Model::RandomForest($inner) => $body,
            Model::GradientBoosting($inner) => $body,
            Model::LinearRegression($inner) => $body,
            Model::Lasso($inner) => $body,
            Model::LogisticRegression($inner) => $body,
            Model::LinearSvm($inner) => $body,
            Model::Knn($inner) => $body,
            Model::NaiveBayes($inner) => $body,
        }
    };
}

impl Estimator for Model {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        if x.nrows() == 0 {
            return Err(LearningError::TrainingFailed("no training rows".to_string()));
        }
        if x.nrows() != y.len() {
            return Err(LearningError::TrainingFailed(format!(
                "{} feature rows but {} targets",
                x.nrows(),
                y.len()
            )));
        }
        dispatch!(self, m => m.fit(x, y))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        dispatch!(self, m => m.predict(x))
    }

    fn supports_importance(&self) -> bool {
        dispatch!(self, m => m.supports_importance())
    }

    fn importance(&self) -> Option<Vec<f64>> {
        dispatch!(self, m => m.importance())
    }

    fn supports_probabilities(&self) -> bool {
        dispatch!(self, m => m.supports_probabilities())
    }

    fn probabilities(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        dispatch!(self, m => m.probabilities(x))
    }
}

/// Build an unfitted estimator for `algorithm`.
///
/// Unknown hyperparameter keys and out-of-range values are
/// [`LearningError::InvalidConfig`]; an algorithm that cannot serve the
/// task is [`LearningError::UnsupportedAlgorithm`].
pub fn build_model(algorithm: Algorithm, task: Task, hyperparameters: &Hyperparameters, seed: u64) -> Result<Model> {
    algorithm.ensure_supports(task.problem_type())?;
    let model = match algorithm {
        Algorithm::LogisticRegression => {
            let p = Params::new(algorithm, hyperparameters, &["C", "max_iter"])?;
            let c = p.positive("C", 1.0)?;
            let max_iter = p.usize("max_iter", 1000)?;
            match task {
                Task::Classification { n_classes } => {
                    Model::LogisticRegression(LogisticRegression::new(n_classes, c, max_iter))
                }
                Task::Regression => Model::LinearRegression(LinearRegression::new(0.0)),
            }
        }
        Algorithm::LinearRegression => {
            Params::new(algorithm, hyperparameters, &[])?;
            Model::LinearRegression(LinearRegression::new(0.0))
        }
        Algorithm::RidgeRegression => {
            let p = Params::new(algorithm, hyperparameters, &["alpha"])?;
            Model::LinearRegression(LinearRegression::new(p.positive("alpha", 1.0)?))
        }
        Algorithm::LassoRegression => {
            let p = Params::new(algorithm, hyperparameters, &["alpha", "max_iter"])?;
            Model::Lasso(Lasso::new(p.positive("alpha", 1.0)?, p.usize("max_iter", 1000)?))
        }
        Algorithm::DecisionTree => {
            let p = Params::new(
                algorithm,
                hyperparameters,
                &["max_depth", "min_samples_split", "min_samples_leaf"],
            )?;
            Model::DecisionTree(DecisionTree::new(task, tree_params(&p)?, seed))
        }
        Algorithm::RandomForest => {
            let p = Params::new(
                algorithm,
                hyperparameters,
                &["n_estimators", "max_depth", "min_samples_split", "min_samples_leaf"],
            )?;
            let n_estimators = p.usize("n_estimators", 100)?;
            Model::RandomForest(RandomForest::new(task, n_estimators, tree_params(&p)?, seed))
        }
        Algorithm::Xgboost => {
            let p = Params::new(
                algorithm,
                hyperparameters,
                &["n_estimators", "max_depth", "learning_rate", "subsample"],
            )?;
            let params = BoostingParams {
                n_estimators: p.usize("n_estimators", 100)?,
                max_depth: p.usize("max_depth", 6)?,
                learning_rate: p.fraction("learning_rate", 0.3)?,
                subsample: p.fraction("subsample", 1.0)?,
                reg_lambda: 1.0,
            };
            Model::GradientBoosting(GradientBoosting::new(task, params, seed))
        }
        Algorithm::Svm => {
            let p = Params::new(algorithm, hyperparameters, &["C", "epsilon", "max_iter"])?;
            Model::LinearSvm(LinearSvm::new(
                task,
                p.positive("C", 1.0)?,
                p.positive("epsilon", 0.1)?,
                p.usize("max_iter", 200)?,
                seed,
            ))
        }
        Algorithm::Knn => {
            let p = Params::new(algorithm, hyperparameters, &["n_neighbors", "weights", "metric"])?;
            let weights = match p.choice("weights", "uniform", &["uniform", "distance"])? {
                "distance" => NeighborWeights::Distance,
                _ => NeighborWeights::Uniform,
            };
            let metric = match p.choice("metric", "euclidean", &["euclidean", "manhattan"])? {
                "manhattan" => DistanceMetric::Manhattan,
                _ => DistanceMetric::Euclidean,
            };
            Model::Knn(KNearestNeighbors::new(task, p.usize("n_neighbors", 5)?, weights, metric))
        }
        Algorithm::NaiveBayes => {
            let p = Params::new(algorithm, hyperparameters, &["var_smoothing"])?;
            let Task::Classification { n_classes } = task else {
                return Err(LearningError::UnsupportedAlgorithm {
                    algorithm: algorithm.as_str().to_string(),
                    problem_type: task.problem_type().as_str().to_string(),
                });
            };
            Model::NaiveBayes(GaussianNaiveBayes::new(n_classes, p.positive("var_smoothing", 1e-9)?))
        }
    };
    Ok(model)
}

fn tree_params(p: &Params<'_>) -> Result<TreeParams> {
    Ok(TreeParams {
        max_depth: p.optional_usize("max_depth", None)?,
        min_samples_split: p.usize("min_samples_split", 2)?.max(2),
        min_samples_leaf: p.usize("min_samples_leaf", 1)?,
        max_features: None,
    })
}

/// Dense row-major copy of a feature matrix.
pub fn to_array(matrix: &FeatureMatrix) -> Array2<f64> {
    Array2::from_shape_fn((matrix.n_rows, matrix.n_features()), |(i, j)| matrix.columns[j][i])
}

/// Index of the first maximum.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

pub(crate) fn check_width(x: &Array2<f64>, expected: usize) -> Result<()> {
    if x.ncols() != expected {
        return Err(LearningError::InferenceError(format!(
            "expected {expected} feature columns, got {}",
            x.ncols()
        )));
    }
    Ok(())
}

/// Numerically stable softmax, in place.
pub(crate) fn softmax(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut total = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        total += *v;
    }
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}
