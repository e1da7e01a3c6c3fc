//! Gradient-boosted trees with Newton leaf values.
//!
//! Each round fits a regression tree to the negative gradient on a row
//! subsample, then replaces every leaf with `-G / (H + lambda)` over the
//! rows that reached it. Squared loss for regression, logistic loss for
//! binary targets, softmax with one tree per class for multiclass.

use std::collections::HashMap;

use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeParams};
use super::{Estimator, Task, argmax, check_width, sigmoid, softmax};
use crate::error::{LearningError, Result};

const MIN_HESSIAN: f64 = 1e-6;
const PROB_CLIP: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    /// Shrinkage applied to each round.
    pub learning_rate: f64,
    /// Fraction of rows sampled per round.
    pub subsample: f64,
    /// L2 penalty on leaf values.
    pub reg_lambda: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    task: Task,
    params: BoostingParams,
    seed: u64,
    base_score: Vec<f64>,
    /// One entry per round, one tree per output.
    rounds: Vec<Vec<DecisionTree>>,
    n_features: usize,
}

impl GradientBoosting {
    pub fn new(task: Task, params: BoostingParams, seed: u64) -> Self {
        Self {
            task,
            params,
            seed,
            base_score: Vec::new(),
            rounds: Vec::new(),
            n_features: 0,
        }
    }

    fn n_outputs(&self) -> usize {
        match self.task {
            Task::Classification { n_classes } if n_classes > 2 => n_classes,
            _ => 1,
        }
    }

    fn initial_scores(&self, y: &Array1<f64>) -> Vec<f64> {
        let n = y.len().max(1) as f64;
        match self.task {
            Task::Regression => vec![y.sum() / n],
            Task::Classification { n_classes } if n_classes > 2 => (0..n_classes)
                .map(|k| {
                    let share = y.iter().filter(|&&v| v as usize == k).count() as f64 / n;
                    share.clamp(PROB_CLIP, 1.0).ln()
                })
                .collect(),
            Task::Classification { .. } => {
                let p = (y.iter().filter(|&&v| v >= 0.5).count() as f64 / n).clamp(PROB_CLIP, 1.0 - PROB_CLIP);
                vec![(p / (1.0 - p)).ln()]
            }
        }
    }

    /// Gradient and hessian of the loss for output `k` of one row.
    fn grad_hess(&self, scores: ArrayView1<f64>, target: f64, k: usize) -> (f64, f64) {
        match self.task {
            Task::Regression => (scores[0] - target, 1.0),
            Task::Classification { n_classes } if n_classes > 2 => {
                let mut p = scores.to_vec();
                softmax(&mut p);
                let indicator = if target as usize == k { 1.0 } else { 0.0 };
                (p[k] - indicator, (p[k] * (1.0 - p[k])).max(MIN_HESSIAN))
            }
            Task::Classification { .. } => {
                let p = sigmoid(scores[0]);
                (p - target, (p * (1.0 - p)).max(MIN_HESSIAN))
            }
        }
    }

    fn raw_scores(&self, x: &Array2<f64>) -> Array2<f64> {
        let outputs = self.n_outputs();
        let mut scores = Array2::zeros((x.nrows(), outputs));
        for (i, row) in x.rows().into_iter().enumerate() {
            for k in 0..outputs {
                let boosted: f64 = self
                    .rounds
                    .iter()
                    .map(|trees| trees[k].leaf_value(row).first().copied().unwrap_or(0.0))
                    .sum();
                scores[[i, k]] = self.base_score[k] + self.params.learning_rate * boosted;
            }
        }
        scores
    }

    fn ensure_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if self.base_score.is_empty() {
            return Err(LearningError::InferenceError("gradient boosting is not fitted".to_string()));
        }
        check_width(x, self.n_features)
    }

    fn class_probabilities(&self, scores: &Array2<f64>, n_classes: usize) -> Array2<f64> {
        let mut out = Array2::zeros((scores.nrows(), n_classes.max(1)));
        for (i, row) in scores.rows().into_iter().enumerate() {
            if n_classes > 2 {
                let mut p = row.to_vec();
                softmax(&mut p);
                for (k, v) in p.into_iter().enumerate() {
                    out[[i, k]] = v;
                }
            } else if n_classes == 2 {
                let p = sigmoid(row[0]);
                out[[i, 0]] = 1.0 - p;
                out[[i, 1]] = p;
            } else {
                out[[i, 0]] = 1.0;
            }
        }
        out
    }
}

impl Estimator for GradientBoosting {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        let outputs = self.n_outputs();
        self.n_features = x.ncols();
        self.base_score = self.initial_scores(y);
        self.rounds.clear();

        let tree_params = TreeParams {
            max_depth: Some(self.params.max_depth),
            ..TreeParams::default()
        };
        let sample_size = ((n as f64 * self.params.subsample).round() as usize).clamp(1, n);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut scores = Array2::from_shape_fn((n, outputs), |(_, k)| self.base_score[k]);

        for _ in 0..self.params.n_estimators {
            let sample: Vec<usize> = if sample_size < n {
                index::sample(&mut rng, n, sample_size).into_vec()
            } else {
                (0..n).collect()
            };

            let mut round = Vec::with_capacity(outputs);
            for k in 0..outputs {
                let mut grads = vec![0.0; n];
                let mut hess = vec![0.0; n];
                for &r in &sample {
                    let (g, h) = self.grad_hess(scores.row(r), y[r], k);
                    grads[r] = g;
                    hess[r] = h;
                }
                let residuals: Vec<f64> = grads.iter().map(|g| -g).collect();

                let mut tree = DecisionTree::new(Task::Regression, tree_params, self.seed);
                tree.fit_rows(x, &residuals, &sample, &mut rng)?;

                let mut sums: HashMap<usize, (f64, f64)> = HashMap::new();
                for &r in &sample {
                    let entry = sums.entry(tree.leaf_index(x.row(r))).or_default();
                    entry.0 += grads[r];
                    entry.1 += hess[r];
                }
                for (leaf, (g, h)) in sums {
                    tree.set_leaf_value(leaf, -g / (h + self.params.reg_lambda));
                }
                round.push(tree);
            }

            for (i, row) in x.rows().into_iter().enumerate() {
                for (k, tree) in round.iter().enumerate() {
                    let step = tree.leaf_value(row).first().copied().unwrap_or(0.0);
                    scores[[i, k]] += self.params.learning_rate * step;
                }
            }
            self.rounds.push(round);
        }

        if scores.iter().any(|v| !v.is_finite()) {
            return Err(LearningError::TrainingFailed(
                "gradient boosting diverged to non-finite scores".to_string(),
            ));
        }
        tracing::debug!(rounds = self.rounds.len(), outputs, "gradient boosting fitted");
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensure_fitted(x)?;
        let scores = self.raw_scores(x);
        Ok(match self.task {
            Task::Regression => scores.column(0).to_owned(),
            Task::Classification { n_classes } => self
                .class_probabilities(&scores, n_classes)
                .rows()
                .into_iter()
                .map(|row| argmax(&row.to_vec()) as f64)
                .collect(),
        })
    }

    fn supports_importance(&self) -> bool {
        true
    }

    fn importance(&self) -> Option<Vec<f64>> {
        if self.rounds.is_empty() {
            return None;
        }
        let mut total = vec![0.0; self.n_features];
        for tree in self.rounds.iter().flatten() {
            for (acc, v) in total.iter_mut().zip(tree.importance().unwrap_or_default()) {
                *acc += v;
            }
        }
        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            total.iter_mut().for_each(|v| *v /= sum);
        }
        Some(total)
    }

    fn supports_probabilities(&self) -> bool {
        matches!(self.task, Task::Classification { .. })
    }

    fn probabilities(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        let Task::Classification { n_classes } = self.task else {
            return Ok(None);
        };
        self.ensure_fitted(x)?;
        Ok(Some(self.class_probabilities(&self.raw_scores(x), n_classes)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::r2_score;

    fn params(n_estimators: usize) -> BoostingParams {
        BoostingParams {
            n_estimators,
            max_depth: 3,
            learning_rate: 0.3,
            subsample: 1.0,
            reg_lambda: 1.0,
        }
    }

    #[test]
    fn test_regression_fits_linear_trend() {
        let x = Array2::from_shape_fn((50, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| 2.0 * v + 1.0);
        let mut model = GradientBoosting::new(Task::Regression, params(50), 0);
        model.fit(&x, &y).unwrap();
        let predictions = model.predict(&x).unwrap();
        assert!(r2_score(&y.to_vec(), &predictions.to_vec()) > 0.95);
    }

    #[test]
    fn test_binary_classification() {
        let x = Array2::from_shape_fn((30, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| if v >= 15.0 { 1.0 } else { 0.0 });
        let mut model = GradientBoosting::new(Task::Classification { n_classes: 2 }, params(20), 0);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        let proba = model.probabilities(&x).unwrap().unwrap();
        assert_eq!(proba.ncols(), 2);
        assert!(proba[[29, 1]] > 0.9);
    }

    #[test]
    fn test_multiclass_with_subsampling() {
        let x = Array2::from_shape_fn((60, 1), |(i, _)| i as f64);
        let y = x.column(0).mapv(|v| (v / 20.0).floor());
        let mut model = GradientBoosting::new(
            Task::Classification { n_classes: 3 },
            BoostingParams {
                subsample: 0.8,
                ..params(30)
            },
            3,
        );
        model.fit(&x, &y).unwrap();
        let predictions = model.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 57, "{correct} of 60 correct");
        let proba = model.probabilities(&x).unwrap().unwrap();
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-9);
    }
}
