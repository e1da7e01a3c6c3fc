//! Random forest: bootstrap-sampled CART trees fitted in parallel.

use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{DecisionTree, TreeParams};
use super::{Estimator, Task, argmax, check_width};
use crate::error::{LearningError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    task: Task,
    n_estimators: usize,
    params: TreeParams,
    seed: u64,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(task: Task, n_estimators: usize, params: TreeParams, seed: u64) -> Self {
        Self {
            task,
            n_estimators,
            params,
            seed,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Sampled features per split: `sqrt(p)` for classification, all of
    /// them for regression.
    fn max_features(&self, n_features: usize) -> Option<usize> {
        match self.task {
            Task::Classification { .. } => Some(((n_features as f64).sqrt().floor() as usize).max(1)),
            Task::Regression => None,
        }
    }

    fn ensure_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if self.trees.is_empty() {
            return Err(LearningError::InferenceError("random forest is not fitted".to_string()));
        }
        check_width(x, self.n_features)
    }

    /// Mean of the trees' leaf distributions.
    fn mean_probabilities(&self, x: &Array2<f64>, n_classes: usize) -> Array2<f64> {
        let mut out = Array2::zeros((x.nrows(), n_classes));
        for tree in &self.trees {
            for (i, row) in x.rows().into_iter().enumerate() {
                for (k, p) in tree.leaf_value(row).iter().enumerate().take(n_classes) {
                    out[[i, k]] += p;
                }
            }
        }
        out /= self.trees.len() as f64;
        out
    }
}

impl Estimator for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let n = x.nrows();
        self.n_features = x.ncols();
        let params = TreeParams {
            max_features: self.max_features(self.n_features),
            ..self.params
        };
        let targets = y.to_vec();

        let trees: Result<Vec<DecisionTree>> = (0..self.n_estimators)
            .into_par_iter()
            .map(|i| {
                let tree_seed = self.seed.wrapping_add(i as u64);
                let mut rng = StdRng::seed_from_u64(tree_seed);
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut tree = DecisionTree::new(self.task, params, tree_seed);
                tree.fit_rows(x, &targets, &sample, &mut rng)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        tracing::debug!(trees = self.trees.len(), "random forest fitted");
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensure_fitted(x)?;
        match self.task {
            Task::Classification { n_classes } => {
                let proba = self.mean_probabilities(x, n_classes);
                Ok(proba
                    .rows()
                    .into_iter()
                    .map(|row| argmax(&row.to_vec()) as f64)
                    .collect())
            }
            Task::Regression => {
                let mut out = Array1::zeros(x.nrows());
                for tree in &self.trees {
                    out += &tree.predict(x)?;
                }
                Ok(out / self.trees.len() as f64)
            }
        }
    }

    fn supports_importance(&self) -> bool {
        true
    }

    fn importance(&self) -> Option<Vec<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut total = vec![0.0; self.n_features];
        for tree in &self.trees {
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
        Ok(Some(self.mean_probabilities(x, n_classes)))
    }
}
