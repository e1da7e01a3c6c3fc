//! k-nearest neighbors over the stored training matrix.

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::{Estimator, Task, argmax, check_width};
use crate::error::{LearningError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeighborWeights {
    Uniform,
    /// Inverse distance; neighbors at distance zero take all the weight.
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    Euclidean,
    Manhattan,
}

impl DistanceMetric {
    fn distance(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            DistanceMetric::Euclidean => a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum::<f64>().sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    task: Task,
    n_neighbors: usize,
    weights: NeighborWeights,
    metric: DistanceMetric,
    x_train: Array2<f64>,
    y_train: Array1<f64>,
}

impl KNearestNeighbors {
    pub fn new(task: Task, n_neighbors: usize, weights: NeighborWeights, metric: DistanceMetric) -> Self {
        Self {
            task,
            n_neighbors,
            weights,
            metric,
            x_train: Array2::zeros((0, 0)),
            y_train: Array1::zeros(0),
        }
    }

    /// `(training row, weight)` for the `k` closest rows, `k` capped at the
    /// training size.
    fn neighbors(&self, row: ArrayView1<f64>) -> Vec<(usize, f64)> {
        let mut distances: Vec<(usize, f64)> = self
            .x_train
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, train)| (i, self.metric.distance(row, train)))
            .collect();
        distances.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        distances.truncate(self.n_neighbors.min(self.x_train.nrows()));

        match self.weights {
            NeighborWeights::Uniform => distances.into_iter().map(|(i, _)| (i, 1.0)).collect(),
            NeighborWeights::Distance => {
                if distances.iter().any(|(_, d)| *d == 0.0) {
                    distances
                        .into_iter()
                        .map(|(i, d)| (i, if d == 0.0 { 1.0 } else { 0.0 }))
                        .collect()
                } else {
                    distances.into_iter().map(|(i, d)| (i, 1.0 / d)).collect()
                }
            }
        }
    }

    fn class_votes(&self, row: ArrayView1<f64>, n_classes: usize) -> Vec<f64> {
        let mut votes = vec![0.0; n_classes];
        let neighbors = self.neighbors(row);
        let total: f64 = neighbors.iter().map(|(_, w)| w).sum();
        for (i, w) in neighbors {
            if let Some(v) = votes.get_mut(self.y_train[i] as usize) {
                *v += w;
            }
        }
        if total > 0.0 {
            votes.iter_mut().for_each(|v| *v /= total);
        }
        votes
    }

    fn ensure_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if self.x_train.nrows() == 0 {
            return Err(LearningError::InferenceError("knn is not fitted".to_string()));
        }
        check_width(x, self.x_train.ncols())
    }
}

impl Estimator for KNearestNeighbors {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.x_train = x.clone();
        self.y_train = y.clone();
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensure_fitted(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| match self.task {
                Task::Classification { n_classes } => argmax(&self.class_votes(row, n_classes)) as f64,
                Task::Regression => {
                    let neighbors = self.neighbors(row);
                    let total: f64 = neighbors.iter().map(|(_, w)| w).sum();
                    if total == 0.0 {
                        return 0.0;
                    }
                    neighbors.iter().map(|(i, w)| w * self.y_train[*i]).sum::<f64>() / total
                }
            })
            .collect())
    }

    fn supports_probabilities(&self) -> bool {
        matches!(self.task, Task::Classification { .. })
    }

    fn probabilities(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        let Task::Classification { n_classes } = self.task else {
            return Ok(None);
        };
        self.ensure_fitted(x)?;
        let mut out = Array2::zeros((x.nrows(), n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (k, v) in self.class_votes(row, n_classes).into_iter().enumerate() {
                out[[i, k]] = v;
            }
        }
        Ok(Some(out))
    }
}
