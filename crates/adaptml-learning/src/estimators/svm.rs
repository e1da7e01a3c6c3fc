//! Linear support vector machine trained by averaged SGD.
//!
//! Classification minimizes the hinge loss one-vs-rest (a single
//! hyperplane for binary targets); regression minimizes the
//! epsilon-insensitive loss on standardized targets. The L2 penalty is
//! `1 / (C * n)`. There is no probability output.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::{Estimator, Task, argmax, check_width};
use crate::error::{LearningError, Result};

const ETA0: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvm {
    task: Task,
    c: f64,
    epsilon: f64,
    epochs: usize,
    seed: u64,
    /// One row per hyperplane.
    weights: Array2<f64>,
    bias: Array1<f64>,
    /// Regression target mean and scale.
    target_scale: (f64, f64),
}

#[derive(Clone, Copy)]
enum Loss {
    Hinge,
    EpsilonInsensitive(f64),
}

struct Sgd {
    w: Array1<f64>,
    b: f64,
    w_sum: Array1<f64>,
    b_sum: f64,
    steps: usize,
}

impl Sgd {
    fn new(p: usize) -> Self {
        Self {
            w: Array1::zeros(p),
            b: 0.0,
            w_sum: Array1::zeros(p),
            b_sum: 0.0,
            steps: 0,
        }
    }

    fn step(&mut self, row: ArrayView1<f64>, target: f64, loss: Loss, lambda: f64) {
        self.steps += 1;
        let eta = ETA0 / (1.0 + ETA0 * lambda * self.steps as f64);
        let output = self.w.dot(&row) + self.b;

        // negative gradient of the data term with respect to the output
        let direction = match loss {
            Loss::Hinge if target * output < 1.0 => target,
            Loss::EpsilonInsensitive(eps) if output - target > eps => -1.0,
            Loss::EpsilonInsensitive(eps) if target - output > eps => 1.0,
            _ => 0.0,
        };

        self.w *= 1.0 - eta * lambda;
        if direction != 0.0 {
            self.w.scaled_add(eta * direction, &row);
            self.b += eta * direction;
        }
        self.w_sum += &self.w;
        self.b_sum += self.b;
    }

    fn averaged(self) -> (Array1<f64>, f64) {
        let steps = self.steps.max(1) as f64;
        (self.w_sum / steps, self.b_sum / steps)
    }
}

impl LinearSvm {
    pub fn new(task: Task, c: f64, epsilon: f64, epochs: usize, seed: u64) -> Self {
        Self {
            task,
            c,
            epsilon,
            epochs,
            seed,
            weights: Array2::zeros((0, 0)),
            bias: Array1::zeros(0),
            target_scale: (0.0, 1.0),
        }
    }

    fn train_one(&self, x: &Array2<f64>, targets: &[f64], loss: Loss, rng: &mut StdRng) -> (Array1<f64>, f64) {
        let n = x.nrows();
        let lambda = 1.0 / (self.c * n as f64);
        let mut sgd = Sgd::new(x.ncols());
        let mut order: Vec<usize> = (0..n).collect();
        for _ in 0..self.epochs {
            order.shuffle(rng);
            for &i in &order {
                sgd.step(x.row(i), targets[i], loss, lambda);
            }
        }
        sgd.averaged()
    }

    fn decision(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.bias.is_empty() {
            return Err(LearningError::InferenceError("svm is not fitted".to_string()));
        }
        check_width(x, self.weights.ncols())?;
        Ok(x.dot(&self.weights.t()) + &self.bias)
    }
}

impl Estimator for LinearSvm {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut planes = Vec::new();

        match self.task {
            Task::Classification { n_classes } => {
                let positives: Vec<usize> = if n_classes <= 2 { vec![1] } else { (0..n_classes).collect() };
                for class in positives {
                    let signs: Vec<f64> = y
                        .iter()
                        .map(|&v| if v as usize == class { 1.0 } else { -1.0 })
                        .collect();
                    planes.push(self.train_one(x, &signs, Loss::Hinge, &mut rng));
                }
            }
            Task::Regression => {
                let mean = y.mean().unwrap_or(0.0);
                let std = y.std(0.0);
                let scale = if std > 0.0 && std.is_finite() { std } else { 1.0 };
                self.target_scale = (mean, scale);
                let scaled: Vec<f64> = y.iter().map(|v| (v - mean) / scale).collect();
                planes.push(self.train_one(x, &scaled, Loss::EpsilonInsensitive(self.epsilon), &mut rng));
            }
        }

        let p = x.ncols();
        let mut weights = Array2::zeros((planes.len(), p));
        let mut bias = Array1::zeros(planes.len());
        for (k, (w, b)) in planes.into_iter().enumerate() {
            weights.row_mut(k).assign(&w);
            bias[k] = b;
        }
        if weights.iter().chain(bias.iter()).any(|v| !v.is_finite()) {
            return Err(LearningError::TrainingFailed(
                "svm produced non-finite coefficients".to_string(),
            ));
        }
        self.weights = weights;
        self.bias = bias;
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let scores = self.decision(x)?;
        Ok(match self.task {
            Task::Classification { n_classes } if n_classes > 2 => scores
                .rows()
                .into_iter()
                .map(|row| argmax(&row.to_vec()) as f64)
                .collect(),
            Task::Classification { .. } => scores.column(0).mapv(|s| if s > 0.0 { 1.0 } else { 0.0 }),
            Task::Regression => {
                let (mean, scale) = self.target_scale;
                scores.column(0).mapv(|s| s * scale + mean)
            }
        })
    }

    fn supports_importance(&self) -> bool {
        true
    }

    fn importance(&self) -> Option<Vec<f64>> {
        self.weights.mapv(f64::abs).mean_axis(Axis(0)).map(|m| m.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_binary_hinge() {
        let x = array![[-2.0, 0.0], [-1.0, 0.5], [-1.5, -0.5], [1.0, 0.0], [2.0, 0.5], [1.5, -0.5]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut svm = LinearSvm::new(Task::Classification { n_classes: 2 }, 1.0, 0.1, 200, 42);
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.predict(&x).unwrap(), y);
        assert!(svm.probabilities(&x).unwrap().is_none());
        let importance = svm.importance().unwrap();
        assert!(importance[0] > importance[1]);
    }

    #[test]
    fn test_one_vs_rest() {
        let x = array![[0.0, 5.0], [0.2, 5.2], [5.0, 0.0], [5.2, 0.1], [-5.0, -5.0], [-5.1, -4.9]];
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0];
        let mut svm = LinearSvm::new(Task::Classification { n_classes: 3 }, 10.0, 0.1, 300, 1);
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.predict(&x).unwrap(), y);
    }

    #[test]
    fn test_regression_tracks_trend() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64 / 10.0);
        let y = x.column(0).mapv(|v| 100.0 + 30.0 * v);
        let mut svm = LinearSvm::new(Task::Regression, 10.0, 0.01, 300, 7);
        svm.fit(&x, &y).unwrap();
        let predictions = svm.predict(&x).unwrap();
        let r2 = crate::metrics::r2_score(&y.to_vec(), &predictions.to_vec());
        assert!(r2 > 0.9, "r2 = {r2}");
    }
}
