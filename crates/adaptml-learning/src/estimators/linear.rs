//! Linear models: least squares (plain or ridge), lasso and multinomial
//! logistic regression.
//!
//! Regression models fit on centered data so the intercept is never
//! penalized.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{Estimator, argmax, check_width};
use crate::error::{LearningError, Result};

const PIVOT_TOLERANCE: f64 = 1e-10;
const JITTER: f64 = 1e-6;

struct Centered {
    x: Array2<f64>,
    y: Array1<f64>,
    x_mean: Array1<f64>,
    y_mean: f64,
}

fn center(x: &Array2<f64>, y: &Array1<f64>) -> Result<Centered> {
    let x_mean = x
        .mean_axis(Axis(0))
        .ok_or_else(|| LearningError::TrainingFailed("no training rows".to_string()))?;
    let y_mean = y.mean().unwrap_or(0.0);
    Ok(Centered {
        x: x - &x_mean,
        y: y - y_mean,
        x_mean,
        y_mean,
    })
}

fn ensure_finite(name: &str, values: &Array1<f64>, intercept: f64) -> Result<()> {
    if values.iter().all(|v| v.is_finite()) && intercept.is_finite() {
        Ok(())
    } else {
        Err(LearningError::TrainingFailed(format!(
            "{name} produced non-finite coefficients"
        )))
    }
}

/// Gaussian elimination with partial pivoting. `None` when the system is
/// (numerically) singular.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a.diag().iter().fold(1.0f64, |m, v| m.max(v.abs()));
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < PIVOT_TOLERANCE * scale {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut solution = Array1::zeros(n);
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * solution[k]).sum();
        solution[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(solution)
}

/// Ordinary least squares, or ridge when `alpha > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    alpha: f64,
    coefficients: Array1<f64>,
    intercept: f64,
}

impl LinearRegression {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha,
            coefficients: Array1::zeros(0),
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Estimator for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let data = center(x, y)?;
        let mut gram = data.x.t().dot(&data.x);
        let rhs = data.x.t().dot(&data.y);
        for j in 0..gram.nrows() {
            gram[[j, j]] += self.alpha;
        }

        let coefficients = match solve(gram.clone(), rhs.clone()) {
            Some(c) => c,
            None => {
                // collinear columns: retry with a small ridge
                let scale = gram.diag().iter().fold(1.0f64, |m, v| m.max(v.abs()));
                for j in 0..gram.nrows() {
                    gram[[j, j]] += JITTER * scale;
                }
                tracing::debug!("singular normal equations, retrying with jitter");
                solve(gram, rhs).ok_or_else(|| {
                    LearningError::TrainingFailed("normal equations are singular".to_string())
                })?
            }
        };

        self.intercept = data.y_mean - data.x_mean.dot(&coefficients);
        self.coefficients = coefficients;
        ensure_finite("linear regression", &self.coefficients, self.intercept)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_width(x, self.coefficients.len())?;
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    fn supports_importance(&self) -> bool {
        true
    }

    fn importance(&self) -> Option<Vec<f64>> {
        Some(self.coefficients.iter().map(|c| c.abs()).collect())
    }
}

/// L1-regularized least squares by cyclic coordinate descent, minimizing
/// `||y - Xw||² / (2n) + alpha * ||w||₁`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lasso {
    alpha: f64,
    max_iter: usize,
    coefficients: Array1<f64>,
    intercept: f64,
}

impl Lasso {
    const TOLERANCE: f64 = 1e-6;

    pub fn new(alpha: f64, max_iter: usize) -> Self {
        Self {
            alpha,
            max_iter,
            coefficients: Array1::zeros(0),
            intercept: 0.0,
        }
    }

    pub fn coefficients(&self) -> &Array1<f64> {
        &self.coefficients
    }
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

impl Estimator for Lasso {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let data = center(x, y)?;
        let (n, p) = data.x.dim();
        let penalty = self.alpha * n as f64;
        let norms: Vec<f64> = data.x.columns().into_iter().map(|c| c.dot(&c)).collect();

        let mut w: Array1<f64> = Array1::zeros(p);
        let mut residual = data.y.clone();
        for _ in 0..self.max_iter {
            let mut max_change = 0.0f64;
            for j in 0..p {
                if norms[j] == 0.0 {
                    continue;
                }
                let column = data.x.column(j);
                let rho = column.dot(&residual) + norms[j] * w[j];
                let updated = soft_threshold(rho, penalty) / norms[j];
                let delta = updated - w[j];
                if delta != 0.0 {
                    residual.scaled_add(-delta, &column);
                    w[j] = updated;
                    max_change = max_change.max(delta.abs());
                }
            }
            if max_change < Self::TOLERANCE {
                break;
            }
        }

        self.intercept = data.y_mean - data.x_mean.dot(&w);
        self.coefficients = w;
        ensure_finite("lasso", &self.coefficients, self.intercept)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_width(x, self.coefficients.len())?;
        Ok(x.dot(&self.coefficients) + self.intercept)
    }

    fn supports_importance(&self) -> bool {
        true
    }

    fn importance(&self) -> Option<Vec<f64>> {
        Some(self.coefficients.iter().map(|c| c.abs()).collect())
    }
}

/// Multinomial logistic regression by full-batch gradient descent with an
/// L2 penalty of strength `1 / (C * n)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    n_classes: usize,
    c: f64,
    max_iter: usize,
    /// `(n_classes, n_features)`
    weights: Array2<f64>,
    bias: Array1<f64>,
}

impl LogisticRegression {
    const LEARNING_RATE: f64 = 0.1;
    const TOLERANCE: f64 = 1e-6;

    pub fn new(n_classes: usize, c: f64, max_iter: usize) -> Self {
        Self {
            n_classes,
            c,
            max_iter,
            weights: Array2::zeros((0, 0)),
            bias: Array1::zeros(0),
        }
    }

    fn softmax_rows(&self, x: &Array2<f64>) -> Array2<f64> {
        // `dot` may hand back a column-major matrix, so rows are not
        // guaranteed to be contiguous slices.
        let mut scores = x.dot(&self.weights.t()) + &self.bias;
        for mut row in scores.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let total = row.sum();
            if total > 0.0 {
                row /= total;
            }
        }
        scores
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let (n, p) = x.dim();
        let k = self.n_classes.max(2);
        let lambda = 1.0 / (self.c * n as f64);

        let mut targets = Array2::zeros((n, k));
        for (i, &label) in y.iter().enumerate() {
            let class = label as usize;
            if class >= k {
                return Err(LearningError::TrainingFailed(format!(
                    "class index {class} outside 0..{k}"
                )));
            }
            targets[[i, class]] = 1.0;
        }

        self.weights = Array2::zeros((k, p));
        self.bias = Array1::zeros(k);
        for _ in 0..self.max_iter {
            let error = self.softmax_rows(x) - &targets;
            let grad_w = error.t().dot(x) / n as f64 + &self.weights * lambda;
            let grad_b = error.sum_axis(Axis(0)) / n as f64;

            self.weights.scaled_add(-Self::LEARNING_RATE, &grad_w);
            self.bias.scaled_add(-Self::LEARNING_RATE, &grad_b);

            let largest = grad_w.iter().chain(grad_b.iter()).fold(0.0f64, |m, g| m.max(g.abs()));
            if largest < Self::TOLERANCE {
                break;
            }
        }

        if self.weights.iter().chain(self.bias.iter()).any(|v| !v.is_finite()) {
            return Err(LearningError::TrainingFailed(
                "logistic regression produced non-finite coefficients".to_string(),
            ));
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_width(x, self.weights.ncols())?;
        Ok(self
            .softmax_rows(x)
            .rows()
            .into_iter()
            .map(|row| argmax(&row.to_vec()) as f64)
            .collect())
    }

    fn supports_importance(&self) -> bool {
        true
    }

    /// Mean absolute coefficient across classes.
    fn importance(&self) -> Option<Vec<f64>> {
        let abs = self.weights.mapv(f64::abs);
        abs.mean_axis(Axis(0)).map(|m| m.to_vec())
    }

    fn supports_probabilities(&self) -> bool {
        true
    }

    fn probabilities(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        check_width(x, self.weights.ncols())?;
        let proba = self.softmax_rows(x);
        if self.n_classes < proba.ncols() {
            return Ok(Some(proba.slice(ndarray::s![.., ..self.n_classes]).to_owned()));
        }
        Ok(Some(proba))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ShapeBuilder, array};

    #[test]
    fn test_ols_recovers_exact_line() {
        let x = array![[1.0, 0.0], [2.0, 1.0], [3.0, 0.0], [4.0, 1.0]];
        let y = array![3.0, 8.0, 7.0, 12.0]; // 2a + 3b + 1
        let mut model = LinearRegression::new(0.0);
        model.fit(&x, &y).unwrap();
        assert!((model.coefficients()[0] - 2.0).abs() < 1e-9);
        assert!((model.coefficients()[1] - 3.0).abs() < 1e-9);
        assert!((model.intercept() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicated_column_falls_back_to_jitter() {
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let y = array![2.0, 4.0, 6.0];
        let mut model = LinearRegression::new(0.0);
        model.fit(&x, &y).unwrap();
        let predictions = model.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-3);
        }
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut ols = LinearRegression::new(0.0);
        let mut ridge = LinearRegression::new(10.0);
        ols.fit(&x, &y).unwrap();
        ridge.fit(&x, &y).unwrap();
        assert!(ridge.coefficients()[0].abs() < ols.coefficients()[0].abs());
    }

    #[test]
    fn test_lasso_zeroes_irrelevant_feature() {
        let x = array![[1.0, 0.1], [2.0, -0.1], [3.0, 0.1], [4.0, -0.1], [5.0, 0.1]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let mut model = Lasso::new(0.1, 1000);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.coefficients()[1], 0.0);
        assert!(model.coefficients()[0] > 0.8);
    }

    #[test]
    fn test_logistic_separates_classes() {
        let x = array![[-2.0], [-1.5], [-1.0], [1.0], [1.5], [2.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = LogisticRegression::new(2, 1.0, 1000);
        model.fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);

        let proba = model.probabilities(&x).unwrap().unwrap();
        assert_eq!(proba.dim(), (6, 2));
        assert!(proba[[5, 1]] > 0.8);
        assert!((proba.row(0).sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_logistic_probabilities_normalized_for_column_major_input() {
        let x = Array2::from_shape_vec(
            (8, 2).f(),
            vec![
                -2.0, -1.5, -1.0, -0.5, 0.5, 1.0, 1.5, 2.0,
                0.3, -0.2, 0.1, 0.0, 0.2, -0.1, 0.4, -0.3,
            ],
        )
        .unwrap();
        let y = array![0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0];
        let mut model = LogisticRegression::new(3, 1.0, 500);
        model.fit(&x, &y).unwrap();

        let proba = model.probabilities(&x).unwrap().unwrap();
        assert_eq!(proba.dim(), (8, 3));
        for row in proba.rows() {
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
        assert_eq!(model.predict(&x).unwrap()[7], 2.0);
    }
}
