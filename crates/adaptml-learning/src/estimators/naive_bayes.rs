//! Gaussian naive Bayes.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use super::{Estimator, argmax, check_width, softmax};
use crate::error::{LearningError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    n_classes: usize,
    var_smoothing: f64,
    /// Classes with no training rows never win.
    present: Vec<bool>,
    log_priors: Vec<f64>,
    /// `(n_classes, n_features)`
    means: Array2<f64>,
    variances: Array2<f64>,
}

impl GaussianNaiveBayes {
    pub fn new(n_classes: usize, var_smoothing: f64) -> Self {
        Self {
            n_classes,
            var_smoothing,
            present: Vec::new(),
            log_priors: Vec::new(),
            means: Array2::zeros((0, 0)),
            variances: Array2::zeros((0, 0)),
        }
    }

    fn joint_log_likelihood(&self, row: ArrayView1<f64>) -> Vec<f64> {
        (0..self.n_classes)
            .map(|k| {
                if !self.present[k] {
                    return f64::NEG_INFINITY;
                }
                let log_density: f64 = row
                    .iter()
                    .zip(self.means.row(k))
                    .zip(self.variances.row(k))
                    .map(|((x, mean), var)| {
                        -0.5 * (2.0 * std::f64::consts::PI * var).ln() - 0.5 * (x - mean).powi(2) / var
                    })
                    .sum();
                self.log_priors[k] + log_density
            })
            .collect()
    }

    fn ensure_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if self.present.is_empty() {
            return Err(LearningError::InferenceError("naive bayes is not fitted".to_string()));
        }
        check_width(x, self.means.ncols())
    }
}

impl Estimator for GaussianNaiveBayes {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let (n, p) = x.dim();
        let max_variance = x
            .var_axis(Axis(0), 0.0)
            .iter()
            .copied()
            .fold(0.0f64, f64::max);
        let epsilon = if max_variance > 0.0 {
            self.var_smoothing * max_variance
        } else {
            self.var_smoothing
        };

        self.present = vec![false; self.n_classes];
        self.log_priors = vec![0.0; self.n_classes];
        self.means = Array2::zeros((self.n_classes, p));
        self.variances = Array2::from_elem((self.n_classes, p), epsilon);

        for k in 0..self.n_classes {
            let rows: Vec<usize> = y
                .iter()
                .enumerate()
                .filter(|(_, v)| **v as usize == k)
                .map(|(i, _)| i)
                .collect();
            if rows.is_empty() {
                continue;
            }
            let subset = x.select(Axis(0), &rows);
            if let Some(mean) = subset.mean_axis(Axis(0)) {
                self.means.row_mut(k).assign(&mean);
            }
            let variance = subset.var_axis(Axis(0), 0.0) + epsilon;
            self.variances.row_mut(k).assign(&variance);
            self.present[k] = true;
            self.log_priors[k] = (rows.len() as f64 / n as f64).ln();
        }

        if !self.present.iter().any(|p| *p) {
            return Err(LearningError::TrainingFailed(
                "naive bayes saw no labelled rows".to_string(),
            ));
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensure_fitted(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| argmax(&self.joint_log_likelihood(row)) as f64)
            .collect())
    }

    fn supports_probabilities(&self) -> bool {
        true
    }

    fn probabilities(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        self.ensure_fitted(x)?;
        let mut out = Array2::zeros((x.nrows(), self.n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            let mut scores = self.joint_log_likelihood(row);
            softmax(&mut scores);
            for (k, v) in scores.into_iter().enumerate() {
                out[[i, k]] = v;
            }
        }
        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_separates_gaussian_clusters() {
        let x = array![[1.0, 2.0], [1.2, 1.8], [0.9, 2.1], [5.0, 6.0], [5.2, 6.1], [4.8, 5.9]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut nb = GaussianNaiveBayes::new(2, 1e-9);
        nb.fit(&x, &y).unwrap();
        assert_eq!(nb.predict(&x).unwrap(), y);
        let proba = nb.probabilities(&array![[1.0, 2.0]]).unwrap().unwrap();
        assert!(proba[[0, 0]] > 0.99);
    }

    #[test]
    fn test_absent_class_gets_zero_probability() {
        let x = array![[0.0], [0.5], [3.0], [3.5]];
        let y = array![0.0, 0.0, 2.0, 2.0];
        let mut nb = GaussianNaiveBayes::new(3, 1e-9);
        nb.fit(&x, &y).unwrap();
        let proba = nb.probabilities(&x).unwrap().unwrap();
        assert_eq!(proba.column(1).sum(), 0.0);
        assert_eq!(nb.predict(&array![[3.2]]).unwrap(), array![2.0]);
    }
}
