use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::profiler::statistics;

/// K-nearest-neighbour imputer for numeric columns.
///
/// Keeps the training rows as its reference set. A missing cell is filled
/// with the inverse-distance weighted mean of the `k` closest reference rows
/// that have a value in that column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNNImputer {
    n_neighbors: usize,
    /// Row-major reference values.
    reference: Vec<Vec<Option<f64>>>,
    /// Column means, used when no neighbour can be found.
    fallback: Vec<f64>,
}

impl KNNImputer {
    /// Fit on column-major training values.
    pub fn fit(n_neighbors: usize, columns: &[Vec<Option<f64>>]) -> Self {
        let n_rows = columns.first().map(Vec::len).unwrap_or(0);
        let reference = (0..n_rows)
            .map(|row| columns.iter().map(|col| col[row]).collect())
            .collect();
        let fallback = columns
            .iter()
            .map(|col| {
                let present: Vec<f64> = col.iter().flatten().copied().collect();
                statistics::mean(&present).unwrap_or(0.0)
            })
            .collect();

        Self {
            n_neighbors: n_neighbors.max(1),
            reference,
            fallback,
        }
    }

    pub fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }

    /// Impute column-major values. Columns must match the fitted layout.
    pub fn transform(&self, columns: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
        let n_rows = columns.first().map(Vec::len).unwrap_or(0);
        let mut out: Vec<Vec<f64>> = columns
            .iter()
            .zip(&self.fallback)
            .map(|(col, fallback)| col.iter().map(|v| v.unwrap_or(*fallback)).collect())
            .collect();

        let mut imputed = 0usize;
        for row in 0..n_rows {
            let values: Vec<Option<f64>> = columns.iter().map(|col| col[row]).collect();
            for (col_idx, value) in values.iter().enumerate() {
                if value.is_none() {
                    out[col_idx][row] = self.impute_value(&values, col_idx);
                    imputed += 1;
                }
            }
        }
        if imputed > 0 {
            debug!("KNN imputed {} cells", imputed);
        }
        out
    }

    /// Impute a single missing value using KNN
    fn impute_value(&self, row: &[Option<f64>], target_col: usize) -> f64 {
        let fallback = self.fallback.get(target_col).copied().unwrap_or(0.0);

        let mut distances: Vec<(f64, f64)> = self
            .reference
            .iter()
            .filter_map(|candidate| {
                let value = candidate[target_col]?;
                Some((Self::calculate_distance(row, candidate, target_col), value))
            })
            .collect();
        if distances.is_empty() {
            return fallback;
        }

        distances.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut weighted_sum = 0.0;
        let mut weight_sum = 0.0;
        for (distance, value) in distances.iter().take(self.n_neighbors) {
            // Use inverse distance as weight (avoiding division by zero)
            let weight = if *distance < 1e-10 {
                1e10
            } else {
                1.0 / distance
            };
            weighted_sum += value * weight;
            weight_sum += weight;
        }

        if weight_sum > 0.0 {
            weighted_sum / weight_sum
        } else {
            fallback
        }
    }

    /// Euclidean distance between two rows, ignoring the target column and
    /// null values. Rows with no comparable values are infinitely far apart.
    fn calculate_distance(row1: &[Option<f64>], row2: &[Option<f64>], skip_col: usize) -> f64 {
        let mut sum_squared_diff = 0.0;
        let mut count = 0;

        for (col_idx, (a, b)) in row1.iter().zip(row2).enumerate() {
            if col_idx == skip_col {
                continue;
            }
            if let (Some(val1), Some(val2)) = (a, b) {
                let diff = val1 - val2;
                sum_squared_diff += diff * diff;
                count += 1;
            }
        }

        if count > 0 {
            (sum_squared_diff / count as f64).sqrt()
        } else {
            f64::INFINITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_neighbors_defaults_to_one() {
        let imputer = KNNImputer::fit(0, &[vec![Some(1.0)]]);
        assert_eq!(imputer.n_neighbors(), 1);
    }

    #[test]
    fn test_basic_imputation() {
        let columns = vec![
            vec![Some(1.0), Some(2.0), Some(3.0), Some(4.0), Some(5.0)],
            vec![Some(10.0), Some(20.0), None, Some(40.0), Some(50.0)],
        ];
        let imputer = KNNImputer::fit(2, &columns);
        let out = imputer.transform(&columns);

        // nearest rows by feature1 are rows 1 and 3
        assert!(out[1][2] > 15.0 && out[1][2] < 45.0);
        assert_eq!(out[1][0], 10.0);
    }

    #[test]
    fn test_no_comparable_neighbors_uses_column_mean() {
        let columns = vec![
            vec![None, Some(2.0), Some(4.0)],
            vec![None, Some(10.0), Some(20.0)],
        ];
        let imputer = KNNImputer::fit(3, &columns);
        let out = imputer.transform(&columns);
        assert_eq!(out[0][0], 3.0);
        assert_eq!(out[1][0], 15.0);
    }

    #[test]
    fn test_transform_new_rows_uses_reference() {
        let train = vec![
            vec![Some(0.0), Some(0.0), Some(10.0), Some(10.0)],
            vec![Some(1.0), Some(1.0), Some(100.0), Some(100.0)],
        ];
        let imputer = KNNImputer::fit(2, &train);
        let new_rows = vec![vec![Some(10.0)], vec![None]];
        let out = imputer.transform(&new_rows);
        assert!((out[1][0] - 100.0).abs() < 1e-6);
    }
}
