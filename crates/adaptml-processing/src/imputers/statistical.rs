//! Statistical imputation methods.
//!
//! Fill values are learned once from the training partition and then
//! applied unchanged, so imputing the same rows twice gives the same result.

use serde::{Deserialize, Serialize};

use crate::profiler::statistics;
use crate::utils::sorted_value_counts;

/// Per-column constant fill for numeric columns (mean or median).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticalImputer {
    fill_values: Vec<f64>,
}

impl StatisticalImputer {
    /// Fill each column with the mean of its present values.
    pub fn fit_mean(columns: &[Vec<Option<f64>>]) -> Self {
        Self::fit_with(columns, statistics::mean)
    }

    /// Fill each column with the median of its present values.
    pub fn fit_median(columns: &[Vec<Option<f64>>]) -> Self {
        Self::fit_with(columns, statistics::median)
    }

    fn fit_with(columns: &[Vec<Option<f64>>], stat: fn(&[f64]) -> Option<f64>) -> Self {
        let fill_values = columns
            .iter()
            .map(|col| {
                let present: Vec<f64> = col.iter().flatten().copied().collect();
                // a column with no values at all fills with zero
                stat(&present).filter(|v| v.is_finite()).unwrap_or(0.0)
            })
            .collect();
        Self { fill_values }
    }

    pub fn fill_values(&self) -> &[f64] {
        &self.fill_values
    }

    pub fn transform(&self, columns: &[Vec<Option<f64>>]) -> Vec<Vec<f64>> {
        columns
            .iter()
            .zip(&self.fill_values)
            .map(|(col, fill)| col.iter().map(|v| v.unwrap_or(*fill)).collect())
            .collect()
    }
}

/// Per-column fill for categorical columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalImputer {
    fill_values: Vec<String>,
}

impl CategoricalImputer {
    /// Fill with each column's most frequent value; a column with no values
    /// uses `fallback`.
    pub fn fit_most_frequent(columns: &[Vec<Option<String>>], fallback: &str) -> Self {
        let fill_values = columns
            .iter()
            .map(|col| {
                sorted_value_counts(col)
                    .into_iter()
                    .next()
                    .map(|(value, _)| value)
                    .unwrap_or_else(|| fallback.to_string())
            })
            .collect();
        Self { fill_values }
    }

    /// Fill every column with the same sentinel.
    pub fn constant(n_columns: usize, value: &str) -> Self {
        Self {
            fill_values: vec![value.to_string(); n_columns],
        }
    }

    pub fn fill_values(&self) -> &[String] {
        &self.fill_values
    }

    pub fn transform(&self, columns: &[Vec<Option<String>>]) -> Vec<Vec<String>> {
        columns
            .iter()
            .zip(&self.fill_values)
            .map(|(col, fill)| {
                col.iter()
                    .map(|v| v.clone().unwrap_or_else(|| fill.clone()))
                    .collect()
            })
            .collect()
    }
}
