//! Outlier capping for numeric columns.

use serde::{Deserialize, Serialize};

use crate::profiler::statistics;

/// Clips each column to the Tukey fences learned from training data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IqrCapper {
    /// `None` for a column with no values to learn from.
    bounds: Vec<Option<(f64, f64)>>,
}

impl IqrCapper {
    pub fn fit(columns: &[Vec<f64>], multiplier: f64) -> Self {
        let bounds = columns
            .iter()
            .map(|col| {
                let sorted = statistics::sorted(col);
                let q1 = statistics::quantile_sorted(&sorted, 0.25)?;
                let q3 = statistics::quantile_sorted(&sorted, 0.75)?;
                let iqr = q3 - q1;
                Some((q1 - multiplier * iqr, q3 + multiplier * iqr))
            })
            .collect();
        Self { bounds }
    }

    pub fn bounds(&self) -> &[Option<(f64, f64)>] {
        &self.bounds
    }

    /// Clip in place; returns how many values were changed.
    pub fn transform(&self, columns: &mut [Vec<f64>]) -> usize {
        let mut capped = 0;
        for (col, bounds) in columns.iter_mut().zip(&self.bounds) {
            let Some((lower, upper)) = bounds else {
                continue;
            };
            for v in col.iter_mut() {
                let clipped = v.clamp(*lower, *upper);
                if clipped != *v {
                    *v = clipped;
                    capped += 1;
                }
            }
        }
        capped
    }
}
