use serde::{Deserialize, Serialize};

use super::plan::ScalingMethod;
use crate::profiler::statistics;

/// Per-column affine scaling `(x - center) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    method: ScalingMethod,
    center: Vec<f64>,
    scale: Vec<f64>,
}

impl FittedScaler {
    pub fn fit(method: ScalingMethod, columns: &[Vec<f64>]) -> Self {
        let (center, scale) = columns
            .iter()
            .map(|col| Self::fit_column(method, col))
            .unzip();
        Self {
            method,
            center,
            scale,
        }
    }

    fn fit_column(method: ScalingMethod, values: &[f64]) -> (f64, f64) {
        let (center, spread) = match method {
            ScalingMethod::Standard => (
                statistics::mean(values).unwrap_or(0.0),
                statistics::population_std(values).unwrap_or(1.0),
            ),
            ScalingMethod::Robust => {
                let sorted = statistics::sorted(values);
                let q1 = statistics::quantile_sorted(&sorted, 0.25).unwrap_or(0.0);
                let q3 = statistics::quantile_sorted(&sorted, 0.75).unwrap_or(0.0);
                (statistics::quantile_sorted(&sorted, 0.5).unwrap_or(0.0), q3 - q1)
            }
            ScalingMethod::MinMax => {
                let sorted = statistics::sorted(values);
                let min = sorted.first().copied().unwrap_or(0.0);
                let max = sorted.last().copied().unwrap_or(0.0);
                (min, max - min)
            }
            ScalingMethod::None => (0.0, 1.0),
        };
        // constant columns keep their offset and are not divided
        let scale = if spread.is_finite() && spread > f64::EPSILON {
            spread
        } else {
            1.0
        };
        (center, scale)
    }

    pub fn method(&self) -> ScalingMethod {
        self.method
    }

    pub fn transform(&self, columns: &mut [Vec<f64>]) {
        for ((col, center), scale) in columns.iter_mut().zip(&self.center).zip(&self.scale) {
            for v in col.iter_mut() {
                *v = (*v - center) / scale;
            }
        }
    }
}
