//! Categorical encoders fitted on the training partition.
//!
//! Values never seen during fitting are not an error: one-hot encodes them
//! as all zeros, frequency encoding as 0 and target encoding as the global
//! target mean (per class for multiclass targets).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::plan::EncodingMethod;
use crate::utils::round_to;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum FittedEncoder {
    /// Kept categories per column, sorted, first category dropped.
    OneHot { categories: Vec<Vec<String>> },
    /// Smoothed target mean per category.
    Target {
        maps: Vec<BTreeMap<String, f64>>,
        global_mean: f64,
    },
    /// Multiclass targets, one-vs-rest: a smoothed rate per class for each
    /// category, one output column per class.
    TargetPerClass {
        maps: Vec<BTreeMap<String, Vec<f64>>>,
        /// Training share of each class, in class order.
        priors: Vec<f64>,
    },
    /// Training count per category.
    Frequency { maps: Vec<BTreeMap<String, f64>> },
}

/// Sorted distinct values with the first one dropped.
pub(crate) fn onehot_categories(values: &[String]) -> Vec<String> {
    let distinct: BTreeSet<&String> = values.iter().collect();
    distinct.into_iter().skip(1).cloned().collect()
}

impl FittedEncoder {
    /// Fit on imputed, column-major values. `target` is the numeric
    /// encoding of the target for each training row; `classes` lists the
    /// distinct class values of a classification target and is empty for
    /// regression.
    pub fn fit(
        method: EncodingMethod,
        columns: &[Vec<String>],
        target: &[f64],
        classes: &[f64],
        smoothing: f64,
    ) -> Self {
        match method {
            EncodingMethod::OneHot => Self::OneHot {
                categories: columns.iter().map(|c| onehot_categories(c)).collect(),
            },
            EncodingMethod::Frequency => Self::Frequency {
                maps: columns
                    .iter()
                    .map(|col| {
                        let mut counts = BTreeMap::new();
                        for value in col {
                            *counts.entry(value.clone()).or_insert(0.0) += 1.0;
                        }
                        counts
                    })
                    .collect(),
            },
            EncodingMethod::Target if classes.len() > 2 => {
                Self::fit_per_class(columns, target, classes, smoothing)
            }
            EncodingMethod::Target => {
                let global_mean = if target.is_empty() {
                    0.0
                } else {
                    target.iter().sum::<f64>() / target.len() as f64
                };
                let maps = columns
                    .iter()
                    .map(|col| {
                        let mut sums: BTreeMap<String, (f64, f64)> = BTreeMap::new();
                        for (value, y) in col.iter().zip(target) {
                            let entry = sums.entry(value.clone()).or_insert((0.0, 0.0));
                            entry.0 += y;
                            entry.1 += 1.0;
                        }
                        sums.into_iter()
                            .map(|(value, (sum, count))| {
                                let encoded = (sum + smoothing * global_mean) / (count + smoothing);
                                (value, round_to(encoded, 12))
                            })
                            .collect()
                    })
                    .collect();
                Self::Target { maps, global_mean }
            }
        }
    }

    fn fit_per_class(columns: &[Vec<String>], target: &[f64], classes: &[f64], smoothing: f64) -> Self {
        let class_of = |y: f64| classes.iter().position(|c| *c == y);
        let rows = target.len().max(1) as f64;
        let mut priors = vec![0.0; classes.len()];
        for k in target.iter().filter_map(|y| class_of(*y)) {
            priors[k] += 1.0;
        }
        priors.iter_mut().for_each(|p| *p /= rows);

        let maps = columns
            .iter()
            .map(|col| {
                let mut counts: BTreeMap<String, (Vec<f64>, f64)> = BTreeMap::new();
                for (value, y) in col.iter().zip(target) {
                    let entry = counts
                        .entry(value.clone())
                        .or_insert_with(|| (vec![0.0; classes.len()], 0.0));
                    if let Some(k) = class_of(*y) {
                        entry.0[k] += 1.0;
                    }
                    entry.1 += 1.0;
                }
                counts
                    .into_iter()
                    .map(|(value, (hits, count))| {
                        let rates = hits
                            .iter()
                            .zip(&priors)
                            .map(|(h, p)| round_to((h + smoothing * p) / (count + smoothing), 12))
                            .collect();
                        (value, rates)
                    })
                    .collect()
            })
            .collect();
        Self::TargetPerClass { maps, priors }
    }

    pub fn method(&self) -> EncodingMethod {
        match self {
            Self::OneHot { .. } => EncodingMethod::OneHot,
            Self::Target { .. } | Self::TargetPerClass { .. } => EncodingMethod::Target,
            Self::Frequency { .. } => EncodingMethod::Frequency,
        }
    }

    /// Output feature names for the given input column names.
    pub fn output_names(&self, columns: &[String]) -> Vec<String> {
        match self {
            Self::OneHot { categories } => columns
                .iter()
                .zip(categories)
                .flat_map(|(name, cats)| cats.iter().map(move |c| format!("{name}_{c}")))
                .collect(),
            Self::TargetPerClass { priors, .. } => columns
                .iter()
                .flat_map(|name| (0..priors.len()).map(move |k| format!("{name}_{k}")))
                .collect(),
            Self::Target { .. } | Self::Frequency { .. } => columns.to_vec(),
        }
    }

    /// Encode imputed, column-major values into numeric output columns.
    pub fn transform(&self, columns: &[Vec<String>]) -> Vec<Vec<f64>> {
        match self {
            Self::OneHot { categories } => columns
                .iter()
                .zip(categories)
                .flat_map(|(col, cats)| {
                    cats.iter().map(move |cat| {
                        col.iter()
                            .map(|v| if v == cat { 1.0 } else { 0.0 })
                            .collect::<Vec<f64>>()
                    })
                })
                .collect(),
            Self::Frequency { maps } => columns
                .iter()
                .zip(maps)
                .map(|(col, map)| col.iter().map(|v| map.get(v).copied().unwrap_or(0.0)).collect())
                .collect(),
            Self::Target { maps, global_mean } => columns
                .iter()
                .zip(maps)
                .map(|(col, map)| {
                    col.iter()
                        .map(|v| map.get(v).copied().unwrap_or(*global_mean))
                        .collect()
                })
                .collect(),
            Self::TargetPerClass { maps, priors } => columns
                .iter()
                .zip(maps)
                .flat_map(|(col, map)| {
                    (0..priors.len()).map(move |k| {
                        col.iter()
                            .map(|v| map.get(v).map_or(priors[k], |rates| rates[k]))
                            .collect::<Vec<f64>>()
                    })
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_onehot_drops_first_sorted_category() {
        let columns = vec![col(&["red", "blue", "green", "blue"])];
        let encoder = FittedEncoder::fit(EncodingMethod::OneHot, &columns, &[], &[], 10.0);

        assert_eq!(
            encoder.output_names(&["color".to_string()]),
            vec!["color_green", "color_red"]
        );
        let out = encoder.transform(&columns);
        assert_eq!(out[0], vec![0.0, 0.0, 1.0, 0.0]);
        assert_eq!(out[1], vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_onehot_unknown_is_all_zero() {
        let encoder = FittedEncoder::fit(EncodingMethod::OneHot, &[col(&["a", "b"])], &[], &[], 10.0);
        let out = encoder.transform(&[col(&["zzz"])]);
        assert_eq!(out, vec![vec![0.0]]);
    }

    #[test]
    fn test_frequency_encoding() {
        let columns = vec![col(&["a", "a", "b"])];
        let encoder = FittedEncoder::fit(EncodingMethod::Frequency, &columns, &[], &[], 10.0);
        assert_eq!(encoder.transform(&[col(&["a", "b", "c"])]), vec![vec![2.0, 1.0, 0.0]]);
    }

    #[test]
    fn test_target_encoding_smooths_toward_global_mean() {
        let columns = vec![col(&["a", "a", "b", "b"])];
        let target = [1.0, 1.0, 0.0, 0.0];
        let encoder = FittedEncoder::fit(EncodingMethod::Target, &columns, &target, &[0.0, 1.0], 2.0);
        let out = encoder.transform(&[col(&["a", "b", "new"])]);
        // (2 + 2 * 0.5) / (2 + 2) = 0.75
        assert!((out[0][0] - 0.75).abs() < 1e-9);
        assert!((out[0][1] - 0.25).abs() < 1e-9);
        assert_eq!(out[0][2], 0.5);
    }

    #[test]
    fn test_multiclass_target_encoding_is_one_vs_rest() {
        // "x" only ever sees classes 0 and 2, "y" only class 1.
        let columns = vec![col(&["x", "x", "y", "y"])];
        let target = [0.0, 2.0, 1.0, 1.0];
        let encoder = FittedEncoder::fit(EncodingMethod::Target, &columns, &target, &[0.0, 1.0, 2.0], 1.0);

        assert_eq!(
            encoder.output_names(&["kind".to_string()]),
            vec!["kind_0", "kind_1", "kind_2"]
        );
        let out = encoder.transform(&[col(&["x", "y", "new"])]);
        assert_eq!(out.len(), 3);
        // class 1 rate: x = (0 + 0.5) / 3, y = (2 + 0.5) / 3
        assert!((out[1][0] - 0.5 / 3.0).abs() < 1e-9);
        assert!((out[1][1] - 2.5 / 3.0).abs() < 1e-9);
        assert_ne!(out[0][0], out[0][1]);
        // unseen categories get the class priors
        assert_eq!(out[0][2], 0.25);
        assert_eq!(out[1][2], 0.5);
        assert_eq!(out[2][2], 0.25);
    }
}
