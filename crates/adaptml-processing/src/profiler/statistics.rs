//! Statistical primitives used by profiling and preprocessing.
//!
//! All functions take plain slices of finite values and return `None` when
//! the statistic is undefined, so callers never see NaN.

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let variance =
        values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Population standard deviation (n denominator).
pub fn population_std(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Sort a copy of the values ascending.
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Quantile with linear interpolation between closest ranks.
/// `sorted_values` must be sorted ascending.
pub fn quantile_sorted(sorted_values: &[f64], q: f64) -> Option<f64> {
    if sorted_values.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted_values.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    Some(sorted_values[lower] + (sorted_values[upper] - sorted_values[lower]) * frac)
}

pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    quantile_sorted(&sorted(values), q)
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

/// Bias-corrected sample skewness. Needs at least three values; a column
/// with zero spread has skewness 0.
pub fn skewness(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 3 {
        return None;
    }
    let m = mean(values)?;
    let nf = n as f64;
    let m2 = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / nf;
    if m2 <= f64::EPSILON {
        return Some(0.0);
    }
    let m3 = values.iter().map(|x| (x - m).powi(3)).sum::<f64>() / nf;
    let g1 = m3 / m2.powf(1.5);
    let adjusted = g1 * (nf * (nf - 1.0)).sqrt() / (nf - 2.0);
    adjusted.is_finite().then_some(adjusted)
}

/// Tukey fences `[Q1 - k*IQR, Q3 + k*IQR]`, or `None` with fewer than
/// four values.
pub fn iqr_bounds(values: &[f64], multiplier: f64) -> Option<(f64, f64)> {
    if values.len() < 4 {
        return None;
    }
    let sorted_values = sorted(values);
    let q1 = quantile_sorted(&sorted_values, 0.25)?;
    let q3 = quantile_sorted(&sorted_values, 0.75)?;
    let iqr = q3 - q1;
    Some((q1 - multiplier * iqr, q3 + multiplier * iqr))
}

/// Positions (in the original column) of values outside the IQR fences.
/// Null positions are skipped but still counted in the indexing.
pub fn detect_outliers(values: &[Option<f64>], multiplier: f64) -> Vec<usize> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    let Some((lower, upper)) = iqr_bounds(&present, multiplier) else {
        return Vec::new();
    };
    values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| *x < lower || *x > upper).map(|_| i))
        .collect()
}

/// Percentage (0-100) of outliers; zero for a degenerate IQR.
pub fn outlier_percentage(values: &[f64], multiplier: f64) -> f64 {
    if values.len() < 4 {
        return 0.0;
    }
    let sorted_values = sorted(values);
    let (Some(q1), Some(q3)) = (
        quantile_sorted(&sorted_values, 0.25),
        quantile_sorted(&sorted_values, 0.75),
    ) else {
        return 0.0;
    };
    let iqr = q3 - q1;
    if iqr == 0.0 {
        return 0.0;
    }
    let (lower, upper) = (q1 - multiplier * iqr, q3 + multiplier * iqr);
    let count = values.iter().filter(|x| **x < lower || **x > upper).count();
    count as f64 / values.len() as f64 * 100.0
}

/// Pearson correlation over rows where both values are present.
pub fn pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in &pairs {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a).powi(2);
        var_b += (y - mean_b).powi(2);
    }
    if var_a <= 0.0 || var_b <= 0.0 {
        return None;
    }
    let r = cov / (var_a.sqrt() * var_b.sqrt());
    r.is_finite().then_some(r.clamp(-1.0, 1.0))
}

/// Shannon entropy (bits) of a frequency distribution.
pub fn entropy(counts: &[usize]) -> Option<f64> {
    let total: usize = counts.iter().sum();
    if total == 0 {
        return None;
    }
    let total = total as f64;
    Some(
        -counts
            .iter()
            .filter(|c| **c > 0)
            .map(|c| {
                let p = *c as f64 / total;
                p * p.log2()
            })
            .sum::<f64>(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_eq!(mean(&values), Some(5.0));
        assert!((population_std(&values).unwrap() - 2.0).abs() < 1e-12);
        assert!(std_dev(&[1.0]).is_none());
    }

    #[test]
    fn test_quantiles_interpolate() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile(&values, 0.25), Some(1.75));
        assert_eq!(median(&values), Some(2.5));
        assert_eq!(quantile(&[], 0.5), None);
    }

    #[test]
    fn test_outlier_detection_flags_extreme_value() {
        let values: Vec<Option<f64>> = [1.0, 2.0, 3.0, 4.0, 100.0].iter().map(|v| Some(*v)).collect();
        assert_eq!(detect_outliers(&values, 1.5), vec![4]);
    }

    #[test]
    fn test_outlier_detection_needs_four_values() {
        let values = vec![Some(1.0), Some(2.0), Some(500.0)];
        assert!(detect_outliers(&values, 1.5).is_empty());
    }

    #[test]
    fn test_outlier_indices_skip_nulls() {
        let values = vec![Some(1.0), None, Some(2.0), Some(3.0), Some(4.0), Some(100.0)];
        assert_eq!(detect_outliers(&values, 1.5), vec![5]);
    }

    #[test]
    fn test_outlier_percentage_degenerate_iqr() {
        assert_eq!(outlier_percentage(&[5.0, 5.0, 5.0, 5.0, 9.0], 1.5), 0.0);
        assert_eq!(outlier_percentage(&[1.0, 2.0, 3.0, 4.0, 100.0], 1.5), 20.0);
    }

    #[test]
    fn test_skewness_is_finite() {
        let skew = skewness(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert!(skew.is_finite());
        assert!(skew > 0.0);
        assert_eq!(skewness(&[3.0, 3.0, 3.0]), Some(0.0));
        assert!(skewness(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_pearson() {
        let a: Vec<Option<f64>> = (0..10).map(|i| Some(i as f64)).collect();
        let b: Vec<Option<f64>> = (0..10).map(|i| Some(2.0 * i as f64 + 1.0)).collect();
        let c: Vec<Option<f64>> = (0..10).map(|i| Some(-(i as f64))).collect();
        assert!((pearson(&a, &b).unwrap() - 1.0).abs() < 1e-12);
        assert!((pearson(&a, &c).unwrap() + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&a, &vec![Some(1.0); 10]), None);
    }

    #[test]
    fn test_entropy() {
        assert_eq!(entropy(&[5, 5]), Some(1.0));
        assert_eq!(entropy(&[10]), Some(0.0));
        assert_eq!(entropy(&[]), None);
    }
}
