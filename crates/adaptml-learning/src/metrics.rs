//! Held-out evaluation metrics.

use std::collections::BTreeSet;

use adaptml_processing::utils::finite_or_none;

use crate::types::EvaluationMetrics;

/// Accuracy, weighted precision/recall/F1 and, for binary targets, the
/// confusion matrix.
///
/// Labels are class indices. Per-class scores with a zero denominator are
/// 0; weights are the true-class supports.
pub fn classification_metrics(y_true: &[usize], y_pred: &[usize]) -> EvaluationMetrics {
    let n = y_true.len();
    if n == 0 {
        return EvaluationMetrics::default();
    }

    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    let labels: BTreeSet<usize> = y_true.iter().chain(y_pred).copied().collect();

    let mut precision = 0.0;
    let mut recall = 0.0;
    let mut f1 = 0.0;
    for &label in &labels {
        let tp = y_true
            .iter()
            .zip(y_pred)
            .filter(|&(&t, &p)| t == label && p == label)
            .count() as f64;
        let predicted = y_pred.iter().filter(|&&p| p == label).count() as f64;
        let support = y_true.iter().filter(|&&t| t == label).count() as f64;

        let p = if predicted > 0.0 { tp / predicted } else { 0.0 };
        let r = if support > 0.0 { tp / support } else { 0.0 };
        let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };

        let weight = support / n as f64;
        precision += weight * p;
        recall += weight * r;
        f1 += weight * f;
    }

    let true_classes: BTreeSet<usize> = y_true.iter().copied().collect();
    let confusion_matrix = (true_classes.len() == 2).then(|| confusion_matrix(y_true, y_pred, &labels));

    EvaluationMetrics {
        accuracy: Some(correct as f64 / n as f64),
        precision: Some(precision),
        recall: Some(recall),
        f1_score: Some(f1),
        confusion_matrix,
        ..Default::default()
    }
}

fn confusion_matrix(y_true: &[usize], y_pred: &[usize], labels: &BTreeSet<usize>) -> Vec<Vec<usize>> {
    let order: Vec<usize> = labels.iter().copied().collect();
    let position = |label: usize| order.iter().position(|&l| l == label);
    let mut matrix = vec![vec![0usize; order.len()]; order.len()];
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if let (Some(i), Some(j)) = (position(t), position(p)) {
            matrix[i][j] += 1;
        }
    }
    matrix
}

pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum::<f64>()
        / y_true.len() as f64
}

/// R²; a constant target scores 1.0 when predicted exactly, else 0.0.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> f64 {
    if y_true.is_empty() {
        return 0.0;
    }
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}

/// RMSE, MAE and R².
pub fn regression_metrics(y_true: &[f64], y_pred: &[f64]) -> EvaluationMetrics {
    if y_true.is_empty() {
        return EvaluationMetrics::default();
    }
    let mae = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum::<f64>() / y_true.len() as f64;
    EvaluationMetrics {
        rmse: finite_or_none(mean_squared_error(y_true, y_pred).sqrt()),
        mae: finite_or_none(mae),
        r2_score: finite_or_none(r2_score(y_true, y_pred)),
        ..Default::default()
    }
}

/// Mean and population standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_binary_classification() {
        let metrics = classification_metrics(&[0, 1, 1, 0], &[0, 1, 1, 0]);
        assert_eq!(metrics.accuracy, Some(1.0));
        assert_eq!(metrics.f1_score, Some(1.0));
        assert_eq!(metrics.confusion_matrix, Some(vec![vec![2, 0], vec![0, 2]]));
    }

    #[test]
    fn test_zero_division_counts_as_zero() {
        // class 1 is never predicted
        let metrics = classification_metrics(&[0, 0, 1, 1], &[0, 0, 0, 0]);
        assert_eq!(metrics.accuracy, Some(0.5));
        // class 0: p = 0.5, r = 1.0; class 1: p = 0, r = 0
        assert!((metrics.precision.unwrap() - 0.25).abs() < 1e-12);
        assert!((metrics.recall.unwrap() - 0.5).abs() < 1e-12);
        assert_eq!(metrics.confusion_matrix, Some(vec![vec![2, 0], vec![2, 0]]));
    }

    #[test]
    fn test_multiclass_has_no_confusion_matrix() {
        let metrics = classification_metrics(&[0, 1, 2], &[0, 1, 1]);
        assert!(metrics.confusion_matrix.is_none());
        assert!(metrics.rmse.is_none());
    }

    #[test]
    fn test_regression_metrics() {
        let metrics = regression_metrics(&[1.0, 2.0, 3.0], &[1.0, 2.0, 5.0]);
        assert!((metrics.rmse.unwrap() - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((metrics.mae.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics.r2_score.unwrap() - (1.0 - 4.0 / 2.0)).abs() < 1e-12);
        assert!(metrics.accuracy.is_none());
    }

    #[test]
    fn test_constant_target_r2() {
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn test_mean_std() {
        let (mean, std) = mean_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
    }
}
