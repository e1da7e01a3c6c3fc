//! Train/test splits and cross-validation folds.
//!
//! Classification targets are split per class so every partition keeps the
//! class proportions; regression targets are shuffled and cut.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::{LearningError, Result};

/// Row positions of one partition pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn group_by_class(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(row);
    }
    groups
}

fn check_partitions(split: Split, rows: usize) -> Result<Split> {
    if split.train.is_empty() || split.test.is_empty() {
        return Err(LearningError::InvalidData(format!(
            "{rows} rows cannot be split into non-empty train and test partitions"
        )));
    }
    Ok(split)
}

/// Shuffled split holding out `ceil(rows * test_size)` rows.
pub fn random_split(rows: usize, test_size: f64, seed: u64) -> Result<Split> {
    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let n_test = ((rows as f64) * test_size).ceil() as usize;
    let n_test = n_test.min(rows.saturating_sub(1));
    let test = order[..n_test].to_vec();
    let train = order[n_test..].to_vec();
    check_partitions(Split { train, test }, rows)
}

/// Split keeping class proportions.
///
/// Each class with at least two rows contributes `round(n * test_size)`
/// rows (at least one, never all) to the test partition. A class seen once
/// stays in training.
pub fn stratified_split(labels: &[usize], test_size: f64, seed: u64) -> Result<Split> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut test = Vec::new();

    for (_, mut rows) in group_by_class(labels) {
        rows.shuffle(&mut rng);
        let n = rows.len();
        let n_test = if n < 2 {
            0
        } else {
            (((n as f64) * test_size).round() as usize).clamp(1, n - 1)
        };
        test.extend_from_slice(&rows[..n_test]);
        train.extend_from_slice(&rows[n_test..]);
    }

    // Interleave classes again so estimators never see sorted blocks.
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);
    check_partitions(Split { train, test }, labels.len())
}

fn validate_folds(rows: usize, folds: usize) -> Result<()> {
    if folds < 2 {
        return Err(LearningError::InvalidConfig(
            "cv_folds must be at least 2".to_string(),
        ));
    }
    if rows < folds {
        return Err(LearningError::InvalidData(format!(
            "{rows} training rows are too few for {folds}-fold cross-validation"
        )));
    }
    Ok(())
}

fn folds_to_splits(folds: Vec<Vec<usize>>) -> Vec<Split> {
    (0..folds.len())
        .map(|held_out| Split {
            test: folds[held_out].clone(),
            train: folds
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != held_out)
                .flat_map(|(_, f)| f.iter().copied())
                .collect(),
        })
        .filter(|s| !s.test.is_empty() && !s.train.is_empty())
        .collect()
}

/// Shuffled k-fold; the first `rows % folds` folds get one extra row.
pub fn k_fold(rows: usize, folds: usize, seed: u64) -> Result<Vec<Split>> {
    validate_folds(rows, folds)?;
    let mut order: Vec<usize> = (0..rows).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let base = rows / folds;
    let remainder = rows % folds;
    let mut buckets = Vec::with_capacity(folds);
    let mut start = 0;
    for i in 0..folds {
        let size = if i < remainder { base + 1 } else { base };
        buckets.push(order[start..start + size].to_vec());
        start += size;
    }
    Ok(folds_to_splits(buckets))
}

/// K-fold dealing each class's shuffled rows round-robin across folds.
pub fn stratified_k_fold(labels: &[usize], folds: usize, seed: u64) -> Result<Vec<Split>> {
    validate_folds(labels.len(), folds)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); folds];
    let mut next = 0;
    for (_, mut rows) in group_by_class(labels) {
        rows.shuffle(&mut rng);
        for row in rows {
            buckets[next % folds].push(row);
            next += 1;
        }
    }
    Ok(folds_to_splits(buckets))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<usize>) -> Vec<usize> {
        v.sort_unstable();
        v
    }

    #[test]
    fn test_random_split_sizes_and_coverage() {
        let split = random_split(10, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 2);
        assert_eq!(split.train.len(), 8);
        let all = sorted([split.train, split.test].concat());
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_random_split_is_seeded() {
        assert_eq!(random_split(30, 0.3, 7).unwrap(), random_split(30, 0.3, 7).unwrap());
    }

    #[test]
    fn test_stratified_split_keeps_each_class_in_both_partitions() {
        let labels: Vec<usize> = (0..20).map(|i| usize::from(i % 4 == 0)).collect();
        let split = stratified_split(&labels, 0.2, 42).unwrap();
        let test_positive = split.test.iter().filter(|&&r| labels[r] == 1).count();
        let train_positive = split.train.iter().filter(|&&r| labels[r] == 1).count();
        assert_eq!(test_positive, 1);
        assert_eq!(train_positive, 4);
        assert_eq!(split.test.len() + split.train.len(), 20);
    }

    #[test]
    fn test_single_row_cannot_be_split() {
        assert!(matches!(random_split(1, 0.2, 1), Err(LearningError::InvalidData(_))));
        assert!(stratified_split(&[0], 0.2, 1).is_err());
    }

    #[test]
    fn test_k_fold_partitions_rows() {
        let splits = k_fold(11, 3, 42).unwrap();
        assert_eq!(splits.len(), 3);
        let tested = sorted(splits.iter().flat_map(|s| s.test.clone()).collect());
        assert_eq!(tested, (0..11).collect::<Vec<_>>());
        for split in &splits {
            assert_eq!(split.train.len() + split.test.len(), 11);
        }
    }

    #[test]
    fn test_stratified_k_fold_spreads_classes() {
        let labels = vec![0, 0, 0, 0, 1, 1, 1, 1];
        let splits = stratified_k_fold(&labels, 4, 3).unwrap();
        for split in &splits {
            let classes: Vec<usize> = split.test.iter().map(|&r| labels[r]).collect();
            assert_eq!(classes.len(), 2);
        }
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        assert!(k_fold(3, 5, 0).is_err());
    }
}
