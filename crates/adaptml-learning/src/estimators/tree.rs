//! CART decision trees.
//!
//! Nodes live in a flat vector (root at index 0) so fitted trees serialize
//! without nesting. Classification leaves hold the class distribution of
//! their rows; regression leaves hold the mean.

use ndarray::{Array1, Array2, ArrayView1};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::{Estimator, Task, argmax, check_width};
use crate::error::{LearningError, Result};

/// Growth limits shared by trees, forests and boosting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// `None` grows until leaves are pure.
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features sampled per split; `None` considers all.
    pub max_features: Option<usize>,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Leaf {
        value: Vec<f64>,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

/// Sufficient statistics of a set of targets.
#[derive(Debug, Clone)]
enum Stats {
    Counts(Vec<f64>),
    Moments { n: f64, sum: f64, sum_sq: f64 },
}

impl Stats {
    fn empty(task: Task) -> Self {
        match task {
            Task::Classification { n_classes } => Stats::Counts(vec![0.0; n_classes]),
            Task::Regression => Stats::Moments {
                n: 0.0,
                sum: 0.0,
                sum_sq: 0.0,
            },
        }
    }

    fn add(&mut self, y: f64) {
        match self {
            Stats::Counts(counts) => {
                if let Some(c) = counts.get_mut(y as usize) {
                    *c += 1.0;
                }
            }
            Stats::Moments { n, sum, sum_sq } => {
                *n += 1.0;
                *sum += y;
                *sum_sq += y * y;
            }
        }
    }

    fn minus(&self, other: &Stats) -> Stats {
        match (self, other) {
            (Stats::Counts(a), Stats::Counts(b)) => {
                Stats::Counts(a.iter().zip(b).map(|(x, y)| x - y).collect())
            }
            (
                Stats::Moments { n, sum, sum_sq },
                Stats::Moments {
                    n: n2,
                    sum: s2,
                    sum_sq: q2,
                },
            ) => Stats::Moments {
                n: n - n2,
                sum: sum - s2,
                sum_sq: sum_sq - q2,
            },
            _ => self.clone(),
        }
    }

    /// Gini for classification, variance for regression.
    fn impurity(&self) -> f64 {
        match self {
            Stats::Counts(counts) => {
                let n: f64 = counts.iter().sum();
                if n == 0.0 {
                    return 0.0;
                }
                1.0 - counts.iter().map(|c| (c / n).powi(2)).sum::<f64>()
            }
            Stats::Moments { n, sum, sum_sq } => {
                if *n == 0.0 {
                    return 0.0;
                }
                (sum_sq / n - (sum / n).powi(2)).max(0.0)
            }
        }
    }

    fn leaf_value(&self) -> Vec<f64> {
        match self {
            Stats::Counts(counts) => {
                let n: f64 = counts.iter().sum();
                if n == 0.0 {
                    counts.clone()
                } else {
                    counts.iter().map(|c| c / n).collect()
                }
            }
            Stats::Moments { n, sum, .. } => vec![if *n == 0.0 { 0.0 } else { sum / n }],
        }
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted impurity decrease, `n * parent - (n_l * left + n_r * right)`.
    decrease: f64,
}

const MIN_DECREASE: f64 = 1e-12;

/// Decision tree model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    params: TreeParams,
    task: Task,
    seed: u64,
    nodes: Vec<Node>,
    importances: Vec<f64>,
    n_features: usize,
}

impl DecisionTree {
    pub fn new(task: Task, params: TreeParams, seed: u64) -> Self {
        Self {
            params,
            task,
            seed,
            nodes: Vec::new(),
            importances: Vec::new(),
            n_features: 0,
        }
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], idx: usize) -> usize {
            match &nodes[idx] {
                Node::Leaf { .. } => 1,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    /// Fit on `rows` of `x` (repeats allowed, as in a bootstrap sample).
    pub(crate) fn fit_rows(&mut self, x: &Array2<f64>, y: &[f64], rows: &[usize], rng: &mut StdRng) -> Result<()> {
        if rows.is_empty() {
            return Err(LearningError::TrainingFailed(
                "cannot fit a tree on zero rows".to_string(),
            ));
        }
        self.n_features = x.ncols();
        self.nodes.clear();
        self.importances = vec![0.0; self.n_features];

        self.grow(x, y, rows.to_vec(), 0, rng);

        let total: f64 = self.importances.iter().sum();
        if total > 0.0 {
            for imp in &mut self.importances {
                *imp /= total;
            }
        }
        Ok(())
    }

    fn stats(&self, y: &[f64], rows: &[usize]) -> Stats {
        let mut stats = Stats::empty(self.task);
        for &r in rows {
            stats.add(y[r]);
        }
        stats
    }

    fn grow(&mut self, x: &Array2<f64>, y: &[f64], rows: Vec<usize>, depth: usize, rng: &mut StdRng) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(Node::Leaf { value: Vec::new() });

        let stats = self.stats(y, &rows);
        let n = rows.len();
        let stop = self.params.max_depth.is_some_and(|d| depth >= d)
            || n < self.params.min_samples_split
            || n < 2 * self.params.min_samples_leaf
            || stats.impurity() <= MIN_DECREASE;

        let candidate = if stop {
            None
        } else {
            self.best_split(x, y, &rows, &stats, rng)
        };

        let Some(split) = candidate else {
            self.nodes[idx] = Node::Leaf {
                value: stats.leaf_value(),
            };
            return idx;
        };

        self.importances[split.feature] += split.decrease;
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| x[[r, split.feature]] <= split.threshold);

        let left = self.grow(x, y, left_rows, depth + 1, rng);
        let right = self.grow(x, y, right_rows, depth + 1, rng);
        self.nodes[idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn candidate_features(&self, rng: &mut StdRng) -> Vec<usize> {
        match self.params.max_features {
            Some(m) if m < self.n_features => index::sample(rng, self.n_features, m.max(1)).into_vec(),
            _ => (0..self.n_features).collect(),
        }
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &[f64],
        rows: &[usize],
        parent: &Stats,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n = rows.len();
        let parent_weighted = n as f64 * parent.impurity();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<SplitCandidate> = None;

        for feature in self.candidate_features(rng) {
            let mut pairs: Vec<(f64, f64)> = rows.iter().map(|&r| (x[[r, feature]], y[r])).collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left = Stats::empty(self.task);
            for i in 0..n - 1 {
                left.add(pairs[i].1);
                let (value, next) = (pairs[i].0, pairs[i + 1].0);
                if value == next {
                    continue;
                }
                let n_left = i + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }
                let right = parent.minus(&left);
                let children = n_left as f64 * left.impurity() + n_right as f64 * right.impurity();
                let decrease = parent_weighted - children;
                if decrease > MIN_DECREASE && best.as_ref().is_none_or(|b| decrease > b.decrease) {
                    let mid = (value + next) / 2.0;
                    let threshold = if mid >= next { value } else { mid };
                    best = Some(SplitCandidate {
                        feature,
                        threshold,
                        decrease,
                    });
                }
            }
        }
        best
    }

    /// Index of the leaf `row` lands in.
    pub(crate) fn leaf_index(&self, row: ArrayView1<f64>) -> usize {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { .. } => return idx,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Replace a leaf's stored value; boosting sets Newton steps this way.
    pub(crate) fn set_leaf_value(&mut self, leaf: usize, value: f64) {
        if let Some(Node::Leaf { value: stored }) = self.nodes.get_mut(leaf) {
            *stored = vec![value];
        }
    }

    pub(crate) fn leaf_value(&self, row: ArrayView1<f64>) -> &[f64] {
        match &self.nodes[self.leaf_index(row)] {
            Node::Leaf { value } => value,
            Node::Split { .. } => &[],
        }
    }

    fn ensure_fitted(&self, x: &Array2<f64>) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(LearningError::InferenceError("decision tree is not fitted".to_string()));
        }
        check_width(x, self.n_features)
    }
}

impl Estimator for DecisionTree {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        let targets = y.to_vec();
        let rows: Vec<usize> = (0..x.nrows()).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        self.fit_rows(x, &targets, &rows, &mut rng)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.ensure_fitted(x)?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let value = self.leaf_value(row);
                match self.task {
                    Task::Classification { .. } => argmax(value) as f64,
                    Task::Regression => value.first().copied().unwrap_or(0.0),
                }
            })
            .collect())
    }

    fn supports_importance(&self) -> bool {
        true
    }

    fn importance(&self) -> Option<Vec<f64>> {
        Some(self.importances.clone())
    }

    fn supports_probabilities(&self) -> bool {
        matches!(self.task, Task::Classification { .. })
    }

    fn probabilities(&self, x: &Array2<f64>) -> Result<Option<Array2<f64>>> {
        let Task::Classification { n_classes } = self.task else {
            return Ok(None);
        };
        self.ensure_fitted(x)?;
        let mut out = Array2::zeros((x.nrows(), n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (k, p) in self.leaf_value(row).iter().enumerate().take(n_classes) {
                out[[i, k]] = *p;
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
    fn test_classifier_separates_threshold() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new(Task::Classification { n_classes: 2 }, TreeParams::default(), 42);
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.predict(&x).unwrap(), y);
        assert_eq!(tree.depth(), 2);
        let importances = tree.importance().unwrap();
        assert_eq!(importances, vec![1.0, 0.0]);
    }

    #[test]
    fn test_regressor_fits_training_data() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![1.0, 2.0, 3.0, 4.0, 5.0];
        let mut tree = DecisionTree::new(Task::Regression, TreeParams::default(), 0);
        tree.fit(&x, &y).unwrap();
        let predictions = tree.predict(&x).unwrap();
        for (p, t) in predictions.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-12);
        }
        assert_eq!(tree.n_leaves(), 5);
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0], [6.0]];
        let y = array![0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let params = TreeParams {
            max_depth: Some(1),
            ..Default::default()
        };
        let mut tree = DecisionTree::new(Task::Classification { n_classes: 2 }, params, 1);
        tree.fit(&x, &y).unwrap();
        assert!(tree.depth() <= 2);
    }

    #[test]
    fn test_probabilities_are_leaf_distributions() {
        let x = array![[0.0], [0.0], [0.0], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new(Task::Classification { n_classes: 2 }, TreeParams::default(), 3);
        tree.fit(&x, &y).unwrap();
        let proba = tree.probabilities(&array![[0.0], [1.0]]).unwrap().unwrap();
        assert!((proba[[0, 0]] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(proba[[1, 1]], 1.0);
    }

    #[test]
    fn test_wrong_width_is_inference_error() {
        let x = array![[1.0], [2.0]];
        let mut tree = DecisionTree::new(Task::Regression, TreeParams::default(), 0);
        tree.fit(&x, &array![1.0, 2.0]).unwrap();
        assert!(matches!(
            tree.predict(&array![[1.0, 2.0]]),
            Err(LearningError::InferenceError(_))
        ));
    }

    #[test]
    fn test_serializes_flat() {
        let x = array![[1.0], [2.0], [3.0]];
        let mut tree = DecisionTree::new(Task::Regression, TreeParams::default(), 0);
        tree.fit(&x, &array![1.0, 1.0, 5.0]).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let back: DecisionTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back.predict(&x).unwrap(), tree.predict(&x).unwrap());
    }
}
