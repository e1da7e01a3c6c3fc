//! Grid search and model comparison by k-fold cross-validation.
//!
//! Both helpers prepare the dataset exactly as training does (split,
//! preprocessing fitted on the training partition) and report held-out
//! metrics from a refit on the whole training partition. Cross-validation
//! refits the preprocessing plan on each fold's training rows, so
//! validation rows never inform imputation, scaling or encoding.

use ndarray::{Array1, Array2, Axis};
use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use adaptml_processing::{AdaptivePreprocessor, ErrorKind, ProblemType};

use crate::config::{Algorithm, Hyperparameters, ParamGrid, TrainingConfig};
use crate::error::{LearningError, Result};
use crate::estimators::{Estimator, Task, build_model, to_array};
use crate::metrics::{mean_squared_error, mean_std};
use crate::split::{Split, k_fold, stratified_k_fold};
use crate::trainer::{Prepared, evaluate, prepare, take_rows};
use crate::types::EvaluationMetrics;

/// CV statistics for one hyperparameter combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedParams {
    pub params: Hyperparameters,
    pub mean_score: f64,
    pub std_score: f64,
}

/// Outcome of [`optimize_hyperparameters`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub algorithm: Algorithm,
    pub problem_type: ProblemType,
    /// `accuracy` or `neg_mean_squared_error`; higher is better.
    pub scoring: String,
    pub best_params: Hyperparameters,
    pub best_cv_score: f64,
    pub test_metrics: EvaluationMetrics,
    /// Per-fold scores of the best combination.
    pub cv_scores: Vec<f64>,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub evaluated: Vec<EvaluatedParams>,
    /// Combinations that completed.
    pub total_fits: usize,
}

/// One row of a [`ModelComparison`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedModel {
    pub algorithm: Algorithm,
    /// Held-out accuracy (classification) or R² (regression).
    pub primary_metric: Option<f64>,
    pub cv_mean: f64,
    pub cv_std: f64,
    pub test_metrics: EvaluationMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub best_score: Option<f64>,
    /// Worst minus best primary metric (zero or negative).
    pub score_range: Option<f64>,
    pub most_stable: Algorithm,
}

/// Outcome of [`compare_models`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelComparison {
    pub problem_type: ProblemType,
    /// Best first.
    pub ranking: Vec<RankedModel>,
    pub recommendations: Vec<String>,
    pub performance_summary: PerformanceSummary,
}

/// Every combination of the grid's values, keys in sorted order. An empty
/// grid yields one empty combination.
pub fn expand_grid(grid: &ParamGrid) -> Vec<Hyperparameters> {
    let mut combos = vec![Hyperparameters::new()];
    for (key, values) in grid {
        if values.is_empty() {
            continue;
        }
        combos = combos
            .into_iter()
            .flat_map(|base| {
                values.iter().map(move |v| {
                    let mut next = base.clone();
                    next.insert(key.clone(), v.clone());
                    next
                })
            })
            .collect();
    }
    combos
}

fn scoring_name(problem_type: ProblemType) -> &'static str {
    match problem_type {
        ProblemType::Classification => "accuracy",
        ProblemType::Regression => "neg_mean_squared_error",
    }
}

fn score(task: Task, y_true: &Array1<f64>, y_pred: &Array1<f64>) -> f64 {
    match task {
        Task::Classification { .. } => {
            let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
            correct as f64 / y_true.len().max(1) as f64
        }
        Task::Regression => -mean_squared_error(&y_true.to_vec(), &y_pred.to_vec()),
    }
}

fn folds(data: &Prepared, cv_folds: usize, seed: u64) -> Result<Vec<Split>> {
    match data.task {
        Task::Classification { .. } => {
            let labels: Vec<usize> = data.y_train.iter().map(|v| *v as usize).collect();
            stratified_k_fold(&labels, cv_folds, seed)
        }
        Task::Regression => k_fold(data.y_train.len(), cv_folds, seed),
    }
}

/// One cross-validation fold, preprocessed with a plan fitted on its own
/// training rows.
struct Fold {
    x_fit: Array2<f64>,
    y_fit: Array1<f64>,
    x_val: Array2<f64>,
    y_val: Array1<f64>,
}

fn preprocess_folds(data: &Prepared, config: &TrainingConfig, splits: &[Split]) -> Result<Vec<Fold>> {
    let preprocessor = AdaptivePreprocessor::new(config.preprocessing.clone());
    splits
        .par_iter()
        .map(|split| {
            let fit_df = take_rows(&data.train_df, &split.train)?;
            let val_df = take_rows(&data.train_df, &split.test)?;
            let y_fit = data.y_train.select(Axis(0), &split.train);
            let (fitted, _) = preprocessor.fit(
                &fit_df,
                &config.target_column,
                data.problem_type,
                &y_fit.to_vec(),
            )?;
            Ok(Fold {
                x_fit: to_array(&fitted.transform(&fit_df)?),
                y_fit,
                x_val: to_array(&fitted.transform(&val_df)?),
                y_val: data.y_train.select(Axis(0), &split.test),
            })
        })
        .collect()
}

fn cross_validate(
    task: Task,
    algorithm: Algorithm,
    params: &Hyperparameters,
    folds: &[Fold],
    seed: u64,
) -> Result<Vec<f64>> {
    folds
        .iter()
        .map(|fold| {
            let mut model = build_model(algorithm, task, params, seed)?;
            model.fit(&fold.x_fit, &fold.y_fit)?;
            Ok(score(task, &fold.y_val, &model.predict(&fold.x_val)?))
        })
        .collect()
}

fn refit_and_evaluate(data: &Prepared, algorithm: Algorithm, params: &Hyperparameters, seed: u64) -> Result<EvaluationMetrics> {
    let mut model = build_model(algorithm, data.task, params, seed)?;
    model.fit(&data.x_train, &data.y_train)?;
    evaluate(&model, data.task, &data.x_test, &data.y_test)
}

/// Exhaustive grid search with k-fold cross-validation (stratified for
/// classification).
///
/// `config` supplies the target, split, seed, fold count and preprocessing
/// overrides. Combinations run in parallel. A combination whose fit fails
/// is skipped; an invalid hyperparameter in the grid fails the search.
pub fn optimize_hyperparameters(
    df: &DataFrame,
    config: &TrainingConfig,
    algorithm: Algorithm,
    grid: &ParamGrid,
) -> Result<SearchResult> {
    config.validate()?;
    let data = prepare(df, config)?;
    algorithm.ensure_supports(data.problem_type)?;
    let splits = folds(&data, config.cv_folds, config.random_seed)?;
    let cv_folds = preprocess_folds(&data, config, &splits)?;
    let combos = expand_grid(grid);
    tracing::info!(
        algorithm = %algorithm,
        combinations = combos.len(),
        folds = cv_folds.len(),
        "hyperparameter search started"
    );

    let outcomes: Vec<(Hyperparameters, Result<Vec<f64>>)> = combos
        .into_par_iter()
        .map(|params| {
            let scores = cross_validate(data.task, algorithm, &params, &cv_folds, config.random_seed);
            (params, scores)
        })
        .collect();

    let mut evaluated = Vec::new();
    let mut best: Option<(Hyperparameters, Vec<f64>, f64)> = None;
    let mut last_error = None;
    for (params, outcome) in outcomes {
        match outcome {
            Ok(scores) => {
                let (mean, std) = mean_std(&scores);
                evaluated.push(EvaluatedParams {
                    params: params.clone(),
                    mean_score: mean,
                    std_score: std,
                });
                if best.as_ref().is_none_or(|(_, _, b)| mean > *b) {
                    best = Some((params, scores, mean));
                }
            }
            Err(err) if err.kind() == ErrorKind::Validation => return Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "combination failed, skipping");
                last_error = Some(err);
            }
        }
    }

    let Some((best_params, cv_scores, best_cv_score)) = best else {
        return Err(last_error
            .map(LearningError::training)
            .unwrap_or_else(|| LearningError::TrainingFailed("no combination was evaluated".to_string())));
    };

    let test_metrics = refit_and_evaluate(&data, algorithm, &best_params, config.random_seed).map_err(LearningError::training)?;
    let (cv_mean, cv_std) = mean_std(&cv_scores);
    tracing::info!(algorithm = %algorithm, best_cv_score, "hyperparameter search finished");

    Ok(SearchResult {
        algorithm,
        problem_type: data.problem_type,
        scoring: scoring_name(data.problem_type).to_string(),
        best_params,
        best_cv_score,
        test_metrics,
        cv_scores,
        cv_mean,
        cv_std,
        total_fits: evaluated.len(),
        evaluated,
    })
}

/// Cross-validate each algorithm with its default hyperparameters and rank
/// them by held-out primary metric.
///
/// An algorithm the detected problem type cannot use is rejected before
/// any fitting.
pub fn compare_models(df: &DataFrame, config: &TrainingConfig, algorithms: &[Algorithm]) -> Result<ModelComparison> {
    config.validate()?;
    if algorithms.is_empty() {
        return Err(LearningError::InvalidConfig("no algorithms to compare".to_string()));
    }
    let data = prepare(df, config)?;
    for algorithm in algorithms {
        algorithm.ensure_supports(data.problem_type)?;
    }
    let splits = folds(&data, config.cv_folds, config.random_seed)?;
    let cv_folds = preprocess_folds(&data, config, &splits)?;
    let defaults = Hyperparameters::new();

    let mut ranking = algorithms
        .par_iter()
        .map(|&algorithm| {
            let scores = cross_validate(data.task, algorithm, &defaults, &cv_folds, config.random_seed)?;
            let test_metrics = refit_and_evaluate(&data, algorithm, &defaults, config.random_seed)?;
            let (cv_mean, cv_std) = mean_std(&scores);
            Ok(RankedModel {
                algorithm,
                primary_metric: test_metrics.primary(data.problem_type),
                cv_mean,
                cv_std,
                test_metrics,
            })
        })
        .collect::<Result<Vec<_>>>()
        .map_err(LearningError::training)?;

    let key = |m: &RankedModel| m.primary_metric.unwrap_or(f64::NEG_INFINITY);
    ranking.sort_by(|a, b| key(b).total_cmp(&key(a)));

    let recommendations = comparison_notes(&ranking);
    let best = &ranking[0];
    let worst = &ranking[ranking.len() - 1];
    let most_stable = ranking
        .iter()
        .min_by(|a, b| a.cv_std.total_cmp(&b.cv_std))
        .map(|m| m.algorithm)
        .unwrap_or(best.algorithm);
    let performance_summary = PerformanceSummary {
        best_score: best.primary_metric,
        score_range: worst.primary_metric.zip(best.primary_metric).map(|(w, b)| w - b),
        most_stable,
    };

    Ok(ModelComparison {
        problem_type: data.problem_type,
        ranking,
        recommendations,
        performance_summary,
    })
}

fn comparison_notes(ranking: &[RankedModel]) -> Vec<String> {
    let mut notes = Vec::new();
    if let [best, second, ..] = ranking {
        let gap = (best.primary_metric.unwrap_or(0.0) - second.primary_metric.unwrap_or(0.0)).abs();
        if gap < 0.02 {
            if best.cv_std <= second.cv_std {
                notes.push(format!("Choose {} for better stability", best.algorithm));
            } else {
                notes.push(format!("Consider {} for better stability", second.algorithm));
            }
        } else {
            notes.push(format!("{} shows clear performance advantage", best.algorithm));
        }
    }
    let stable: Vec<&str> = ranking
        .iter()
        .filter(|m| m.cv_std < 0.05)
        .take(3)
        .map(|m| m.algorithm.as_str())
        .collect();
    if !stable.is_empty() {
        notes.push(format!("Most stable models: {}", stable.join(", ")));
    }
    notes
}
