//! Integration tests for training, persistence and prediction.
//!
//! Every test trains on a small in-memory dataset and writes artifacts to
//! its own temporary directory.

use std::sync::{Arc, Mutex};

use adaptml_learning::{
    Algorithm, ArtifactStore, FileArtifactStore, LearningError, Predictor, ProblemType, Trainer,
    TrainingConfig, TrainingStage, compare_models, optimize_hyperparameters,
};
use adaptml_processing::ErrorKind;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

const CITIES: [&str; 3] = ["Paris", "Lyon", "Nice"];

/// `label` is `yes` exactly when income exceeds 50k.
fn customers() -> DataFrame {
    let n = 60;
    let age: Vec<i64> = (0..n).map(|i| 20 + (i * 7) % 45).collect();
    let income: Vec<f64> = (0..n).map(|i| 20_000.0 + ((i * 1371) % 60_000) as f64).collect();
    let city: Vec<&str> = (0..n).map(|i| CITIES[(i % 3) as usize]).collect();
    let label: Vec<&str> = income.iter().map(|v| if *v > 50_000.0 { "yes" } else { "no" }).collect();
    df!("age" => age, "income" => income, "city" => city, "label" => label).unwrap()
}

fn prices() -> DataFrame {
    let n = 50;
    let size: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let rooms: Vec<f64> = (0..n).map(|i| ((i * 3) % 7) as f64).collect();
    let price: Vec<f64> = size.iter().zip(&rooms).map(|(s, r)| 2.0 * s + 0.5 * r + 1.0).collect();
    df!("size" => size, "rooms" => rooms, "price" => price).unwrap()
}

fn config(target: &str, algorithm: &str, session: &str) -> TrainingConfig {
    TrainingConfig::builder()
        .target_column(target)
        .algorithm(algorithm)
        .session_id(session)
        .build()
        .unwrap()
}

fn trainer(dir: &TempDir) -> Trainer<FileArtifactStore> {
    Trainer::new(FileArtifactStore::new(dir.path()))
}

fn row(age: i64, income: f64, city: &str) -> Value {
    json!({"age": age, "income": income, "city": city})
}

// ============================================================================
// Training
// ============================================================================

#[test]
fn test_out_of_range_test_size_persists_nothing() {
    let dir = TempDir::new().unwrap();
    let config = TrainingConfig {
        target_column: "label".to_string(),
        test_size: 0.6,
        ..Default::default()
    };
    let err = trainer(&dir).train(&customers(), &config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(FileArtifactStore::new(dir.path()).list().unwrap().is_empty());
}

#[test]
fn test_missing_target_column() {
    let dir = TempDir::new().unwrap();
    let err = trainer(&dir)
        .train(&customers(), &config("churn", "decision_tree", "s1"))
        .unwrap_err();
    assert!(matches!(err, LearningError::TargetNotFound(ref c) if c == "churn"));
}

#[test]
fn test_unsupported_algorithm_for_detected_problem() {
    let dir = TempDir::new().unwrap();
    let err = trainer(&dir)
        .train(&prices(), &config("price", "naive_bayes", "s1"))
        .unwrap_err();
    assert!(matches!(err, LearningError::UnsupportedAlgorithm { .. }));
    assert!(FileArtifactStore::new(dir.path()).list().unwrap().is_empty());
}

#[test]
fn test_classification_training_result() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "decision_tree", "custsession42"))
        .unwrap();

    assert!(result.model_id.starts_with("model_custsess_"));
    assert_eq!(result.problem_type, ProblemType::Classification);
    assert_eq!(result.training_info.training_samples + result.training_info.test_samples, 60);
    let accuracy = result.evaluation_metrics.accuracy.unwrap();
    assert!(accuracy >= 0.75, "accuracy {accuracy}");
    assert!(result.evaluation_metrics.confusion_matrix.is_some());
    assert!(result.evaluation_metrics.rmse.is_none());
    assert!(result.feature_importance.len() <= 10);
    assert!(result.feature_importance.windows(2).all(|w| w[0].1 >= w[1].1));

    let metadata = FileArtifactStore::new(dir.path()).metadata(&result.model_id).unwrap();
    assert_eq!(metadata.feature_names, vec!["age", "income", "city"]);
    assert_eq!(metadata.class_labels, Some(vec!["no".to_string(), "yes".to_string()]));
    assert_eq!(metadata.data_completeness, 1.0);
}

#[test]
fn test_regression_training_and_prediction() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&prices(), &config("price", "linear_regression", "houses"))
        .unwrap();
    assert_eq!(result.problem_type, ProblemType::Regression);
    assert!(result.evaluation_metrics.r2_score.unwrap() > 0.8);
    assert!(result.evaluation_metrics.accuracy.is_none());

    let predictor = Predictor::new(FileArtifactStore::new(dir.path()));
    let single = predictor
        .predict(&result.model_id, &[json!({"size": 10.0, "rooms": 2.0})])
        .unwrap();
    assert_eq!(single.predictions[0].confidence, 0.8);
    assert!(single.predictions[0].prediction.is_number());
    assert!(single.predictions[0].probabilities.is_none());

    let batch = predictor
        .predict(
            &result.model_id,
            &[json!({"size": 1.0, "rooms": 0.0}), json!({"size": 40.0, "rooms": 6.0})],
        )
        .unwrap();
    let confidence = batch.predictions[0].confidence;
    assert!((0.1..=0.9).contains(&confidence));
    assert_eq!(batch.predictions[1].confidence, confidence);
}

#[test]
fn test_auto_algorithm_picks_supported_candidate() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "auto", "autosel"))
        .unwrap();
    assert!(result.algorithm.supports(ProblemType::Classification));
}

#[test]
fn test_same_session_gets_distinct_model_ids() {
    let dir = TempDir::new().unwrap();
    let trainer = trainer(&dir);
    let config = config("label", "logistic_regression", "repeat");
    let first = trainer.train(&customers(), &config).unwrap();
    let second = trainer.train(&customers(), &config).unwrap();
    assert_ne!(first.model_id, second.model_id);
    assert_eq!(FileArtifactStore::new(dir.path()).list().unwrap().len(), 2);
}

#[test]
fn test_progress_reports_every_stage() {
    let dir = TempDir::new().unwrap();
    let stages = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&stages);
    let trainer = Trainer::builder()
        .store(FileArtifactStore::new(dir.path()))
        .on_progress(move |u| seen.lock().unwrap().push(u.stage))
        .build()
        .unwrap();
    trainer
        .train(&customers(), &config("label", "naive_bayes", "progress"))
        .unwrap();

    let stages = stages.lock().unwrap();
    assert_eq!(
        *stages,
        vec![
            TrainingStage::Preparing,
            TrainingStage::Training,
            TrainingStage::Evaluation,
            TrainingStage::Saving,
            TrainingStage::Complete,
        ]
    );
}

// ============================================================================
// Prediction
// ============================================================================

#[test]
fn test_predictions_carry_labels_and_probabilities() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "random_forest", "probs"))
        .unwrap();
    let batch = Predictor::new(FileArtifactStore::new(dir.path()))
        .predict(&result.model_id, &[row(30, 80_000.0, "Paris"), row(50, 21_000.0, "Nice")])
        .unwrap();

    assert_eq!(batch.predictions.len(), 2);
    for prediction in &batch.predictions {
        assert!((0.0..=1.0).contains(&prediction.confidence));
        let probabilities = prediction.probabilities.as_ref().unwrap();
        let keys: Vec<&str> = probabilities.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["no", "yes"]);
        assert!((probabilities.values().sum::<f64>() - 1.0).abs() < 1e-9);
    }
    assert_eq!(batch.predictions[0].prediction, json!("yes"));
    assert_eq!(batch.predictions[1].prediction, json!("no"));
}

#[test]
fn test_missing_feature_is_named_exactly() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "decision_tree", "missing"))
        .unwrap();
    let err = Predictor::new(FileArtifactStore::new(dir.path()))
        .predict(
            &result.model_id,
            &[row(30, 60_000.0, "Lyon"), json!({"age": 30, "income": 60_000.0})],
        )
        .unwrap_err();
    match err {
        LearningError::MissingFeatures { features } => assert_eq!(features, vec!["city"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_key_order_and_extra_fields_do_not_matter() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "knn", "ordering"))
        .unwrap();
    let predictor = Predictor::new(FileArtifactStore::new(dir.path()));

    let ordered = predictor
        .predict(&result.model_id, &[row(41, 55_000.0, "Nice")])
        .unwrap();
    let shuffled = predictor
        .predict(
            &result.model_id,
            &[json!({"city": "Nice", "unused": "x", "income": 55_000.0, "age": 41})],
        )
        .unwrap();
    assert_eq!(ordered.predictions, shuffled.predictions);
}

#[test]
fn test_logistic_probabilities_on_single_feature() {
    let dir = TempDir::new().unwrap();
    let plan: Vec<&str> = (0..30).map(|i| ["basic", "pro"][i % 2]).collect();
    let churn: Vec<&str> = plan.iter().map(|p| if *p == "pro" { "yes" } else { "no" }).collect();
    let df = df!("plan" => plan, "churn" => churn).unwrap();

    let result = trainer(&dir)
        .train(&df, &config("churn", "logistic_regression", "single"))
        .unwrap();
    let batch = Predictor::new(FileArtifactStore::new(dir.path()))
        .predict(&result.model_id, &[json!({"plan": "pro"}), json!({"plan": "basic"})])
        .unwrap();

    for prediction in &batch.predictions {
        let probabilities = prediction.probabilities.as_ref().unwrap();
        assert!(probabilities.values().all(|p| (0.0..=1.0).contains(p)));
        assert!((probabilities.values().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!((0.0..=1.0).contains(&prediction.confidence));
    }
    assert_eq!(batch.predictions[0].prediction, json!("yes"));
    assert_eq!(batch.predictions[1].prediction, json!("no"));
}

#[test]
fn test_unseen_category_uses_encoder_fallback() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "logistic_regression", "unseen"))
        .unwrap();
    let batch = Predictor::new(FileArtifactStore::new(dir.path()))
        .predict(&result.model_id, &[row(33, 70_000.0, "Marseille")])
        .unwrap();
    assert_eq!(batch.predictions.len(), 1);
}

#[test]
fn test_non_numeric_value_for_numeric_feature() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "decision_tree", "badvalue"))
        .unwrap();
    let err = Predictor::new(FileArtifactStore::new(dir.path()))
        .predict(
            &result.model_id,
            &[json!({"age": "forty", "income": 50_000.0, "city": "Paris"})],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Computation);
}

#[test]
fn test_empty_batch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "decision_tree", "empty"))
        .unwrap();
    let err = Predictor::new(FileArtifactStore::new(dir.path()))
        .predict(&result.model_id, &[])
        .unwrap_err();
    assert!(matches!(err, LearningError::InvalidData(_)));
}

// ============================================================================
// Artifacts
// ============================================================================

#[test]
fn test_artifact_round_trip_preserves_predictions() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "xgboost", "roundtrip"))
        .unwrap();
    let store = FileArtifactStore::new(dir.path());
    let artifact = store.load(&result.model_id).unwrap();
    assert_eq!(artifact.metadata.model_id, result.model_id);

    let rows = [row(25, 30_000.0, "Lyon"), row(60, 75_000.0, "Paris")];
    let before = artifact.pipeline.predict_rows(&rows).unwrap();
    let restored =
        adaptml_learning::TrainedModel::from_bytes(&artifact.pipeline.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.predict_rows(&rows).unwrap(), before);

    let served = Predictor::new(store).predict(&result.model_id, &rows).unwrap();
    assert_eq!(served.predictions, before);
}

#[test]
fn test_unknown_model_is_not_found() {
    let dir = TempDir::new().unwrap();
    let err = Predictor::new(FileArtifactStore::new(dir.path()))
        .predict("model_unknown_20250101_000000", &[json!({"a": 1})])
        .unwrap_err();
    assert!(matches!(err, LearningError::ModelNotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_record_without_pipeline_is_inconsistent() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "decision_tree", "halfrec"))
        .unwrap();
    let path = dir.path().join(format!("{}.json", result.model_id));
    let mut record: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    record.as_object_mut().unwrap().remove("pipeline");
    std::fs::write(&path, serde_json::to_vec(&record).unwrap()).unwrap();

    let err = Predictor::new(FileArtifactStore::new(dir.path()))
        .predict(&result.model_id, &[row(30, 40_000.0, "Nice")])
        .unwrap_err();
    assert!(matches!(err, LearningError::InconsistentArtifact { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_model_summary_has_no_pipeline() {
    let dir = TempDir::new().unwrap();
    let result = trainer(&dir)
        .train(&customers(), &config("label", "decision_tree", "summary"))
        .unwrap();
    let metadata = Predictor::new(FileArtifactStore::new(dir.path()))
        .model_summary(&result.model_id)
        .unwrap();
    let json = serde_json::to_value(&metadata).unwrap();
    assert!(json.get("pipeline").is_none());
    assert_eq!(json["algorithm"], "decision_tree");

    let report = adaptml_learning::insights::model_report(
        &adaptml_processing::ai::Summarizer::offline(),
        &metadata,
    );
    assert!(report.summary.contains("Decision Tree"));
    assert!(report.summary.contains("'label'"));
}

// ============================================================================
// Search
// ============================================================================

#[test]
fn test_grid_search_evaluates_every_combination() {
    let mut grid = adaptml_learning::ParamGrid::new();
    grid.insert("n_neighbors".to_string(), vec![json!(3), json!(5)]);
    let config = TrainingConfig::builder()
        .target_column("label")
        .cv_folds(3)
        .build()
        .unwrap();

    let result = optimize_hyperparameters(&customers(), &config, Algorithm::Knn, &grid).unwrap();
    assert_eq!(result.total_fits, 2);
    assert_eq!(result.evaluated.len(), 2);
    assert!(result.best_params.contains_key("n_neighbors"));
    assert_eq!(result.cv_scores.len(), 3);
    assert!(result.test_metrics.accuracy.is_some());
}

#[test]
fn test_compare_models_ranks_best_first() {
    let config = TrainingConfig::builder()
        .target_column("price")
        .cv_folds(3)
        .build()
        .unwrap();
    let comparison = compare_models(
        &prices(),
        &config,
        &[Algorithm::DecisionTree, Algorithm::LinearRegression],
    )
    .unwrap();
    assert_eq!(comparison.problem_type, ProblemType::Regression);
    assert_eq!(comparison.ranking.len(), 2);
    let scores: Vec<f64> = comparison
        .ranking
        .iter()
        .map(|r| r.primary_metric.unwrap_or(f64::NEG_INFINITY))
        .collect();
    assert!(scores[0] >= scores[1]);
}
