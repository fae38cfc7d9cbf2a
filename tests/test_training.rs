//! Integration test: Training pipeline end-to-end

use std::sync::Arc;

use automl_agent::automl::{Algorithm, NativeAutoMl};
use automl_agent::config::AutoMlSettings;
use automl_agent::dataset::{Dataset, DatasetLoader};
use automl_agent::normalize::{normalize, RawTrainingOutput};
use automl_agent::orchestrator::{TrainingOrchestrator, TrainingRequest};
use automl_agent::registry::ModelRegistry;
use automl_agent::task::TaskKind;
use automl_agent::AutomlError;
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn loan_dataset() -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let mut age = Vec::with_capacity(100);
    let mut income = Vec::with_capacity(100);
    let mut education = Vec::with_capacity(100);
    let mut approved = Vec::with_capacity(100);

    for _ in 0..100 {
        let a: i64 = rng.gen_range(21..65);
        let inc: f64 = rng.gen_range(20_000.0..120_000.0);
        let edu: i64 = rng.gen_range(8..20);
        let score = inc / 10_000.0 + edu as f64 * 0.5 + rng.gen_range(-1.0..1.0);
        age.push(a);
        income.push(inc);
        education.push(edu);
        approved.push(if score > 12.5 { 1i64 } else { 0 });
    }

    Dataset::from_frame(
        df!(
            "age" => age,
            "income" => income,
            "education_years" => education,
            "loan_approved" => approved
        )
        .unwrap(),
    )
}

fn settings() -> AutoMlSettings {
    AutoMlSettings {
        random_seed: 42,
        cv_folds: 3,
        tune_iterations: 3,
    }
}

fn orchestrator(models_dir: &std::path::Path, automl: NativeAutoMl) -> TrainingOrchestrator {
    let automl = Arc::new(automl);
    let registry = ModelRegistry::new(models_dir, automl.clone());
    TrainingOrchestrator::new(automl, registry, 42)
}

#[test]
fn test_end_to_end_classification() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), NativeAutoMl::new(settings()));

    let summary = orch
        .train(&loan_dataset(), &TrainingRequest::new("loan_approved"))
        .expect("training should succeed");
    assert_eq!(summary.task_type, TaskKind::Classification);
    assert!(!summary.leaderboard.is_empty());
    assert_eq!(summary.leaderboard.columns.first().map(String::as_str), Some("Model"));
    assert_eq!(summary.leaderboard.columns.last().map(String::as_str), Some("TT (Sec)"));

    let response = normalize(RawTrainingOutput::from(summary));
    assert_eq!(response.metric, "Accuracy");
    assert!((0.0..=1.0).contains(&response.metric_value));
    assert_eq!(response.task_type, "classification");
    assert_eq!(response.target_column, "loan_approved");
    assert!(!response.leaderboard.unwrap().is_empty());
}

#[test]
fn test_missing_target_creates_no_model() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), NativeAutoMl::new(settings()));

    let err = orch
        .train(&loan_dataset(), &TrainingRequest::new("nonexistent_column"))
        .unwrap_err();
    assert!(matches!(err, AutomlError::Validation(_)));
    assert_eq!(
        err.to_string(),
        "Target column 'nonexistent_column' not found in dataset. \
         Available columns: age, income, education_years, loan_approved"
    );
    assert!(orch.registry().list().unwrap().is_empty());
}

#[test]
fn test_regression_with_explicit_metric() {
    let dir = tempfile::tempdir().unwrap();
    let automl = NativeAutoMl::new(settings()).with_include(vec![Algorithm::Ridge, Algorithm::DummyRegressor]);
    let orch = orchestrator(dir.path(), automl);

    let request = TrainingRequest::new("income").with_metric(Some("MAE"));
    let summary = orch.train(&loan_dataset(), &request).unwrap();
    assert_eq!(summary.task_type, TaskKind::Regression);
    assert_eq!(summary.metric, "MAE");
    assert!(summary.model_name.starts_with("regression_"));

    let maes: Vec<f64> = (0..summary.leaderboard.len())
        .map(|row| summary.leaderboard.get(row, "MAE").and_then(|v| v.as_f64()).unwrap())
        .collect();
    assert!(maes.windows(2).all(|w| w[0] <= w[1]), "MAE should sort ascending: {:?}", maes);
}

#[test]
fn test_registry_round_trip_and_predict() {
    let dir = tempfile::tempdir().unwrap();
    let automl = NativeAutoMl::new(settings()).with_include(vec![Algorithm::LogisticRegression]);
    let orch = orchestrator(dir.path(), automl);

    let summary = orch
        .train(&loan_dataset(), &TrainingRequest::new("loan_approved"))
        .unwrap();
    assert!(summary.model_name.starts_with("classification_LogisticRegression_"));

    let registry = orch.registry();
    assert!(registry.resolve(&summary.model_name).is_ok());

    let listed = registry.list().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, summary.model_name);
    assert_eq!(listed[0].model_type, TaskKind::Classification);

    let features = serde_json::json!({"age": 35, "income": 75000, "education_years": 16});
    let outcome = registry
        .predict(&summary.model_name, features.as_object().unwrap())
        .unwrap();
    assert!(outcome.prediction.is_number());
    assert_eq!(outcome.model_type, TaskKind::Classification);

    let probabilities = outcome.probabilities.expect("classification returns probabilities");
    assert!(!probabilities.is_empty());
    let total: f64 = probabilities.values().sum();
    assert!((total - 1.0).abs() < 1e-6, "probabilities sum to {}", total);
}

#[test]
fn test_unknown_model_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), NativeAutoMl::new(settings()));
    let features = serde_json::json!({"age": 35});
    let err = orch
        .registry()
        .predict("classification_LogisticRegression_20240101_120000", features.as_object().unwrap())
        .unwrap_err();
    assert!(matches!(err, AutomlError::ModelNotFound(_)));
}

#[test]
fn test_excel_upload_trains_from_converted_csv() {
    let uploads = tempfile::tempdir().unwrap();
    let models = tempfile::tempdir().unwrap();
    let loader = DatasetLoader::new(uploads.path());
    let bytes = std::fs::read(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/cities.xlsx")).unwrap();
    let source = loader.save_upload("cities.xlsx", &bytes).unwrap();

    let loaded = loader.ingest(&source).unwrap();
    assert!(loaded.path.to_string_lossy().ends_with(".csv"));
    assert!(loaded.path.starts_with(uploads.path()));
    assert_ne!(loaded.path, source);
    assert_eq!(loaded.dataset.column_names(), vec!["x", "city", "y"]);
    assert_eq!(loaded.dataset.n_rows(), 20);

    let automl = NativeAutoMl::new(settings()).with_include(vec![Algorithm::LogisticRegression]);
    let orch = orchestrator(models.path(), automl);
    let summary = orch.train(&loaded.dataset, &TrainingRequest::new("y")).unwrap();
    assert_eq!(summary.task_type, TaskKind::Classification);
    assert!(summary.model_name.starts_with("classification_LogisticRegression_"));
    assert_eq!(orch.registry().list().unwrap().len(), 1);
}
