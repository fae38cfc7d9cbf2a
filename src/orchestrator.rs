//! Training orchestrator
//!
//! Drives one training attempt through a fixed sequence: validate the
//! target, resolve the task kind and metric, configure the experiment,
//! compare candidates, tune the winner, persist it, and summarize.
//!
//! The reported metric comes from the comparison leaderboard, so it
//! describes the untuned family, not the tuned model that was saved.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info};

use crate::automl::{AutoMl, Leaderboard, Metric};
use crate::dataset::{validate_target, Dataset};
use crate::error::Result;
use crate::registry::{model_identifier, ModelRegistry};
use crate::task::{infer_by_distinct_count, TaskKind};

/// Resolved parameters for one training attempt
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub target: String,
    /// Raw task kind; parsed after inference so unknown values are rejected
    /// with their original spelling
    pub task_type: Option<String>,
    pub metric: Option<String>,
}

impl TrainingRequest {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    pub fn with_task_type(mut self, task_type: Option<impl Into<String>>) -> Self {
        self.task_type = task_type.map(Into::into);
        self
    }

    pub fn with_metric(mut self, metric: Option<impl Into<String>>) -> Self {
        self.metric = metric.map(Into::into);
        self
    }
}

/// Score of the top leaderboard row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Value of the requested metric, if the leaderboard has that column
    pub value: Option<f64>,
    /// Every other numeric column of the top row
    pub additional_metrics: Map<String, Value>,
}

/// Successful training outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub model_name: String,
    pub model_path: String,
    pub task_type: TaskKind,
    pub target_column: String,
    pub metric: String,
    pub performance: Performance,
    pub leaderboard: Leaderboard,
}

/// Entry point for training; holds its collaborators explicitly
#[derive(Clone)]
pub struct TrainingOrchestrator {
    automl: Arc<dyn AutoMl>,
    registry: ModelRegistry,
    seed: u64,
}

impl TrainingOrchestrator {
    pub fn new(automl: Arc<dyn AutoMl>, registry: ModelRegistry, seed: u64) -> Self {
        Self { automl, registry, seed }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Train and persist a model. Failures outside the error taxonomy come
    /// back as `TrainingFailure` with the original message.
    pub fn train(&self, dataset: &Dataset, request: &TrainingRequest) -> Result<TrainingSummary> {
        self.run(dataset, request).map_err(|e| {
            error!(target_column = %request.target, kind = ?e.kind(), error = %e, "Training failed");
            e.into_training_failure()
        })
    }

    fn run(&self, dataset: &Dataset, request: &TrainingRequest) -> Result<TrainingSummary> {
        let target = request.target.as_str();
        validate_target(dataset, target)?;

        let task = match request.task_type.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(raw) => raw.parse::<TaskKind>()?,
            None => {
                let inferred = infer_by_distinct_count(dataset, target)?;
                info!(target_column = target, task = %inferred, "Inferred task type");
                inferred
            }
        };
        let metric = Metric::resolve(request.metric.as_deref(), task)?;

        info!(
            target_column = target,
            task = %task,
            metric = %metric,
            rows = dataset.n_rows(),
            "Starting training"
        );

        let experiment = self.automl.setup(dataset, target, task, self.seed)?;
        let comparison = self.automl.compare(&experiment, metric)?;
        info!(best = comparison.best.algorithm.class_name(), "Selected best candidate");

        let model = self.automl.tune(&experiment, &comparison.best, metric)?;

        let model_name = model_identifier(task, model.class_name(), &chrono::Local::now());
        let model_path = self.registry.path_for(&model_name);
        self.automl.save(&model, &model_path)?;

        let leaderboard = comparison.leaderboard;
        let performance = top_row_performance(&leaderboard, metric);

        info!(
            model = %model_name,
            metric = %metric,
            value = ?performance.value,
            "Training complete"
        );

        Ok(TrainingSummary {
            model_name,
            model_path: model_path.to_string_lossy().to_string(),
            task_type: task,
            target_column: target.to_string(),
            metric: metric.column().to_string(),
            performance,
            leaderboard,
        })
    }
}

fn top_row_performance(leaderboard: &Leaderboard, metric: Metric) -> Performance {
    let value = leaderboard.get(0, metric.column()).and_then(Value::as_f64);

    let additional_metrics = leaderboard
        .columns
        .iter()
        .filter(|col| col.as_str() != metric.column())
        .filter_map(|col| {
            let v = leaderboard.get(0, col)?;
            v.is_number().then(|| (col.clone(), v.clone()))
        })
        .collect();

    Performance {
        value,
        additional_metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automl::{Candidate, Comparison, Experiment, FittedModel, NativeAutoMl, Table};
    use crate::config::AutoMlSettings;
    use crate::error::AutomlError;
    use polars::prelude::*;
    use serde_json::json;

    fn settings() -> AutoMlSettings {
        AutoMlSettings {
            random_seed: 42,
            cv_folds: 3,
            tune_iterations: 2,
        }
    }

    fn orchestrator(dir: &std::path::Path, automl: Arc<dyn AutoMl>) -> TrainingOrchestrator {
        TrainingOrchestrator::new(automl.clone(), ModelRegistry::new(dir, automl), 42)
    }

    fn dataset() -> Dataset {
        let x: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let y: Vec<i64> = (0..40).map(|i| if i < 20 { 0 } else { 1 }).collect();
        Dataset::from_frame(df!("x" => x, "y" => y).unwrap())
    }

    /// Backend whose comparison always fails with a plumbing error
    struct BrokenCompare(NativeAutoMl);

    impl AutoMl for BrokenCompare {
        fn setup(&self, d: &Dataset, t: &str, k: TaskKind, s: u64) -> Result<Experiment> {
            self.0.setup(d, t, k, s)
        }
        fn compare(&self, _: &Experiment, _: Metric) -> Result<Comparison> {
            Err(AutomlError::Data("solver diverged".to_string()))
        }
        fn tune(&self, e: &Experiment, c: &Candidate, m: Metric) -> Result<FittedModel> {
            self.0.tune(e, c, m)
        }
        fn predict(&self, m: &FittedModel, d: &Dataset) -> Result<Table> {
            self.0.predict(m, d)
        }
    }

    #[test]
    fn test_missing_target_is_validation_error() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(NativeAutoMl::new(settings())));
        let err = orch.train(&dataset(), &TrainingRequest::new("nope")).unwrap_err();
        assert!(matches!(err, AutomlError::Validation(_)));
        assert_eq!(err.to_string(), "Target column 'nope' not found in dataset. Available columns: x, y");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_unsupported_task_type() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(NativeAutoMl::new(settings())));
        let request = TrainingRequest::new("y").with_task_type(Some("clustering"));
        let err = orch.train(&dataset(), &request).unwrap_err();
        assert!(matches!(err, AutomlError::UnsupportedTaskType(_)));
        assert!(err.to_string().contains("clustering"));
    }

    #[test]
    fn test_metric_for_wrong_task() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(NativeAutoMl::new(settings())));
        let request = TrainingRequest::new("y").with_metric(Some("RMSE"));
        let err = orch.train(&dataset(), &request).unwrap_err();
        assert!(matches!(err, AutomlError::Validation(_)));
    }

    #[test]
    fn test_backend_errors_become_training_failures() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), Arc::new(BrokenCompare(NativeAutoMl::new(settings()))));
        let err = orch.train(&dataset(), &TrainingRequest::new("y")).unwrap_err();
        assert!(matches!(err, AutomlError::TrainingFailure(_)));
        assert!(err.to_string().contains("solver diverged"));
    }

    #[test]
    fn test_successful_training() {
        let dir = tempfile::tempdir().unwrap();
        let automl = NativeAutoMl::new(settings()).with_include(vec![
            crate::automl::Algorithm::GaussianNB,
            crate::automl::Algorithm::DummyClassifier,
        ]);
        let orch = orchestrator(dir.path(), Arc::new(automl));

        let summary = orch.train(&dataset(), &TrainingRequest::new("y")).unwrap();
        assert_eq!(summary.task_type, TaskKind::Classification);
        assert_eq!(summary.metric, "Accuracy");
        assert!(summary.model_name.starts_with("classification_GaussianNB_"));
        assert_eq!(summary.leaderboard.len(), 2);
        assert_eq!(summary.leaderboard.get(0, "Model"), Some(&json!("Naive Bayes")));

        let value = summary.performance.value.unwrap();
        assert!((0.0..=1.0).contains(&value));
        assert!(summary.performance.additional_metrics.contains_key("AUC"));
        assert!(!summary.performance.additional_metrics.contains_key("Accuracy"));
        assert!(!summary.performance.additional_metrics.contains_key("Model"));

        assert!(orch.registry().resolve(&summary.model_name).is_ok());
    }

    #[test]
    fn test_top_row_performance() {
        let mut board = Table::new(vec!["Model".into(), "MAE".into(), "R2".into()]);
        board.push_row(vec![json!("Ridge Regression"), json!(1.5), json!(0.9)]);
        let perf = top_row_performance(&board, Metric::R2);
        assert_eq!(perf.value, Some(0.9));
        assert_eq!(perf.additional_metrics.get("MAE"), Some(&json!(1.5)));

        let perf = top_row_performance(&Table::default(), Metric::R2);
        assert_eq!(perf.value, None);
        assert!(perf.additional_metrics.is_empty());
    }
}
