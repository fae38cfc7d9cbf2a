//! Tabular AutoML backend
//!
//! The orchestrator only talks to the [`AutoMl`] trait: configure an
//! experiment, compare candidate families under cross-validation, tune the
//! winner, persist it, and score new rows. [`NativeAutoMl`] is the in-crate
//! implementation.

pub mod cv;
pub mod estimators;
pub mod metrics;
mod native;
pub mod preprocess;
pub mod search;

pub use estimators::{Algorithm, Estimator};
pub use metrics::{Metric, MetricScores};
pub use native::NativeAutoMl;
pub use preprocess::{ClassLabel, FeaturePipeline, TargetEncoder};
pub use search::Hyperparams;

use std::path::Path;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dataset::Dataset;
use crate::error::{AutomlError, Result};
use crate::task::TaskKind;
use cv::Fold;

/// File holding a persisted model inside its directory
pub const MODEL_FILE: &str = "model.json";

/// Column of a scored table holding the predicted label or value
pub const PREDICTION_LABEL: &str = "prediction_label";

/// Prefix of the per-class probability columns of a scored table
pub const PREDICTION_SCORE_PREFIX: &str = "prediction_score_";

/// Column-named rows of JSON values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Ranked candidate results, best first
pub type Leaderboard = Table;

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }

    /// One map per row, keyed by column name.
    pub fn records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

/// A configured experiment: transformed features, encoded target and folds
#[derive(Debug, Clone)]
pub struct Experiment {
    pub task: TaskKind,
    pub target_column: String,
    pub seed: u64,
    pub pipeline: FeaturePipeline,
    pub target: TargetEncoder,
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub folds: Vec<Fold>,
}

impl Experiment {
    pub fn n_classes(&self) -> usize {
        self.target.n_classes()
    }

    pub fn n_rows(&self) -> usize {
        self.x.nrows()
    }
}

/// A model family with concrete hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub algorithm: Algorithm,
    pub params: Hyperparams,
}

impl Candidate {
    pub fn with_defaults(algorithm: Algorithm) -> Self {
        Self {
            params: algorithm.default_params(),
            algorithm,
        }
    }
}

/// Result of comparing candidate families
#[derive(Debug, Clone)]
pub struct Comparison {
    pub leaderboard: Leaderboard,
    pub best: Candidate,
}

/// A trained, persistable model with everything needed to score raw rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    pub algorithm: Algorithm,
    pub params: Hyperparams,
    pub task: TaskKind,
    pub target_column: String,
    pub pipeline: FeaturePipeline,
    pub target: TargetEncoder,
    pub estimator: Estimator,
    /// Cross-validated score of `params` on `optimized_metric`
    pub cv_score: f64,
    pub optimized_metric: String,
    pub trained_at: String,
}

impl FittedModel {
    pub fn class_name(&self) -> &'static str {
        self.algorithm.class_name()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.pipeline.feature_names()
    }
}

/// Write a model as `<dir>/model.json`.
pub fn save_model(model: &FittedModel, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string(model)?;
    std::fs::write(dir.join(MODEL_FILE), json)?;
    Ok(())
}

pub fn load_model(dir: &Path) -> Result<FittedModel> {
    let path = dir.join(MODEL_FILE);
    let json = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => AutomlError::ModelNotFound(format!(
            "Model '{}' not found",
            dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default()
        )),
        _ => AutomlError::Io(e),
    })?;
    Ok(serde_json::from_str(&json)?)
}

/// AutoML backend used by the training orchestrator
pub trait AutoMl: Send + Sync {
    /// Validate and transform the data, and fix the CV folds for `seed`.
    fn setup(&self, dataset: &Dataset, target: &str, task: TaskKind, seed: u64) -> Result<Experiment>;

    /// Cross-validate every candidate family and rank them by `sort`.
    fn compare(&self, experiment: &Experiment, sort: Metric) -> Result<Comparison>;

    /// Search hyperparameters around `candidate` and refit on all rows.
    fn tune(&self, experiment: &Experiment, candidate: &Candidate, optimize: Metric) -> Result<FittedModel>;

    fn predict(&self, model: &FittedModel, data: &Dataset) -> Result<Table>;

    fn save(&self, model: &FittedModel, dir: &Path) -> Result<()> {
        save_model(model, dir)
    }

    fn load(&self, dir: &Path) -> Result<FittedModel> {
        load_model(dir)
    }
}
