//! Model registry
//!
//! Persisted models live one directory per model under the models root.
//! The directory name is the model identifier, and the identifier embeds the
//! task kind verbatim: listing and prediction infer the task kind from it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::automl::{AutoMl, PREDICTION_LABEL, PREDICTION_SCORE_PREFIX};
use crate::dataset::Dataset;
use crate::error::{AutomlError, Result};
use crate::task::TaskKind;

/// Build a model identifier: `{task}_{ClassName}_{YYYYmmdd_HHMMSS}`.
///
/// Uniqueness rests on second granularity plus the class name; two models
/// of the same class finishing within one second get the same identifier.
pub fn model_identifier<Tz: TimeZone>(task: TaskKind, class_name: &str, at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}_{}_{}", task, class_name, at.format("%Y%m%d_%H%M%S"))
}

/// Task kind implied by an identifier
pub fn task_from_identifier(name: &str) -> TaskKind {
    if name.to_lowercase().contains(TaskKind::Classification.as_str()) {
        TaskKind::Classification
    } else {
        TaskKind::Regression
    }
}

/// One persisted model as seen by listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: TaskKind,
    pub path: String,
}

/// Single-row prediction result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionOutcome {
    pub prediction: Value,
    /// Class label to probability; classification only
    pub probabilities: Option<BTreeMap<String, f64>>,
    pub model_type: TaskKind,
    pub features_used: Vec<String>,
}

/// Name-based access to persisted models
#[derive(Clone)]
pub struct ModelRegistry {
    models_dir: PathBuf,
    automl: Arc<dyn AutoMl>,
}

impl ModelRegistry {
    pub fn new(models_dir: impl Into<PathBuf>, automl: Arc<dyn AutoMl>) -> Self {
        Self {
            models_dir: models_dir.into(),
            automl,
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Where a model with this identifier is persisted.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.models_dir.join(name)
    }

    /// All persisted models, sorted by name. A missing store lists as empty.
    pub fn list(&self) -> Result<Vec<ModelEntry>> {
        let entries = match std::fs::read_dir(&self.models_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(dir = %self.models_dir.display(), "Models directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut models = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            models.push(ModelEntry {
                model_type: task_from_identifier(&name),
                path: entry.path().to_string_lossy().to_string(),
                name,
            });
        }
        models.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(models)
    }

    /// Path of an existing model.
    pub fn resolve(&self, name: &str) -> Result<PathBuf> {
        let not_found = || AutomlError::ModelNotFound(format!("Model '{}' not found", name));

        let suspicious = name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..");
        if suspicious {
            warn!(model = name, "Rejected model name");
            return Err(not_found());
        }

        let path = self.path_for(name);
        if path.is_dir() {
            Ok(path)
        } else {
            Err(not_found())
        }
    }

    /// Score one feature mapping with a persisted model.
    pub fn predict(&self, name: &str, features: &Map<String, Value>) -> Result<PredictionOutcome> {
        let path = self.resolve(name)?;
        let model = self.automl.load(&path)?;
        let row = Dataset::from_record(features)?;
        let scored = self.automl.predict(&model, &row)?;

        let model_type = task_from_identifier(name);
        let prediction = scored.get(0, PREDICTION_LABEL).cloned().unwrap_or(Value::Null);

        let probabilities = match model_type {
            TaskKind::Classification => {
                let probs: BTreeMap<String, f64> = scored
                    .columns
                    .iter()
                    .filter_map(|col| {
                        let class = col.strip_prefix(PREDICTION_SCORE_PREFIX)?;
                        let p = scored.get(0, col)?.as_f64()?;
                        Some((class.to_string(), p))
                    })
                    .collect();
                Some(probs).filter(|p| !p.is_empty())
            }
            TaskKind::Regression => None,
        };

        info!(model = name, prediction = %prediction, "Prediction served");

        Ok(PredictionOutcome {
            prediction,
            probabilities,
            model_type,
            features_used: features.keys().cloned().collect(),
        })
    }
}
