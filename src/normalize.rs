//! Result normalization
//!
//! Training output reaches callers along two paths: typed, straight from
//! the orchestrator, or as loose JSON coming back through the agent's tool
//! call. Both are flattened into [`TrainingResponse`], with defaults filling
//! any field that is missing.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::automl::Table;
use crate::error::{AutomlError, ErrorKind, Result};
use crate::orchestrator::TrainingSummary;

/// Leaderboard either as records or as a column/row table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LeaderboardData {
    Records(Vec<Map<String, Value>>),
    Table(Table),
}

impl LeaderboardData {
    pub fn into_records(self) -> Vec<Map<String, Value>> {
        match self {
            LeaderboardData::Records(records) => records,
            LeaderboardData::Table(table) => table.records(),
        }
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(LeaderboardData::Records(
                items.iter().filter_map(|v| v.as_object().cloned()).collect(),
            )),
            Value::Object(_) => serde_json::from_value(value.clone()).ok().map(LeaderboardData::Table),
            _ => None,
        }
    }
}

/// Training output with every field optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawTrainingOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    pub model_name: Option<String>,
    pub model_path: Option<String>,
    pub task_type: Option<String>,
    pub target_column: Option<String>,
    pub metric: Option<String>,
    pub metric_value: Option<f64>,
    /// `{<metric>: value, "additional_metrics": {...}}`
    pub performance: Option<Map<String, Value>>,
    pub leaderboard: Option<LeaderboardData>,
}

impl RawTrainingOutput {
    /// Lenient read of a JSON object; fields of the wrong type count as missing.
    pub fn from_value(value: &Value) -> Self {
        let text = |key: &str| value.get(key).and_then(Value::as_str).map(str::to_string);
        Self {
            error: text("error"),
            kind: value
                .get("kind")
                .and_then(|k| serde_json::from_value(k.clone()).ok()),
            model_name: text("model_name"),
            model_path: text("model_path"),
            task_type: text("task_type"),
            target_column: text("target_column"),
            metric: text("metric"),
            metric_value: value.get("metric_value").and_then(Value::as_f64),
            performance: value.get("performance").and_then(Value::as_object).cloned(),
            leaderboard: value.get("leaderboard").and_then(LeaderboardData::from_value),
        }
    }

    /// Normalize, or surface the carried error.
    pub fn into_result(self) -> Result<TrainingResponse> {
        match self.error {
            Some(message) => Err(AutomlError::from_kind(
                self.kind.unwrap_or(ErrorKind::TrainingFailure),
                message,
            )),
            None => Ok(normalize(self)),
        }
    }
}

impl From<TrainingSummary> for RawTrainingOutput {
    fn from(summary: TrainingSummary) -> Self {
        let mut performance = Map::new();
        performance.insert(
            summary.metric.clone(),
            summary.performance.value.map(Value::from).unwrap_or(Value::Null),
        );
        performance.insert(
            "additional_metrics".to_string(),
            Value::Object(summary.performance.additional_metrics),
        );

        Self {
            model_name: Some(summary.model_name),
            model_path: Some(summary.model_path),
            task_type: Some(summary.task_type.to_string()),
            target_column: Some(summary.target_column),
            metric: Some(summary.metric),
            performance: Some(performance),
            leaderboard: Some(LeaderboardData::Table(summary.leaderboard)),
            ..Default::default()
        }
    }
}

/// Caller-facing training response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResponse {
    pub model_name: String,
    pub model_path: String,
    pub task_type: String,
    pub target_column: String,
    pub metric: String,
    pub metric_value: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaderboard: Option<Vec<Map<String, Value>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TrainingResponse {
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Flatten raw output into the stable response shape.
///
/// `metric_value` falls back to `performance[metric]`, then to 0.
pub fn normalize(raw: RawTrainingOutput) -> TrainingResponse {
    let metric = raw.metric.unwrap_or_default();
    let metric_value = raw
        .metric_value
        .or_else(|| {
            raw.performance
                .as_ref()
                .and_then(|p| p.get(&metric))
                .and_then(Value::as_f64)
        })
        .unwrap_or(0.0);

    TrainingResponse {
        model_name: raw.model_name.unwrap_or_default(),
        model_path: raw.model_path.unwrap_or_default(),
        task_type: raw.task_type.unwrap_or_default(),
        target_column: raw.target_column.unwrap_or_default(),
        metric,
        metric_value,
        leaderboard: raw.leaderboard.map(LeaderboardData::into_records),
        message: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_for_missing_fields() {
        let response = normalize(RawTrainingOutput::default());
        assert_eq!(response.model_name, "");
        assert_eq!(response.metric_value, 0.0);
        assert_eq!(response.leaderboard, None);

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("leaderboard").is_none());
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_metric_value_from_performance() {
        let raw = RawTrainingOutput::from_value(&json!({
            "model_name": "classification_GaussianNB_20240101_120000",
            "metric": "Accuracy",
            "performance": {"Accuracy": 0.87, "additional_metrics": {"AUC": 0.9}}
        }));
        assert_eq!(normalize(raw).metric_value, 0.87);

        let explicit = RawTrainingOutput::from_value(&json!({
            "metric": "Accuracy",
            "metric_value": 0.5,
            "performance": {"Accuracy": 0.87}
        }));
        assert_eq!(normalize(explicit).metric_value, 0.5);
    }

    #[test]
    fn test_leaderboard_shapes_agree() {
        let records = RawTrainingOutput::from_value(&json!({
            "leaderboard": [{"Model": "Ridge Regression", "R2": 0.8}]
        }));
        let table = RawTrainingOutput::from_value(&json!({
            "leaderboard": {"columns": ["Model", "R2"], "rows": [["Ridge Regression", 0.8]]}
        }));
        assert_eq!(normalize(records).leaderboard, normalize(table).leaderboard);
    }

    #[test]
    fn test_wrong_types_count_as_missing() {
        let raw = RawTrainingOutput::from_value(&json!({
            "model_name": 12,
            "metric_value": "high",
            "leaderboard": "n/a"
        }));
        let response = normalize(raw);
        assert_eq!(response.model_name, "");
        assert_eq!(response.metric_value, 0.0);
        assert_eq!(response.leaderboard, None);
    }

    #[test]
    fn test_error_output_becomes_error() {
        let raw = RawTrainingOutput::from_value(&json!({
            "error": "Target column 'x' not found in dataset. Available columns: a",
            "kind": "validation"
        }));
        let err = raw.into_result().unwrap_err();
        assert!(matches!(err, AutomlError::Validation(_)));

        let untagged = RawTrainingOutput::from_value(&json!({"error": "boom"}));
        assert!(matches!(untagged.into_result(), Err(AutomlError::TrainingFailure(_))));
    }

    #[test]
    fn test_typed_output_roundtrips_through_json() {
        let raw = RawTrainingOutput {
            model_name: Some("regression_Ridge_20240101_000000".into()),
            metric: Some("R2".into()),
            performance: json!({"R2": 0.75}).as_object().cloned(),
            leaderboard: Some(LeaderboardData::Table(Table {
                columns: vec!["Model".into(), "R2".into()],
                rows: vec![vec![json!("Ridge Regression"), json!(0.75)]],
            })),
            ..Default::default()
        };
        let via_json = RawTrainingOutput::from_value(&serde_json::to_value(&raw).unwrap());
        assert_eq!(normalize(raw), normalize(via_json));
    }
}
