//! Task kinds and task-kind inference
//!
//! Two inference rules coexist on purpose. The training orchestrator uses
//! [`infer_by_distinct_count`]; the explicit-target upload path uses
//! [`infer_by_distinct_ratio`]. They disagree for numeric targets with many
//! distinct values that make up a small share of the rows.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dataset::Dataset;
use crate::error::{AutomlError, Result};

/// Distinct-value threshold shared by both rules
pub const DISTINCT_THRESHOLD: usize = 10;

/// Minimum distinct/rows ratio for the ratio rule to call regression
pub const DISTINCT_RATIO_THRESHOLD: f64 = 0.05;

/// Prediction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Classification,
    Regression,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Classification => "classification",
            TaskKind::Regression => "regression",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = AutomlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "classification" => Ok(TaskKind::Classification),
            "regression" => Ok(TaskKind::Regression),
            _ => Err(AutomlError::UnsupportedTaskType(format!(
                "Unsupported task type: {}. Use 'classification' or 'regression'.",
                s
            ))),
        }
    }
}

/// Numeric with more than 10 distinct values is regression; anything else
/// (few distinct values, or non-numeric) is classification.
pub fn infer_by_distinct_count(dataset: &Dataset, target: &str) -> Result<TaskKind> {
    let column = dataset.column(target)?;
    let distinct = column.n_unique();

    Ok(if column.is_numeric() && distinct > DISTINCT_THRESHOLD {
        TaskKind::Regression
    } else {
        TaskKind::Classification
    })
}

/// Regression only when the column is numeric, has more than 10 distinct
/// values, and those make up more than 5% of the rows.
pub fn infer_by_distinct_ratio(dataset: &Dataset, target: &str) -> Result<TaskKind> {
    let column = dataset.column(target)?;
    let distinct = column.n_unique();
    let ratio = if column.is_empty() {
        0.0
    } else {
        distinct as f64 / column.len() as f64
    };

    Ok(
        if column.is_numeric() && distinct > DISTINCT_THRESHOLD && ratio > DISTINCT_RATIO_THRESHOLD {
            TaskKind::Regression
        } else {
            TaskKind::Classification
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn numeric(values: Vec<f64>) -> Dataset {
        Dataset::from_frame(df!("y" => values).unwrap())
    }

    #[test]
    fn test_parse_task_kind() {
        assert_eq!("Classification".parse::<TaskKind>().unwrap(), TaskKind::Classification);
        assert_eq!(" regression ".parse::<TaskKind>().unwrap(), TaskKind::Regression);

        let err = "clustering".parse::<TaskKind>().unwrap_err();
        assert!(matches!(err, AutomlError::UnsupportedTaskType(_)));
        assert!(err.to_string().contains("clustering"));
    }

    #[test]
    fn test_count_rule() {
        for distinct in 1..=DISTINCT_THRESHOLD {
            let values = (0..100).map(|i| (i % distinct) as f64).collect();
            assert_eq!(infer_by_distinct_count(&numeric(values), "y").unwrap(), TaskKind::Classification);
        }

        let values = (0..100).map(|i| (i % 11) as f64).collect();
        assert_eq!(infer_by_distinct_count(&numeric(values), "y").unwrap(), TaskKind::Regression);

        let values = (0..100).map(|i| i as f64 * 0.37).collect();
        assert_eq!(infer_by_distinct_count(&numeric(values), "y").unwrap(), TaskKind::Regression);
    }

    #[test]
    fn test_count_rule_text_is_classification() {
        let labels: Vec<String> = (0..100).map(|i| format!("label_{}", i)).collect();
        let ds = Dataset::from_frame(df!("y" => labels).unwrap());
        assert_eq!(infer_by_distinct_count(&ds, "y").unwrap(), TaskKind::Classification);
        assert_eq!(infer_by_distinct_ratio(&ds, "y").unwrap(), TaskKind::Classification);
    }

    #[test]
    fn test_ratio_rule_diverges_on_large_datasets() {
        // 11 distinct values over 1000 rows: 1.1% distinct
        let values: Vec<f64> = (0..1000).map(|i| (i % 11) as f64).collect();
        let ds = numeric(values);
        assert_eq!(infer_by_distinct_count(&ds, "y").unwrap(), TaskKind::Regression);
        assert_eq!(infer_by_distinct_ratio(&ds, "y").unwrap(), TaskKind::Classification);
    }

    #[test]
    fn test_ratio_rule_regression() {
        let values: Vec<f64> = (0..100).map(|i| i as f64).collect();
        assert_eq!(infer_by_distinct_ratio(&numeric(values), "y").unwrap(), TaskKind::Regression);
    }
}
