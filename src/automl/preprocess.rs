//! Feature and target preprocessing
//!
//! Numeric features are mean-imputed and standardized; text features are
//! one-hot encoded over their most frequent categories. Unknown categories
//! and columns absent at prediction time encode as all zeros / the mean.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dataset::{format_number, ColumnData, Dataset};
use crate::error::{AutomlError, Result};
use crate::task::TaskKind;

/// Most categories kept per text column
pub const MAX_CATEGORIES: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FeatureTransform {
    Numeric { name: String, mean: f64, std: f64 },
    Categorical { name: String, categories: Vec<String> },
}

impl FeatureTransform {
    pub fn name(&self) -> &str {
        match self {
            FeatureTransform::Numeric { name, .. } | FeatureTransform::Categorical { name, .. } => name,
        }
    }

    fn width(&self) -> usize {
        match self {
            FeatureTransform::Numeric { .. } => 1,
            FeatureTransform::Categorical { categories, .. } => categories.len(),
        }
    }
}

/// Fitted column transforms, applied in order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturePipeline {
    transforms: Vec<FeatureTransform>,
}

impl FeaturePipeline {
    /// Fit on every column except `target`.
    pub fn fit(dataset: &Dataset, target: &str) -> Result<Self> {
        let mut transforms = Vec::new();

        for name in dataset.column_names() {
            if name == target {
                continue;
            }
            let transform = match dataset.column(&name)? {
                ColumnData::Numeric(values) => {
                    let present: Vec<f64> = values.into_iter().flatten().collect();
                    let (mean, std) = mean_std(&present);
                    FeatureTransform::Numeric { name, mean, std }
                }
                ColumnData::Text(values) => {
                    let categories = top_categories(&values);
                    if categories.is_empty() {
                        continue;
                    }
                    FeatureTransform::Categorical { name, categories }
                }
            };
            transforms.push(transform);
        }

        Ok(Self { transforms })
    }

    pub fn is_empty(&self) -> bool {
        self.n_outputs() == 0
    }

    /// Width of the transformed matrix
    pub fn n_outputs(&self) -> usize {
        self.transforms.iter().map(FeatureTransform::width).sum()
    }

    /// Source column names, in fit order
    pub fn feature_names(&self) -> Vec<String> {
        self.transforms.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn transform(&self, dataset: &Dataset) -> Result<Array2<f64>> {
        let n_rows = dataset.n_rows();
        let mut out = Array2::<f64>::zeros((n_rows, self.n_outputs()));
        let mut offset = 0;

        for transform in &self.transforms {
            let column = if dataset.has_column(transform.name()) {
                Some(dataset.column(transform.name())?)
            } else {
                None
            };

            match transform {
                FeatureTransform::Numeric { mean, std, .. } => {
                    let values = column
                        .map(|c| c.to_numeric())
                        .unwrap_or_else(|| vec![None; n_rows]);
                    for (row, value) in values.into_iter().enumerate() {
                        out[[row, offset]] = (value.unwrap_or(*mean) - mean) / std;
                    }
                }
                FeatureTransform::Categorical { categories, .. } => {
                    if let Some(column) = column {
                        let index: HashMap<&str, usize> = categories
                            .iter()
                            .enumerate()
                            .map(|(i, c)| (c.as_str(), i))
                            .collect();
                        for (row, value) in column.to_text().iter().enumerate() {
                            if let Some(&i) = value.as_deref().and_then(|v| index.get(v)) {
                                out[[row, offset + i]] = 1.0;
                            }
                        }
                    }
                }
            }
            offset += transform.width();
        }

        Ok(out)
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 1.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    (mean, if std > 1e-12 { std } else { 1.0 })
}

fn top_categories(values: &[Option<String>]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for value in values.iter().flatten() {
        *counts.entry(value.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(MAX_CATEGORIES)
        .map(|(c, _)| c.to_string())
        .collect()
}

/// A class value as it appeared in the target column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Number(f64),
    Text(String),
}

impl ClassLabel {
    pub fn to_json(&self) -> Value {
        match self {
            ClassLabel::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => Value::from(*v as i64),
            ClassLabel::Number(v) => Value::from(*v),
            ClassLabel::Text(s) => Value::from(s.clone()),
        }
    }

    fn cmp_label(&self, other: &Self) -> Ordering {
        match (self, other) {
            (ClassLabel::Number(a), ClassLabel::Number(b)) => a.total_cmp(b),
            (ClassLabel::Text(a), ClassLabel::Text(b)) => a.cmp(b),
            (ClassLabel::Number(_), ClassLabel::Text(_)) => Ordering::Less,
            (ClassLabel::Text(_), ClassLabel::Number(_)) => Ordering::Greater,
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Number(v) => f.write_str(&format_number(*v)),
            ClassLabel::Text(s) => f.write_str(s),
        }
    }
}

/// Maps target values to model space and back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TargetEncoder {
    /// Sorted class labels; the encoded value is the label index
    Classes(Vec<ClassLabel>),
    Continuous,
}

impl TargetEncoder {
    pub fn fit(column: &ColumnData, task: TaskKind) -> Result<Self> {
        match task {
            TaskKind::Classification => {
                let mut labels: Vec<ClassLabel> = Vec::new();
                for label in Self::labels(column).into_iter().flatten() {
                    if !labels.contains(&label) {
                        labels.push(label);
                    }
                }
                labels.sort_by(ClassLabel::cmp_label);

                if labels.len() < 2 {
                    return Err(AutomlError::TrainingFailure(format!(
                        "Classification needs at least 2 classes in the target, found {}",
                        labels.len()
                    )));
                }
                Ok(TargetEncoder::Classes(labels))
            }
            TaskKind::Regression => {
                let parsed = column.to_numeric();
                let unparsable = parsed
                    .iter()
                    .zip(column.to_text())
                    .filter(|(n, t)| n.is_none() && t.is_some())
                    .count();
                if unparsable > 0 {
                    return Err(AutomlError::TrainingFailure(
                        "Regression target must be numeric".to_string(),
                    ));
                }
                Ok(TargetEncoder::Continuous)
            }
        }
    }

    fn labels(column: &ColumnData) -> Vec<Option<ClassLabel>> {
        match column {
            ColumnData::Numeric(v) => v.iter().map(|x| x.map(ClassLabel::Number)).collect(),
            ColumnData::Text(v) => v.iter().map(|x| x.clone().map(ClassLabel::Text)).collect(),
        }
    }

    pub fn n_classes(&self) -> usize {
        match self {
            TargetEncoder::Classes(labels) => labels.len(),
            TargetEncoder::Continuous => 0,
        }
    }

    pub fn classes(&self) -> &[ClassLabel] {
        match self {
            TargetEncoder::Classes(labels) => labels,
            TargetEncoder::Continuous => &[],
        }
    }

    pub fn encode(&self, column: &ColumnData) -> Result<Array1<f64>> {
        match self {
            TargetEncoder::Classes(classes) => Self::labels(column)
                .into_iter()
                .map(|label| {
                    let label = label.ok_or_else(|| {
                        AutomlError::TrainingFailure("Target contains missing values".to_string())
                    })?;
                    classes
                        .iter()
                        .position(|c| *c == label)
                        .map(|i| i as f64)
                        .ok_or_else(|| {
                            AutomlError::TrainingFailure(format!("Unknown class label '{}'", label))
                        })
                })
                .collect(),
            TargetEncoder::Continuous => column
                .to_numeric()
                .into_iter()
                .map(|v| {
                    v.ok_or_else(|| {
                        AutomlError::TrainingFailure("Target contains missing values".to_string())
                    })
                })
                .collect(),
        }
    }

    /// Model output back to a JSON value.
    pub fn decode(&self, value: f64) -> Value {
        match self {
            TargetEncoder::Classes(classes) => classes
                .get(value.max(0.0) as usize)
                .map(ClassLabel::to_json)
                .unwrap_or(Value::Null),
            TargetEncoder::Continuous => Value::from(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn sample() -> Dataset {
        Dataset::from_frame(
            df!(
                "income" => &[Some(10.0), Some(20.0), None, Some(30.0)],
                "city" => &[Some("Oslo"), Some("Lima"), Some("Oslo"), None],
                "label" => &["yes", "no", "yes", "no"]
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_pipeline_shapes() {
        let ds = sample();
        let pipeline = FeaturePipeline::fit(&ds, "label").unwrap();
        assert_eq!(pipeline.feature_names(), vec!["income", "city"]);
        assert_eq!(pipeline.n_outputs(), 3);

        let x = pipeline.transform(&ds).unwrap();
        assert_eq!(x.dim(), (4, 3));
        // missing income imputed to the mean, so it standardizes to zero
        assert!(x[[2, 0]].abs() < 1e-12);
        // "Oslo" is most frequent, so it is category 0
        assert_eq!(x[[0, 1]], 1.0);
        assert_eq!(x[[1, 2]], 1.0);
        assert_eq!(x.row(3).iter().skip(1).sum::<f64>(), 0.0);
    }

    #[test]
    fn test_transform_tolerates_missing_columns() {
        let pipeline = FeaturePipeline::fit(&sample(), "label").unwrap();
        let record = serde_json::json!({"city": "Paris"});
        let one = Dataset::from_record(record.as_object().unwrap()).unwrap();
        let x = pipeline.transform(&one).unwrap();
        assert_eq!(x.dim(), (1, 3));
        assert!(x.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_class_labels_sorted_and_decoded() {
        let column = ColumnData::Numeric(vec![Some(1.0), Some(0.0), Some(1.0)]);
        let encoder = TargetEncoder::fit(&column, TaskKind::Classification).unwrap();
        assert_eq!(encoder.n_classes(), 2);
        assert_eq!(encoder.encode(&column).unwrap().to_vec(), vec![1.0, 0.0, 1.0]);
        assert_eq!(encoder.decode(1.0), serde_json::json!(1));
        assert_eq!(encoder.classes()[0].to_string(), "0");
    }

    #[test]
    fn test_single_class_rejected() {
        let column = ColumnData::Text(vec![Some("a".into()), Some("a".into())]);
        let err = TargetEncoder::fit(&column, TaskKind::Classification).unwrap_err();
        assert!(matches!(err, AutomlError::TrainingFailure(_)));
    }

    #[test]
    fn test_text_regression_target_rejected() {
        let column = ColumnData::Text(vec![Some("1.5".into()), Some("high".into())]);
        assert!(TargetEncoder::fit(&column, TaskKind::Regression).is_err());
    }
}
