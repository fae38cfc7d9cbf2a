//! Tabular datasets
//!
//! A [`Dataset`] wraps a polars `DataFrame` and is read-only once loaded.
//! Column access goes through [`ColumnData`], which collapses polars dtypes
//! into the two logical kinds the rest of the crate cares about.

mod loader;
mod validate;

pub use loader::{DatasetLoader, FileFormat, LoadedDataset};
pub use validate::{missing_target_message, validate_dataset, validate_target, MIN_ROWS};

use std::collections::HashSet;
use std::path::Path;

use polars::prelude::*;

use crate::error::{AutomlError, Result};

/// Values of one column, either numeric or text, with `None` for missing cells
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.len(),
            ColumnData::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    pub fn null_count(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v.iter().filter(|x| x.is_none()).count(),
            ColumnData::Text(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Number of distinct non-missing values.
    pub fn n_unique(&self) -> usize {
        match self {
            ColumnData::Numeric(v) => v
                .iter()
                .flatten()
                // fold -0.0 into 0.0 so both count once
                .map(|x| if *x == 0.0 { 0u64 } else { x.to_bits() })
                .collect::<HashSet<u64>>()
                .len(),
            ColumnData::Text(v) => v.iter().flatten().collect::<HashSet<&String>>().len(),
        }
    }

    /// Numeric view; text cells that do not parse as numbers become missing.
    pub fn to_numeric(&self) -> Vec<Option<f64>> {
        match self {
            ColumnData::Numeric(v) => v.clone(),
            ColumnData::Text(v) => v
                .iter()
                .map(|s| s.as_deref().and_then(|s| s.trim().parse::<f64>().ok()))
                .collect(),
        }
    }

    /// Text view; numbers are rendered without a trailing `.0` when integral.
    pub fn to_text(&self) -> Vec<Option<String>> {
        match self {
            ColumnData::Numeric(v) => v.iter().map(|x| x.map(format_number)).collect(),
            ColumnData::Text(v) => v.clone(),
        }
    }
}

/// Render a number the way it reads in a CSV cell.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// In-memory tabular dataset
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
}

impl Dataset {
    pub fn from_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    /// Build a dataset from named columns of equal length.
    pub fn from_columns(columns: Vec<(String, ColumnData)>) -> Result<Self> {
        let columns: Vec<Column> = columns
            .into_iter()
            .map(|(name, data)| match data {
                ColumnData::Numeric(values) => Series::new(name.into(), values).into(),
                ColumnData::Text(values) => Series::new(name.into(), values).into(),
            })
            .collect();
        Ok(Self::from_frame(DataFrame::new(columns)?))
    }

    /// Wrap a single feature mapping as a one-row dataset.
    pub fn from_record(record: &serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        use serde_json::Value;

        let columns = record
            .iter()
            .map(|(name, value)| {
                let data = match value {
                    Value::Number(n) => ColumnData::Numeric(vec![n.as_f64()]),
                    Value::Bool(b) => ColumnData::Numeric(vec![Some(if *b { 1.0 } else { 0.0 })]),
                    Value::String(s) => ColumnData::Text(vec![Some(s.clone())]),
                    Value::Null => ColumnData::Numeric(vec![None]),
                    other => {
                        return Err(AutomlError::Validation(format!(
                            "Feature '{}' must be a scalar value, got {}",
                            name, other
                        )))
                    }
                };
                Ok((name.clone(), data))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::from_columns(columns)
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn n_rows(&self) -> usize {
        self.frame.height()
    }

    pub fn n_columns(&self) -> usize {
        self.frame.width()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0 || self.n_columns() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.get_column_names().iter().any(|c| c.as_str() == name)
    }

    /// Read one column as [`ColumnData`].
    pub fn column(&self, name: &str) -> Result<ColumnData> {
        let column = self
            .frame
            .column(name)
            .map_err(|_| AutomlError::Validation(missing_target_message(self, name)))?;
        let series = column.as_materialized_series();

        if is_numeric_dtype(series.dtype()) {
            let values: Vec<Option<f64>> = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| !x.is_nan()))
                .collect();
            Ok(ColumnData::Numeric(values))
        } else {
            let values: Vec<Option<String>> = series
                .cast(&DataType::String)?
                .str()?
                .into_iter()
                .map(|v| v.map(str::to_string))
                .collect();
            Ok(ColumnData::Text(values))
        }
    }

    /// Write the dataset as CSV with a header row.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        let mut frame = self.frame.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut frame)?;
        Ok(())
    }
}
