//! Minimum-quality checks run before any training work starts

use super::Dataset;
use crate::error::{AutomlError, Result};

/// Smallest number of rows accepted for training
pub const MIN_ROWS: usize = 10;

/// Message used wherever a target column is absent from the dataset.
pub fn missing_target_message(dataset: &Dataset, target: &str) -> String {
    format!(
        "Target column '{}' not found in dataset. Available columns: {}",
        target,
        dataset.column_names().join(", ")
    )
}

/// Check that the dataset is usable, and the target column too when given.
pub fn validate_dataset(dataset: &Dataset, target: Option<&str>) -> Result<()> {
    if dataset.is_empty() {
        return Err(AutomlError::Validation("Dataset is empty".to_string()));
    }

    if dataset.n_rows() < MIN_ROWS {
        return Err(AutomlError::Validation(format!(
            "Dataset has too few rows for meaningful ML (minimum {})",
            MIN_ROWS
        )));
    }

    match target {
        Some(target) if !target.is_empty() => validate_target(dataset, target),
        _ => Ok(()),
    }
}

/// Target column must exist and have no missing values.
pub fn validate_target(dataset: &Dataset, target: &str) -> Result<()> {
    if !dataset.has_column(target) {
        return Err(AutomlError::Validation(missing_target_message(dataset, target)));
    }

    if dataset.column(target)?.null_count() > 0 {
        return Err(AutomlError::Validation(format!(
            "Target column '{}' contains missing values",
            target
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn rows(n: usize) -> Dataset {
        let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
        let y: Vec<i64> = (0..n).map(|i| (i % 2) as i64).collect();
        Dataset::from_frame(df!("x" => x, "y" => y).unwrap())
    }

    #[test]
    fn test_empty_dataset() {
        let ds = Dataset::from_frame(DataFrame::empty());
        let err = validate_dataset(&ds, None).unwrap_err();
        assert_eq!(err.to_string(), "Dataset is empty");
    }

    #[test]
    fn test_too_few_rows_regardless_of_target() {
        for n in 1..MIN_ROWS {
            for target in [None, Some("y"), Some("missing")] {
                let err = validate_dataset(&rows(n), target).unwrap_err();
                assert!(err.to_string().contains("too few rows"), "n={} target={:?}", n, target);
            }
        }
    }

    #[test]
    fn test_missing_target_lists_columns() {
        let err = validate_dataset(&rows(12), Some("label")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Target column 'label' not found in dataset. Available columns: x, y"
        );
    }

    #[test]
    fn test_target_with_missing_values() {
        let y: Vec<Option<f64>> = (0..12).map(|i| if i == 3 { None } else { Some(1.0) }).collect();
        let x: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let ds = Dataset::from_frame(df!("x" => x, "y" => y).unwrap());
        let err = validate_dataset(&ds, Some("y")).unwrap_err();
        assert_eq!(err.to_string(), "Target column 'y' contains missing values");
    }

    #[test]
    fn test_valid_dataset() {
        assert!(validate_dataset(&rows(10), Some("y")).is_ok());
        assert!(validate_dataset(&rows(10), None).is_ok());
    }
}
