//! Baseline that ignores the features

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::{check_xy, not_fitted, Objective};
use crate::error::Result;

/// Predicts class frequencies or the target mean
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DummyModel {
    objective: Objective,
    prior: Option<Vec<f64>>,
}

impl DummyModel {
    pub fn new(objective: Objective) -> Self {
        Self { objective, prior: None }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let n = y.len() as f64;
        let prior = match self.objective {
            Objective::Classification { n_classes } => {
                let mut counts = vec![0.0; n_classes];
                for &label in y.iter() {
                    counts[label as usize] += 1.0;
                }
                counts.into_iter().map(|c| c / n).collect()
            }
            Objective::Regression => vec![y.sum() / n],
        };
        self.prior = Some(prior);
        Ok(self)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let prior = self.prior.as_ref().ok_or_else(|| not_fitted("DummyModel"))?;
        let mut proba = Array2::zeros((x.nrows(), prior.len()));
        for mut row in proba.rows_mut() {
            row.assign(&Array1::from(prior.clone()));
        }
        Ok(proba)
    }

    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let prior = self.prior.as_ref().ok_or_else(|| not_fitted("DummyModel"))?;
        Ok(Array1::from_elem(x.nrows(), prior.first().copied().unwrap_or(0.0)))
    }
}
