//! K-nearest neighbors for classification and regression

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use super::{check_xy, not_fitted, Objective};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    pub k: usize,
    objective: Objective,
    x_train: Option<Array2<f64>>,
    y_train: Array1<f64>,
}

impl KNearestNeighbors {
    pub fn new(objective: Objective) -> Self {
        Self {
            k: 5,
            objective,
            x_train: None,
            y_train: Array1::zeros(0),
        }
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k.max(1);
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        self.x_train = Some(x.clone());
        self.y_train = y.clone();
        Ok(self)
    }

    /// Indices of the `k` closest training rows, nearest first.
    fn neighbors(&self, train: &Array2<f64>, row: ArrayView1<f64>) -> Vec<usize> {
        let mut dists: Vec<(f64, usize)> = train
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let d: f64 = t.iter().zip(row.iter()).map(|(a, b)| (a - b).powi(2)).sum();
                (d, i)
            })
            .collect();
        let k = self.k.min(dists.len());
        dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        dists.into_iter().take(k).map(|(_, i)| i).collect()
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let train = self.x_train.as_ref().ok_or_else(|| not_fitted("KNearestNeighbors"))?;
        let n_classes = self.objective.n_classes();
        let mut proba = Array2::<f64>::zeros((x.nrows(), n_classes));

        for (i, row) in x.rows().into_iter().enumerate() {
            let nearest = self.neighbors(train, row);
            for &j in &nearest {
                proba[[i, self.y_train[j] as usize]] += 1.0 / nearest.len() as f64;
            }
        }
        Ok(proba)
    }

    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let train = self.x_train.as_ref().ok_or_else(|| not_fitted("KNearestNeighbors"))?;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let nearest = self.neighbors(train, row);
                nearest.iter().map(|&j| self.y_train[j]).sum::<f64>() / nearest.len() as f64
            })
            .collect())
    }
}
