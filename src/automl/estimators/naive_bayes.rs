//! Gaussian naive Bayes

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::{check_xy, not_fitted};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GaussianNaiveBayes {
    pub var_smoothing: f64,
    n_classes: usize,
    /// Per class: log prior, feature means, feature variances
    params: Option<Vec<Option<ClassStats>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClassStats {
    log_prior: f64,
    means: Vec<f64>,
    variances: Vec<f64>,
}

impl GaussianNaiveBayes {
    pub fn new(n_classes: usize) -> Self {
        Self {
            var_smoothing: 1e-9,
            n_classes,
            params: None,
        }
    }

    pub fn with_var_smoothing(mut self, smoothing: f64) -> Self {
        self.var_smoothing = smoothing;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let (n_samples, n_features) = x.dim();

        // epsilon is relative to the largest feature variance
        let max_var = (0..n_features)
            .map(|j| {
                let col = x.column(j);
                let mean = col.sum() / n_samples as f64;
                col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n_samples as f64
            })
            .fold(0.0f64, f64::max);
        let epsilon = self.var_smoothing * max_var.max(1e-12);

        let stats = (0..self.n_classes)
            .map(|class| {
                let rows: Vec<usize> = (0..n_samples).filter(|&i| y[i] as usize == class).collect();
                if rows.is_empty() {
                    return None;
                }
                let count = rows.len() as f64;
                let means: Vec<f64> = (0..n_features)
                    .map(|j| rows.iter().map(|&i| x[[i, j]]).sum::<f64>() / count)
                    .collect();
                let variances: Vec<f64> = (0..n_features)
                    .map(|j| {
                        rows.iter().map(|&i| (x[[i, j]] - means[j]).powi(2)).sum::<f64>() / count + epsilon
                    })
                    .collect();
                Some(ClassStats {
                    log_prior: (count / n_samples as f64).ln(),
                    means,
                    variances,
                })
            })
            .collect();

        self.params = Some(stats);
        Ok(self)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let params = self.params.as_ref().ok_or_else(|| not_fitted("GaussianNaiveBayes"))?;
        let mut proba = Array2::<f64>::zeros((x.nrows(), self.n_classes));

        for (i, row) in x.rows().into_iter().enumerate() {
            let log_likelihoods: Vec<Option<f64>> = params
                .iter()
                .map(|stats| {
                    stats.as_ref().map(|s| {
                        s.log_prior
                            + row
                                .iter()
                                .zip(s.means.iter().zip(&s.variances))
                                .map(|(v, (m, var))| {
                                    -0.5 * ((2.0 * std::f64::consts::PI * var).ln() + (v - m).powi(2) / var)
                                })
                                .sum::<f64>()
                    })
                })
                .collect();

            let max = log_likelihoods.iter().flatten().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
            let total: f64 = log_likelihoods.iter().flatten().map(|l| (l - max).exp()).sum();
            for (k, ll) in log_likelihoods.iter().enumerate() {
                if let Some(ll) = ll {
                    proba[[i, k]] = (ll - max).exp() / total;
                }
            }
        }
        Ok(proba)
    }
}
