//! Linear models: least squares, ridge and multinomial logistic regression

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{check_xy, not_fitted};
use crate::error::{AutomlError, Result};

/// Floor on the ridge penalty so collinear one-hot blocks stay solvable
const MIN_ALPHA: f64 = 1e-8;

/// Solve `a x = b` by Gaussian elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() < 1e-12 {
            return None;
        }
        if pivot != col {
            for j in 0..n {
                a.swap([col, j], [pivot, j]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for j in col..n {
                a[[row, j]] -= factor * a[[col, j]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let tail: f64 = (i + 1..n).map(|j| a[[i, j]] * x[j]).sum();
        x[i] = (b[i] - tail) / a[[i, i]];
    }
    Some(x)
}

/// Ordinary least squares with an optional L2 penalty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearRegression {
    pub alpha: f64,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self {
            alpha: 0.0,
            coefficients: None,
            intercept: 0.0,
        }
    }

    /// Set regularization strength (ridge)
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;

        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AutomlError::TrainingFailure("Cannot fit on zero rows".to_string()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean.view().insert_axis(Axis(0));
        let yc = y - y_mean;

        let mut xtx = xc.t().dot(&xc);
        let penalty = self.alpha.max(MIN_ALPHA);
        for i in 0..xtx.nrows() {
            xtx[[i, i]] += penalty;
        }
        let xty = xc.t().dot(&yc);

        let coefficients = solve(xtx, xty).ok_or_else(|| {
            AutomlError::TrainingFailure("Matrix is singular, cannot solve least squares".to_string())
        })?;

        self.intercept = y_mean - coefficients.dot(&x_mean);
        self.coefficients = Some(coefficients);
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self
            .coefficients
            .as_ref()
            .ok_or_else(|| not_fitted("LinearRegression"))?;
        Ok(x.dot(coefficients) + self.intercept)
    }
}

/// Multinomial logistic regression trained by full-batch gradient descent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Inverse regularization strength
    pub c: f64,
    pub max_iter: usize,
    pub learning_rate: f64,
    pub tol: f64,
    n_classes: usize,
    weights: Option<Array2<f64>>,
    bias: Array1<f64>,
}

impl LogisticRegression {
    pub fn new(n_classes: usize) -> Self {
        Self {
            c: 1.0,
            max_iter: 500,
            learning_rate: 0.5,
            tol: 1e-6,
            n_classes,
            weights: None,
            bias: Array1::zeros(n_classes),
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    fn softmax(logits: &mut Array2<f64>) {
        for mut row in logits.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let total = row.sum();
            row.mapv_inplace(|v| v / total);
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let (n_samples, n_features) = x.dim();
        let k = self.n_classes;

        let mut onehot = Array2::<f64>::zeros((n_samples, k));
        for (i, &label) in y.iter().enumerate() {
            onehot[[i, label as usize]] = 1.0;
        }

        let l2 = 1.0 / (self.c.max(1e-12) * n_samples as f64);
        let mut weights = Array2::<f64>::zeros((n_features, k));
        let mut bias = Array1::<f64>::zeros(k);

        for _ in 0..self.max_iter {
            let mut proba = x.dot(&weights) + &bias;
            Self::softmax(&mut proba);
            let residual = (proba - &onehot) / n_samples as f64;

            let grad_w = x.t().dot(&residual) + &weights * l2;
            let grad_b = residual.sum_axis(Axis(0));

            weights.scaled_add(-self.learning_rate, &grad_w);
            bias.scaled_add(-self.learning_rate, &grad_b);

            if grad_w.iter().chain(grad_b.iter()).all(|g| g.abs() < self.tol) {
                break;
            }
        }

        self.weights = Some(weights);
        self.bias = bias;
        Ok(self)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| not_fitted("LogisticRegression"))?;
        let mut proba = x.dot(weights) + &self.bias;
        Self::softmax(&mut proba);
        Ok(proba)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_linear_regression_recovers_line() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let y = array![3.0, 5.0, 7.0, 9.0, 11.0];
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&array![[6.0]]).unwrap();
        assert!((pred[0] - 13.0).abs() < 1e-4);
    }

    #[test]
    fn test_collinear_columns_still_fit() {
        let x = array![[1.0, 0.0, 1.0], [0.0, 1.0, 2.0], [1.0, 0.0, 3.0], [0.0, 1.0, 4.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];
        let mut model = LinearRegression::new();
        model.fit(&x, &y).unwrap();
        let pred = model.predict(&x).unwrap();
        assert!(pred.iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_ridge_shrinks() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let y = array![2.0, 4.0, 6.0, 8.0];
        let mut ols = LinearRegression::new();
        ols.fit(&x, &y).unwrap();
        let mut ridge = LinearRegression::new().with_alpha(100.0);
        ridge.fit(&x, &y).unwrap();

        let slope = |m: &LinearRegression| m.predict(&array![[1.0]]).unwrap()[0] - m.predict(&array![[0.0]]).unwrap()[0];
        assert!(slope(&ridge) < slope(&ols));
    }

    #[test]
    fn test_logistic_separates_classes() {
        let x = array![[-2.0], [-1.5], [-1.0], [1.0], [1.5], [2.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let mut model = LogisticRegression::new(2);
        model.fit(&x, &y).unwrap();

        let proba = model.predict_proba(&array![[-3.0], [3.0]]).unwrap();
        assert!(proba[[0, 0]] > 0.8);
        assert!(proba[[1, 1]] > 0.8);
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_predict_before_fit() {
        assert!(LinearRegression::new().predict(&array![[1.0]]).is_err());
        assert!(LogisticRegression::new(2).predict_proba(&array![[1.0]]).is_err());
    }
}
