//! Evaluation metrics and metric names

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1};

use crate::error::{AutomlError, Result};
use crate::task::TaskKind;

/// Scoring metric, named after the leaderboard column it fills
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Accuracy,
    Auc,
    Recall,
    Precision,
    F1,
    Kappa,
    Mcc,
    Mae,
    Mse,
    Rmse,
    R2,
    Rmsle,
    Mape,
}

impl Metric {
    pub const CLASSIFICATION: [Metric; 7] = [
        Metric::Accuracy,
        Metric::Auc,
        Metric::Recall,
        Metric::Precision,
        Metric::F1,
        Metric::Kappa,
        Metric::Mcc,
    ];

    pub const REGRESSION: [Metric; 6] = [
        Metric::Mae,
        Metric::Mse,
        Metric::Rmse,
        Metric::R2,
        Metric::Rmsle,
        Metric::Mape,
    ];

    /// Leaderboard column name
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Accuracy => "Accuracy",
            Metric::Auc => "AUC",
            Metric::Recall => "Recall",
            Metric::Precision => "Prec.",
            Metric::F1 => "F1",
            Metric::Kappa => "Kappa",
            Metric::Mcc => "MCC",
            Metric::Mae => "MAE",
            Metric::Mse => "MSE",
            Metric::Rmse => "RMSE",
            Metric::R2 => "R2",
            Metric::Rmsle => "RMSLE",
            Metric::Mape => "MAPE",
        }
    }

    pub fn task(&self) -> TaskKind {
        if Self::CLASSIFICATION.contains(self) {
            TaskKind::Classification
        } else {
            TaskKind::Regression
        }
    }

    pub fn higher_is_better(&self) -> bool {
        matches!(
            self,
            Metric::Accuracy
                | Metric::Auc
                | Metric::Recall
                | Metric::Precision
                | Metric::F1
                | Metric::Kappa
                | Metric::Mcc
                | Metric::R2
        )
    }

    /// Whether `a` beats `b`; NaN never wins.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        if a.is_nan() {
            return false;
        }
        if b.is_nan() {
            return true;
        }
        if self.higher_is_better() {
            a > b
        } else {
            a < b
        }
    }

    pub fn for_task(task: TaskKind) -> &'static [Metric] {
        match task {
            TaskKind::Classification => &Self::CLASSIFICATION,
            TaskKind::Regression => &Self::REGRESSION,
        }
    }

    /// Metric used when none is requested. Regression defaults to R2
    /// rather than Accuracy, which would be rejected for that task.
    pub fn default_for(task: TaskKind) -> Metric {
        match task {
            TaskKind::Classification => Metric::Accuracy,
            TaskKind::Regression => Metric::R2,
        }
    }

    /// Resolve an optional metric name against a task kind.
    pub fn resolve(name: Option<&str>, task: TaskKind) -> Result<Metric> {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => name,
            None => return Ok(Self::default_for(task)),
        };

        let valid = || {
            Self::for_task(task)
                .iter()
                .map(|m| m.column())
                .collect::<Vec<_>>()
                .join(", ")
        };

        let metric: Metric = name.parse().map_err(|_| {
            AutomlError::Validation(format!(
                "Unknown metric '{}' for {}. Valid metrics: {}",
                name,
                task,
                valid()
            ))
        })?;

        if metric.task() != task {
            return Err(AutomlError::Validation(format!(
                "Metric '{}' is not valid for {}. Valid metrics: {}",
                name,
                task,
                valid()
            )));
        }
        Ok(metric)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = AutomlError;

    fn from_str(s: &str) -> Result<Self> {
        let metric = match s.trim().to_lowercase().as_str() {
            "accuracy" | "acc" => Metric::Accuracy,
            "auc" | "roc_auc" => Metric::Auc,
            "recall" => Metric::Recall,
            "prec." | "prec" | "precision" => Metric::Precision,
            "f1" | "f1_score" => Metric::F1,
            "kappa" => Metric::Kappa,
            "mcc" => Metric::Mcc,
            "mae" => Metric::Mae,
            "mse" => Metric::Mse,
            "rmse" => Metric::Rmse,
            "r2" | "r2_score" => Metric::R2,
            "rmsle" => Metric::Rmsle,
            "mape" => Metric::Mape,
            _ => return Err(AutomlError::Validation(format!("Unknown metric: {}", s))),
        };
        Ok(metric)
    }
}

/// Metric values for one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricScores(HashMap<Metric, f64>);

impl MetricScores {
    pub fn get(&self, metric: Metric) -> f64 {
        self.0.get(&metric).copied().unwrap_or(f64::NAN)
    }

    pub fn insert(&mut self, metric: Metric, value: f64) {
        self.0.insert(metric, value);
    }

    /// Average per-fold scores.
    pub fn mean(folds: &[MetricScores]) -> MetricScores {
        let mut out = MetricScores::default();
        if folds.is_empty() {
            return out;
        }
        for metric in folds[0].0.keys() {
            let total: f64 = folds.iter().map(|s| s.get(*metric)).sum();
            out.insert(*metric, total / folds.len() as f64);
        }
        out
    }
}

/// Classification metrics from true class indices and class probabilities.
///
/// Binary problems score the second class as positive; multiclass recall,
/// precision, F1 and AUC are support-weighted one-vs-rest averages.
pub fn classification_scores(y_true: &[usize], proba: &Array2<f64>) -> MetricScores {
    let n_classes = proba.ncols();
    let y_pred: Vec<usize> = proba.rows().into_iter().map(argmax).collect();
    let n = y_true.len() as f64;

    let mut confusion = vec![vec![0usize; n_classes]; n_classes];
    for (&t, &p) in y_true.iter().zip(&y_pred) {
        confusion[t][p] += 1;
    }
    let correct: usize = (0..n_classes).map(|k| confusion[k][k]).sum();
    let true_counts: Vec<usize> = (0..n_classes).map(|k| confusion[k].iter().sum()).collect();
    let pred_counts: Vec<usize> = (0..n_classes)
        .map(|k| confusion.iter().map(|row| row[k]).sum())
        .collect();

    let per_class = |k: usize| {
        let tp = confusion[k][k] as f64;
        let precision = safe_div(tp, pred_counts[k] as f64);
        let recall = safe_div(tp, true_counts[k] as f64);
        let f1 = safe_div(2.0 * precision * recall, precision + recall);
        (precision, recall, f1)
    };

    let (precision, recall, f1, auc) = if n_classes == 2 {
        let (p, r, f) = per_class(1);
        let positives: Vec<bool> = y_true.iter().map(|&t| t == 1).collect();
        (p, r, f, binary_auc(&positives, proba.column(1)))
    } else {
        let mut sums = (0.0, 0.0, 0.0, 0.0, 0.0);
        for k in 0..n_classes {
            let weight = true_counts[k] as f64;
            if weight == 0.0 {
                continue;
            }
            let (p, r, f) = per_class(k);
            sums.0 += weight * p;
            sums.1 += weight * r;
            sums.2 += weight * f;

            let positives: Vec<bool> = y_true.iter().map(|&t| t == k).collect();
            let auc = binary_auc(&positives, proba.column(k));
            if !auc.is_nan() {
                sums.3 += weight * auc;
                sums.4 += weight;
            }
        }
        (
            safe_div(sums.0, n),
            safe_div(sums.1, n),
            safe_div(sums.2, n),
            safe_div(sums.3, sums.4),
        )
    };

    let accuracy = safe_div(correct as f64, n);

    let expected: f64 = (0..n_classes)
        .map(|k| true_counts[k] as f64 * pred_counts[k] as f64)
        .sum::<f64>()
        / (n * n).max(1.0);
    let kappa = safe_div(accuracy - expected, 1.0 - expected);

    let c = correct as f64;
    let cov_pt = c * n
        - (0..n_classes)
            .map(|k| pred_counts[k] as f64 * true_counts[k] as f64)
            .sum::<f64>();
    let cov_pp = n * n - pred_counts.iter().map(|&p| (p * p) as f64).sum::<f64>();
    let cov_tt = n * n - true_counts.iter().map(|&t| (t * t) as f64).sum::<f64>();
    let mcc = safe_div(cov_pt, (cov_pp * cov_tt).sqrt());

    let mut scores = MetricScores::default();
    scores.insert(Metric::Accuracy, accuracy);
    scores.insert(Metric::Auc, if auc.is_nan() { 0.0 } else { auc });
    scores.insert(Metric::Recall, recall);
    scores.insert(Metric::Precision, precision);
    scores.insert(Metric::F1, f1);
    scores.insert(Metric::Kappa, kappa);
    scores.insert(Metric::Mcc, mcc);
    scores
}

/// Regression metrics. RMSLE is computed on absolute values.
pub fn regression_scores(y_true: &[f64], y_pred: &[f64]) -> MetricScores {
    let n = y_true.len() as f64;
    let errors: Vec<f64> = y_true.iter().zip(y_pred).map(|(t, p)| t - p).collect();

    let mae = safe_div(errors.iter().map(|e| e.abs()).sum(), n);
    let mse = safe_div(errors.iter().map(|e| e * e).sum(), n);

    let mean = safe_div(y_true.iter().sum(), n);
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = errors.iter().map(|e| e * e).sum();
    let r2 = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let msle = safe_div(
        y_true
            .iter()
            .zip(y_pred)
            .map(|(t, p)| (t.abs().ln_1p() - p.abs().ln_1p()).powi(2))
            .sum(),
        n,
    );

    let mape = safe_div(
        y_true
            .iter()
            .zip(&errors)
            .map(|(t, e)| e.abs() / t.abs().max(f64::EPSILON))
            .sum(),
        n,
    );

    let mut scores = MetricScores::default();
    scores.insert(Metric::Mae, mae);
    scores.insert(Metric::Mse, mse);
    scores.insert(Metric::Rmse, mse.sqrt());
    scores.insert(Metric::R2, r2);
    scores.insert(Metric::Rmsle, msle.sqrt());
    scores.insert(Metric::Mape, mape);
    scores
}

pub(crate) fn argmax(row: ArrayView1<f64>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_val), (i, &v)| {
            if v > best_val {
                (i, v)
            } else {
                (best, best_val)
            }
        })
        .0
}

/// Rank-based ROC AUC; NaN when only one class is present.
fn binary_auc(positives: &[bool], scores: ArrayView1<f64>) -> f64 {
    let n_pos = positives.iter().filter(|&&p| p).count() as f64;
    let n_neg = positives.len() as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..positives.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // average ranks over ties
    let mut ranks = vec![0.0; order.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let rank_sum: f64 = positives
        .iter()
        .zip(&ranks)
        .filter(|(p, _)| **p)
        .map(|(_, r)| r)
        .sum();
    (rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)
}

fn safe_div(num: f64, den: f64) -> f64 {
    if den == 0.0 || !den.is_finite() {
        0.0
    } else {
        num / den
    }
}
