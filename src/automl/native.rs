//! In-crate AutoML backend

use std::path::Path;
use std::time::Instant;

use ndarray::Axis;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::cv::FoldSplitter;
use super::metrics::{argmax, classification_scores, regression_scores, Metric, MetricScores};
use super::search::{Hyperparams, RandomSampler};
use super::{
    AutoMl, Candidate, Comparison, Experiment, FeaturePipeline, FittedModel, Leaderboard, Table, TargetEncoder,
    PREDICTION_LABEL, PREDICTION_SCORE_PREFIX,
};
use crate::automl::estimators::Algorithm;
use crate::config::AutoMlSettings;
use crate::dataset::Dataset;
use crate::error::{AutomlError, Result};
use crate::task::TaskKind;

/// Cross-validated outcome of one candidate
struct CvOutcome {
    scores: MetricScores,
    /// Mean wall time per fold
    fit_seconds: f64,
}

/// Cross-validated model selection over the built-in estimator families
#[derive(Debug, Clone)]
pub struct NativeAutoMl {
    settings: AutoMlSettings,
    include: Option<Vec<Algorithm>>,
}

impl NativeAutoMl {
    pub fn new(settings: AutoMlSettings) -> Self {
        Self {
            settings,
            include: None,
        }
    }

    /// Restrict comparison to the given families.
    pub fn with_include(mut self, algorithms: Vec<Algorithm>) -> Self {
        self.include = Some(algorithms);
        self
    }

    pub fn settings(&self) -> &AutoMlSettings {
        &self.settings
    }

    fn candidates(&self, task: TaskKind) -> Result<Vec<Algorithm>> {
        let candidates: Vec<Algorithm> = Algorithm::candidates(task)
            .iter()
            .copied()
            .filter(|a| self.include.as_ref().map_or(true, |inc| inc.contains(a)))
            .collect();
        if candidates.is_empty() {
            return Err(AutomlError::TrainingFailure(format!(
                "No candidate models available for {}",
                task
            )));
        }
        Ok(candidates)
    }

    fn check_metric(task: TaskKind, metric: Metric) -> Result<()> {
        if metric.task() != task {
            return Err(AutomlError::Validation(format!(
                "Metric '{}' is not valid for {}",
                metric, task
            )));
        }
        Ok(())
    }

    fn cross_validate(&self, exp: &Experiment, candidate: &Candidate) -> Result<CvOutcome> {
        let start = Instant::now();
        let mut per_fold = Vec::with_capacity(exp.folds.len());

        for fold in &exp.folds {
            let x_train = exp.x.select(Axis(0), &fold.train);
            let y_train = exp.y.select(Axis(0), &fold.train);
            let x_test = exp.x.select(Axis(0), &fold.test);

            let mut estimator = candidate
                .algorithm
                .build(&candidate.params, exp.n_classes(), exp.seed);
            estimator.fit(&x_train, &y_train)?;

            let scores = match exp.task {
                TaskKind::Classification => {
                    let proba = estimator.predict_proba(&x_test)?;
                    let truth: Vec<usize> = fold.test.iter().map(|&i| exp.y[i] as usize).collect();
                    classification_scores(&truth, &proba)
                }
                TaskKind::Regression => {
                    let pred = estimator.predict_values(&x_test)?;
                    let truth: Vec<f64> = fold.test.iter().map(|&i| exp.y[i]).collect();
                    regression_scores(&truth, &pred.to_vec())
                }
            };
            per_fold.push(scores);
        }

        Ok(CvOutcome {
            scores: MetricScores::mean(&per_fold),
            fit_seconds: start.elapsed().as_secs_f64() / exp.folds.len().max(1) as f64,
        })
    }
}

fn round_to(value: f64, places: i32) -> Value {
    let factor = 10f64.powi(places);
    Value::from((value * factor).round() / factor)
}

impl AutoMl for NativeAutoMl {
    fn setup(&self, dataset: &Dataset, target: &str, task: TaskKind, seed: u64) -> Result<Experiment> {
        let column = dataset.column(target)?;
        let encoder = TargetEncoder::fit(&column, task)?;
        let y = encoder.encode(&column)?;

        let pipeline = FeaturePipeline::fit(dataset, target)?;
        if pipeline.is_empty() {
            return Err(AutomlError::TrainingFailure(format!(
                "Dataset has no usable feature columns besides the target '{}'",
                target
            )));
        }
        let x = pipeline.transform(dataset)?;

        let splitter = FoldSplitter::new(self.settings.cv_folds, seed);
        let folds = match task {
            TaskKind::Classification => {
                let classes: Vec<usize> = y.iter().map(|&v| v as usize).collect();
                splitter.split_stratified(&classes)?
            }
            TaskKind::Regression => splitter.split(y.len())?,
        };

        info!(
            target_column = target,
            task = %task,
            rows = x.nrows(),
            features = x.ncols(),
            folds = folds.len(),
            seed,
            "Experiment configured"
        );

        Ok(Experiment {
            task,
            target_column: target.to_string(),
            seed,
            pipeline,
            target: encoder,
            x,
            y,
            folds,
        })
    }

    fn compare(&self, exp: &Experiment, sort: Metric) -> Result<Comparison> {
        Self::check_metric(exp.task, sort)?;
        let candidates = self.candidates(exp.task)?;

        let results: Vec<(Algorithm, Result<CvOutcome>)> = candidates
            .par_iter()
            .map(|&algo| (algo, self.cross_validate(exp, &Candidate::with_defaults(algo))))
            .collect();

        let mut ranked = Vec::with_capacity(results.len());
        let mut last_error = None;
        for (algo, result) in results {
            match result {
                Ok(outcome) => {
                    debug!(model = algo.class_name(), score = outcome.scores.get(sort), "Candidate evaluated");
                    ranked.push((algo, outcome));
                }
                Err(e) => {
                    warn!(model = algo.class_name(), error = %e, "Candidate failed, skipping");
                    last_error = Some(e);
                }
            }
        }

        if ranked.is_empty() {
            return Err(AutomlError::TrainingFailure(format!(
                "No candidate model could be trained: {}",
                last_error.map(|e| e.to_string()).unwrap_or_default()
            )));
        }

        ranked.sort_by(|a, b| {
            let (sa, sb) = (a.1.scores.get(sort), b.1.scores.get(sort));
            if sort.is_better(sa, sb) {
                std::cmp::Ordering::Less
            } else if sort.is_better(sb, sa) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });

        let metrics = Metric::for_task(exp.task);
        let mut columns = vec!["Model".to_string()];
        columns.extend(metrics.iter().map(|m| m.column().to_string()));
        columns.push("TT (Sec)".to_string());

        let mut leaderboard = Leaderboard::new(columns);
        for (algo, outcome) in &ranked {
            let mut row = vec![Value::from(algo.display_name())];
            row.extend(metrics.iter().map(|m| round_to(outcome.scores.get(*m), 4)));
            row.push(round_to(outcome.fit_seconds, 3));
            leaderboard.push_row(row);
        }

        let best = Candidate::with_defaults(ranked[0].0);
        info!(
            best = best.algorithm.class_name(),
            metric = %sort,
            score = ranked[0].1.scores.get(sort),
            candidates = ranked.len(),
            "Model comparison complete"
        );

        Ok(Comparison { leaderboard, best })
    }

    fn tune(&self, exp: &Experiment, candidate: &Candidate, optimize: Metric) -> Result<FittedModel> {
        Self::check_metric(exp.task, optimize)?;
        let algorithm = candidate.algorithm;
        let space = algorithm.search_space();

        // the untuned parameters always compete
        let mut trials: Vec<Hyperparams> = vec![candidate.params.clone()];
        if !space.is_empty() {
            let mut sampler = RandomSampler::new(exp.seed);
            for _ in 0..self.settings.tune_iterations {
                trials.push(sampler.sample(&space, &candidate.params));
            }
        }

        let results: Vec<Result<f64>> = trials
            .par_iter()
            .map(|params| {
                let trial = Candidate {
                    algorithm,
                    params: params.clone(),
                };
                self.cross_validate(exp, &trial).map(|o| o.scores.get(optimize))
            })
            .collect();

        let mut best: Option<(usize, f64)> = None;
        let mut last_error = None;
        for (idx, result) in results.into_iter().enumerate() {
            match result {
                Ok(score) => {
                    if best.map_or(true, |(_, b)| optimize.is_better(score, b)) {
                        best = Some((idx, score));
                    }
                }
                Err(e) => {
                    warn!(model = algorithm.class_name(), trial = idx, error = %e, "Tuning trial failed");
                    last_error = Some(e);
                }
            }
        }

        let (best_idx, cv_score) = best.ok_or_else(|| {
            AutomlError::TrainingFailure(format!(
                "Tuning failed for {}: {}",
                algorithm.class_name(),
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ))
        })?;
        let params = trials.swap_remove(best_idx);

        info!(
            model = algorithm.class_name(),
            trials = trials.len() + 1,
            improved = best_idx != 0,
            metric = %optimize,
            score = cv_score,
            "Hyperparameter tuning complete"
        );

        let mut estimator = algorithm.build(&params, exp.n_classes(), exp.seed);
        estimator.fit(&exp.x, &exp.y)?;

        Ok(FittedModel {
            algorithm,
            params,
            task: exp.task,
            target_column: exp.target_column.clone(),
            pipeline: exp.pipeline.clone(),
            target: exp.target.clone(),
            estimator,
            cv_score,
            optimized_metric: optimize.column().to_string(),
            trained_at: chrono::Local::now().to_rfc3339(),
        })
    }

    fn predict(&self, model: &FittedModel, data: &Dataset) -> Result<Table> {
        let x = model.pipeline.transform(data)?;

        match model.task {
            TaskKind::Classification => {
                let proba = model.estimator.predict_proba(&x)?;
                let mut columns = vec![PREDICTION_LABEL.to_string()];
                columns.extend(
                    model
                        .target
                        .classes()
                        .iter()
                        .map(|c| format!("{}{}", PREDICTION_SCORE_PREFIX, c)),
                );

                let mut table = Table::new(columns);
                for row in proba.rows() {
                    let mut values = vec![model.target.decode(argmax(row) as f64)];
                    values.extend(row.iter().map(|p| Value::from(*p)));
                    table.push_row(values);
                }
                Ok(table)
            }
            TaskKind::Regression => {
                let values = model.estimator.predict_values(&x)?;
                let mut table = Table::new(vec![PREDICTION_LABEL.to_string()]);
                for v in values.iter() {
                    table.push_row(vec![Value::from(*v)]);
                }
                Ok(table)
            }
        }
    }

    fn save(&self, model: &FittedModel, dir: &Path) -> Result<()> {
        super::save_model(model, dir)?;
        info!(path = %dir.display(), model = model.class_name(), "Model saved");
        Ok(())
    }
}
