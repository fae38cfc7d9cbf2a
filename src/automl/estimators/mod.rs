//! Candidate model families
//!
//! [`Algorithm`] names a family and knows its defaults and search space;
//! [`Estimator`] is the fitted, serializable model behind it.

mod dummy;
mod knn;
mod linear;
mod naive_bayes;
mod tree;

pub use dummy::DummyModel;
pub use knn::KNearestNeighbors;
pub use linear::{LinearRegression, LogisticRegression};
pub use naive_bayes::GaussianNaiveBayes;
pub use tree::{DecisionTree, RandomForest};

use std::fmt;
use std::str::FromStr;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::search::{param_f64, param_usize, Hyperparams, ParamValue, Parameter, SearchSpace};
use crate::error::{AutomlError, Result};
use crate::task::TaskKind;

/// What an estimator is fitted to predict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Objective {
    Classification { n_classes: usize },
    Regression,
}

impl Objective {
    pub fn n_classes(&self) -> usize {
        match self {
            Objective::Classification { n_classes } => *n_classes,
            Objective::Regression => 0,
        }
    }
}

pub(crate) fn not_fitted(model: &str) -> AutomlError {
    AutomlError::TrainingFailure(format!("{} is not fitted", model))
}

pub(crate) fn check_xy(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(AutomlError::TrainingFailure(format!(
            "Feature rows ({}) and target length ({}) differ",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() == 0 {
        return Err(AutomlError::TrainingFailure("Cannot fit on zero rows".to_string()));
    }
    Ok(())
}

/// Model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    LogisticRegression,
    KNeighborsClassifier,
    GaussianNB,
    DecisionTreeClassifier,
    RandomForestClassifier,
    DummyClassifier,
    LinearRegression,
    Ridge,
    KNeighborsRegressor,
    DecisionTreeRegressor,
    RandomForestRegressor,
    DummyRegressor,
}

impl Algorithm {
    const CLASSIFIERS: [Algorithm; 6] = [
        Algorithm::LogisticRegression,
        Algorithm::KNeighborsClassifier,
        Algorithm::GaussianNB,
        Algorithm::DecisionTreeClassifier,
        Algorithm::RandomForestClassifier,
        Algorithm::DummyClassifier,
    ];

    const REGRESSORS: [Algorithm; 6] = [
        Algorithm::LinearRegression,
        Algorithm::Ridge,
        Algorithm::KNeighborsRegressor,
        Algorithm::DecisionTreeRegressor,
        Algorithm::RandomForestRegressor,
        Algorithm::DummyRegressor,
    ];

    /// Candidates compared for a task, in leaderboard tie-break order
    pub fn candidates(task: TaskKind) -> &'static [Algorithm] {
        match task {
            TaskKind::Classification => &Self::CLASSIFIERS,
            TaskKind::Regression => &Self::REGRESSORS,
        }
    }

    pub fn task(&self) -> TaskKind {
        if Self::CLASSIFIERS.contains(self) {
            TaskKind::Classification
        } else {
            TaskKind::Regression
        }
    }

    /// Short class name, used in model identifiers
    pub fn class_name(&self) -> &'static str {
        match self {
            Algorithm::LogisticRegression => "LogisticRegression",
            Algorithm::KNeighborsClassifier => "KNeighborsClassifier",
            Algorithm::GaussianNB => "GaussianNB",
            Algorithm::DecisionTreeClassifier => "DecisionTreeClassifier",
            Algorithm::RandomForestClassifier => "RandomForestClassifier",
            Algorithm::DummyClassifier => "DummyClassifier",
            Algorithm::LinearRegression => "LinearRegression",
            Algorithm::Ridge => "Ridge",
            Algorithm::KNeighborsRegressor => "KNeighborsRegressor",
            Algorithm::DecisionTreeRegressor => "DecisionTreeRegressor",
            Algorithm::RandomForestRegressor => "RandomForestRegressor",
            Algorithm::DummyRegressor => "DummyRegressor",
        }
    }

    /// Leaderboard label
    pub fn display_name(&self) -> &'static str {
        match self {
            Algorithm::LogisticRegression => "Logistic Regression",
            Algorithm::KNeighborsClassifier => "K Neighbors Classifier",
            Algorithm::GaussianNB => "Naive Bayes",
            Algorithm::DecisionTreeClassifier => "Decision Tree Classifier",
            Algorithm::RandomForestClassifier => "Random Forest Classifier",
            Algorithm::DummyClassifier => "Dummy Classifier",
            Algorithm::LinearRegression => "Linear Regression",
            Algorithm::Ridge => "Ridge Regression",
            Algorithm::KNeighborsRegressor => "K Neighbors Regressor",
            Algorithm::DecisionTreeRegressor => "Decision Tree Regressor",
            Algorithm::RandomForestRegressor => "Random Forest Regressor",
            Algorithm::DummyRegressor => "Dummy Regressor",
        }
    }

    pub fn default_params(&self) -> Hyperparams {
        let pairs: Vec<(&str, ParamValue)> = match self {
            Algorithm::LogisticRegression => vec![("C", ParamValue::Float(1.0))],
            Algorithm::KNeighborsClassifier | Algorithm::KNeighborsRegressor => {
                vec![("n_neighbors", ParamValue::Int(5))]
            }
            Algorithm::GaussianNB => vec![("var_smoothing", ParamValue::Float(1e-9))],
            Algorithm::DecisionTreeClassifier | Algorithm::DecisionTreeRegressor => vec![
                ("max_depth", ParamValue::Int(32)),
                ("min_samples_split", ParamValue::Int(2)),
            ],
            Algorithm::RandomForestClassifier | Algorithm::RandomForestRegressor => vec![
                ("n_estimators", ParamValue::Int(100)),
                ("max_depth", ParamValue::Int(32)),
                ("min_samples_split", ParamValue::Int(2)),
            ],
            Algorithm::Ridge => vec![("alpha", ParamValue::Float(1.0))],
            Algorithm::LinearRegression | Algorithm::DummyClassifier | Algorithm::DummyRegressor => vec![],
        };
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    pub fn search_space(&self) -> SearchSpace {
        let space = SearchSpace::new();
        match self {
            Algorithm::LogisticRegression => space.add(Parameter::log_float("C", 0.01, 10.0)),
            Algorithm::KNeighborsClassifier | Algorithm::KNeighborsRegressor => {
                space.add(Parameter::int("n_neighbors", 1, 25))
            }
            Algorithm::GaussianNB => space.add(Parameter::log_float("var_smoothing", 1e-11, 1e-3)),
            Algorithm::DecisionTreeClassifier | Algorithm::DecisionTreeRegressor => space
                .add(Parameter::int("max_depth", 2, 16))
                .add(Parameter::int("min_samples_split", 2, 20)),
            Algorithm::RandomForestClassifier | Algorithm::RandomForestRegressor => space
                .add(Parameter::int("n_estimators", 10, 150))
                .add(Parameter::int("max_depth", 2, 16))
                .add(Parameter::int("min_samples_split", 2, 10)),
            Algorithm::Ridge => space.add(Parameter::log_float("alpha", 0.01, 100.0)),
            Algorithm::LinearRegression | Algorithm::DummyClassifier | Algorithm::DummyRegressor => space,
        }
    }

    /// Instantiate an unfitted estimator.
    pub fn build(&self, params: &Hyperparams, n_classes: usize, seed: u64) -> Estimator {
        let objective = match self.task() {
            TaskKind::Classification => Objective::Classification { n_classes },
            TaskKind::Regression => Objective::Regression,
        };
        let max_depth = param_usize(params, "max_depth", 32);
        let min_split = param_usize(params, "min_samples_split", 2);

        match self {
            Algorithm::LogisticRegression => {
                Estimator::Logistic(LogisticRegression::new(n_classes).with_c(param_f64(params, "C", 1.0)))
            }
            Algorithm::KNeighborsClassifier | Algorithm::KNeighborsRegressor => Estimator::Neighbors(
                KNearestNeighbors::new(objective).with_k(param_usize(params, "n_neighbors", 5)),
            ),
            Algorithm::GaussianNB => Estimator::NaiveBayes(
                GaussianNaiveBayes::new(n_classes).with_var_smoothing(param_f64(params, "var_smoothing", 1e-9)),
            ),
            Algorithm::DecisionTreeClassifier | Algorithm::DecisionTreeRegressor => Estimator::Tree(
                DecisionTree::new(objective)
                    .with_max_depth(max_depth)
                    .with_min_samples_split(min_split)
                    .with_seed(seed),
            ),
            Algorithm::RandomForestClassifier | Algorithm::RandomForestRegressor => Estimator::Forest(
                RandomForest::new(objective)
                    .with_n_estimators(param_usize(params, "n_estimators", 100))
                    .with_max_depth(max_depth)
                    .with_min_samples_split(min_split)
                    .with_seed(seed),
            ),
            Algorithm::LinearRegression => Estimator::Linear(LinearRegression::new()),
            Algorithm::Ridge => Estimator::Linear(LinearRegression::new().with_alpha(param_f64(params, "alpha", 1.0))),
            Algorithm::DummyClassifier | Algorithm::DummyRegressor => Estimator::Dummy(DummyModel::new(objective)),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.class_name())
    }
}

impl FromStr for Algorithm {
    type Err = AutomlError;

    fn from_str(s: &str) -> Result<Self> {
        Self::CLASSIFIERS
            .iter()
            .chain(Self::REGRESSORS.iter())
            .find(|a| a.class_name().eq_ignore_ascii_case(s.trim()))
            .copied()
            .ok_or_else(|| AutomlError::Validation(format!("Unknown model family: {}", s)))
    }
}

/// A fitted (or fittable) model of any family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Estimator {
    Logistic(LogisticRegression),
    Linear(LinearRegression),
    Neighbors(KNearestNeighbors),
    NaiveBayes(GaussianNaiveBayes),
    Tree(DecisionTree),
    Forest(RandomForest),
    Dummy(DummyModel),
}

impl Estimator {
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        match self {
            Estimator::Logistic(m) => m.fit(x, y).map(|_| ()),
            Estimator::Linear(m) => m.fit(x, y).map(|_| ()),
            Estimator::Neighbors(m) => m.fit(x, y).map(|_| ()),
            Estimator::NaiveBayes(m) => m.fit(x, y).map(|_| ()),
            Estimator::Tree(m) => m.fit(x, y).map(|_| ()),
            Estimator::Forest(m) => m.fit(x, y).map(|_| ()),
            Estimator::Dummy(m) => m.fit(x, y).map(|_| ()),
        }
    }

    /// Class probabilities, one column per class.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            Estimator::Logistic(m) => m.predict_proba(x),
            Estimator::Neighbors(m) => m.predict_proba(x),
            Estimator::NaiveBayes(m) => m.predict_proba(x),
            Estimator::Tree(m) => m.predict_proba(x),
            Estimator::Forest(m) => m.predict_proba(x),
            Estimator::Dummy(m) => m.predict_proba(x),
            Estimator::Linear(_) => Err(AutomlError::TrainingFailure(
                "Linear regression does not produce class probabilities".to_string(),
            )),
        }
    }

    /// Continuous predictions for regression models.
    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        match self {
            Estimator::Linear(m) => m.predict(x),
            Estimator::Neighbors(m) => m.predict_values(x),
            Estimator::Tree(m) => m.predict_values(x),
            Estimator::Forest(m) => m.predict_values(x),
            Estimator::Dummy(m) => m.predict_values(x),
            Estimator::Logistic(_) | Estimator::NaiveBayes(_) => Err(AutomlError::TrainingFailure(
                "Classifier does not produce continuous predictions".to_string(),
            )),
        }
    }
}
