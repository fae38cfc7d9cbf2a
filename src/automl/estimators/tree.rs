//! CART decision trees and bagged random forests

use ndarray::{Array1, Array2, ArrayView1};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_xy, not_fitted, Objective};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    /// Class distribution, or a single mean for regression
    Leaf { value: Vec<f64> },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

/// Gini (classification) or variance (regression) decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; all when `None`
    pub max_features: Option<usize>,
    pub seed: u64,
    objective: Objective,
    root: Option<TreeNode>,
}

impl DecisionTree {
    pub fn new(objective: Objective) -> Self {
        Self {
            max_depth: 32,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
            objective,
            root: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_max_features(mut self, max_features: Option<usize>) -> Self {
        self.max_features = max_features;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let rows: Vec<usize> = (0..x.nrows()).collect();
        self.fit_rows(x, y, rows)
    }

    /// Fit on a subset of rows (repeats allowed, as in a bootstrap sample).
    pub fn fit_rows(&mut self, x: &Array2<f64>, y: &Array1<f64>, rows: Vec<usize>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.root = Some(self.grow(x, y, rows, 0, &mut rng));
        Ok(self)
    }

    fn leaf(&self, y: &Array1<f64>, rows: &[usize]) -> TreeNode {
        let n = rows.len().max(1) as f64;
        let value = match self.objective {
            Objective::Classification { n_classes } => {
                let mut dist = vec![0.0; n_classes];
                for &r in rows {
                    dist[y[r] as usize] += 1.0 / n;
                }
                dist
            }
            Objective::Regression => vec![rows.iter().map(|&r| y[r]).sum::<f64>() / n],
        };
        TreeNode::Leaf { value }
    }

    fn grow(&self, x: &Array2<f64>, y: &Array1<f64>, rows: Vec<usize>, depth: usize, rng: &mut ChaCha8Rng) -> TreeNode {
        let pure = rows.windows(2).all(|w| y[w[0]] == y[w[1]]);
        if depth >= self.max_depth || rows.len() < self.min_samples_split || pure {
            return self.leaf(y, &rows);
        }

        let Some((feature, threshold)) = self.best_split(x, y, &rows, rng) else {
            return self.leaf(y, &rows);
        };

        let (left, right): (Vec<usize>, Vec<usize>) =
            rows.iter().copied().partition(|&r| x[[r, feature]] <= threshold);

        TreeNode::Split {
            feature,
            threshold,
            left: Box::new(self.grow(x, y, left, depth + 1, rng)),
            right: Box::new(self.grow(x, y, right, depth + 1, rng)),
        }
    }

    /// Split maximizing `sum_l^2 / n_l + sum_r^2 / n_r`, which is equivalent to
    /// minimizing weighted Gini or squared error.
    fn best_split(&self, x: &Array2<f64>, y: &Array1<f64>, rows: &[usize], rng: &mut ChaCha8Rng) -> Option<(usize, f64)> {
        let n_features = x.ncols();
        let features: Vec<usize> = match self.max_features {
            Some(m) if m < n_features => sample(rng, n_features, m.max(1)).into_vec(),
            _ => (0..n_features).collect(),
        };

        let n = rows.len();
        let min_leaf = self.min_samples_leaf.max(1);
        let parent = self.proxy(y, rows.iter().copied());
        let mut best: Option<(usize, f64, f64)> = None;

        for feature in features {
            let mut sorted = rows.to_vec();
            sorted.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));

            let mut scan = SplitScan::new(self.objective, y, &sorted);
            for i in 0..n.saturating_sub(1) {
                scan.move_left(y[sorted[i]]);
                let (lo, hi) = (x[[sorted[i], feature]], x[[sorted[i + 1], feature]]);
                if lo == hi || i + 1 < min_leaf || n - i - 1 < min_leaf {
                    continue;
                }
                let gain = scan.score() - parent;
                if gain > 1e-12 && best.map_or(true, |(_, _, g)| gain > g) {
                    best = Some((feature, (lo + hi) / 2.0, gain));
                }
            }
        }

        best.map(|(f, t, _)| (f, t))
    }

    fn proxy(&self, y: &Array1<f64>, rows: impl Iterator<Item = usize>) -> f64 {
        let rows: Vec<usize> = rows.collect();
        let mut scan = SplitScan::new(self.objective, y, &rows);
        for &r in &rows {
            scan.move_left(y[r]);
        }
        scan.left_score()
    }

    fn predict_row(&self, row: ArrayView1<f64>) -> Result<&[f64]> {
        let mut node = self.root.as_ref().ok_or_else(|| not_fitted("DecisionTree"))?;
        loop {
            match node {
                TreeNode::Leaf { value } => return Ok(value.as_slice()),
                TreeNode::Split { feature, threshold, left, right } => {
                    node = if row[*feature] <= *threshold { &**left } else { &**right };
                }
            }
        }
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n_classes = self.objective.n_classes();
        let mut proba = Array2::<f64>::zeros((x.nrows(), n_classes));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (k, p) in self.predict_row(row)?.iter().enumerate() {
                proba[[i, k]] = *p;
            }
        }
        Ok(proba)
    }

    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        x.rows()
            .into_iter()
            .map(|row| Ok(self.predict_row(row)?.first().copied().unwrap_or(0.0)))
            .collect()
    }
}

/// Running left/right sufficient statistics while sweeping a sorted feature
struct SplitScan {
    classification: bool,
    left_counts: Vec<f64>,
    right_counts: Vec<f64>,
    left_sq: f64,
    right_sq: f64,
    left_sum: f64,
    right_sum: f64,
    n_left: f64,
    n_right: f64,
}

impl SplitScan {
    fn new(objective: Objective, y: &Array1<f64>, rows: &[usize]) -> Self {
        let n_classes = objective.n_classes();
        let mut right_counts = vec![0.0; n_classes];
        let mut right_sum = 0.0;
        for &r in rows {
            match objective {
                Objective::Classification { .. } => right_counts[y[r] as usize] += 1.0,
                Objective::Regression => right_sum += y[r],
            }
        }
        Self {
            classification: matches!(objective, Objective::Classification { .. }),
            right_sq: right_counts.iter().map(|c| c * c).sum(),
            left_counts: vec![0.0; n_classes],
            right_counts,
            left_sq: 0.0,
            left_sum: 0.0,
            right_sum,
            n_left: 0.0,
            n_right: rows.len() as f64,
        }
    }

    fn move_left(&mut self, label: f64) {
        if self.classification {
            let c = label as usize;
            self.left_sq += 2.0 * self.left_counts[c] + 1.0;
            self.left_counts[c] += 1.0;
            self.right_sq -= 2.0 * self.right_counts[c] - 1.0;
            self.right_counts[c] -= 1.0;
        } else {
            self.left_sum += label;
            self.right_sum -= label;
        }
        self.n_left += 1.0;
        self.n_right -= 1.0;
    }

    fn side(&self, sq: f64, sum: f64, n: f64) -> f64 {
        if n == 0.0 {
            0.0
        } else if self.classification {
            sq / n
        } else {
            sum * sum / n
        }
    }

    fn left_score(&self) -> f64 {
        self.side(self.left_sq, self.left_sum, self.n_left)
    }

    fn score(&self) -> f64 {
        self.left_score() + self.side(self.right_sq, self.right_sum, self.n_right)
    }
}

/// Bagged ensemble of decision trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
    objective: Objective,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(objective: Objective) -> Self {
        Self {
            n_estimators: 100,
            max_depth: 32,
            min_samples_split: 2,
            seed: 42,
            objective,
            trees: Vec::new(),
        }
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n.max(1);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        check_xy(x, y)?;
        let (n_samples, n_features) = x.dim();
        let max_features = match self.objective {
            Objective::Classification { .. } => (n_features as f64).sqrt().round() as usize,
            Objective::Regression => n_features / 3,
        }
        .max(1);

        self.trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|idx| {
                let seed = self.seed.wrapping_add(idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let rows: Vec<usize> = (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();

                let mut tree = DecisionTree::new(self.objective)
                    .with_max_depth(self.max_depth)
                    .with_min_samples_split(self.min_samples_split)
                    .with_max_features(Some(max_features))
                    .with_seed(seed);
                tree.fit_rows(x, y, rows)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(self)
    }

    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(not_fitted("RandomForest"));
        }
        let mut total = Array2::<f64>::zeros((x.nrows(), self.objective.n_classes()));
        for tree in &self.trees {
            total += &tree.predict_proba(x)?;
        }
        Ok(total / self.trees.len() as f64)
    }

    pub fn predict_values(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(not_fitted("RandomForest"));
        }
        let mut total = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            total += &tree.predict_values(x)?;
        }
        Ok(total / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const BINARY: Objective = Objective::Classification { n_classes: 2 };

    #[test]
    fn test_tree_classifier_simple() {
        let x = array![[1.0, 1.0], [1.0, 2.0], [2.0, 1.0], [2.0, 2.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new(BINARY);
        tree.fit(&x, &y).unwrap();

        let proba = tree.predict_proba(&x).unwrap();
        for (i, label) in y.iter().enumerate() {
            assert_eq!(proba[[i, *label as usize]], 1.0);
        }
    }

    #[test]
    fn test_tree_regressor_depth_one() {
        let x = array![[1.0], [2.0], [10.0], [11.0]];
        let y = array![1.0, 1.0, 5.0, 5.0];
        let mut tree = DecisionTree::new(Objective::Regression).with_max_depth(1);
        tree.fit(&x, &y).unwrap();
        assert_eq!(tree.predict_values(&array![[0.0], [20.0]]).unwrap().to_vec(), vec![1.0, 5.0]);
    }

    #[test]
    fn test_constant_feature_gives_leaf() {
        let x = array![[3.0], [3.0], [3.0]];
        let y = array![0.0, 1.0, 1.0];
        let mut tree = DecisionTree::new(BINARY);
        tree.fit(&x, &y).unwrap();
        let proba = tree.predict_proba(&x).unwrap();
        assert!((proba[[0, 1]] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_forest_is_deterministic() {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let y = Array1::from_shape_fn(40, |i| if x[[i, 0]] > 5.0 { 1.0 } else { 0.0 });

        let fit = || {
            let mut forest = RandomForest::new(BINARY).with_n_estimators(15).with_seed(3);
            forest.fit(&x, &y).unwrap();
            forest.predict_proba(&x).unwrap()
        };
        let a = fit();
        assert_eq!(a, fit());
        for row in a.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_forest_regression_tracks_target() {
        let x = Array2::from_shape_fn((50, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(50, |i| 2.0 * i as f64);
        let mut forest = RandomForest::new(Objective::Regression).with_n_estimators(20);
        forest.fit(&x, &y).unwrap();
        let pred = forest.predict_values(&array![[25.0]]).unwrap()[0];
        assert!((pred - 50.0).abs() < 10.0);
    }
}
