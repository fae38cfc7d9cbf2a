//! Cross-validation fold assignment

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{AutomlError, Result};

/// A single train/test split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Seeded k-fold splitter
#[derive(Debug, Clone)]
pub struct FoldSplitter {
    n_splits: usize,
    seed: u64,
}

impl FoldSplitter {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    fn effective_splits(&self, n_samples: usize) -> Result<usize> {
        let k = self.n_splits.min(n_samples);
        if k < 2 {
            return Err(AutomlError::TrainingFailure(format!(
                "Cross-validation needs at least 2 folds and 2 rows (got {} folds, {} rows)",
                self.n_splits, n_samples
            )));
        }
        Ok(k)
    }

    /// Shuffled k-fold.
    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        let k = self.effective_splits(n_samples)?;
        let mut indices: Vec<usize> = (0..n_samples).collect();
        indices.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));

        let assignment: Vec<usize> = indices
            .iter()
            .enumerate()
            .fold(vec![0; n_samples], |mut acc, (pos, &idx)| {
                acc[idx] = pos % k;
                acc
            });

        Ok(Self::folds_from_assignment(&assignment, k))
    }

    /// Stratified k-fold: each class is shuffled and dealt round-robin, so
    /// class proportions are roughly preserved in every fold.
    pub fn split_stratified(&self, classes: &[usize]) -> Result<Vec<Fold>> {
        let n_samples = classes.len();
        let k = self.effective_splits(n_samples)?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let n_classes = classes.iter().copied().max().map(|m| m + 1).unwrap_or(0);
        let mut by_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (idx, &class) in classes.iter().enumerate() {
            by_class[class].push(idx);
        }

        let mut assignment = vec![0; n_samples];
        let mut dealt = 0;
        for members in by_class.iter_mut() {
            members.shuffle(&mut rng);
            for &idx in members.iter() {
                assignment[idx] = dealt % k;
                dealt += 1;
            }
        }

        Ok(Self::folds_from_assignment(&assignment, k))
    }

    fn folds_from_assignment(assignment: &[usize], k: usize) -> Vec<Fold> {
        (0..k)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..assignment.len()).partition(|&i| assignment[i] == fold);
                Fold { train, test }
            })
            .collect()
    }
}
