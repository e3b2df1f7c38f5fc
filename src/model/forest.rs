//! Random forest regressor
//!
//! Each tree sees a bootstrap sample drawn with its own `StdRng` seeded from
//! `seed + tree index`, so results do not depend on how rayon schedules the
//! trees.

use super::tree::{RegressionTree, TreeParams};
use super::{check_columns, check_training_data, normalize, not_fitted, ModelKind, Regressor};
use crate::{ForestConfig, Result, TransferError};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct RandomForest {
    n_estimators: usize,
    tree_params: TreeParams,
    seed: u64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl RandomForest {
    pub fn new(n_estimators: usize, tree_params: TreeParams, seed: u64) -> Result<Self> {
        if n_estimators == 0 {
            return Err(TransferError::Config(
                "random forest needs at least one tree".to_string(),
            ));
        }
        tree_params.validate()?;
        Ok(RandomForest {
            n_estimators,
            tree_params,
            seed,
            trees: Vec::new(),
            n_features: 0,
        })
    }

    pub fn from_config(config: &ForestConfig) -> Result<Self> {
        Self::new(
            config.n_estimators,
            TreeParams {
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                min_samples_leaf: config.min_samples_leaf,
                max_features: config.max_features,
                seed: config.seed,
            },
            config.seed,
        )
    }

    pub fn trees(&self) -> &[RegressionTree] {
        &self.trees
    }

    fn fit_tree(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        tree_index: usize,
    ) -> Result<RegressionTree> {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(tree_index as u64));
        let n = x.nrows();
        let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

        let mut tree = RegressionTree::new(self.tree_params.clone());
        tree.fit_indices(x, y, &bootstrap, &mut rng)?;
        Ok(tree)
    }
}

impl Regressor for RandomForest {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_data(x, y)?;

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|t| self.fit_tree(x, y, t))
            .collect::<Result<Vec<_>>>()?;

        log::debug!(
            "Random forest fitted: {} trees, mean depth {:.1}",
            trees.len(),
            trees.iter().map(|t| t.depth() as f64).sum::<f64>() / trees.len() as f64
        );

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(not_fitted(self.kind()));
        }
        check_columns(self.n_features, x)?;

        let per_tree = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<_>>>()?;

        // summed in tree order so the result is identical across thread counts
        let mut sum: Array1<f64> = Array1::zeros(x.nrows());
        for pred in &per_tree {
            sum += pred;
        }
        Ok(sum / self.trees.len() as f64)
    }

    fn feature_weights(&self) -> Option<Array1<f64>> {
        if self.trees.is_empty() {
            return None;
        }
        let mut total: Array1<f64> = Array1::zeros(self.n_features);
        for tree in &self.trees {
            total += &tree.importances()?;
        }
        Some(normalize(total / self.trees.len() as f64))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    /// y depends on the first column only; the second is noise
    fn data() -> (Array2<f64>, Array1<f64>) {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 80;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64 / n as f64
            } else {
                rng.gen::<f64>()
            }
        });
        let y = x.column(0).mapv(|v| if v < 0.5 { 1.0 } else { 3.0 });
        (x, y)
    }

    fn forest(seed: u64) -> RandomForest {
        RandomForest::new(
            25,
            TreeParams {
                max_depth: Some(4),
                ..TreeParams::default()
            },
            seed,
        )
        .unwrap()
    }

    #[test]
    fn test_fits_step_function() {
        let (x, y) = data();
        let mut model = forest(50);
        model.fit(x.view(), y.view()).unwrap();
        assert_eq!(model.trees().len(), 25);

        let pred = model.predict(x.view()).unwrap();
        let mae = (&pred - &y).mapv(f64::abs).mean().unwrap();
        assert!(mae < 0.2, "mae {}", mae);

        let weights = model.feature_weights().unwrap();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        assert!(weights[0] > weights[1]);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = data();
        let mut a = forest(50);
        let mut b = forest(50);
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a.predict(x.view()).unwrap(), b.predict(x.view()).unwrap());
    }

    #[test]
    fn test_unfitted_and_zero_trees() {
        let model = forest(1);
        assert!(model.predict(Array2::<f64>::zeros((1, 2)).view()).is_err());
        assert!(model.feature_weights().is_none());
        assert!(RandomForest::new(0, TreeParams::default(), 1).is_err());
    }
}
