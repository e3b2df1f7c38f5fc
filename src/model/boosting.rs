//! Gradient boosting with squared-error loss

use super::tree::{RegressionTree, TreeParams};
use super::{check_columns, check_training_data, normalize, not_fitted, ModelKind, Regressor};
use crate::{BoostingConfig, Result, TransferError};
use ndarray::{Array1, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone)]
pub struct GradientBoosting {
    n_estimators: usize,
    learning_rate: f64,
    subsample: f64,
    tree_params: TreeParams,
    seed: u64,
    init: f64,
    stages: Vec<RegressionTree>,
    n_features: usize,
    /// Training loss (mean squared error) after each stage
    train_loss: Vec<f64>,
}

impl GradientBoosting {
    pub fn new(
        n_estimators: usize,
        learning_rate: f64,
        subsample: f64,
        tree_params: TreeParams,
        seed: u64,
    ) -> Result<Self> {
        if n_estimators == 0 {
            return Err(TransferError::Config(
                "gradient boosting needs at least one stage".to_string(),
            ));
        }
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            return Err(TransferError::Config(format!(
                "learning_rate must be positive, got {}",
                learning_rate
            )));
        }
        if !(subsample > 0.0 && subsample <= 1.0) {
            return Err(TransferError::Config(format!(
                "subsample must be within (0, 1], got {}",
                subsample
            )));
        }
        tree_params.validate()?;

        Ok(GradientBoosting {
            n_estimators,
            learning_rate,
            subsample,
            tree_params,
            seed,
            init: 0.0,
            stages: Vec::new(),
            n_features: 0,
            train_loss: Vec::new(),
        })
    }

    pub fn from_config(config: &BoostingConfig) -> Result<Self> {
        Self::new(
            config.n_estimators,
            config.learning_rate,
            config.subsample,
            TreeParams {
                max_depth: Some(config.max_depth),
                min_samples_split: config.min_samples_split,
                min_samples_leaf: config.min_samples_leaf,
                max_features: None,
                seed: config.seed,
            },
            config.seed,
        )
    }

    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    pub fn stages(&self) -> usize {
        self.stages.len()
    }

    fn sample_rows(&self, n: usize, rng: &mut StdRng) -> Vec<usize> {
        if self.subsample >= 1.0 {
            return (0..n).collect();
        }
        let in_bag = ((self.subsample * n as f64) as usize).max(1);
        let mut rows = rand::seq::index::sample(rng, n, in_bag).into_vec();
        rows.sort_unstable();
        rows
    }
}

impl Regressor for GradientBoosting {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
        check_training_data(x, y)?;

        let n = x.nrows();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let init = y.sum() / n as f64;
        let mut current = Array1::from_elem(n, init);
        let mut stages = Vec::with_capacity(self.n_estimators);
        let mut train_loss = Vec::with_capacity(self.n_estimators);

        for stage in 0..self.n_estimators {
            let residuals = &y - &current;
            let rows = self.sample_rows(n, &mut rng);

            let mut tree = RegressionTree::new(self.tree_params.clone());
            tree.fit_indices(x, residuals.view(), &rows, &mut rng)?;

            current = current + tree.predict(x)? * self.learning_rate;
            stages.push(tree);

            let mse = (&y - &current).mapv(|r| r * r).sum() / n as f64;
            train_loss.push(mse);
            if (stage + 1) % 100 == 0 {
                log::debug!("Boosting stage {}: train MSE {:.6}", stage + 1, mse);
            }
        }

        self.init = init;
        self.stages = stages;
        self.train_loss = train_loss;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>> {
        if self.stages.is_empty() {
            return Err(not_fitted(self.kind()));
        }
        check_columns(self.n_features, x)?;

        let mut pred = Array1::from_elem(x.nrows(), self.init);
        for tree in &self.stages {
            pred = pred + tree.predict(x)? * self.learning_rate;
        }
        Ok(pred)
    }

    fn feature_weights(&self) -> Option<Array1<f64>> {
        if self.stages.is_empty() {
            return None;
        }
        // each stage weighted by the squared error it removes
        let mut total: Array1<f64> = Array1::zeros(self.n_features);
        for tree in &self.stages {
            total += tree.impurity_decrease()?;
        }
        Some(normalize(total))
    }
}
