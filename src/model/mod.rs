//! Regression models
//!
//! Three models compete on the same feature matrix:
//! - Linear Regression: ordinary least squares via linfa
//! - Random Forest: bagged regression trees fitted in parallel
//! - Gradient Boosting: shallow trees fitted on residuals

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod tree;

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use linear::LinearModel;
pub use tree::{RegressionTree, TreeParams};

use crate::{ModelsConfig, Result, TransferError};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three competing model families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LinearRegression,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub fn all() -> [ModelKind; 3] {
        [
            ModelKind::LinearRegression,
            ModelKind::RandomForest,
            ModelKind::GradientBoosting,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::RandomForest => "Random Forest",
            ModelKind::GradientBoosting => "Gradient Boosting",
        }
    }

    /// File-name form, e.g. `random_forest`
    pub fn slug(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "linear_regression",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }

    /// What `Regressor::feature_weights` means for this family
    pub fn weight_label(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "coefficient",
            ModelKind::RandomForest | ModelKind::GradientBoosting => "importance",
        }
    }

    /// Unfitted model with hyperparameters from config
    pub fn build(&self, config: &ModelsConfig) -> Result<Box<dyn Regressor>> {
        Ok(match self {
            ModelKind::LinearRegression => Box::new(LinearModel::new(config.linear.fit_intercept)),
            ModelKind::RandomForest => Box::new(RandomForest::from_config(&config.random_forest)?),
            ModelKind::GradientBoosting => {
                Box::new(GradientBoosting::from_config(&config.gradient_boosting)?)
            }
        })
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A regressor mapping a feature matrix to one prediction per row
pub trait Regressor: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn fit(&mut self, x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()>;

    fn predict(&self, x: ArrayView2<f64>) -> Result<Array1<f64>>;

    /// Coefficients for linear models, impurity importances for tree ensembles;
    /// `None` until fitted
    fn feature_weights(&self) -> Option<Array1<f64>>;
}

pub(crate) fn check_training_data(x: ArrayView2<f64>, y: ArrayView1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(TransferError::EmptyData("no training rows".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(TransferError::Model(format!(
            "{} feature rows but {} targets",
            x.nrows(),
            y.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_columns(expected: usize, x: ArrayView2<f64>) -> Result<()> {
    if x.ncols() != expected {
        return Err(TransferError::DimensionMismatch {
            expected,
            actual: x.ncols(),
        });
    }
    Ok(())
}

pub(crate) fn not_fitted(kind: ModelKind) -> TransferError {
    TransferError::Model(format!("{} has not been fitted", kind))
}

/// Scale non-negative weights to sum to one; all-zero stays zero
pub(crate) fn normalize(mut weights: Array1<f64>) -> Array1<f64> {
    let total = weights.sum();
    if total > 0.0 {
        weights /= total;
    }
    weights
}
