//! Model training
//!
//! Data splitting, the three-model bake-off, and regression metrics.

pub mod bakeoff;
pub mod metrics;
pub mod split;

pub use crate::model::ModelKind;
pub use bakeoff::{
    format_result, train_all_models, Comparison, FeatureWeight, ModelResult, Prediction,
};
pub use metrics::{RegressionMetrics, ResidualSummary};
pub use split::{split, TrainTestSplit};
