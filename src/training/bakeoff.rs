//! Fits the three models on the same split and compares them
//!
//! Features are standardised with statistics from the training partition.
//! Columns that are constant in training carry no information for any model
//! and make the least-squares system singular, so they are left out.

use super::metrics::{RegressionMetrics, ResidualSummary};
use crate::features::{FeatureTable, StandardScaler};
use crate::model::{ModelKind, Regressor};
use crate::{ModelsConfig, Result, TransferError};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// A named coefficient or importance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub name: String,
    pub weight: f64,
}

/// One held-out transfer and what a model made of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub player: String,
    pub transfer_year: i32,
    pub actual: f64,
    pub predicted: f64,
}

impl Prediction {
    pub fn residual(&self) -> f64 {
        self.actual - self.predicted
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResult {
    pub kind: ModelKind,
    pub train: RegressionMetrics,
    pub test: RegressionMetrics,
    pub residuals: ResidualSummary,
    pub predictions: Vec<Prediction>,
    /// Sorted by absolute weight, largest first
    pub weights: Vec<FeatureWeight>,
}

impl ModelResult {
    /// Train R² minus test R²
    pub fn overfit_gap(&self) -> f64 {
        self.train.r2 - self.test.r2
    }

    pub fn top_weights(&self, n: usize) -> &[FeatureWeight] {
        &self.weights[..n.min(self.weights.len())]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparison {
    /// Features the models were trained on
    pub feature_names: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    pub results: Vec<ModelResult>,
}

impl Comparison {
    /// Highest test R²; models with an undefined R² are never best
    pub fn best(&self) -> Option<&ModelResult> {
        self.results
            .iter()
            .filter(|r| r.test.r2.is_finite())
            .max_by(|a, b| a.test.r2.total_cmp(&b.test.r2))
    }

    /// Models whose train/test R² gap exceeds `threshold`
    pub fn overfitting(&self, threshold: f64) -> Vec<&ModelResult> {
        self.results
            .iter()
            .filter(|r| r.overfit_gap() > threshold)
            .collect()
    }

    pub fn result(&self, kind: ModelKind) -> Option<&ModelResult> {
        self.results.iter().find(|r| r.kind == kind)
    }
}

/// Single-line summary, e.g. `Model: Random Forest - R² score: 0.1234`
pub fn format_result(name: &str, r2: f64) -> String {
    format!("Model: {} - R² score: {:.4}", name, r2)
}

/// Fit every model on `train` and evaluate on both partitions
pub fn train_all_models(
    config: &ModelsConfig,
    train: &FeatureTable,
    test: &FeatureTable,
) -> Result<Comparison> {
    if train.names != test.names {
        return Err(TransferError::DimensionMismatch {
            expected: train.n_features(),
            actual: test.n_features(),
        });
    }
    if train.is_empty() || test.is_empty() {
        return Err(TransferError::EmptyData(
            "both partitions need at least one row".to_string(),
        ));
    }

    let x_train = train.matrix();
    let x_test = test.matrix();

    let constant = StandardScaler::fit(x_train.view())?.constant_columns();
    let keep: Vec<usize> = (0..train.n_features())
        .filter(|c| !constant.contains(c))
        .collect();
    if keep.is_empty() {
        return Err(TransferError::EmptyData(
            "every feature is constant in the training partition".to_string(),
        ));
    }
    if !constant.is_empty() {
        let names: Vec<&str> = constant.iter().map(|&c| train.names[c].as_str()).collect();
        log::warn!("Dropping features constant in training: {}", names.join(", "));
    }

    let feature_names: Vec<String> = keep.iter().map(|&c| train.names[c].clone()).collect();
    let x_train: Array2<f64> = x_train.select(Axis(1), &keep);
    let x_test: Array2<f64> = x_test.select(Axis(1), &keep);

    let scaler = StandardScaler::fit(x_train.view())?;
    let x_train = scaler.transform(x_train.view())?;
    let x_test = scaler.transform(x_test.view())?;
    let y_train = train.target_vector();

    let mut results = Vec::with_capacity(3);
    for kind in ModelKind::all() {
        let start = Instant::now();
        let mut model = kind.build(config)?;
        model.fit(x_train.view(), y_train.view())?;

        let train_pred = model.predict(x_train.view())?.to_vec();
        let test_pred = model.predict(x_test.view())?.to_vec();

        let predictions: Vec<Prediction> = (0..test.len())
            .map(|i| Prediction {
                player: test.players[i].clone(),
                transfer_year: test.years[i],
                actual: test.targets[i],
                predicted: test_pred[i],
            })
            .collect();

        let result = ModelResult {
            kind,
            train: RegressionMetrics::compute(&train.targets, &train_pred),
            test: RegressionMetrics::compute(&test.targets, &test_pred),
            residuals: ResidualSummary::from_predictions(&predictions),
            weights: ranked_weights(model.as_ref(), &feature_names),
            predictions,
        };

        log::info!(
            "{} (train R² {:.4}, {:.2?})",
            format_result(kind.name(), result.test.r2),
            result.train.r2,
            start.elapsed()
        );
        results.push(result);
    }

    Ok(Comparison {
        feature_names,
        n_train: train.len(),
        n_test: test.len(),
        results,
    })
}

fn ranked_weights(model: &dyn Regressor, names: &[String]) -> Vec<FeatureWeight> {
    let Some(weights) = model.feature_weights() else {
        return Vec::new();
    };
    let mut ranked: Vec<FeatureWeight> = names
        .iter()
        .zip(weights.iter())
        .map(|(name, &weight)| FeatureWeight {
            name: name.clone(),
            weight,
        })
        .collect();
    ranked.sort_by(|a, b| b.weight.abs().total_cmp(&a.weight.abs()));
    ranked
}
