//! Regression metrics and evaluation

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coefficient of determination
///
/// A constant target gives 1.0 for an exact fit and 0.0 otherwise; fewer than
/// two samples give NaN.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n < 2 {
        return f64::NAN;
    }
    let actual = &actual[..n];
    let mean = actual.iter().sum::<f64>() / n as f64;
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();
    let ss_res: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();

    if ss_tot == 0.0 {
        if ss_res == 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        1.0 - ss_res / ss_tot
    }
}

pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / n as f64
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    let n = actual.len().min(predicted.len());
    if n == 0 {
        return 0.0;
    }
    let mse = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / n as f64;
    mse.sqrt()
}

/// Fit quality on one partition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub n: usize,
    pub r2: f64,
    pub mae: f64,
    pub rmse: f64,
}

impl RegressionMetrics {
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Self {
        RegressionMetrics {
            n: actual.len().min(predicted.len()),
            r2: r2_score(actual, predicted),
            mae: mean_absolute_error(actual, predicted),
            rmse: root_mean_squared_error(actual, predicted),
        }
    }
}

impl fmt::Display for RegressionMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "R²: {:.4} | MAE: {:.4} | RMSE: {:.4} (n={})",
            self.r2, self.mae, self.rmse, self.n
        )
    }
}

/// Distribution of test residuals (actual - predicted)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResidualSummary {
    pub mean: f64,
    pub std: f64,
    pub max_abs: f64,
}

impl ResidualSummary {
    pub fn from_residuals(residuals: &[f64]) -> Self {
        if residuals.is_empty() {
            return ResidualSummary {
                mean: 0.0,
                std: 0.0,
                max_abs: 0.0,
            };
        }
        let n = residuals.len() as f64;
        let mean = residuals.iter().sum::<f64>() / n;
        let variance = residuals.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
        let max_abs = residuals.iter().fold(0.0_f64, |m, r| m.max(r.abs()));

        ResidualSummary {
            mean,
            std: variance.sqrt(),
            max_abs,
        }
    }

    pub fn from_predictions(predictions: &[super::Prediction]) -> Self {
        let residuals: Vec<f64> = predictions.iter().map(|p| p.residual()).collect();
        Self::from_residuals(&residuals)
    }
}

impl fmt::Display for ResidualSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "mean {:+.4}, std {:.4}, max |r| {:.4}",
            self.mean, self.std, self.max_abs
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r2_perfect_and_mean() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(r2_score(&actual, &actual), 1.0);
        assert_eq!(r2_score(&actual, &[2.5; 4]), 0.0);
    }

    #[test]
    fn test_r2_can_be_negative() {
        let actual = [1.0, 2.0, 3.0];
        assert!(r2_score(&actual, &[3.0, 2.0, 1.0]) < 0.0);
    }

    #[test]
    fn test_r2_known_value() {
        // ss_tot = 2, ss_res = 0.25 + 0 + 0.25
        let r2 = r2_score(&[1.0, 2.0, 3.0], &[1.5, 2.0, 2.5]);
        assert!((r2 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_r2_degenerate_inputs() {
        assert!(r2_score(&[1.0], &[1.0]).is_nan());
        assert!(r2_score(&[], &[]).is_nan());
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 2.0]), 1.0);
        assert_eq!(r2_score(&[2.0, 2.0], &[2.0, 3.0]), 0.0);
    }

    #[test]
    fn test_mae_rmse() {
        let actual = [0.0, 0.0, 0.0, 0.0];
        let predicted = [1.0, -1.0, 3.0, -3.0];
        assert_eq!(mean_absolute_error(&actual, &predicted), 2.0);
        assert_eq!(root_mean_squared_error(&actual, &predicted), 5.0_f64.sqrt());
    }

    #[test]
    fn test_metrics_display() {
        let m = RegressionMetrics::compute(&[1.0, 2.0, 3.0], &[1.5, 2.0, 2.5]);
        assert_eq!(m.n, 3);
        assert_eq!(m.to_string(), "R²: 0.7500 | MAE: 0.3333 | RMSE: 0.4082 (n=3)");
    }

    #[test]
    fn test_residual_summary() {
        let summary = ResidualSummary::from_residuals(&[1.0, -1.0, 3.0, -3.0]);
        assert_eq!(summary.mean, 0.0);
        assert_eq!(summary.std, 5.0_f64.sqrt());
        assert_eq!(summary.max_abs, 3.0);
    }
}
