//! Terminal rendering of a comparison

use crate::training::{Comparison, FeatureWeight, ModelResult};
use std::fmt::Write;

const BAR_WIDTH: usize = 30;

/// R² to four places, `n/a` when undefined
pub fn format_r2(r2: f64) -> String {
    if r2.is_finite() {
        format!("{:.4}", r2)
    } else {
        "n/a".to_string()
    }
}

/// Box-drawn metrics table, one row per model
pub fn format_comparison(comparison: &Comparison) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "┌───────────────────┬──────────┬──────────┬──────────┬──────────┬──────────┐"
    );
    let _ = writeln!(
        out,
        "│ {:<17} │ {:>8} │ {:>8} │ {:>8} │ {:>8} │ {:>8} │",
        "Model", "Train R²", "Test R²", "Test MAE", "Test RMSE", "Gap"
    );
    let _ = writeln!(
        out,
        "├───────────────────┼──────────┼──────────┼──────────┼──────────┼──────────┤"
    );
    for r in &comparison.results {
        let _ = writeln!(
            out,
            "│ {:<17} │ {:>8} │ {:>8} │ {:>8.4} │ {:>8.4} │ {:>8} │",
            r.kind.name(),
            format_r2(r.train.r2),
            format_r2(r.test.r2),
            r.test.mae,
            r.test.rmse,
            format_r2(r.overfit_gap()),
        );
    }
    let _ = writeln!(
        out,
        "└───────────────────┴──────────┴──────────┴──────────┴──────────┴──────────┘"
    );
    let _ = write!(
        out,
        "  {} training rows, {} test rows, {} features",
        comparison.n_train,
        comparison.n_test,
        comparison.feature_names.len()
    );
    out
}

/// Horizontal bars scaled to the largest absolute weight
pub fn format_bars(weights: &[FeatureWeight]) -> String {
    let max = weights
        .iter()
        .fold(0.0_f64, |m, w| m.max(w.weight.abs()));
    let name_width = weights.iter().map(|w| w.name.len()).max().unwrap_or(0);

    let mut out = String::new();
    for w in weights {
        let len = if max > 0.0 {
            ((w.weight.abs() / max) * BAR_WIDTH as f64).round() as usize
        } else {
            0
        };
        let _ = writeln!(
            out,
            "  {:<width$}  {:<bar$} {:+.4}",
            w.name,
            "█".repeat(len),
            w.weight,
            width = name_width,
            bar = BAR_WIDTH
        );
    }
    out
}

/// Importance or coefficient ranking for one model
pub fn format_weights(result: &ModelResult, top_n: usize) -> String {
    let top = result.top_weights(top_n);
    let mut out = format!(
        "{} - top {} features by {}\n",
        result.kind.name(),
        top.len(),
        result.kind.weight_label()
    );
    out.push_str(&format_bars(top));
    out
}

pub fn format_residuals(comparison: &Comparison) -> String {
    let mut out = String::from("Test residuals (actual - predicted)\n");
    for r in &comparison.results {
        let _ = writeln!(out, "  {:<17}  {}", r.kind.name(), r.residuals);
    }
    out
}

/// Best model and any overfitting warnings
pub fn format_verdict(comparison: &Comparison, gap_threshold: f64) -> String {
    let mut out = String::new();
    match comparison.best() {
        Some(best) => {
            let _ = writeln!(
                out,
                "Best model: {} (test R² {})",
                best.kind.name(),
                format_r2(best.test.r2)
            );
        }
        None => {
            let _ = writeln!(out, "Best model: none (test R² undefined)");
        }
    }
    for r in comparison.overfitting(gap_threshold) {
        let _ = writeln!(
            out,
            "Warning: {} may be overfitting (train R² {} vs test R² {}, gap {:.4} > {:.2})",
            r.kind.name(),
            format_r2(r.train.r2),
            format_r2(r.test.r2),
            r.overfit_gap(),
            gap_threshold
        );
    }
    out
}

/// Everything printed after `train` in table format
pub fn format_report(comparison: &Comparison, top_n: usize, gap_threshold: f64) -> String {
    let mut out = String::new();
    out.push_str(&format_comparison(comparison));
    out.push_str("\n\n");
    for result in &comparison.results {
        out.push_str(&format_weights(result, top_n));
        out.push('\n');
    }
    out.push_str(&format_residuals(comparison));
    out.push('\n');
    out.push_str(&format_verdict(comparison, gap_threshold));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ModelKind, RegressionMetrics, ResidualSummary};

    fn result(kind: ModelKind, train_r2: f64, test_r2: f64) -> ModelResult {
        ModelResult {
            kind,
            train: RegressionMetrics {
                n: 100,
                r2: train_r2,
                mae: 0.1,
                rmse: 0.12,
            },
            test: RegressionMetrics {
                n: 20,
                r2: test_r2,
                mae: 0.15,
                rmse: 0.2,
            },
            residuals: ResidualSummary::from_residuals(&[0.1, -0.1]),
            predictions: Vec::new(),
            weights: vec![
                FeatureWeight {
                    name: "before_ga_per_90".to_string(),
                    weight: 0.5,
                },
                FeatureWeight {
                    name: "age".to_string(),
                    weight: -0.25,
                },
            ],
        }
    }

    fn comparison() -> Comparison {
        Comparison {
            feature_names: vec!["before_ga_per_90".to_string(), "age".to_string()],
            n_train: 100,
            n_test: 20,
            results: vec![
                result(ModelKind::LinearRegression, 0.2, 0.15),
                result(ModelKind::RandomForest, 0.85, 0.1),
                result(ModelKind::GradientBoosting, 0.4, f64::NAN),
            ],
        }
    }

    #[test]
    fn test_format_r2() {
        assert_eq!(format_r2(0.12345), "0.1235");
        assert_eq!(format_r2(f64::NAN), "n/a");
    }

    #[test]
    fn test_comparison_table() {
        let table = format_comparison(&comparison());
        assert!(table.contains("│ Random Forest     │   0.8500 │   0.1000 │"));
        assert!(table.contains("n/a"));
        assert!(table.ends_with("100 training rows, 20 test rows, 2 features"));
    }

    #[test]
    fn test_bars_scale_to_largest() {
        let c = comparison();
        let bars = format_bars(&c.results[0].weights);
        let lines: Vec<&str> = bars.lines().collect();
        assert_eq!(lines[0].matches('█').count(), BAR_WIDTH);
        assert_eq!(lines[1].matches('█').count(), BAR_WIDTH / 2);
        assert!(lines[1].ends_with("-0.2500"));
    }

    #[test]
    fn test_weights_heading() {
        let c = comparison();
        let text = format_weights(&c.results[1], 1);
        assert!(text.starts_with("Random Forest - top 1 features by importance"));
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_verdict() {
        let verdict = format_verdict(&comparison(), 0.15);
        assert!(verdict.starts_with("Best model: Linear Regression (test R² 0.1500)"));
        assert!(verdict.contains("Warning: Random Forest may be overfitting"));
        assert!(!verdict.contains("Warning: Linear Regression"));
    }

    #[test]
    fn test_full_report() {
        let report = format_report(&comparison(), 15, 0.15);
        assert!(report.contains("Test residuals"));
        assert!(report.contains("Gradient Boosting - top 2 features by importance"));
    }
}
