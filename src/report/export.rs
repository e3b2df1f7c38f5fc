//! Report files: JSON summary, metrics CSV and per-model predictions

use crate::data::table::{format_number, Table};
use crate::training::{Comparison, ModelResult};
use crate::{Result, SplitStrategy};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const REPORT_FILE: &str = "report.json";
pub const METRICS_FILE: &str = "model_metrics.csv";

const METRIC_COLUMNS: [&str; 8] = [
    "model",
    "train_r2",
    "test_r2",
    "train_mae",
    "test_mae",
    "train_rmse",
    "test_rmse",
    "overfit_gap",
];

/// Everything written to `report.json`
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub generated_at: DateTime<Utc>,
    pub dataset: &'a str,
    pub split: SplitStrategy,
    pub split_description: &'a str,
    pub best_model: Option<&'a str>,
    pub comparison: &'a Comparison,
}

impl<'a> RunReport<'a> {
    pub fn new(
        dataset: &'a str,
        split: SplitStrategy,
        split_description: &'a str,
        comparison: &'a Comparison,
    ) -> Self {
        RunReport {
            generated_at: Utc::now(),
            dataset,
            split,
            split_description,
            best_model: comparison.best().map(|r| r.kind.name()),
            comparison,
        }
    }
}

/// Empty string for an undefined metric
fn metric(value: f64) -> String {
    if value.is_finite() {
        format_number(value)
    } else {
        String::new()
    }
}

/// One row per model with train and test metrics
pub fn metrics_table(comparison: &Comparison) -> Table {
    let mut table = Table::new(METRIC_COLUMNS.iter().map(|c| c.to_string()).collect());
    for r in &comparison.results {
        table.rows.push(vec![
            r.kind.name().to_string(),
            metric(r.train.r2),
            metric(r.test.r2),
            metric(r.train.mae),
            metric(r.test.mae),
            metric(r.train.rmse),
            metric(r.test.rmse),
            metric(r.overfit_gap()),
        ]);
    }
    table
}

/// Held-out predictions of one model
pub fn predictions_table(result: &ModelResult) -> Table {
    let mut table = Table::new(
        ["player", "year", "actual", "predicted", "residual"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
    );
    for p in &result.predictions {
        table.rows.push(vec![
            p.player.clone(),
            p.transfer_year.to_string(),
            format_number(p.actual),
            format_number(p.predicted),
            format_number(p.residual()),
        ]);
    }
    table
}

pub fn predictions_file(result: &ModelResult) -> String {
    format!("{}_pred_vs_actual.csv", result.kind.slug())
}

/// Metrics as CSV to any writer (used for `--format csv` on stdout)
pub fn write_metrics_csv<W: Write>(comparison: &Comparison, out: W) -> Result<()> {
    let table = metrics_table(comparison);
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&table.headers)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the report, the metrics CSV and one predictions CSV per model into
/// `dir`, returning the paths written
pub fn write_results<P: AsRef<Path>>(dir: P, report: &RunReport) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let path = dir.join(REPORT_FILE);
    std::fs::write(&path, serde_json::to_string_pretty(report)?)?;
    written.push(path);

    let path = dir.join(METRICS_FILE);
    metrics_table(report.comparison).write(&path)?;
    written.push(path);

    for result in &report.comparison.results {
        let path = dir.join(predictions_file(result));
        predictions_table(result).write(&path)?;
        written.push(path);
    }

    log::info!("Wrote {} result files to {}", written.len(), dir.display());
    Ok(written)
}
