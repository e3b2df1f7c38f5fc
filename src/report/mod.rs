//! Presenting bake-off results
//!
//! Terminal tables and bar charts for interactive use, plus JSON and CSV
//! files for anything downstream.

pub mod export;
pub mod summary;

pub use export::{write_metrics_csv, write_results, RunReport};
pub use summary::{format_r2, format_report};
