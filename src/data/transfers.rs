//! Transfermarkt export ingestion
//!
//! Combines the per-league, per-season transfer exports into one table and
//! narrows it to permanent moves of attacking players above a fee floor.

use crate::data::table::{parse_number, Table};
use crate::{FilterConfig, League, Result, TransferError, TransferRecord};
use regex::{Regex, RegexBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const COL_PLAYER: &str = "Player";
pub const COL_AGE: &str = "Age";
pub const COL_POSITION: &str = "Position";
pub const COL_NATIONALITY: &str = "Nationality";
pub const COL_PREVIOUS_CLUB: &str = "Previous_Club";
pub const COL_MARKET_VALUE: &str = "Market_Value";
pub const COL_FEE: &str = "Transfer_Fee";
pub const COL_LEAGUE: &str = "league";
pub const COL_SOURCE_FILE: &str = "source_file";

/// List the CSV files in a directory, sorted by name
pub fn csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// First four-digit run in a file name, e.g. `Bundesliga_2023.csv` -> 2023
pub fn transfer_year_from_filename(filename: &str) -> Option<i32> {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    let re = YEAR.get_or_init(|| Regex::new(r"(\d{4})").expect("static regex"));
    re.captures(filename)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// League label for an export file, `Unknown` when the name matches none
pub fn league_from_filename(filename: &str) -> String {
    League::from_filename(filename)
        .map(|l| l.display_name().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Load and stack every transfer export in `dir`
///
/// Files that fail to parse are skipped with a warning; an error is only
/// returned when nothing could be loaded.
pub fn combine_transfer_files(dir: &Path) -> Result<Table> {
    let files = csv_files(dir)?;
    log::info!("Found {} transfer files in {}", files.len(), dir.display());

    let mut combined = Table::default();
    let mut loaded = 0;

    for path in files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        match Table::read(&path) {
            Ok(mut table) => {
                table.drop_empty_columns();
                table.set_constant(COL_SOURCE_FILE, &filename);
                table.set_constant(COL_LEAGUE, &league_from_filename(&filename));
                log::info!("  Loaded {}: {} transfers", filename, table.len());
                combined.append(table);
                loaded += 1;
            }
            Err(e) => {
                log::warn!("  Failed to load {}: {}", filename, e);
            }
        }
    }

    if loaded == 0 {
        return Err(TransferError::EmptyData(format!(
            "no transfer files could be loaded from {}",
            dir.display()
        )));
    }

    combined.drop_empty_columns();
    Ok(combined)
}

/// Convert a combined transfer table into typed records
pub fn records_from_table(table: &Table, source: &str) -> Result<Vec<TransferRecord>> {
    let player = table.require(COL_PLAYER, source)?;
    let age = table.column(COL_AGE);
    let position = table.column(COL_POSITION);
    let nationality = table.column(COL_NATIONALITY);
    let previous_club = table.column(COL_PREVIOUS_CLUB);
    let market_value = table.column(COL_MARKET_VALUE);
    let fee = table.column(COL_FEE);
    let league = table.column(COL_LEAGUE);
    let source_file = table.column(COL_SOURCE_FILE);
    let year = table.column("transfer_year");

    let text = |row: usize, col: Option<usize>| table.cell(row, col).map(str::to_string);

    let records = (0..table.len())
        .filter_map(|row| {
            let name = table.cell(row, Some(player))?.to_string();
            let source_file = text(row, source_file).unwrap_or_default();
            let transfer_year = table
                .number(row, year)
                .map(|y| y as i32)
                .or_else(|| transfer_year_from_filename(&source_file));

            Some(TransferRecord {
                player: name,
                age: table.number(row, age).map(|a| a as u32),
                position: text(row, position),
                nationality: text(row, nationality),
                previous_club: text(row, previous_club),
                market_value: table.number(row, market_value),
                fee: table.cell(row, fee).and_then(parse_fee),
                league: text(row, league).unwrap_or_else(|| "Unknown".to_string()),
                source_file,
                transfer_year,
            })
        })
        .collect();

    Ok(records)
}

/// Fee floor and position pattern applied to the combined exports
#[derive(Debug, Clone)]
pub struct TransferFilter {
    pub min_fee: f64,
    position: Regex,
}

impl TransferFilter {
    pub fn new(min_fee: f64, position_pattern: &str) -> Result<Self> {
        let position = RegexBuilder::new(position_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                TransferError::Config(format!(
                    "Invalid position pattern '{}': {}",
                    position_pattern, e
                ))
            })?;
        Ok(TransferFilter { min_fee, position })
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        Self::new(config.min_fee, &config.position_pattern)
    }

    /// Fee at or above the floor and a matching, known position
    pub fn accepts(&self, fee: Option<f64>, position: Option<&str>) -> bool {
        let fee_ok = fee.is_some_and(|f| f >= self.min_fee);
        let position_ok = position.is_some_and(|p| self.position.is_match(p));
        fee_ok && position_ok
    }

    pub fn accepts_record(&self, record: &TransferRecord) -> bool {
        self.accepts(record.fee, record.position.as_deref())
    }

    /// Rows of `table` passing the filter, all columns preserved
    pub fn apply(&self, table: &Table) -> Table {
        let fee = table.column(COL_FEE);
        let position = table.column(COL_POSITION);
        let mut filtered = table.clone();
        filtered.rows = (0..table.len())
            .filter(|&row| {
                self.accepts(table.cell(row, fee).and_then(parse_fee), table.cell(row, position))
            })
            .map(|row| table.rows[row].clone())
            .collect();
        filtered.drop_empty_columns();
        filtered
    }
}

/// Records passing `filter`, in input order
pub fn filter_transfers(records: &[TransferRecord], filter: &TransferFilter) -> Vec<TransferRecord> {
    records
        .iter()
        .filter(|r| filter.accepts_record(r))
        .cloned()
        .collect()
}

/// Headline numbers for a filtered transfer set
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSummary {
    pub total: usize,
    pub filtered: usize,
    pub by_league: Vec<(String, usize)>,
    pub by_position: Vec<(String, usize)>,
    pub mean_fee: f64,
    pub median_fee: f64,
    pub max_fee: f64,
}

impl TransferSummary {
    pub fn new(total: usize, filtered: &[TransferRecord]) -> Self {
        let mut fees: Vec<f64> = filtered.iter().filter_map(|r| r.fee).collect();
        fees.sort_by(f64::total_cmp);

        let mean_fee = if fees.is_empty() {
            0.0
        } else {
            fees.iter().sum::<f64>() / fees.len() as f64
        };

        let median_fee = match fees.len() {
            0 => 0.0,
            n if n % 2 == 1 => fees[n / 2],
            n => (fees[n / 2 - 1] + fees[n / 2]) / 2.0,
        };

        let mut by_position = count_by(filtered, |r| r.position.clone());
        by_position.truncate(10);

        TransferSummary {
            total,
            filtered: filtered.len(),
            by_league: count_by(filtered, |r| Some(r.league.clone())),
            by_position,
            mean_fee,
            median_fee,
            max_fee: fees.last().copied().unwrap_or(0.0),
        }
    }
}

fn count_by<F>(records: &[TransferRecord], key: F) -> Vec<(String, usize)>
where
    F: Fn(&TransferRecord) -> Option<String>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        if let Some(k) = key(record) {
            *counts.entry(k).or_insert(0) += 1;
        }
    }
    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
}

/// The `n` most expensive transfers, highest fee first
pub fn top_by_fee(records: &[TransferRecord], n: usize) -> Vec<&TransferRecord> {
    let mut sorted: Vec<&TransferRecord> = records.iter().filter(|r| r.fee.is_some()).collect();
    sorted.sort_by(|a, b| {
        b.fee
            .unwrap_or(0.0)
            .total_cmp(&a.fee.unwrap_or(0.0))
    });
    sorted.truncate(n);
    sorted
}

/// Parse a fee cell from a raw export
pub fn parse_fee(value: &str) -> Option<f64> {
    parse_number(value.trim_start_matches('€'))
}
