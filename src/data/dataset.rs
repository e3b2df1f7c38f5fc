//! The merged transfer dataset
//!
//! One row per matched transfer: transfer details, the mover's season before
//! and after the move (prefixed `before_` / `after_`), presence flags and the
//! after-minus-before change columns.

use crate::data::table::{format_number, format_optional, Table};
use crate::{MatchedTransfer, Result, SeasonSnapshot, TransferError, TARGET_COLUMN};
use std::collections::BTreeMap;
use std::path::Path;

const TRANSFER_COLUMNS: [&str; 11] = [
    "player_name",
    "age",
    "position",
    "nationality",
    "transfer_fee",
    "previous_club",
    "market_value",
    "transfer_year",
    "league",
    "season_before",
    "season_after",
];

/// Per-season columns, written once with each of the `before_` / `after_` prefixes
const SNAPSHOT_COLUMNS: [&str; 14] = [
    "squad",
    "mp",
    "starts",
    "min",
    "90s",
    "gls",
    "ast",
    "g_pk",
    "pk",
    "crdy",
    "crdr",
    "gls_per_90",
    "ast_per_90",
    "ga_per_90",
];

const FLAG_COLUMNS: [&str; 3] = ["has_before_data", "has_after_data", "has_both_data"];

const CHANGE_COLUMNS: [&str; 6] = [
    "change_gls",
    "change_ast",
    "change_mp",
    "change_gls_per_90",
    "change_ast_per_90",
    "change_ga_per_90",
];

fn headers(with_changes: bool) -> Vec<String> {
    let mut headers: Vec<String> = TRANSFER_COLUMNS.iter().map(|c| c.to_string()).collect();
    for prefix in ["before", "after"] {
        headers.extend(SNAPSHOT_COLUMNS.iter().map(|c| format!("{}_{}", prefix, c)));
    }
    headers.extend(FLAG_COLUMNS.iter().map(|c| c.to_string()));
    if with_changes {
        headers.extend(CHANGE_COLUMNS.iter().map(|c| c.to_string()));
    }
    headers
}

fn snapshot_cells(snapshot: Option<&SeasonSnapshot>) -> Vec<String> {
    let Some(s) = snapshot else {
        return vec![String::new(); SNAPSHOT_COLUMNS.len()];
    };
    vec![
        s.squad.clone().unwrap_or_default(),
        format_number(s.matches_played),
        format_number(s.starts),
        format_number(s.minutes),
        format_number(s.nineties),
        format_number(s.goals),
        format_number(s.assists),
        format_number(s.non_penalty_goals),
        format_number(s.penalties),
        format_number(s.yellow_cards),
        format_number(s.red_cards),
        format_number(s.goals_per_90),
        format_number(s.assists_per_90),
        format_number(s.ga_per_90),
    ]
}

fn flag(value: bool) -> String {
    let text = if value { "True" } else { "False" };
    text.to_string()
}

/// Matched transfers in the merged-dataset layout
///
/// `with_changes` appends the change columns; they are only filled for
/// records with both seasons present.
pub fn matched_to_table(records: &[MatchedTransfer], with_changes: bool) -> Table {
    let mut table = Table::new(headers(with_changes));

    for m in records {
        let mut row = vec![
            m.player.clone(),
            m.age.map(|a| a.to_string()).unwrap_or_default(),
            m.position.clone().unwrap_or_default(),
            m.nationality.clone().unwrap_or_default(),
            format_number(m.fee),
            m.previous_club.clone().unwrap_or_default(),
            format_optional(m.market_value),
            m.transfer_year.to_string(),
            m.league.clone(),
            m.season_before.clone(),
            m.season_after.clone(),
        ];
        row.extend(snapshot_cells(m.before.as_ref()));
        row.extend(snapshot_cells(m.after.as_ref()));
        row.push(flag(m.has_before()));
        row.push(flag(m.has_after()));
        row.push(flag(m.is_complete()));

        if with_changes {
            let changes = [
                m.change(|s| s.goals),
                m.change(|s| s.assists),
                m.change(|s| s.matches_played),
                m.change(|s| s.goals_per_90),
                m.change(|s| s.assists_per_90),
                m.change(|s| s.ga_per_90),
            ];
            row.extend(changes.into_iter().map(format_optional));
        }

        table.rows.push(row);
    }

    table
}

/// Positions in `SNAPSHOT_COLUMNS` that a prior season must fill: matches,
/// starts, minutes, goals, assists, penalties, cards and both rates
const BEFORE_REQUIRED: [usize; 10] = [1, 2, 3, 5, 6, 8, 9, 10, 11, 13];

/// The following season only has to carry the target rate
const AFTER_REQUIRED: [usize; 1] = [13];

/// Column positions of one prefixed season block
struct SnapshotColumns {
    cols: Vec<Option<usize>>,
    required: &'static [usize],
}

impl SnapshotColumns {
    fn resolve(table: &Table, prefix: &str, required: &'static [usize]) -> Self {
        let cols = SNAPSHOT_COLUMNS
            .iter()
            .map(|c| table.column_ignore_case(&format!("{}_{}", prefix, c)))
            .collect();
        SnapshotColumns { cols, required }
    }

    /// `None` when any required cell is empty; other gaps read as zero
    fn read(&self, table: &Table, row: usize) -> Option<SeasonSnapshot> {
        if self
            .required
            .iter()
            .any(|&i| table.number(row, self.cols[i]).is_none())
        {
            return None;
        }
        let ga_per_90 = table.number(row, self.cols[13])?;
        let num = |i: usize| table.number(row, self.cols[i]).unwrap_or(0.0);
        Some(SeasonSnapshot {
            squad: table.cell(row, self.cols[0]).map(str::to_string),
            matches_played: num(1),
            starts: num(2),
            minutes: num(3),
            nineties: num(4),
            goals: num(5),
            assists: num(6),
            non_penalty_goals: num(7),
            penalties: num(8),
            yellow_cards: num(9),
            red_cards: num(10),
            goals_per_90: num(11),
            assists_per_90: num(12),
            ga_per_90,
        })
    }
}

/// Parse matched transfers; rows without a player, fee or year are skipped
pub fn matched_from_table(table: &Table, source: &str) -> Result<Vec<MatchedTransfer>> {
    let require = |name: &str| {
        table
            .column_ignore_case(name)
            .ok_or_else(|| TransferError::MissingColumn {
                column: name.to_string(),
                source_name: source.to_string(),
            })
    };
    let player_col = require("player_name")?;
    let fee_col = require("transfer_fee")?;
    let year_col = require("transfer_year")?;
    let c = |name: &str| table.column_ignore_case(name);
    let text = |row: usize, name: &str| table.cell(row, c(name)).map(str::to_string);

    let before = SnapshotColumns::resolve(table, "before", &BEFORE_REQUIRED);
    let after = SnapshotColumns::resolve(table, "after", &AFTER_REQUIRED);

    let mut records = Vec::with_capacity(table.len());
    for row in 0..table.len() {
        let (Some(name), Some(fee), Some(year)) = (
            table.cell(row, Some(player_col)),
            table.number(row, Some(fee_col)),
            table.number(row, Some(year_col)),
        ) else {
            log::debug!("Skipping incomplete row {} in {}", row + 1, source);
            continue;
        };

        let transfer_year = year as i32;
        let (default_before, default_after) = crate::data::matching::year_to_season(transfer_year);

        records.push(MatchedTransfer {
            player: name.to_string(),
            age: table
                .number(row, c("age"))
                .filter(|a| *a >= 0.0)
                .map(|a| a as u32),
            position: text(row, "position"),
            nationality: text(row, "nationality"),
            fee,
            previous_club: text(row, "previous_club"),
            market_value: table.number(row, c("market_value")),
            transfer_year,
            league: text(row, "league").unwrap_or_default(),
            season_before: text(row, "season_before").unwrap_or(default_before),
            season_after: text(row, "season_after").unwrap_or(default_after),
            before: before.read(table, row),
            after: after.read(table, row),
        });
    }

    Ok(records)
}

/// Headline counts for a loaded dataset
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub records: usize,
    pub dropped_missing_target: usize,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub by_league: Vec<(String, usize)>,
    pub by_year: Vec<(i32, usize)>,
}

/// Transfers with a known post-transfer target, ready for feature engineering
#[derive(Debug, Clone, Default)]
pub struct TransferDataset {
    pub records: Vec<MatchedTransfer>,
    /// Rows discarded at load time because the target was missing
    pub dropped_missing_target: usize,
}

impl TransferDataset {
    /// Keep only records whose target is present
    pub fn from_records(records: Vec<MatchedTransfer>) -> Self {
        let total = records.len();
        let records: Vec<MatchedTransfer> = records
            .into_iter()
            .filter(|r| r.target().is_some())
            .collect();
        TransferDataset {
            dropped_missing_target: total - records.len(),
            records,
        }
    }

    /// Load the merged dataset CSV
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut table = Table::read(path)?;
        table.drop_unnamed_columns();

        let source = path.display().to_string();
        if table.column_ignore_case(TARGET_COLUMN).is_none() {
            return Err(TransferError::MissingColumn {
                column: TARGET_COLUMN.to_string(),
                source_name: source,
            });
        }

        let dataset = Self::from_records(matched_from_table(&table, &source)?);
        if dataset.dropped_missing_target > 0 {
            log::warn!(
                "Dropped {} rows with no {}",
                dataset.dropped_missing_target,
                TARGET_COLUMN
            );
        }
        log::info!("Loaded {} transfers from {}", dataset.len(), source);

        Ok(dataset)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        matched_to_table(&self.records, true).write(path)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn summary(&self) -> DatasetSummary {
        let mut by_league: BTreeMap<String, usize> = BTreeMap::new();
        let mut by_year: BTreeMap<i32, usize> = BTreeMap::new();
        for r in &self.records {
            *by_league.entry(r.league.clone()).or_insert(0) += 1;
            *by_year.entry(r.transfer_year).or_insert(0) += 1;
        }

        DatasetSummary {
            records: self.records.len(),
            dropped_missing_target: self.dropped_missing_target,
            first_year: by_year.keys().next().copied(),
            last_year: by_year.keys().next_back().copied(),
            by_league: by_league.into_iter().collect(),
            by_year: by_year.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(goals: f64, assists: f64, nineties: f64) -> SeasonSnapshot {
        SeasonSnapshot {
            squad: Some("Club".to_string()),
            matches_played: 30.0,
            starts: 25.0,
            minutes: nineties * 90.0,
            nineties,
            goals,
            assists,
            non_penalty_goals: goals,
            penalties: 0.0,
            yellow_cards: 3.0,
            red_cards: 0.0,
            goals_per_90: goals / nineties,
            assists_per_90: assists / nineties,
            ga_per_90: (goals + assists) / nineties,
        }
    }

    fn matched(player: &str, year: i32, after: Option<SeasonSnapshot>) -> MatchedTransfer {
        MatchedTransfer {
            player: player.to_string(),
            age: Some(24),
            position: Some("Left Winger".to_string()),
            nationality: Some("France".to_string()),
            fee: 42_500_000.0,
            previous_club: Some("Old Club".to_string()),
            market_value: None,
            transfer_year: year,
            league: "Ligue-1".to_string(),
            season_before: format!("{}-{}", year - 1, year),
            season_after: format!("{}-{}", year, year + 1),
            before: Some(snapshot(8.0, 4.0, 20.0)),
            after,
        }
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("complete.csv");
        let dataset = TransferDataset::from_records(vec![
            matched("A", 2019, Some(snapshot(5.0, 5.0, 25.0))),
            matched("B", 2023, Some(snapshot(10.0, 0.0, 20.0))),
        ]);
        dataset.save(&path).unwrap();

        let loaded = TransferDataset::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.records[0], dataset.records[0]);
        assert!((loaded.records[1].target().unwrap() - 0.5).abs() < 1e-12);

        let table = Table::read(&path).unwrap();
        assert_eq!(table.cell(0, table.column("has_both_data")), Some("True"));
        assert_eq!(table.cell(0, table.column("change_gls")), Some("-3"));
    }

    #[test]
    fn test_missing_target_rows_are_dropped() {
        let dataset = TransferDataset::from_records(vec![
            matched("A", 2019, Some(snapshot(5.0, 5.0, 25.0))),
            matched("B", 2020, None),
        ]);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.dropped_missing_target, 1);
    }

    #[test]
    fn test_load_requires_target_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "player_name,transfer_fee,transfer_year\nA,1000,2020\n").unwrap();
        let err = TransferDataset::load(&path).unwrap_err();
        assert!(matches!(err, TransferError::MissingColumn { .. }));
    }

    #[test]
    fn test_load_tolerates_upper_case_target_and_index_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upper.csv");
        std::fs::write(
            &path,
            "Unnamed: 0,player_name,transfer_fee,transfer_year,league,before_ga_per_90,after_GA_per_90\n\
             0,A,1e7,2021,Serie-A,0.4,0.55\n\
             1,B,2e7,2022,Serie-A,0.3,\n",
        )
        .unwrap();

        let dataset = TransferDataset::load(&path).unwrap();
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.dropped_missing_target, 1);
        assert_eq!(dataset.records[0].target(), Some(0.55));
        assert_eq!(dataset.records[0].season_before, "2020-2021");
    }

    #[test]
    fn test_partial_prior_season_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.csv");
        let dataset = TransferDataset::from_records(vec![
            matched("A", 2021, Some(snapshot(5.0, 5.0, 25.0))),
            matched("B", 2021, Some(snapshot(2.0, 1.0, 10.0))),
        ]);
        dataset.save(&path).unwrap();

        let mut table = Table::read(&path).unwrap();
        for name in ["before_mp", "before_min", "before_gls"] {
            let col = table.column(name).unwrap();
            table.rows[1][col] = String::new();
        }
        table.write(&path).unwrap();

        let loaded = TransferDataset::load(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.records[0].before.is_some());
        assert!(loaded.records[1].before.is_none());
        // the following season and its target are unaffected
        assert!(loaded.records[1].target().is_some());
    }

    #[test]
    fn test_summary() {
        let dataset = TransferDataset::from_records(vec![
            matched("A", 2019, Some(snapshot(5.0, 5.0, 25.0))),
            matched("B", 2023, Some(snapshot(10.0, 0.0, 20.0))),
            matched("C", 2023, Some(snapshot(1.0, 0.0, 10.0))),
        ]);
        let summary = dataset.summary();
        assert_eq!(summary.records, 3);
        assert_eq!(summary.first_year, Some(2019));
        assert_eq!(summary.last_year, Some(2023));
        assert_eq!(summary.by_league, vec![("Ligue-1".to_string(), 3)]);
        assert_eq!(summary.by_year, vec![(2019, 1), (2023, 2)]);
    }
}
