//! FBref standard-stats ingestion and cleaning

use crate::data::table::{format_number, format_optional, Table};
use crate::data::transfers::csv_files;
use crate::{Result, SeasonStats, TransferError};
use std::collections::HashSet;
use std::path::Path;

/// Columns kept from the raw FBref standard-stats table
pub const ESSENTIAL_COLUMNS: [&str; 27] = [
    "Player", "Nation", "Pos", "Squad", "Age", "Born", "MP", "Starts", "Min", "90s", "Gls", "Ast",
    "G+A", "G-PK", "PK", "PKatt", "CrdY", "CrdR", "xG", "npxG", "xAG", "npxG+xAG", "PrgC", "PrgP",
    "PrgR", "season", "league",
];

/// Map the league part of an export name (`premier_league_2019-2020.csv`)
/// to the hyphenated FBref form
pub fn fbref_league_name(raw: &str) -> String {
    match raw.to_lowercase().as_str() {
        "bundesliga" => "Bundesliga".to_string(),
        "laliga" => "La-Liga".to_string(),
        "ligue1" => "Ligue-1".to_string(),
        "premier_league" => "Premier-League".to_string(),
        "seriea" => "Serie-A".to_string(),
        _ => raw.to_string(),
    }
}

/// Split `<league>_<season>.csv` into its parts
pub fn parse_export_name(filename: &str) -> Option<(String, String)> {
    let stem = filename.strip_suffix(".csv").unwrap_or(filename);
    let (league, season) = stem.rsplit_once('_')?;
    if league.is_empty() || season.is_empty() {
        return None;
    }
    Some((fbref_league_name(league), season.to_string()))
}

/// Load and stack every `<league>_<season>.csv` export in `dir`
pub fn combine_fbref_files(dir: &Path) -> Result<Table> {
    let files = csv_files(dir)?;
    log::info!("Found {} FBref files in {}", files.len(), dir.display());

    let mut combined = Table::default();

    for path in files {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let Some((league, season)) = parse_export_name(&filename) else {
            log::warn!("  Skipping {}: expected <league>_<season>.csv", filename);
            continue;
        };

        let mut table = match Table::read(&path) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("  Failed to load {}: {}", filename, e);
                continue;
            }
        };

        if table.is_empty() {
            log::warn!("  Skipping {}: no rows", filename);
            continue;
        }

        // FBref repeats the header row every few lines of the table
        if let Some(player) = table.column("Player") {
            table.retain_rows(|row| row[player].trim() != "Player");
        }

        table.set_constant("season", &season);
        table.set_constant("league", &league);
        log::info!("  Loaded {} ({} {}): {} rows", filename, league, season, table.len());
        combined.append(table);
    }

    if combined.is_empty() {
        return Err(TransferError::EmptyData(format!(
            "no FBref rows could be loaded from {}",
            dir.display()
        )));
    }

    Ok(combined)
}

/// Row counts removed at each cleaning step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    pub input_rows: usize,
    pub missing_player: usize,
    pub missing_age: usize,
    pub duplicates: usize,
    pub output_rows: usize,
}

/// First column equal to `name` or carrying a `.N` duplicate suffix of it
fn essential_column(table: &Table, name: &str) -> Option<usize> {
    let suffixed = format!("{}.", name);
    table
        .headers
        .iter()
        .position(|h| h == name || h.starts_with(&suffixed))
}

/// Leading integer of an FBref age cell (`25-123` -> 25)
pub fn parse_age(value: &str) -> Option<u32> {
    let digits: String = value
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Collapse runs of whitespace and trim
pub fn normalize_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean a combined raw FBref table into typed player-season rows
///
/// Count columns that are missing or unparseable become zero; rows without a
/// player name or an age are dropped; duplicates on
/// (player, squad, season, league) keep the first occurrence.
pub fn clean_fbref(raw: &Table) -> Result<(Vec<SeasonStats>, CleanReport)> {
    let mut table = raw.clone();
    table.drop_unnamed_columns();
    let keep: HashSet<usize> = ESSENTIAL_COLUMNS
        .iter()
        .filter_map(|name| essential_column(&table, name))
        .collect();
    table.retain_columns(|idx, _| keep.contains(&idx));

    let col = |name: &str| essential_column(&table, name);
    let player = col("Player").ok_or_else(|| TransferError::MissingColumn {
        column: "Player".to_string(),
        source_name: "FBref stats".to_string(),
    })?;
    let age_col = col("Age").ok_or_else(|| TransferError::MissingColumn {
        column: "Age".to_string(),
        source_name: "FBref stats".to_string(),
    })?;

    let nation = col("Nation");
    let pos = col("Pos");
    let squad = col("Squad");
    let born = col("Born");
    let season = col("season");
    let league = col("league");

    let count = |row: usize, name: &str| table.number(row, col(name)).unwrap_or(0.0);
    let optional = |row: usize, name: &str| {
        col(name).map(|c| table.number(row, Some(c)).unwrap_or(0.0))
    };
    let text = |row: usize, c: Option<usize>| table.cell(row, c).map(normalize_whitespace);

    let mut report = CleanReport {
        input_rows: table.len(),
        ..Default::default()
    };
    let mut seen: HashSet<(String, Option<String>, String, String)> = HashSet::new();
    let mut stats = Vec::new();

    for row in 0..table.len() {
        let Some(name) = text(row, Some(player)) else {
            report.missing_player += 1;
            continue;
        };
        let Some(age) = table.cell(row, Some(age_col)).and_then(parse_age) else {
            report.missing_age += 1;
            continue;
        };

        let record = SeasonStats {
            player: name,
            nation: text(row, nation),
            position: text(row, pos),
            squad: text(row, squad),
            age,
            born: table.cell(row, born).and_then(parse_age),
            matches_played: count(row, "MP"),
            starts: count(row, "Starts"),
            minutes: count(row, "Min"),
            nineties: count(row, "90s"),
            goals: count(row, "Gls"),
            assists: count(row, "Ast"),
            goals_assists: count(row, "G+A"),
            non_penalty_goals: count(row, "G-PK"),
            penalties: count(row, "PK"),
            penalty_attempts: count(row, "PKatt"),
            yellow_cards: count(row, "CrdY"),
            red_cards: count(row, "CrdR"),
            xg: optional(row, "xG"),
            npxg: optional(row, "npxG"),
            xag: optional(row, "xAG"),
            npxg_xag: optional(row, "npxG+xAG"),
            progressive_carries: optional(row, "PrgC"),
            progressive_passes: optional(row, "PrgP"),
            progressive_receptions: optional(row, "PrgR"),
            season: text(row, season).unwrap_or_default(),
            league: text(row, league).unwrap_or_default(),
        };

        let key = (
            record.player.clone(),
            record.squad.clone(),
            record.season.clone(),
            record.league.clone(),
        );
        if !seen.insert(key) {
            report.duplicates += 1;
            continue;
        }

        stats.push(record);
    }

    report.output_rows = stats.len();
    log::info!(
        "Cleaned FBref stats: {} -> {} rows ({} without player, {} without age, {} duplicates)",
        report.input_rows,
        report.output_rows,
        report.missing_player,
        report.missing_age,
        report.duplicates
    );

    Ok((stats, report))
}

const CLEANED_HEADERS: [&str; 30] = [
    "Player", "Nation", "Pos", "Squad", "Age", "Born", "MP", "Starts", "Min", "90s", "Gls", "Ast",
    "G+A", "G-PK", "PK", "PKatt", "CrdY", "CrdR", "xG", "npxG", "xAG", "npxG+xAG", "PrgC", "PrgP",
    "PrgR", "season", "league", "Gls_per_90", "Ast_per_90", "GA_per_90",
];

/// Cleaned rows in the `fbref_cleaned.csv` layout
pub fn stats_to_table(stats: &[SeasonStats]) -> Table {
    let mut table = Table::new(CLEANED_HEADERS.iter().map(|h| h.to_string()).collect());
    for s in stats {
        table.rows.push(vec![
            s.player.clone(),
            s.nation.clone().unwrap_or_default(),
            s.position.clone().unwrap_or_default(),
            s.squad.clone().unwrap_or_default(),
            s.age.to_string(),
            s.born.map(|b| b.to_string()).unwrap_or_default(),
            format_number(s.matches_played),
            format_number(s.starts),
            format_number(s.minutes),
            format_number(s.nineties),
            format_number(s.goals),
            format_number(s.assists),
            format_number(s.goals_assists),
            format_number(s.non_penalty_goals),
            format_number(s.penalties),
            format_number(s.penalty_attempts),
            format_number(s.yellow_cards),
            format_number(s.red_cards),
            format_optional(s.xg),
            format_optional(s.npxg),
            format_optional(s.xag),
            format_optional(s.npxg_xag),
            format_optional(s.progressive_carries),
            format_optional(s.progressive_passes),
            format_optional(s.progressive_receptions),
            s.season.clone(),
            s.league.clone(),
            format_number(s.goals_per_90()),
            format_number(s.assists_per_90()),
            format_number(s.goals_assists_per_90()),
        ]);
    }
    table
}

/// Read a previously written `fbref_cleaned.csv`
pub fn stats_from_table(table: &Table) -> Result<Vec<SeasonStats>> {
    let player = table.require("Player", "cleaned FBref stats")?;
    let age = table.require("Age", "cleaned FBref stats")?;
    let c = |name: &str| table.column(name);
    let num = |row: usize, name: &str| table.number(row, c(name)).unwrap_or(0.0);
    let opt = |row: usize, name: &str| table.number(row, c(name));
    let text = |row: usize, name: &str| table.cell(row, c(name)).map(str::to_string);

    let stats = (0..table.len())
        .filter_map(|row| {
            Some(SeasonStats {
                player: table.cell(row, Some(player))?.to_string(),
                nation: text(row, "Nation"),
                position: text(row, "Pos"),
                squad: text(row, "Squad"),
                age: table.cell(row, Some(age)).and_then(parse_age)?,
                born: table.cell(row, c("Born")).and_then(parse_age),
                matches_played: num(row, "MP"),
                starts: num(row, "Starts"),
                minutes: num(row, "Min"),
                nineties: num(row, "90s"),
                goals: num(row, "Gls"),
                assists: num(row, "Ast"),
                goals_assists: num(row, "G+A"),
                non_penalty_goals: num(row, "G-PK"),
                penalties: num(row, "PK"),
                penalty_attempts: num(row, "PKatt"),
                yellow_cards: num(row, "CrdY"),
                red_cards: num(row, "CrdR"),
                xg: opt(row, "xG"),
                npxg: opt(row, "npxG"),
                xag: opt(row, "xAG"),
                npxg_xag: opt(row, "npxG+xAG"),
                progressive_carries: opt(row, "PrgC"),
                progressive_passes: opt(row, "PrgP"),
                progressive_receptions: opt(row, "PrgR"),
                season: text(row, "season").unwrap_or_default(),
                league: text(row, "league").unwrap_or_default(),
            })
        })
        .collect();

    Ok(stats)
}

/// Number of distinct values, used for the cleaning summary
pub fn distinct<F>(stats: &[SeasonStats], key: F) -> Vec<(String, usize)>
where
    F: Fn(&SeasonStats) -> &str,
{
    let mut counts: std::collections::BTreeMap<String, usize> = std::collections::BTreeMap::new();
    for s in stats {
        *counts.entry(key(s).to_string()).or_insert(0) += 1;
    }
    counts.into_iter().collect()
}
