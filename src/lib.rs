//! Post-transfer performance prediction
//!
//! Compares linear regression, random forest and gradient boosting on how well
//! they predict a player's goals+assists per 90 minutes in the season after a
//! transfer, from transfer fees and prior-season output.

pub mod data;
pub mod features;
pub mod model;
pub mod report;
pub mod training;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Name of the prediction target in the merged dataset
pub const TARGET_COLUMN: &str = "after_ga_per_90";

/// One of the five leagues covered by the dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum League {
    PremierLeague,
    LaLiga,
    SerieA,
    Bundesliga,
    Ligue1,
}

impl League {
    pub fn all() -> [League; 5] {
        [
            League::PremierLeague,
            League::LaLiga,
            League::SerieA,
            League::Bundesliga,
            League::Ligue1,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            League::PremierLeague => "Premier League",
            League::LaLiga => "La Liga",
            League::SerieA => "Serie A",
            League::Bundesliga => "Bundesliga",
            League::Ligue1 => "Ligue 1",
        }
    }

    /// Hyphenated form used in FBref URLs and the merged dataset
    pub fn slug(&self) -> &'static str {
        match self {
            League::PremierLeague => "Premier-League",
            League::LaLiga => "La-Liga",
            League::SerieA => "Serie-A",
            League::Bundesliga => "Bundesliga",
            League::Ligue1 => "Ligue-1",
        }
    }

    /// Resolve free text ("Premier League", "la_liga", "Serie-A", "ligue1", ...)
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase().replace(['_', '-'], " ");
        if lower.contains("premier") {
            Some(League::PremierLeague)
        } else if lower.contains("la liga") || lower.contains("laliga") {
            Some(League::LaLiga)
        } else if lower.contains("serie") {
            Some(League::SerieA)
        } else if lower.contains("bundesliga") {
            Some(League::Bundesliga)
        } else if lower.contains("ligue") {
            Some(League::Ligue1)
        } else {
            None
        }
    }

    /// Resolve the league from an export file name such as `premier_league_2023.csv`
    pub fn from_filename(filename: &str) -> Option<Self> {
        let stem = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
        Self::from_name(stem.trim_end_matches(".csv"))
    }
}

impl fmt::Display for League {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Coarse playing-position buckets derived from Transfermarkt position text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionGroup {
    Striker,
    Winger,
    AttackingMidfield,
    Midfield,
    Other,
}

impl PositionGroup {
    pub fn from_position(position: &str) -> Self {
        let lower = position.to_lowercase();
        if lower.contains("winger") {
            PositionGroup::Winger
        } else if lower.contains("attacking midfield") {
            PositionGroup::AttackingMidfield
        } else if lower.contains("forward") || lower.contains("striker") {
            PositionGroup::Striker
        } else if lower.contains("midfield") {
            PositionGroup::Midfield
        } else if lower.contains("attack") {
            PositionGroup::Striker
        } else {
            PositionGroup::Other
        }
    }
}

impl fmt::Display for PositionGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionGroup::Striker => write!(f, "Striker"),
            PositionGroup::Winger => write!(f, "Winger"),
            PositionGroup::AttackingMidfield => write!(f, "Attacking Midfield"),
            PositionGroup::Midfield => write!(f, "Midfield"),
            PositionGroup::Other => write!(f, "Other"),
        }
    }
}

/// A permanent transfer from the Transfermarkt exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub player: String,
    pub age: Option<u32>,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub previous_club: Option<String>,
    pub market_value: Option<f64>,
    pub fee: Option<f64>,
    pub league: String,
    pub source_file: String,
    pub transfer_year: Option<i32>,
}

/// One player-season row of FBref standard stats after cleaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonStats {
    pub player: String,
    pub nation: Option<String>,
    pub position: Option<String>,
    pub squad: Option<String>,
    pub age: u32,
    pub born: Option<u32>,
    pub matches_played: f64,
    pub starts: f64,
    pub minutes: f64,
    pub nineties: f64,
    pub goals: f64,
    pub assists: f64,
    pub goals_assists: f64,
    pub non_penalty_goals: f64,
    pub penalties: f64,
    pub penalty_attempts: f64,
    pub yellow_cards: f64,
    pub red_cards: f64,
    pub xg: Option<f64>,
    pub npxg: Option<f64>,
    pub xag: Option<f64>,
    pub npxg_xag: Option<f64>,
    pub progressive_carries: Option<f64>,
    pub progressive_passes: Option<f64>,
    pub progressive_receptions: Option<f64>,
    pub season: String,
    pub league: String,
}

impl SeasonStats {
    /// Rate per full match, zero when no minutes were recorded
    pub fn per_90(&self, total: f64) -> f64 {
        if self.nineties > 0.0 {
            total / self.nineties
        } else {
            0.0
        }
    }

    pub fn goals_per_90(&self) -> f64 {
        self.per_90(self.goals)
    }

    pub fn assists_per_90(&self) -> f64 {
        self.per_90(self.assists)
    }

    pub fn goals_assists_per_90(&self) -> f64 {
        self.per_90(self.goals_assists)
    }
}

/// The slice of a season kept alongside a transfer (before or after the move)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonSnapshot {
    pub squad: Option<String>,
    pub matches_played: f64,
    pub starts: f64,
    pub minutes: f64,
    pub nineties: f64,
    pub goals: f64,
    pub assists: f64,
    pub non_penalty_goals: f64,
    pub penalties: f64,
    pub yellow_cards: f64,
    pub red_cards: f64,
    pub goals_per_90: f64,
    pub assists_per_90: f64,
    pub ga_per_90: f64,
}

impl From<&SeasonStats> for SeasonSnapshot {
    fn from(stats: &SeasonStats) -> Self {
        SeasonSnapshot {
            squad: stats.squad.clone(),
            matches_played: stats.matches_played,
            starts: stats.starts,
            minutes: stats.minutes,
            nineties: stats.nineties,
            goals: stats.goals,
            assists: stats.assists,
            non_penalty_goals: stats.non_penalty_goals,
            penalties: stats.penalties,
            yellow_cards: stats.yellow_cards,
            red_cards: stats.red_cards,
            goals_per_90: stats.goals_per_90(),
            assists_per_90: stats.assists_per_90(),
            ga_per_90: stats.goals_assists_per_90(),
        }
    }
}

/// A transfer joined with the mover's performance either side of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedTransfer {
    pub player: String,
    pub age: Option<u32>,
    pub position: Option<String>,
    pub nationality: Option<String>,
    pub fee: f64,
    pub previous_club: Option<String>,
    pub market_value: Option<f64>,
    pub transfer_year: i32,
    pub league: String,
    pub season_before: String,
    pub season_after: String,
    pub before: Option<SeasonSnapshot>,
    pub after: Option<SeasonSnapshot>,
}

impl MatchedTransfer {
    pub fn has_before(&self) -> bool {
        self.before.is_some()
    }

    pub fn has_after(&self) -> bool {
        self.after.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.before.is_some() && self.after.is_some()
    }

    /// Goals+assists per 90 in the season after the move
    pub fn target(&self) -> Option<f64> {
        self.after.as_ref().map(|s| s.ga_per_90)
    }

    /// After minus before for a stat, when both seasons are known
    pub fn change<F>(&self, stat: F) -> Option<f64>
    where
        F: Fn(&SeasonSnapshot) -> f64,
    {
        match (&self.before, &self.after) {
            (Some(before), Some(after)) => Some(stat(after) - stat(before)),
            _ => None,
        }
    }

    pub fn league_kind(&self) -> Option<League> {
        League::from_name(&self.league)
    }

    pub fn position_group(&self) -> PositionGroup {
        self.position
            .as_deref()
            .map(PositionGroup::from_position)
            .unwrap_or(PositionGroup::Other)
    }
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Missing column '{column}' in {source_name}")]
    MissingColumn { column: String, source_name: String },

    #[error("No data: {0}")]
    EmptyData(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Feature count mismatch: model expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, TransferError>;

/// Application configuration loaded from transfers.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub filter: FilterConfig,
    pub matching: MatchingConfig,
    pub features: FeatureConfig,
    pub split: SplitConfig,
    pub models: ModelsConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub transfers_dir: String,
    pub fbref_dir: String,
    pub processed_dir: String,
    pub dataset_path: String,
    pub database_path: String,
    pub results_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub min_fee: f64,
    pub position_pattern: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub fuzzy_threshold: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub reference_year: i32,
    pub inflation: Vec<PriceIndexPoint>,
}

/// Annual average consumer price index for one year
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceIndexPoint {
    pub year: i32,
    pub index: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    Chronological,
    Random,
}

impl fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitStrategy::Chronological => write!(f, "chronological"),
            SplitStrategy::Random => write!(f, "random"),
        }
    }
}

impl std::str::FromStr for SplitStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "chronological" | "time" => Ok(SplitStrategy::Chronological),
            "random" => Ok(SplitStrategy::Random),
            _ => Err(format!(
                "Unknown split: {}. Use chronological or random.",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitConfig {
    pub strategy: SplitStrategy,
    /// Last transfer year used for training
    pub train_until: i32,
    /// First transfer year held out for testing
    pub test_from: i32,
    pub test_fraction: f64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    pub linear: LinearConfig,
    pub random_forest: ForestConfig,
    pub gradient_boosting: BoostingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearConfig {
    pub fit_intercept: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_estimators: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_features: Option<usize>,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoostingConfig {
    pub n_estimators: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub subsample: f64,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub top_features: usize,
    pub overfit_gap_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                transfers_dir: "data/transfermarkt".to_string(),
                fbref_dir: "data/fbref".to_string(),
                processed_dir: "data/processed".to_string(),
                dataset_path: "data/processed/transfers_matched_complete.csv".to_string(),
                database_path: "data/transfers.db".to_string(),
                results_dir: "results".to_string(),
            },
            filter: FilterConfig {
                min_fee: 5_000_000.0,
                position_pattern: "Midfield|Attack|Forward|Winger|Striker".to_string(),
            },
            matching: MatchingConfig {
                fuzzy_threshold: 0.85,
            },
            features: FeatureConfig {
                reference_year: 2024,
                // Euro-area HICP annual averages, 2015 = 100
                inflation: [
                    (2015, 100.00),
                    (2016, 100.24),
                    (2017, 101.78),
                    (2018, 103.57),
                    (2019, 104.82),
                    (2020, 105.09),
                    (2021, 107.79),
                    (2022, 116.78),
                    (2023, 123.07),
                    (2024, 126.14),
                ]
                .into_iter()
                .map(|(year, index)| PriceIndexPoint { year, index })
                .collect(),
            },
            split: SplitConfig {
                strategy: SplitStrategy::Chronological,
                train_until: 2022,
                test_from: 2023,
                test_fraction: 0.20,
                seed: 42,
            },
            models: ModelsConfig {
                linear: LinearConfig {
                    fit_intercept: true,
                },
                random_forest: ForestConfig {
                    n_estimators: 300,
                    max_depth: None,
                    min_samples_split: 2,
                    min_samples_leaf: 1,
                    max_features: None,
                    seed: 50,
                },
                gradient_boosting: BoostingConfig {
                    n_estimators: 300,
                    learning_rate: 0.05,
                    max_depth: 3,
                    subsample: 1.0,
                    min_samples_split: 2,
                    min_samples_leaf: 1,
                    seed: 70,
                },
            },
            report: ReportConfig {
                top_features: 15,
                overfit_gap_threshold: 0.15,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TransferError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| TransferError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TransferError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(goals: f64, assists: f64, nineties: f64) -> SeasonSnapshot {
        SeasonSnapshot {
            squad: None,
            matches_played: 30.0,
            starts: 25.0,
            minutes: nineties * 90.0,
            nineties,
            goals,
            assists,
            non_penalty_goals: goals,
            penalties: 0.0,
            yellow_cards: 2.0,
            red_cards: 0.0,
            goals_per_90: goals / nineties,
            assists_per_90: assists / nineties,
            ga_per_90: (goals + assists) / nineties,
        }
    }

    #[test]
    fn test_league_from_name() {
        assert_eq!(League::from_name("Premier League"), Some(League::PremierLeague));
        assert_eq!(League::from_name("la_liga"), Some(League::LaLiga));
        assert_eq!(League::from_name("LaLiga"), Some(League::LaLiga));
        assert_eq!(League::from_name("Serie-A"), Some(League::SerieA));
        assert_eq!(League::from_name("seriea"), Some(League::SerieA));
        assert_eq!(League::from_name("ligue1"), Some(League::Ligue1));
        assert_eq!(League::from_name("Eredivisie"), None);
    }

    #[test]
    fn test_league_slug_round_trips() {
        for league in League::all() {
            assert_eq!(League::from_name(league.slug()), Some(league));
        }
    }

    #[test]
    fn test_league_from_filename() {
        assert_eq!(
            League::from_filename("data/transfermarkt/premier_league_2023.csv"),
            Some(League::PremierLeague)
        );
        assert_eq!(League::from_filename("Bundesliga_2019.csv"), Some(League::Bundesliga));
    }

    #[test]
    fn test_position_groups() {
        assert_eq!(PositionGroup::from_position("Centre-Forward"), PositionGroup::Striker);
        assert_eq!(PositionGroup::from_position("Second Striker"), PositionGroup::Striker);
        assert_eq!(PositionGroup::from_position("Left Winger"), PositionGroup::Winger);
        assert_eq!(
            PositionGroup::from_position("Attacking Midfield"),
            PositionGroup::AttackingMidfield
        );
        assert_eq!(PositionGroup::from_position("Defensive Midfield"), PositionGroup::Midfield);
        assert_eq!(PositionGroup::from_position("attack"), PositionGroup::Striker);
        assert_eq!(PositionGroup::from_position("Goalkeeper"), PositionGroup::Other);
    }

    #[test]
    fn test_matched_transfer_change() {
        let transfer = MatchedTransfer {
            player: "Test Player".to_string(),
            age: Some(24),
            position: Some("Centre-Forward".to_string()),
            nationality: None,
            fee: 30_000_000.0,
            previous_club: None,
            market_value: None,
            transfer_year: 2021,
            league: "Serie-A".to_string(),
            season_before: "2020-2021".to_string(),
            season_after: "2021-2022".to_string(),
            before: Some(snapshot(10.0, 4.0, 28.0)),
            after: Some(snapshot(6.0, 2.0, 20.0)),
        };

        assert!(transfer.is_complete());
        assert_eq!(transfer.change(|s| s.goals), Some(-4.0));
        assert!((transfer.target().unwrap() - 0.4).abs() < 1e-12);
        assert_eq!(transfer.position_group(), PositionGroup::Striker);
        assert_eq!(transfer.league_kind(), Some(League::SerieA));
    }

    #[test]
    fn test_config_toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.models.random_forest.max_depth, None);
        assert_eq!(parsed.models.gradient_boosting.max_depth, 3);
        assert_eq!(parsed.split.strategy, SplitStrategy::Chronological);
        assert_eq!(parsed.features.inflation.len(), config.features.inflation.len());
    }

    #[test]
    fn test_per_90_without_minutes() {
        let stats = SeasonStats {
            player: "Bench".to_string(),
            nation: None,
            position: None,
            squad: None,
            age: 20,
            born: None,
            matches_played: 0.0,
            starts: 0.0,
            minutes: 0.0,
            nineties: 0.0,
            goals: 0.0,
            assists: 0.0,
            goals_assists: 0.0,
            non_penalty_goals: 0.0,
            penalties: 0.0,
            penalty_attempts: 0.0,
            yellow_cards: 0.0,
            red_cards: 0.0,
            xg: None,
            npxg: None,
            xag: None,
            npxg_xag: None,
            progressive_carries: None,
            progressive_passes: None,
            progressive_receptions: None,
            season: "2020-2021".to_string(),
            league: "Bundesliga".to_string(),
        };
        assert_eq!(stats.goals_assists_per_90(), 0.0);
    }
}
