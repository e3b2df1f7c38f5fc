//! Feature matrix assembly
//!
//! Each usable transfer becomes one row of fee, age, prior-season and
//! categorical features, with `after_ga_per_90` as the target.

use super::encoding::{
    age_features, league_one_hot, position_one_hot, AGE_FEATURES, LEAGUE_FEATURES,
    POSITION_FEATURES,
};
use super::inflation::InflationIndex;
use super::spend::LeagueSpend;
use crate::data::TransferDataset;
use crate::{FeatureConfig, MatchedTransfer, Result, SeasonSnapshot, TransferError};
use ndarray::{Array1, Array2};

pub const FEE_FEATURES: [&str; 3] = ["fee_adj_m", "log_fee_adj", "league_relative_spend"];

pub const PRIOR_SEASON_FEATURES: [&str; 10] = [
    "before_mp",
    "before_starts",
    "before_min",
    "before_gls",
    "before_ast",
    "before_pk",
    "before_crdy",
    "before_crdr",
    "before_gls_per_90",
    "before_ga_per_90",
];

fn prior_season(s: &SeasonSnapshot) -> [f64; 10] {
    [
        s.matches_played,
        s.starts,
        s.minutes,
        s.goals,
        s.assists,
        s.penalties,
        s.yellow_cards,
        s.red_cards,
        s.goals_per_90,
        s.ga_per_90,
    ]
}

/// Column order of every feature row
pub fn feature_names() -> Vec<String> {
    AGE_FEATURES
        .iter()
        .chain(FEE_FEATURES.iter())
        .chain(PRIOR_SEASON_FEATURES.iter())
        .copied()
        .chain(POSITION_FEATURES.iter().map(|(name, _)| *name))
        .chain(LEAGUE_FEATURES.iter().map(|(name, _)| *name))
        .map(str::to_string)
        .collect()
}

/// Model-ready rows with the identifiers needed for reporting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    pub names: Vec<String>,
    pub rows: Vec<Vec<f64>>,
    pub targets: Vec<f64>,
    pub players: Vec<String>,
    pub years: Vec<i32>,
    /// Records skipped for lacking age or prior-season stats
    pub dropped: usize,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.names.len()
    }

    pub fn matrix(&self) -> Array2<f64> {
        let cols = self.names.len();
        Array2::from_shape_fn((self.rows.len(), cols), |(r, c)| self.rows[r][c])
    }

    pub fn target_vector(&self) -> Array1<f64> {
        Array1::from(self.targets.clone())
    }

    /// Rows at `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> FeatureTable {
        FeatureTable {
            names: self.names.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
            targets: indices.iter().map(|&i| self.targets[i]).collect(),
            players: indices.iter().map(|&i| self.players[i].clone()).collect(),
            years: indices.iter().map(|&i| self.years[i]).collect(),
            dropped: 0,
        }
    }
}

/// Turns matched transfers into a `FeatureTable`
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    inflation: InflationIndex,
}

impl FeatureBuilder {
    pub fn new(inflation: InflationIndex) -> Self {
        FeatureBuilder { inflation }
    }

    pub fn from_config(config: &FeatureConfig) -> Result<Self> {
        Ok(Self::new(InflationIndex::from_config(config)?))
    }

    /// One row per transfer with an age, a prior season and a target
    pub fn build(&self, dataset: &TransferDataset) -> Result<FeatureTable> {
        let spend = LeagueSpend::from_records(&dataset.records);
        log::debug!(
            "League spend computed over {} league-seasons",
            spend.groups()
        );

        let mut table = FeatureTable {
            names: feature_names(),
            ..Default::default()
        };

        for record in &dataset.records {
            match self.row(record, &spend) {
                Some((row, target)) => {
                    table.rows.push(row);
                    table.targets.push(target);
                    table.players.push(record.player.clone());
                    table.years.push(record.transfer_year);
                }
                None => table.dropped += 1,
            }
        }

        if table.dropped > 0 {
            log::warn!(
                "Skipped {} transfers without age or prior-season stats",
                table.dropped
            );
        }
        if table.is_empty() {
            return Err(TransferError::EmptyData(
                "no transfers have the features needed for training".to_string(),
            ));
        }

        log::info!(
            "Built {} feature rows with {} features",
            table.len(),
            table.n_features()
        );
        Ok(table)
    }

    fn row(&self, record: &MatchedTransfer, spend: &LeagueSpend) -> Option<(Vec<f64>, f64)> {
        let age = record.age?;
        let before = record.before.as_ref()?;
        let target = record.target()?;

        let fee_adj = self.inflation.adjust(record.fee, record.transfer_year);
        let fee_adj_m = fee_adj / 1.0e6;

        let mut row = Vec::with_capacity(22);
        row.extend(age_features(age));
        row.push(fee_adj_m);
        row.push(fee_adj.max(1.0).ln());
        row.push(spend.relative(record));
        row.extend(prior_season(before));
        row.extend(position_one_hot(record.position_group()));
        row.extend(league_one_hot(record.league_kind()));

        Some((row, target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PriceIndexPoint;

    fn snapshot(goals: f64, nineties: f64) -> SeasonSnapshot {
        SeasonSnapshot {
            squad: None,
            matches_played: 30.0,
            starts: 20.0,
            minutes: nineties * 90.0,
            nineties,
            goals,
            assists: 2.0,
            non_penalty_goals: goals,
            penalties: 1.0,
            yellow_cards: 4.0,
            red_cards: 0.0,
            goals_per_90: goals / nineties,
            assists_per_90: 2.0 / nineties,
            ga_per_90: (goals + 2.0) / nineties,
        }
    }

    fn transfer(player: &str, year: i32, fee: f64, age: Option<u32>, with_before: bool) -> MatchedTransfer {
        MatchedTransfer {
            player: player.to_string(),
            age,
            position: Some("Right Winger".to_string()),
            nationality: None,
            fee,
            previous_club: None,
            market_value: None,
            transfer_year: year,
            league: "Serie-A".to_string(),
            season_before: String::new(),
            season_after: String::new(),
            before: with_before.then(|| snapshot(8.0, 20.0)),
            after: Some(snapshot(4.0, 20.0)),
        }
    }

    fn builder() -> FeatureBuilder {
        let points = vec![
            PriceIndexPoint {
                year: 2020,
                index: 100.0,
            },
            PriceIndexPoint {
                year: 2024,
                index: 120.0,
            },
        ];
        FeatureBuilder::new(InflationIndex::new(&points, 2024).unwrap())
    }

    fn value(table: &FeatureTable, row: usize, name: &str) -> f64 {
        let col = table.names.iter().position(|n| n == name).unwrap();
        table.rows[row][col]
    }

    #[test]
    fn test_feature_names_are_unique() {
        let names = feature_names();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), names.len());
        assert_eq!(names.len(), 22);
    }

    #[test]
    fn test_build_rows() {
        let dataset = TransferDataset::from_records(vec![
            transfer("A", 2020, 10.0e6, Some(22), true),
            transfer("B", 2020, 30.0e6, Some(27), true),
            transfer("C", 2024, 50.0e6, None, true),
            transfer("D", 2024, 50.0e6, Some(25), false),
        ]);

        let table = builder().build(&dataset).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.dropped, 2);
        assert_eq!(table.players, vec!["A", "B"]);
        assert_eq!(table.rows[0].len(), table.n_features());

        assert_eq!(value(&table, 0, "age_sq"), 484.0);
        assert!((value(&table, 0, "fee_adj_m") - 12.0).abs() < 1e-9);
        assert!((value(&table, 0, "log_fee_adj") - 12.0e6_f64.ln()).abs() < 1e-9);
        assert_eq!(value(&table, 0, "league_relative_spend"), 0.5);
        assert_eq!(value(&table, 1, "league_relative_spend"), 1.5);
        assert_eq!(value(&table, 0, "before_gls"), 8.0);
        assert_eq!(value(&table, 0, "pos_winger"), 1.0);
        assert_eq!(value(&table, 0, "league_serie_a"), 1.0);
        assert!((table.targets[0] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_build_with_no_usable_rows() {
        let dataset =
            TransferDataset::from_records(vec![transfer("A", 2020, 10.0e6, None, true)]);
        assert!(matches!(
            builder().build(&dataset),
            Err(TransferError::EmptyData(_))
        ));
    }

    #[test]
    fn test_matrix_and_select() {
        let dataset = TransferDataset::from_records(vec![
            transfer("A", 2020, 10.0e6, Some(22), true),
            transfer("B", 2021, 30.0e6, Some(27), true),
        ]);
        let table = builder().build(&dataset).unwrap();
        let x = table.matrix();
        assert_eq!(x.dim(), (2, 22));
        assert_eq!(x[[1, 0]], 27.0);

        let picked = table.select(&[1]);
        assert_eq!(picked.players, vec!["B"]);
        assert_eq!(picked.years, vec![2021]);
        assert_eq!(picked.target_vector().len(), 1);
    }
}
