//! Train/test partitioning of the feature table

use crate::features::FeatureTable;
use crate::{Result, SplitConfig, SplitStrategy, TransferError};
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Training and held-out partitions
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: FeatureTable,
    pub test: FeatureTable,
    pub strategy: SplitStrategy,
    /// Rows falling between the training and test year ranges
    pub discarded: usize,
}

impl TrainTestSplit {
    pub fn describe(&self) -> String {
        match self.strategy {
            SplitStrategy::Chronological => {
                let range = |t: &FeatureTable| match (t.years.iter().min(), t.years.iter().max()) {
                    (Some(a), Some(b)) if a == b => format!("{}", a),
                    (Some(a), Some(b)) => format!("{}-{}", a, b),
                    _ => "-".to_string(),
                };
                format!(
                    "chronological: train {} ({} rows), test {} ({} rows)",
                    range(&self.train),
                    self.train.len(),
                    range(&self.test),
                    self.test.len()
                )
            }
            SplitStrategy::Random => format!(
                "random: train {} rows, test {} rows",
                self.train.len(),
                self.test.len()
            ),
        }
    }
}

/// Split with the configured parameters and the given strategy
pub fn split(
    table: &FeatureTable,
    config: &SplitConfig,
    strategy: SplitStrategy,
) -> Result<TrainTestSplit> {
    let split = match strategy {
        SplitStrategy::Chronological => {
            chronological_split(table, config.train_until, config.test_from)?
        }
        SplitStrategy::Random => random_split(table, config.test_fraction, config.seed)?,
    };
    log::info!("Split {}", split.describe());
    if split.discarded > 0 {
        log::info!(
            "{} rows between {} and {} left out",
            split.discarded,
            config.train_until,
            config.test_from
        );
    }
    Ok(split)
}

/// Train on transfers up to `train_until`, test on those from `test_from`
pub fn chronological_split(
    table: &FeatureTable,
    train_until: i32,
    test_from: i32,
) -> Result<TrainTestSplit> {
    if train_until >= test_from {
        return Err(TransferError::Config(format!(
            "training years (up to {}) must end before test years (from {})",
            train_until, test_from
        )));
    }

    let mut train = Vec::new();
    let mut test = Vec::new();
    for (i, &year) in table.years.iter().enumerate() {
        if year <= train_until {
            train.push(i);
        } else if year >= test_from {
            test.push(i);
        }
    }

    finish(table, &train, &test, SplitStrategy::Chronological)
}

/// Seeded shuffle; `ceil(test_fraction * n)` rows go to test
pub fn random_split(table: &FeatureTable, test_fraction: f64, seed: u64) -> Result<TrainTestSplit> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TransferError::Config(format!(
            "test_fraction must be within (0, 1), got {}",
            test_fraction
        )));
    }

    let n = table.len();
    let mut order: Vec<usize> = (0..n).collect();
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let n_test = ((n as f64) * test_fraction).ceil() as usize;
    let (test, train) = order.split_at(n_test.min(n));
    finish(table, train, test, SplitStrategy::Random)
}

fn finish(
    table: &FeatureTable,
    train: &[usize],
    test: &[usize],
    strategy: SplitStrategy,
) -> Result<TrainTestSplit> {
    if train.is_empty() {
        return Err(TransferError::EmptyData(
            "training partition is empty".to_string(),
        ));
    }
    if test.is_empty() {
        return Err(TransferError::EmptyData("test partition is empty".to_string()));
    }

    Ok(TrainTestSplit {
        train: table.select(train),
        test: table.select(test),
        strategy,
        discarded: table.len() - train.len() - test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(years: &[i32]) -> FeatureTable {
        FeatureTable {
            names: vec!["x".to_string()],
            rows: years.iter().map(|&y| vec![y as f64]).collect(),
            targets: years.iter().map(|&y| y as f64 / 1000.0).collect(),
            players: years.iter().enumerate().map(|(i, _)| format!("P{}", i)).collect(),
            years: years.to_vec(),
            dropped: 0,
        }
    }

    #[test]
    fn test_chronological_split() {
        let t = table(&[2018, 2023, 2020, 2022, 2024, 2019]);
        let split = chronological_split(&t, 2022, 2023).unwrap();
        assert_eq!(split.train.years, vec![2018, 2020, 2022, 2019]);
        assert_eq!(split.test.years, vec![2023, 2024]);
        assert_eq!(split.discarded, 0);
        assert_eq!(split.test.players, vec!["P1", "P4"]);
        assert_eq!(
            split.describe(),
            "chronological: train 2018-2022 (4 rows), test 2023-2024 (2 rows)"
        );
    }

    #[test]
    fn test_gap_years_are_discarded() {
        let t = table(&[2018, 2021, 2022, 2024]);
        let split = chronological_split(&t, 2020, 2023).unwrap();
        assert_eq!(split.train.len(), 1);
        assert_eq!(split.test.len(), 1);
        assert_eq!(split.discarded, 2);
    }

    #[test]
    fn test_empty_partition_is_error() {
        let t = table(&[2018, 2019]);
        assert!(matches!(
            chronological_split(&t, 2022, 2023),
            Err(TransferError::EmptyData(_))
        ));
        assert!(chronological_split(&t, 2023, 2023).is_err());
    }

    #[test]
    fn test_random_split_sizes_and_seed() {
        let t = table(&(2015..2025).collect::<Vec<_>>());
        let a = random_split(&t, 0.25, 42).unwrap();
        let b = random_split(&t, 0.25, 42).unwrap();

        assert_eq!(a.test.len(), 3);
        assert_eq!(a.train.len(), 7);
        assert_eq!(a.test.players, b.test.players);

        let mut all: Vec<i32> = a.train.years.iter().chain(a.test.years.iter()).copied().collect();
        all.sort();
        assert_eq!(all, (2015..2025).collect::<Vec<_>>());
    }

    #[test]
    fn test_random_split_bad_fraction() {
        let t = table(&[2018, 2019]);
        assert!(random_split(&t, 0.0, 1).is_err());
        assert!(random_split(&t, 1.0, 1).is_err());
    }
}
