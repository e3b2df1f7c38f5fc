//! Inflation adjustment of transfer fees

use crate::{FeatureConfig, PriceIndexPoint, Result, TransferError};
use std::collections::BTreeMap;

/// Price index by year, used to express fees in reference-year euros
#[derive(Debug, Clone)]
pub struct InflationIndex {
    points: BTreeMap<i32, f64>,
    reference_year: i32,
    reference_index: f64,
}

impl InflationIndex {
    pub fn new(points: &[PriceIndexPoint], reference_year: i32) -> Result<Self> {
        if points.is_empty() {
            return Err(TransferError::Config(
                "inflation table has no price index points".to_string(),
            ));
        }
        if let Some(bad) = points.iter().find(|p| !(p.index.is_finite() && p.index > 0.0)) {
            return Err(TransferError::Config(format!(
                "price index for {} must be positive, got {}",
                bad.year, bad.index
            )));
        }

        let points: BTreeMap<i32, f64> = points.iter().map(|p| (p.year, p.index)).collect();
        let mut index = InflationIndex {
            points,
            reference_year,
            reference_index: 1.0,
        };
        index.reference_index = index.index_for(reference_year);
        Ok(index)
    }

    pub fn from_config(config: &FeatureConfig) -> Result<Self> {
        Self::new(&config.inflation, config.reference_year)
    }

    pub fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Index for `year`, clamped to the first or last known year
    pub fn index_for(&self, year: i32) -> f64 {
        if let Some(index) = self.points.get(&year) {
            return *index;
        }
        match self.points.range(..year).next_back() {
            Some((_, previous)) => *previous,
            None => self.points.values().next().copied().unwrap_or(1.0),
        }
    }

    /// Fee in reference-year purchasing power
    pub fn adjust(&self, fee: f64, year: i32) -> f64 {
        fee * self.reference_index / self.index_for(year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> InflationIndex {
        let points = [(2018, 100.0), (2020, 110.0), (2024, 125.0)]
            .into_iter()
            .map(|(year, index)| PriceIndexPoint { year, index })
            .collect::<Vec<_>>();
        InflationIndex::new(&points, 2024).unwrap()
    }

    #[test]
    fn test_adjust_to_reference_year() {
        let idx = index();
        assert!((idx.adjust(100.0, 2018) - 125.0).abs() < 1e-9);
        assert!((idx.adjust(100.0, 2024) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_years_outside_table_clamp() {
        let idx = index();
        assert_eq!(idx.index_for(2010), 100.0);
        assert_eq!(idx.index_for(2030), 125.0);
        assert!((idx.adjust(50.0, 2030) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_gap_uses_previous_year() {
        assert_eq!(index().index_for(2022), 110.0);
    }

    #[test]
    fn test_empty_table_is_error() {
        assert!(matches!(
            InflationIndex::new(&[], 2024),
            Err(TransferError::Config(_))
        ));
    }

    #[test]
    fn test_default_config_builds() {
        let config = crate::Config::default();
        let idx = InflationIndex::from_config(&config.features).unwrap();
        assert_eq!(idx.reference_year(), 2024);
        assert!(idx.adjust(10.0e6, 2017) > 10.0e6);
    }
}
