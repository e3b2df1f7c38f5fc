//! League-relative transfer spend

use crate::MatchedTransfer;
use std::collections::HashMap;

/// Mean fee per league and transfer year
#[derive(Debug, Clone, Default)]
pub struct LeagueSpend {
    means: HashMap<(String, i32), f64>,
}

impl LeagueSpend {
    pub fn from_records(records: &[MatchedTransfer]) -> Self {
        let mut totals: HashMap<(String, i32), (f64, usize)> = HashMap::new();
        for r in records {
            let entry = totals
                .entry((r.league.clone(), r.transfer_year))
                .or_insert((0.0, 0));
            entry.0 += r.fee;
            entry.1 += 1;
        }

        let means = totals
            .into_iter()
            .map(|(key, (sum, count))| (key, sum / count as f64))
            .collect();
        LeagueSpend { means }
    }

    pub fn mean(&self, league: &str, year: i32) -> Option<f64> {
        self.means.get(&(league.to_string(), year)).copied()
    }

    /// Fee as a multiple of its league-season mean; 1.0 when no usable mean exists
    pub fn relative(&self, record: &MatchedTransfer) -> f64 {
        match self.mean(&record.league, record.transfer_year) {
            Some(mean) if mean > 0.0 => record.fee / mean,
            _ => 1.0,
        }
    }

    pub fn groups(&self) -> usize {
        self.means.len()
    }
}
