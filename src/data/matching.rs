//! Joins transfers to the mover's FBref seasons either side of the move
//!
//! A transfer in year `y` is compared against season `y-1`-`y` (before) and
//! season `y`-`y+1` (after) in the buying club's league. Names are matched
//! exactly after normalisation, falling back to a similarity ratio.

use crate::data::table::Table;
use crate::{League, MatchedTransfer, Result, SeasonSnapshot, SeasonStats, TransferError, TransferRecord};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

const ACCENTS: [(char, &str); 35] = [
    ('á', "a"),
    ('à', "a"),
    ('ã', "a"),
    ('â', "a"),
    ('ä', "a"),
    ('é', "e"),
    ('è', "e"),
    ('ê', "e"),
    ('ë', "e"),
    ('í', "i"),
    ('ì', "i"),
    ('î', "i"),
    ('ï', "i"),
    ('ó', "o"),
    ('ò', "o"),
    ('õ', "o"),
    ('ô', "o"),
    ('ö', "o"),
    ('ú', "u"),
    ('ù', "u"),
    ('û', "u"),
    ('ü', "u"),
    ('ñ', "n"),
    ('ç', "c"),
    ('ć', "c"),
    ('č', "c"),
    ('ş', "s"),
    ('š', "s"),
    ('ž', "z"),
    ('đ', "d"),
    ('ø', "o"),
    ('å', "a"),
    ('æ', "ae"),
    ('\u{00a0}', " "),
    ('\t', " "),
];

/// Lowercase, fold accents, drop generational suffixes and collapse spaces
pub fn standardize_name(name: &str) -> String {
    static SUFFIX: OnceLock<Regex> = OnceLock::new();
    let suffix = SUFFIX.get_or_init(|| Regex::new(r"\s+(jr|sr|ii|iii|iv)\.?$").expect("static regex"));

    let lower = name.trim().to_lowercase();
    let mut folded = String::with_capacity(lower.len());
    for ch in lower.chars() {
        match ACCENTS.iter().find(|(accented, _)| *accented == ch) {
            Some((_, plain)) => folded.push_str(plain),
            None => folded.push(ch),
        }
    }

    let stripped = suffix.replace(&folded, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// FBref league slug for free-text league names; unknown names pass through
pub fn standardize_league(league: &str) -> String {
    League::from_name(league)
        .map(|l| l.slug().to_string())
        .unwrap_or_else(|| league.trim().to_string())
}

/// Seasons immediately before and after a transfer window in `year`
pub fn year_to_season(year: i32) -> (String, String) {
    (
        format!("{}-{}", year - 1, year),
        format!("{}-{}", year, year + 1),
    )
}

/// Ratcliff/Obershelp similarity: twice the matched characters over the total
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut stack = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, k) = longest_common_block(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            stack.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            stack.push((i + k, ahi, j + k, bhi));
        }
    }

    matched
}

/// Longest common substring of `a[alo..ahi]` and `b[blo..bhi]`, earliest first
fn longest_common_block(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut prev = vec![0usize; width + 1];
    let mut cur = vec![0usize; width + 1];
    let mut best = (alo, blo, 0);

    for i in alo..ahi {
        for j in blo..bhi {
            let slot = j - blo + 1;
            if a[i] == b[j] {
                cur[slot] = prev[slot - 1] + 1;
                if cur[slot] > best.2 {
                    let k = cur[slot];
                    best = (i + 1 - k, j + 1 - k, k);
                }
            } else {
                cur[slot] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

pub fn names_match(a: &str, b: &str, threshold: f64) -> bool {
    similarity(a, b) >= threshold
}

/// A transfer with no performance data on either side
#[derive(Debug, Clone, PartialEq)]
pub struct UnmatchedTransfer {
    pub player: String,
    pub league: String,
    pub transfer_year: i32,
}

/// Output of a matching pass
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub matched: Vec<MatchedTransfer>,
    pub unmatched: Vec<UnmatchedTransfer>,
    /// Transfers dropped before matching because their year is unknown
    pub without_year: usize,
    pub without_fee: usize,
    pub fuzzy_matches: usize,
}

impl MatchOutcome {
    pub fn complete(&self) -> Vec<MatchedTransfer> {
        self.matched
            .iter()
            .filter(|m| m.is_complete())
            .cloned()
            .collect()
    }

    pub fn total(&self) -> usize {
        self.matched.len() + self.unmatched.len()
    }

    pub fn report(&self) -> MatchReport {
        let complete = self.matched.iter().filter(|m| m.is_complete()).count();
        let before_only = self
            .matched
            .iter()
            .filter(|m| m.has_before() && !m.has_after())
            .count();
        MatchReport {
            total: self.total(),
            matched: self.matched.len(),
            complete,
            before_only,
            after_only: self.matched.len() - complete - before_only,
            unmatched: self.unmatched.len(),
            leagues: self.league_report(),
        }
    }

    /// Goals, assists and goals-per-90 changes across complete matches
    pub fn change_summaries(&self) -> Vec<ChangeSummary> {
        let stats: [(&'static str, fn(&SeasonSnapshot) -> f64); 3] = [
            ("goals", |s| s.goals),
            ("assists", |s| s.assists),
            ("goals per 90", |s| s.goals_per_90),
        ];
        stats
            .into_iter()
            .filter_map(|(name, stat)| {
                let changes: Vec<f64> =
                    self.matched.iter().filter_map(|m| m.change(stat)).collect();
                ChangeSummary::from_changes(name, &changes)
            })
            .collect()
    }

    /// Match and completeness rates per league
    pub fn league_report(&self) -> Vec<LeagueMatchRate> {
        let mut by_league: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for m in &self.matched {
            let entry = by_league.entry(m.league.clone()).or_insert((0, 0));
            entry.0 += 1;
            if m.is_complete() {
                entry.1 += 1;
            }
        }
        by_league
            .into_iter()
            .map(|(league, (matched, complete))| LeagueMatchRate {
                league,
                matched,
                complete,
            })
            .collect()
    }
}

/// Distribution of one stat's after-minus-before change over complete matches
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSummary {
    pub stat: &'static str,
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub improved: usize,
    pub declined: usize,
}

impl ChangeSummary {
    pub fn from_changes(stat: &'static str, changes: &[f64]) -> Option<Self> {
        if changes.is_empty() {
            return None;
        }
        let n = changes.len();
        let mut sorted = changes.to_vec();
        sorted.sort_by(f64::total_cmp);
        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        Some(ChangeSummary {
            stat,
            n,
            mean: changes.iter().sum::<f64>() / n as f64,
            median,
            improved: changes.iter().filter(|c| **c > 0.0).count(),
            declined: changes.iter().filter(|c| **c < 0.0).count(),
        })
    }

    pub fn improved_pct(&self) -> f64 {
        self.improved as f64 / self.n as f64 * 100.0
    }

    pub fn declined_pct(&self) -> f64 {
        self.declined as f64 / self.n as f64 * 100.0
    }
}

/// Counts printed after a matching pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub total: usize,
    pub matched: usize,
    pub complete: usize,
    pub before_only: usize,
    pub after_only: usize,
    pub unmatched: usize,
    pub leagues: Vec<LeagueMatchRate>,
}

impl MatchReport {
    pub fn match_pct(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched as f64 / self.total as f64 * 100.0
        }
    }
}

/// `transfers_unmatched.csv` layout
pub fn unmatched_to_table(unmatched: &[UnmatchedTransfer]) -> Table {
    let mut table = Table::new(vec![
        "player_name".to_string(),
        "league".to_string(),
        "transfer_year".to_string(),
    ]);
    for u in unmatched {
        table.rows.push(vec![
            u.player.clone(),
            u.league.clone(),
            u.transfer_year.to_string(),
        ]);
    }
    table
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeagueMatchRate {
    pub league: String,
    pub matched: usize,
    pub complete: usize,
}

impl LeagueMatchRate {
    pub fn complete_pct(&self) -> f64 {
        if self.matched == 0 {
            0.0
        } else {
            self.complete as f64 / self.matched as f64 * 100.0
        }
    }
}

/// Player-season rows grouped for lookup by league and season
struct SeasonIndex<'a> {
    exact: HashMap<(String, String, String), &'a SeasonStats>,
    by_group: HashMap<(String, String), Vec<(String, &'a SeasonStats)>>,
}

impl<'a> SeasonIndex<'a> {
    fn build(stats: &'a [SeasonStats]) -> Self {
        let mut exact = HashMap::new();
        let mut by_group: HashMap<(String, String), Vec<(String, &'a SeasonStats)>> =
            HashMap::new();

        for s in stats {
            let name = standardize_name(&s.player);
            let league = standardize_league(&s.league);
            exact
                .entry((league.clone(), s.season.clone(), name.clone()))
                .or_insert(s);
            by_group
                .entry((league, s.season.clone()))
                .or_default()
                .push((name, s));
        }

        SeasonIndex { exact, by_group }
    }

    /// Exact normalised-name hit, else the first fuzzy hit in the league-season
    fn find(
        &self,
        name: &str,
        league: &str,
        season: &str,
        threshold: f64,
    ) -> Option<(&'a SeasonStats, bool)> {
        let key = (league.to_string(), season.to_string(), name.to_string());
        if let Some(stats) = self.exact.get(&key) {
            return Some((*stats, false));
        }

        self.by_group
            .get(&(league.to_string(), season.to_string()))?
            .iter()
            .find(|(candidate, _)| names_match(name, candidate, threshold))
            .map(|(_, stats)| (*stats, true))
    }
}

/// Attach before/after season stats to each transfer
pub fn match_transfers(
    transfers: &[TransferRecord],
    stats: &[SeasonStats],
    threshold: f64,
) -> Result<MatchOutcome> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(TransferError::Config(format!(
            "fuzzy threshold must be within [0, 1], got {}",
            threshold
        )));
    }

    let index = SeasonIndex::build(stats);
    let mut outcome = MatchOutcome::default();

    for (i, transfer) in transfers.iter().enumerate() {
        if (i + 1) % 100 == 0 {
            log::debug!("Matched {}/{} transfers", i + 1, transfers.len());
        }

        let Some(year) = transfer.transfer_year else {
            outcome.without_year += 1;
            continue;
        };
        let Some(fee) = transfer.fee else {
            outcome.without_fee += 1;
            continue;
        };

        let name = standardize_name(&transfer.player);
        let league = standardize_league(&transfer.league);
        let (season_before, season_after) = year_to_season(year);

        let before = index.find(&name, &league, &season_before, threshold);
        let after = index.find(&name, &league, &season_after, threshold);

        outcome.fuzzy_matches += [before, after]
            .iter()
            .filter(|hit| hit.is_some_and(|(_, fuzzy)| fuzzy))
            .count();

        if before.is_none() && after.is_none() {
            outcome.unmatched.push(UnmatchedTransfer {
                player: transfer.player.clone(),
                league,
                transfer_year: year,
            });
            continue;
        }

        outcome.matched.push(MatchedTransfer {
            player: transfer.player.clone(),
            age: transfer.age,
            position: transfer.position.clone(),
            nationality: transfer.nationality.clone(),
            fee,
            previous_club: transfer.previous_club.clone(),
            market_value: transfer.market_value,
            transfer_year: year,
            league,
            season_before,
            season_after,
            before: before.map(|(s, _)| SeasonSnapshot::from(s)),
            after: after.map(|(s, _)| SeasonSnapshot::from(s)),
        });
    }

    log::info!(
        "Matched {} of {} transfers ({} complete, {} fuzzy name hits)",
        outcome.matched.len(),
        outcome.total(),
        outcome.matched.iter().filter(|m| m.is_complete()).count(),
        outcome.fuzzy_matches
    );

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn season(player: &str, league: &str, season: &str, goals: f64, nineties: f64) -> SeasonStats {
        SeasonStats {
            player: player.to_string(),
            nation: None,
            position: Some("FW".to_string()),
            squad: Some("Club".to_string()),
            age: 24,
            born: None,
            matches_played: 30.0,
            starts: 28.0,
            minutes: nineties * 90.0,
            nineties,
            goals,
            assists: 3.0,
            goals_assists: goals + 3.0,
            non_penalty_goals: goals,
            penalties: 0.0,
            penalty_attempts: 0.0,
            yellow_cards: 1.0,
            red_cards: 0.0,
            xg: None,
            npxg: None,
            xag: None,
            npxg_xag: None,
            progressive_carries: None,
            progressive_passes: None,
            progressive_receptions: None,
            season: season.to_string(),
            league: league.to_string(),
        }
    }

    fn transfer(player: &str, league: &str, year: i32) -> TransferRecord {
        TransferRecord {
            player: player.to_string(),
            age: Some(23),
            position: Some("Centre-Forward".to_string()),
            nationality: None,
            previous_club: Some("Old Club".to_string()),
            market_value: Some(20.0e6),
            fee: Some(25.0e6),
            league: league.to_string(),
            source_file: format!("file_{}.csv", year),
            transfer_year: Some(year),
        }
    }

    #[test]
    fn test_standardize_name() {
        assert_eq!(standardize_name("  Kylian   Mbappé "), "kylian mbappe");
        assert_eq!(standardize_name("Luka Modrić"), "luka modric");
        assert_eq!(standardize_name("Martin Ødegaard"), "martin odegaard");
        assert_eq!(standardize_name("Timothy Weah Jr."), "timothy weah");
        assert_eq!(standardize_name("John Smith III"), "john smith");
    }

    #[test]
    fn test_standardize_league() {
        assert_eq!(standardize_league("Premier League"), "Premier-League");
        assert_eq!(standardize_league("la liga"), "La-Liga");
        assert_eq!(standardize_league("Eredivisie"), "Eredivisie");
    }

    #[test]
    fn test_year_to_season() {
        assert_eq!(
            year_to_season(2022),
            ("2021-2022".to_string(), "2022-2023".to_string())
        );
    }

    #[test]
    fn test_similarity() {
        assert_eq!(similarity("abcd", "abcd"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert!((similarity("abcd", "bcde") - 0.75).abs() < 1e-12);
        assert!(similarity("vinicius junior", "vinicius jr") > 0.8);
        assert!(similarity("joao felix", "joao cancelo") < 0.85);
    }

    #[test]
    fn test_match_transfers_exact_and_fuzzy() {
        let stats = vec![
            season("Dušan Vlahović", "Serie-A", "2021-2022", 24.0, 30.0),
            season("Dusan Vlahovic", "Serie-A", "2022-2023", 10.0, 20.0),
            season("Mohamed Salah", "Premier-League", "2017-2018", 32.0, 34.0),
            season("Mohammed Salah", "Premier-League", "2016-2017", 15.0, 31.0),
        ];
        let transfers = vec![
            transfer("Dusan Vlahovic", "Serie A", 2022),
            transfer("Mohamed Salah", "Premier League", 2017),
            transfer("Unknown Player", "Serie A", 2022),
        ];

        let outcome = match_transfers(&transfers, &stats, 0.85).unwrap();

        assert_eq!(outcome.matched.len(), 2);
        assert_eq!(outcome.unmatched.len(), 1);
        assert_eq!(outcome.unmatched[0].player, "Unknown Player");

        let vlahovic = &outcome.matched[0];
        assert!(vlahovic.is_complete());
        assert_eq!(vlahovic.league, "Serie-A");
        assert_eq!(vlahovic.before.as_ref().unwrap().goals, 24.0);
        assert_eq!(vlahovic.change(|s| s.goals), Some(-14.0));

        let salah = &outcome.matched[1];
        assert!(salah.is_complete());
        assert_eq!(salah.before.as_ref().unwrap().goals, 15.0);
        assert_eq!(outcome.fuzzy_matches, 1);

        let report = outcome.report();
        assert_eq!(report.total, 3);
        assert_eq!(report.complete, 2);
        assert_eq!(report.before_only + report.after_only, 0);
        assert_eq!(report.leagues.len(), 2);
        assert!(report.leagues.iter().all(|r| r.complete_pct() == 100.0));

        let unmatched = unmatched_to_table(&outcome.unmatched);
        assert_eq!(unmatched.rows[0], vec!["Unknown Player", "Serie-A", "2022"]);
    }

    #[test]
    fn test_change_summaries() {
        let stats = vec![
            season("Alpha One", "Serie-A", "2020-2021", 6.0, 20.0),
            season("Alpha One", "Serie-A", "2021-2022", 10.0, 20.0),
            season("Beta Two", "Serie-A", "2020-2021", 8.0, 20.0),
            season("Beta Two", "Serie-A", "2021-2022", 8.0, 20.0),
            season("Gamma Three", "Serie-A", "2020-2021", 5.0, 20.0),
            season("Gamma Three", "Serie-A", "2021-2022", 3.0, 20.0),
            season("Delta Four", "Serie-A", "2020-2021", 30.0, 20.0),
        ];
        let transfers = vec![
            transfer("Alpha One", "Serie A", 2021),
            transfer("Beta Two", "Serie A", 2021),
            transfer("Gamma Three", "Serie A", 2021),
            transfer("Delta Four", "Serie A", 2021),
        ];
        let outcome = match_transfers(&transfers, &stats, 0.85).unwrap();
        assert_eq!(outcome.matched.len(), 4);

        let summaries = outcome.change_summaries();
        assert_eq!(summaries.len(), 3);

        // changes of +4, 0 and -2; the before-only match is left out
        let goals = &summaries[0];
        assert_eq!(goals.stat, "goals");
        assert_eq!(goals.n, 3);
        assert!((goals.mean - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(goals.median, 0.0);
        assert_eq!((goals.improved, goals.declined), (1, 1));
        assert!((goals.improved_pct() - 100.0 / 3.0).abs() < 1e-9);

        let assists = &summaries[1];
        assert_eq!((assists.improved, assists.declined), (0, 0));
        assert_eq!(assists.mean, 0.0);

        let per_90 = &summaries[2];
        assert!((per_90.median - 0.0).abs() < 1e-12);
        assert!((per_90.mean - 0.1 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_change_summary_even_count_median() {
        let summary = ChangeSummary::from_changes("goals", &[3.0, -1.0, 1.0, 0.0]).unwrap();
        assert_eq!(summary.median, 0.5);
        assert_eq!(summary.declined_pct(), 25.0);
        assert!(ChangeSummary::from_changes("goals", &[]).is_none());
    }

    #[test]
    fn test_partial_match_is_kept() {
        let stats = vec![season("Player One", "Bundesliga", "2019-2020", 8.0, 25.0)];
        let transfers = vec![transfer("Player One", "Bundesliga", 2020)];
        let outcome = match_transfers(&transfers, &stats, 0.85).unwrap();
        assert_eq!(outcome.matched.len(), 1);
        assert!(outcome.matched[0].has_before());
        assert!(!outcome.matched[0].has_after());
        assert!(outcome.complete().is_empty());
        assert_eq!(outcome.report().before_only, 1);
    }

    #[test]
    fn test_missing_year_is_skipped() {
        let mut t = transfer("Player One", "Bundesliga", 2020);
        t.transfer_year = None;
        let outcome = match_transfers(&[t], &[], 0.85).unwrap();
        assert_eq!(outcome.without_year, 1);
        assert_eq!(outcome.total(), 0);
    }

    #[test]
    fn test_threshold_out_of_range() {
        assert!(match_transfers(&[], &[], 1.5).is_err());
    }
}
