//! Categorical and polynomial encodings

use crate::{League, PositionGroup};

/// Position indicators; Midfield and Other are the baseline
pub const POSITION_FEATURES: [(&str, PositionGroup); 3] = [
    ("pos_striker", PositionGroup::Striker),
    ("pos_winger", PositionGroup::Winger),
    ("pos_attacking_midfield", PositionGroup::AttackingMidfield),
];

/// League indicators; the Premier League is the baseline
pub const LEAGUE_FEATURES: [(&str, League); 4] = [
    ("league_la_liga", League::LaLiga),
    ("league_serie_a", League::SerieA),
    ("league_bundesliga", League::Bundesliga),
    ("league_ligue_1", League::Ligue1),
];

pub const AGE_FEATURES: [&str; 2] = ["age", "age_sq"];

pub fn position_one_hot(group: PositionGroup) -> [f64; 3] {
    POSITION_FEATURES.map(|(_, g)| indicator(g == group))
}

/// Unrecognised leagues encode as the baseline
pub fn league_one_hot(league: Option<League>) -> [f64; 4] {
    LEAGUE_FEATURES.map(|(_, l)| indicator(Some(l) == league))
}

pub fn age_features(age: u32) -> [f64; 2] {
    let age = age as f64;
    [age, age * age]
}

fn indicator(flag: bool) -> f64 {
    if flag {
        1.0
    } else {
        0.0
    }
}
