//! Feature engineering
//!
//! Converts matched transfers into model-ready numeric features.

pub mod builder;
pub mod encoding;
pub mod inflation;
pub mod scaling;
pub mod spend;

pub use builder::{feature_names, FeatureBuilder, FeatureTable};
pub use inflation::InflationIndex;
pub use scaling::StandardScaler;
pub use spend::LeagueSpend;
