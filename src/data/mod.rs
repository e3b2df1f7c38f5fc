//! Data ingestion and storage
//!
//! Preparation of the merged transfer dataset from raw Transfermarkt and
//! FBref exports, loading of that dataset, and SQLite run history.

pub mod database;
pub mod dataset;
pub mod fbref;
pub mod matching;
pub mod table;
pub mod transfers;

pub use database::Database;
pub use dataset::TransferDataset;
pub use table::Table;
