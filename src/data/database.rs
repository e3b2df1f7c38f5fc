//! SQLite history of training runs

use crate::training::{Comparison, RegressionMetrics};
use crate::{Result, TransferError};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                created_at TEXT NOT NULL,
                dataset TEXT NOT NULL,
                split TEXT NOT NULL,
                n_train INTEGER NOT NULL,
                n_test INTEGER NOT NULL,
                n_features INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS model_results (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL REFERENCES runs(id),
                model TEXT NOT NULL,
                train_r2 REAL,
                train_mae REAL NOT NULL,
                train_rmse REAL NOT NULL,
                test_r2 REAL,
                test_mae REAL NOT NULL,
                test_rmse REAL NOT NULL,
                UNIQUE(run_id, model)
            );

            CREATE TABLE IF NOT EXISTS predictions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL REFERENCES runs(id),
                model TEXT NOT NULL,
                player TEXT NOT NULL,
                transfer_year INTEGER NOT NULL,
                actual REAL NOT NULL,
                predicted REAL NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_model_results_run ON model_results(run_id);
            CREATE INDEX IF NOT EXISTS idx_predictions_run ON predictions(run_id, model);
            "#,
        )?;
        Ok(())
    }

    // ==================== Run Operations ====================

    /// Store a finished comparison with its test predictions, returning the run id
    pub fn record_run(&mut self, meta: &RunMeta, comparison: &Comparison) -> Result<i64> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO runs (created_at, dataset, split, n_train, n_test, n_features)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                Utc::now().to_rfc3339(),
                meta.dataset,
                meta.split,
                comparison.n_train as i64,
                comparison.n_test as i64,
                comparison.feature_names.len() as i64,
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        {
            let mut result_stmt = tx.prepare(
                "INSERT INTO model_results (run_id, model, train_r2, train_mae, train_rmse,
                                            test_r2, test_mae, test_rmse)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            let mut prediction_stmt = tx.prepare(
                "INSERT INTO predictions (run_id, model, player, transfer_year, actual, predicted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for result in &comparison.results {
                let model = result.kind.name();
                result_stmt.execute(params![
                    run_id,
                    model,
                    finite(result.train.r2),
                    result.train.mae,
                    result.train.rmse,
                    finite(result.test.r2),
                    result.test.mae,
                    result.test.rmse,
                ])?;

                for p in &result.predictions {
                    prediction_stmt.execute(params![
                        run_id,
                        model,
                        p.player,
                        p.transfer_year,
                        p.actual,
                        p.predicted,
                    ])?;
                }
            }
        }

        tx.commit()?;
        log::debug!("Recorded run {}", run_id);
        Ok(run_id)
    }

    /// Most recent runs first, with the best test R² of each
    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT r.id, r.created_at, r.dataset, r.split, r.n_train, r.n_test, r.n_features,
                    (SELECT m.model FROM model_results m WHERE m.run_id = r.id
                     ORDER BY m.test_r2 DESC LIMIT 1),
                    (SELECT MAX(m.test_r2) FROM model_results m WHERE m.run_id = r.id)
             FROM runs r
             ORDER BY r.id DESC
             LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                let created_at: String = row.get(1)?;
                Ok(RunSummary {
                    id: row.get(0)?,
                    created_at: parse_timestamp(&created_at),
                    dataset: row.get(2)?,
                    split: row.get(3)?,
                    n_train: row.get::<_, i64>(4)? as usize,
                    n_test: row.get::<_, i64>(5)? as usize,
                    n_features: row.get::<_, i64>(6)? as usize,
                    best_model: row.get(7)?,
                    best_test_r2: row.get(8)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    /// Per-model metrics stored for a run
    pub fn model_results(&self, run_id: i64) -> Result<Vec<StoredModelResult>> {
        let exists: Option<i64> = self
            .conn
            .query_row("SELECT id FROM runs WHERE id = ?1", params![run_id], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(TransferError::EmptyData(format!("no run with id {}", run_id)));
        }

        let mut stmt = self.conn.prepare(
            "SELECT model, train_r2, train_mae, train_rmse, test_r2, test_mae, test_rmse,
                    (SELECT COUNT(*) FROM predictions p
                     WHERE p.run_id = model_results.run_id AND p.model = model_results.model),
                    (SELECT n_train FROM runs WHERE runs.id = model_results.run_id)
             FROM model_results
             WHERE run_id = ?1
             ORDER BY id",
        )?;

        let results = stmt
            .query_map(params![run_id], |row| {
                let n_test = row.get::<_, i64>(7)? as usize;
                let n_train = row.get::<_, i64>(8)? as usize;
                Ok(StoredModelResult {
                    model: row.get(0)?,
                    train: RegressionMetrics {
                        n: n_train,
                        r2: row.get::<_, Option<f64>>(1)?.unwrap_or(f64::NAN),
                        mae: row.get(2)?,
                        rmse: row.get(3)?,
                    },
                    test: RegressionMetrics {
                        n: n_test,
                        r2: row.get::<_, Option<f64>>(4)?.unwrap_or(f64::NAN),
                        mae: row.get(5)?,
                        rmse: row.get(6)?,
                    },
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(results)
    }

    // ==================== Statistics ====================

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let run_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;

        let prediction_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM predictions", [], |row| row.get(0))?;

        let first: Option<String> = self
            .conn
            .query_row("SELECT MIN(created_at) FROM runs", [], |row| row.get(0))
            .optional()?
            .flatten();

        let last: Option<String> = self
            .conn
            .query_row("SELECT MAX(created_at) FROM runs", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            run_count: run_count as usize,
            prediction_count: prediction_count as usize,
            first_run: first.as_deref().and_then(parse_timestamp),
            last_run: last.as_deref().and_then(parse_timestamp),
        })
    }
}

/// NaN R² is stored as NULL
fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// What was trained, recorded alongside the metrics
#[derive(Debug, Clone)]
pub struct RunMeta {
    pub dataset: String,
    pub split: String,
}

/// One row of `history`
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub dataset: String,
    pub split: String,
    pub n_train: usize,
    pub n_test: usize,
    pub n_features: usize,
    pub best_model: Option<String>,
    pub best_test_r2: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct StoredModelResult {
    pub model: String,
    pub train: RegressionMetrics,
    pub test: RegressionMetrics,
}

impl StoredModelResult {
    pub fn overfit_gap(&self) -> f64 {
        self.train.r2 - self.test.r2
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub run_count: usize,
    pub prediction_count: usize,
    pub first_run: Option<DateTime<Utc>>,
    pub last_run: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::{ModelKind, ModelResult, Prediction, ResidualSummary};

    fn metrics(n: usize, r2: f64) -> RegressionMetrics {
        RegressionMetrics {
            n,
            r2,
            mae: 0.1,
            rmse: 0.15,
        }
    }

    fn comparison() -> Comparison {
        let predictions = vec![
            Prediction {
                player: "A".to_string(),
                transfer_year: 2023,
                actual: 0.5,
                predicted: 0.4,
            },
            Prediction {
                player: "B".to_string(),
                transfer_year: 2024,
                actual: 0.2,
                predicted: 0.3,
            },
        ];
        let result = |kind: ModelKind, train_r2: f64, test_r2: f64| ModelResult {
            kind,
            train: metrics(10, train_r2),
            test: metrics(2, test_r2),
            residuals: ResidualSummary::from_predictions(&predictions),
            predictions: predictions.clone(),
            weights: Vec::new(),
        };

        Comparison {
            feature_names: vec!["age".to_string(), "fee_adj_m".to_string()],
            n_train: 10,
            n_test: 2,
            results: vec![
                result(ModelKind::LinearRegression, 0.3, 0.1),
                result(ModelKind::RandomForest, 0.9, 0.25),
                result(ModelKind::GradientBoosting, 0.6, f64::NAN),
            ],
        }
    }

    fn meta() -> RunMeta {
        RunMeta {
            dataset: "complete.csv".to_string(),
            split: "chronological".to_string(),
        }
    }

    #[test]
    fn test_create_database() {
        let db = Database::in_memory().unwrap();
        let stats = db.get_stats().unwrap();
        assert_eq!(stats.run_count, 0);
        assert_eq!(stats.prediction_count, 0);
        assert!(stats.first_run.is_none());
    }

    #[test]
    fn test_record_run() {
        let mut db = Database::in_memory().unwrap();
        let run_id = db.record_run(&meta(), &comparison()).unwrap();

        let stats = db.get_stats().unwrap();
        assert_eq!(stats.run_count, 1);
        assert_eq!(stats.prediction_count, 6);
        assert!(stats.last_run.is_some());

        let results = db.model_results(run_id).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].model, "Linear Regression");
        assert_eq!(results[1].test.n, 2);
        assert_eq!(results[1].train.n, 10);
        assert!((results[1].overfit_gap() - 0.65).abs() < 1e-9);
        assert!(results[2].test.r2.is_nan());
    }

    #[test]
    fn test_recent_runs_newest_first() {
        let mut db = Database::in_memory().unwrap();
        let first = db.record_run(&meta(), &comparison()).unwrap();
        let second = db.record_run(&meta(), &comparison()).unwrap();

        let runs = db.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second);
        assert_eq!(runs[1].id, first);
        assert_eq!(runs[0].best_model.as_deref(), Some("Random Forest"));
        assert_eq!(runs[0].best_test_r2, Some(0.25));
        assert_eq!(runs[0].n_features, 2);

        assert_eq!(db.recent_runs(1).unwrap().len(), 1);
    }

    #[test]
    fn test_unknown_run() {
        let db = Database::in_memory().unwrap();
        assert!(db.model_results(42).is_err());
    }
}
