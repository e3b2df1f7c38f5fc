//! Transfer Performance CLI
//!
//! Prepares the merged transfer dataset and runs the three-model bake-off.

use clap::{Parser, Subcommand};
use transfers::{Config, Result, SplitStrategy};

#[derive(Parser)]
#[command(name = "transfers")]
#[command(about = "Predict post-transfer goals+assists per 90 with three regression models", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "transfers.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data preparation commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Train and compare the three models
    Train {
        /// Split strategy (chronological or random)
        #[arg(long)]
        split: Option<SplitStrategy>,
        /// Merged dataset CSV (defaults to data.dataset_path)
        #[arg(long)]
        dataset: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
        /// Do not record the run in the database
        #[arg(long)]
        no_save: bool,
    },
    /// List recorded training runs
    History {
        /// Number of runs to show
        #[arg(long, default_value = "10")]
        limit: usize,
        /// Show per-model metrics for one run
        #[arg(long)]
        run: Option<i64>,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Stack the Transfermarkt exports and apply the fee/position filter
    CombineTransfers,
    /// Stack the FBref standard-stats exports
    CombineFbref,
    /// Clean the combined FBref table
    CleanFbref,
    /// Match filtered transfers to the seasons either side of the move
    Match,
    /// Show dataset and database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::CombineTransfers => commands::combine_transfers(&config),
            DataCommands::CombineFbref => commands::combine_fbref(&config),
            DataCommands::CleanFbref => commands::clean_fbref(&config),
            DataCommands::Match => commands::match_transfers(&config),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Train {
            split,
            dataset,
            format,
            no_save,
        } => commands::train(&config, split, dataset, format, no_save),
        Commands::History { limit, run } => commands::history(&config, limit, run),
        Commands::Init => commands::init(&cli.config, &Config::default()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use std::path::{Path, PathBuf};
    use transfers::data::database::RunMeta;
    use transfers::data::table::Table;
    use transfers::data::{dataset, fbref, matching, transfers as tm};
    use transfers::data::{Database, TransferDataset};
    use transfers::features::FeatureBuilder;
    use transfers::report::{self, format_r2, RunReport};
    use transfers::training::{self, train_all_models};

    const ALL_TRANSFERS: &str = "all_transfers_combined.csv";
    const FILTERED_TRANSFERS: &str = "transfers_filtered.csv";
    const FBREF_RAW: &str = "fbref_stats_raw.csv";
    const FBREF_CLEANED: &str = "fbref_cleaned.csv";
    const MATCHED_ALL: &str = "transfers_matched_all.csv";
    const MATCHED_COMPLETE: &str = "transfers_matched_complete.csv";
    const UNMATCHED: &str = "transfers_unmatched.csv";

    fn processed(config: &Config, name: &str) -> PathBuf {
        Path::new(&config.data.processed_dir).join(name)
    }

    fn millions(fee: f64) -> String {
        format!("€{:.1}M", fee / 1_000_000.0)
    }

    pub fn init(config_path: &str, config: &Config) -> Result<()> {
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        for dir in [
            &config.data.transfers_dir,
            &config.data.fbref_dir,
            &config.data.processed_dir,
            &config.data.results_dir,
        ] {
            std::fs::create_dir_all(dir)?;
        }
        println!(
            "Created {}, {}, {} and {}",
            config.data.transfers_dir,
            config.data.fbref_dir,
            config.data.processed_dir,
            config.data.results_dir
        );

        println!("\nNext steps:");
        println!(
            "  1. Put Transfermarkt exports in {} and FBref exports in {}",
            config.data.transfers_dir, config.data.fbref_dir
        );
        println!("  2. Run 'transfers data combine-transfers', 'combine-fbref', 'clean-fbref', 'match'");
        println!("  3. Run 'transfers train' to compare the models");

        Ok(())
    }

    pub fn combine_transfers(config: &Config) -> Result<()> {
        println!("Combining transfer files from {}...", config.data.transfers_dir);
        let combined = tm::combine_transfer_files(Path::new(&config.data.transfers_dir))?;
        let path = processed(config, ALL_TRANSFERS);
        combined.write(&path)?;
        println!("Wrote {} transfers to {}", combined.len(), path.display());

        let filter = tm::TransferFilter::from_config(&config.filter)?;
        let records = tm::records_from_table(&combined, ALL_TRANSFERS)?;
        let filtered = tm::filter_transfers(&records, &filter);

        let path = processed(config, FILTERED_TRANSFERS);
        filter.apply(&combined).write(&path)?;

        let summary = tm::TransferSummary::new(records.len(), &filtered);
        println!("\nTransfer Summary");
        println!("───────────────────────────────");
        println!("  Total:      {}", summary.total);
        println!(
            "  Filtered:   {} (fee ≥ {}, position ~ {})",
            summary.filtered,
            millions(config.filter.min_fee),
            config.filter.position_pattern
        );
        println!("  Mean fee:   {}", millions(summary.mean_fee));
        println!("  Median fee: {}", millions(summary.median_fee));
        println!("  Max fee:    {}", millions(summary.max_fee));

        println!("\nBy league:");
        for (league, count) in &summary.by_league {
            println!("  {:<20} {}", league, count);
        }
        println!("\nBy position:");
        for (position, count) in &summary.by_position {
            println!("  {:<20} {}", position, count);
        }

        println!("\nTop transfers:");
        for r in tm::top_by_fee(&filtered, 20) {
            println!(
                "  {:<28} {:>9}  {} ({})",
                r.player,
                millions(r.fee.unwrap_or(0.0)),
                r.league,
                r.transfer_year.map(|y| y.to_string()).unwrap_or_default()
            );
        }

        println!("\nWrote filtered transfers to {}", path.display());
        Ok(())
    }

    pub fn combine_fbref(config: &Config) -> Result<()> {
        println!("Combining FBref files from {}...", config.data.fbref_dir);
        let combined = fbref::combine_fbref_files(Path::new(&config.data.fbref_dir))?;
        let path = processed(config, FBREF_RAW);
        combined.write(&path)?;
        println!(
            "Wrote {} player-season rows ({} columns) to {}",
            combined.len(),
            combined.headers.len(),
            path.display()
        );
        Ok(())
    }

    pub fn clean_fbref(config: &Config) -> Result<()> {
        let raw = Table::read(processed(config, FBREF_RAW))?;
        let (stats, report) = fbref::clean_fbref(&raw)?;

        println!("FBref Cleaning");
        println!("───────────────────────────────");
        println!("  Input rows:      {}", report.input_rows);
        println!("  Missing player:  {}", report.missing_player);
        println!("  Missing age:     {}", report.missing_age);
        println!("  Duplicates:      {}", report.duplicates);
        println!("  Output rows:     {}", report.output_rows);

        println!("\nBy league:");
        for (league, count) in fbref::distinct(&stats, |s| s.league.as_str()) {
            println!("  {:<20} {}", league, count);
        }
        println!("\nBy season:");
        for (season, count) in fbref::distinct(&stats, |s| s.season.as_str()) {
            println!("  {:<20} {}", season, count);
        }

        let path = processed(config, FBREF_CLEANED);
        fbref::stats_to_table(&stats).write(&path)?;
        println!("\nWrote cleaned stats to {}", path.display());
        Ok(())
    }

    pub fn match_transfers(config: &Config) -> Result<()> {
        let transfers = tm::records_from_table(
            &Table::read(processed(config, FILTERED_TRANSFERS))?,
            FILTERED_TRANSFERS,
        )?;
        let stats = fbref::stats_from_table(&Table::read(processed(config, FBREF_CLEANED))?)?;
        println!(
            "Matching {} transfers against {} player-seasons...",
            transfers.len(),
            stats.len()
        );

        let outcome =
            matching::match_transfers(&transfers, &stats, config.matching.fuzzy_threshold)?;
        let report = outcome.report();

        println!("\nMatch Report");
        println!("───────────────────────────────");
        println!("  Transfers:     {}", report.total);
        println!(
            "  Matched:       {} ({:.1}%)",
            report.matched,
            report.match_pct()
        );
        println!("  Complete:      {}", report.complete);
        println!("  Before only:   {}", report.before_only);
        println!("  After only:    {}", report.after_only);
        println!("  Unmatched:     {}", report.unmatched);
        println!("  Fuzzy matches: {}", outcome.fuzzy_matches);
        if outcome.without_year + outcome.without_fee > 0 {
            println!(
                "  Skipped:       {} without year, {} without fee",
                outcome.without_year, outcome.without_fee
            );
        }

        println!("\nBy league:");
        for l in &report.leagues {
            println!(
                "  {:<20} {:>4} matched, {:>4} complete ({:.1}%)",
                l.league,
                l.matched,
                l.complete,
                l.complete_pct()
            );
        }

        let changes = outcome.change_summaries();
        if let Some(first) = changes.first() {
            println!("\nPerformance changes (complete matches, n={}):", first.n);
            for c in &changes {
                println!(
                    "  {:<13} mean {:+.3}, median {:+.3}, improved {} ({:.1}%), declined {} ({:.1}%)",
                    c.stat,
                    c.mean,
                    c.median,
                    c.improved,
                    c.improved_pct(),
                    c.declined,
                    c.declined_pct()
                );
            }
        }

        let complete = outcome.complete();
        let outputs = [
            (MATCHED_ALL, dataset::matched_to_table(&outcome.matched, true)),
            (MATCHED_COMPLETE, dataset::matched_to_table(&complete, true)),
            (UNMATCHED, matching::unmatched_to_table(&outcome.unmatched)),
        ];
        println!();
        for (name, table) in outputs {
            let path = processed(config, name);
            table.write(&path)?;
            println!("Wrote {} rows to {}", table.len(), path.display());
        }

        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        println!("Dataset Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.dataset_path);
        if Path::new(&config.data.dataset_path).exists() {
            let summary = TransferDataset::load(&config.data.dataset_path)?.summary();
            println!("  Records:  {}", summary.records);
            if summary.dropped_missing_target > 0 {
                println!("  Dropped:  {} (no target)", summary.dropped_missing_target);
            }
            if let (Some(first), Some(last)) = (summary.first_year, summary.last_year) {
                println!("  Years:    {} to {}", first, last);
            }
            for (league, count) in &summary.by_league {
                println!("    {:<18} {}", league, count);
            }
        } else {
            println!("  Not built yet. Run 'transfers data match'.");
        }

        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("\nDatabase Status");
        println!("───────────────────────────────");
        println!("  Path:        {}", config.data.database_path);
        println!("  Runs:        {}", stats.run_count);
        println!("  Predictions: {}", stats.prediction_count);
        if let (Some(first), Some(last)) = (stats.first_run, stats.last_run) {
            println!(
                "  Range:       {} to {}",
                first.format("%Y-%m-%d %H:%M"),
                last.format("%Y-%m-%d %H:%M")
            );
        }

        Ok(())
    }

    pub fn train(
        config: &Config,
        split: Option<SplitStrategy>,
        dataset: Option<String>,
        format: OutputFormat,
        no_save: bool,
    ) -> Result<()> {
        let dataset_path = dataset.unwrap_or_else(|| config.data.dataset_path.clone());
        let strategy = split.unwrap_or(config.split.strategy);

        let data = TransferDataset::load(&dataset_path)?;
        let builder = FeatureBuilder::from_config(&config.features)?;
        let table = builder.build(&data)?;

        let split = training::split(&table, &config.split, strategy)?;
        let comparison = train_all_models(&config.models, &split.train, &split.test)?;

        let description = split.describe();
        let run_report = RunReport::new(&dataset_path, strategy, &description, &comparison);

        match format {
            OutputFormat::Table => {
                println!("{}", description);
                println!();
                print!(
                    "{}",
                    report::format_report(
                        &comparison,
                        config.report.top_features,
                        config.report.overfit_gap_threshold
                    )
                );
            }
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&run_report)?);
            }
            OutputFormat::Csv => {
                report::write_metrics_csv(&comparison, std::io::stdout().lock())?;
            }
        }

        report::write_results(&config.data.results_dir, &run_report)?;

        if !no_save {
            let mut db = Database::open(&config.data.database_path)?;
            let meta = RunMeta {
                dataset: dataset_path,
                split: strategy.to_string(),
            };
            let run_id = db.record_run(&meta, &comparison)?;
            log::info!("Recorded run {} in {}", run_id, config.data.database_path);
        }

        Ok(())
    }

    pub fn history(config: &Config, limit: usize, run: Option<i64>) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;

        if let Some(run_id) = run {
            println!("Run {}", run_id);
            println!("───────────────────────────────");
            for r in db.model_results(run_id)? {
                println!("  {}", r.model);
                println!("    Train  {}", r.train);
                println!("    Test   {}", r.test);
                println!("    Gap    {}", format_r2(r.overfit_gap()));
            }
            return Ok(());
        }

        let runs = db.recent_runs(limit)?;
        if runs.is_empty() {
            println!("No runs recorded. Run 'transfers train' first.");
            return Ok(());
        }

        println!(
            "{:>4}  {:<16}  {:<13}  {:>5}  {:>5}  {:<17}  {:>8}",
            "ID", "When", "Split", "Train", "Test", "Best model", "Test R²"
        );
        println!("{}", "─".repeat(80));
        for r in runs {
            println!(
                "{:>4}  {:<16}  {:<13}  {:>5}  {:>5}  {:<17}  {:>8}",
                r.id,
                r.created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default(),
                r.split,
                r.n_train,
                r.n_test,
                r.best_model.unwrap_or_else(|| "-".to_string()),
                r.best_test_r2.map(format_r2).unwrap_or_else(|| "n/a".to_string()),
            );
        }

        Ok(())
    }
}
