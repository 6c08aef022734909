use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossfade::config::AppConfig;
use crossfade::pipeline::{self, RunManifest};
use crossfade::store::{CsvStore, Stage};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "crossfade", version, about = "Music catalog cleaning and merging pipeline")]
struct Cli {
    /// Directory holding the data, cleaned_data and merged_data directories
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pull the raw catalog tables out of the SQLite warehouse
    Extract {
        /// Warehouse database (defaults to config `warehouse`)
        #[arg(long)]
        warehouse: Option<PathBuf>,
    },

    /// Clean the raw tables into cleaned_data/
    Clean {
        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Merge the cleaned tables into the final views
    Merge {
        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Extract (when a warehouse is configured), clean and merge
    Run {
        /// Warehouse database (defaults to config `warehouse`)
        #[arg(long)]
        warehouse: Option<PathBuf>,

        /// Number of parallel workers (0 = auto-detect from config)
        #[arg(short = 'j', long, default_value = "0")]
        jobs: usize,
    },

    /// Show row counts for every stage and the last completed run
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load config file (optional, defaults if missing)
    let config = AppConfig::load();

    // Resolve data root: CLI > config > current directory
    let root = cli.root.clone().unwrap_or_else(|| config.resolve_root());
    log::info!("Data root: {}", root.display());
    let store = CsvStore::new(root, config.layout.clone());

    let workers = |jobs: usize| if jobs > 0 { jobs } else { config.resolve_workers() };

    match cli.command {
        Commands::Extract { warehouse } => {
            let warehouse = warehouse
                .or(config.warehouse.clone())
                .context("No warehouse given. Pass --warehouse or set `warehouse` in config.")?;
            let counts = pipeline::extract(&store, &warehouse).context("Extraction failed")?;
            for (table, rows) in &counts {
                println!("{:<24} {:>8} rows", table, rows);
            }
            println!("Extraction complete: {} tables saved", counts.len());
        }

        Commands::Clean { jobs } => {
            let tables = pipeline::clean(&store, workers(jobs)).context("Cleaning failed")?;
            for (table, rows) in tables.counts() {
                println!("{:<28} {:>8} rows", table, rows);
            }
            println!("Data cleaning completed successfully.");
        }

        Commands::Merge { jobs } => {
            let manifest = pipeline::merge(&store, workers(jobs)).context("Merging failed")?;
            print_manifest(&manifest);
            println!("All data merging tasks completed successfully.");
        }

        Commands::Run { warehouse, jobs } => {
            let warehouse = warehouse.or(config.warehouse.clone());
            let manifest = pipeline::run(&store, warehouse.as_deref(), workers(jobs))
                .context("Pipeline run failed")?;
            print_manifest(&manifest);
            println!("Pipeline completed successfully.");
        }

        Commands::Stats => {
            let stats = pipeline::table_stats(&store).context("Failed to count rows")?;
            println!("{:<8} {:<28} {:>8}", "Stage", "Table", "Rows");
            println!("{}", "-".repeat(46));
            for s in &stats {
                let rows = s
                    .rows
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<8} {:<28} {:>8}", s.stage.label(), s.name, rows);
            }
            println!();

            match pipeline::read_manifest(&store).context("Failed to read manifest")? {
                Some(m) => println!("Last complete run: {}", m.completed_at.to_rfc3339()),
                None => println!(
                    "No complete run recorded in {}.",
                    store.dir(Stage::Merged).display()
                ),
            }
        }
    }

    Ok(())
}

/// Print the row counts recorded in a run manifest.
fn print_manifest(manifest: &RunManifest) {
    println!("{:<28} {:>8}", "Table", "Rows");
    println!("{}", "-".repeat(37));
    for (table, rows) in &manifest.tables {
        println!("{:<28} {:>8}", table, rows);
    }
    println!();
    println!("Completed at {}", manifest.completed_at.to_rfc3339());
}
