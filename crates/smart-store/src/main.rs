//! CLI entry point for the sales ETL.

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use smart_store::{
    ColumnResolver, DataScrubber, LoadReport, Pipeline, PipelineConfig, PreparationReport,
    read_raw_table,
};
use std::path::{Path, PathBuf};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Sales data preparation and warehouse loader",
    long_about = "Prepares raw customer, product and sales files and loads them into a \
                  SQLite star schema.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  RUST_LOG    Overrides --log-level (e.g. smart_store=debug)\n\n\
                  EXAMPLES:\n  \
                  # Prepare data/raw into data/prepared\n  \
                  smart-store prepare\n\n  \
                  # Prepare, then load data/dw/smart_sales.db\n  \
                  smart-store run\n\n  \
                  # Summarise one file as JSON\n  \
                  smart-store inspect data/raw/sales_data.csv"
)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the raw entity files
    #[arg(long, global = true)]
    raw_dir: Option<PathBuf>,

    /// Directory the prepared files are written to
    #[arg(long, global = true)]
    prepared_dir: Option<PathBuf>,

    /// Warehouse SQLite file
    #[arg(long, global = true)]
    warehouse: Option<PathBuf>,

    /// Enforce warehouse foreign keys during the load
    #[arg(long, global = true)]
    enforce_foreign_keys: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, default_value = "info")]
    log_level: String,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare the raw entity files
    Prepare,
    /// Load the prepared files into the warehouse
    Load,
    /// Prepare, then load
    Run,
    /// Print the structural and statistical summary of a file as JSON
    Inspect {
        /// File to summarise
        file: PathBuf,
    },
}

/// Initialize the tracing subscriber for logging.
fn init_logging(level: &str, quiet: bool) {
    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Merge the configuration file (or defaults) with command line overrides.
fn build_config(args: &Args) -> Result<PipelineConfig> {
    let base = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };

    let mut builder = PipelineConfig::builder()
        .raw_dir(args.raw_dir.clone().unwrap_or(base.raw_dir))
        .prepared_dir(args.prepared_dir.clone().unwrap_or(base.prepared_dir))
        .warehouse_path(args.warehouse.clone().unwrap_or(base.warehouse_path))
        .entities(base.entities)
        .outlier_iqr_multiplier(base.outlier_iqr_multiplier);

    if args.enforce_foreign_keys || base.enforce_foreign_keys {
        builder = builder.enforce_foreign_keys(true);
    }

    Ok(builder.build()?)
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file
    dotenv().ok();

    init_logging(&args.log_level, args.quiet);

    if let Command::Inspect { file } = &args.command {
        return inspect(file);
    }

    let pipeline = Pipeline::new(build_config(&args)?)?;

    match args.command {
        Command::Prepare => {
            let report = pipeline.prepare()?;
            print_preparation(&report);
            if !report.any_prepared() {
                return Err(anyhow!("No entity could be prepared"));
            }
        }
        Command::Load => {
            let report = pipeline.load()?;
            print_load(&report);
        }
        Command::Run => {
            let report = pipeline.run()?;
            print_preparation(&report.preparation);
            match report.load {
                Some(load) => print_load(&load),
                None => {
                    error!("Warehouse load skipped");
                    return Err(anyhow!(
                        "{} entities failed preparation",
                        report.preparation.failures.len()
                    ));
                }
            }
        }
        Command::Inspect { .. } => {}
    }

    Ok(())
}

/// Summarise a raw or prepared file.
///
/// Repeated headers are collapsed to their first occurrence before the
/// summary is built.
fn inspect(file: &Path) -> Result<()> {
    info!("Inspecting {}", file.display());
    let raw = read_raw_table(file)?;
    let headers = raw.headers();
    let resolution = ColumnResolver::resolve(&raw, &headers)?;
    let typed = DataScrubber::infer_column_types(&resolution.frame)?;
    let summary = DataScrubber::inspect_data(&typed)?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Print the preparation outcome.
///
/// Uses `println!` on purpose: this is the command's output, independent of
/// the log level.
fn print_preparation(report: &PreparationReport) {
    println!();
    println!("{}", "=".repeat(80));
    println!("PREPARATION");
    println!("{}", "=".repeat(80));

    for prepared in &report.prepared {
        println!(
            "  {:<10} {} -> {} rows ({} after dedup)  {}",
            prepared.entity.to_string(),
            prepared.rows_before,
            prepared.rows_after,
            prepared.rows_after_dedup,
            prepared.output_path.display()
        );
        if !prepared.duplicates_collapsed.is_empty() {
            println!("             collapsed columns: {:?}", prepared.duplicates_collapsed);
        }
        if !prepared.date_columns_skipped.is_empty() {
            println!("             date columns left as-is: {:?}", prepared.date_columns_skipped);
        }
    }

    for failure in &report.failures {
        println!("  ! {:<8} [{}] {}", failure.entity.to_string(), failure.code, failure.message);
    }
    println!();
}

fn print_load(report: &LoadReport) {
    println!("{}", "=".repeat(80));
    println!("WAREHOUSE LOADED");
    println!("{}", "=".repeat(80));
    println!("  customer: {} rows", report.customers);
    println!("  product:  {} rows", report.products);
    println!("  sale:     {} rows", report.sales);
    println!();
}
