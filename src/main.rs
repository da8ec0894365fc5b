use loyalty_prep::ml_ready::to_ml_ready;
use loyalty_prep::sample::{sample_rows, DEFAULT_SEED};
use loyalty_prep::sink::{export_records, ExportOptions, SqliteSink};
use loyalty_prep::table_io::{load_csv, write_csv};
use loyalty_prep::{LoyaltyPipeline, PipelineConfig};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "loyalty-prep")]
#[command(about = "Cleans loyalty-program transactions and builds customer summaries")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clean a transaction CSV and build the customer summary
    Process {
        /// Raw transaction CSV
        input: PathBuf,

        /// JSON pipeline config
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory for the output tables (overrides the config)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Do not write output tables
        #[arg(long)]
        no_save: bool,
    },
    /// Write a random sample of rows to a new CSV
    Sample {
        input: PathBuf,

        output: PathBuf,

        /// Number of rows to keep
        #[arg(short, long, default_value_t = 80_000)]
        n: usize,

        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,
    },
    /// Convert every column to a float and fill gaps with 0
    MlReady { input: PathBuf, output: PathBuf },
    /// Push rows of a CSV into a SQLite key-value table
    Export {
        input: PathBuf,

        /// SQLite database file
        #[arg(long)]
        db: PathBuf,

        #[arg(long, default_value = "CustomerProfiles")]
        table: String,

        /// Column used as the record key
        #[arg(long, default_value = "user_id")]
        key: String,

        /// Name of the key field in exported records
        #[arg(long)]
        rename_key: Option<String>,

        /// Export only the first N rows
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Commands::Process {
            input,
            config,
            output_dir,
            no_save,
        } => run_process(input, config, output_dir, no_save),
        Commands::Sample {
            input,
            output,
            n,
            seed,
        } => run_sample(input, output, n, seed),
        Commands::MlReady { input, output } => run_ml_ready(input, output),
        Commands::Export {
            input,
            db,
            table,
            key,
            rename_key,
            limit,
        } => run_export(input, db, table, key, rename_key, limit),
    }
}

fn run_process(
    input: PathBuf,
    config_path: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    no_save: bool,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = output_dir {
        config.output_dir = dir;
    }
    if no_save {
        config.save_results = false;
    }

    println!("{}", "=".repeat(60));
    println!(" LOYALTY DATA PROCESSING PIPELINE");
    println!("{}", "=".repeat(60));

    let pipeline = LoyaltyPipeline::new(config);
    let output = pipeline
        .run(&input)
        .with_context(|| format!("Pipeline failed for {}", input.display()))?;

    if pipeline.config().save_results {
        println!("\nFiles saved:");
        println!(
            "  - {} {:?}",
            pipeline.config().cleaned_path().display(),
            output.cleaned.shape()
        );
        match &output.summary {
            Some(summary) => println!(
                "  - {} {:?}",
                pipeline.config().summary_path().display(),
                summary.shape()
            ),
            None => println!("  - {} (N/A)", pipeline.config().summary_path().display()),
        }
    }

    println!("\n{}", output.report);
    let cleaning =
        serde_json::to_string(&output.cleaning).context("Failed to serialize cleaning report")?;
    info!("Cleaning report: {}", cleaning);
    Ok(())
}

fn run_sample(input: PathBuf, output: PathBuf, n: usize, seed: u64) -> Result<()> {
    let df = load_csv(&input).context("Failed to load input")?;
    println!("Original data shape: {:?}", df.shape());

    let mut sampled = sample_rows(&df, n, seed)?;
    println!("Sampled data shape: {:?}", sampled.shape());

    write_csv(&mut sampled, &output).context("Failed to write sample")?;
    println!("Saved random {} rows to {}", n, output.display());
    Ok(())
}

fn run_ml_ready(input: PathBuf, output: PathBuf) -> Result<()> {
    let df = load_csv(&input).context("Failed to load input")?;
    let mut ready = to_ml_ready(&df)?;
    println!("Shape: {:?}", ready.shape());

    write_csv(&mut ready, &output).context("Failed to write ML-ready table")?;
    println!("Saved as {}", output.display());
    Ok(())
}

fn run_export(
    input: PathBuf,
    db: PathBuf,
    table: String,
    key: String,
    rename_key: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let df = load_csv(&input).context("Failed to load input")?;
    let mut sink = SqliteSink::open(&db, &table)
        .with_context(|| format!("Failed to open {}", db.display()))?;

    let options = ExportOptions {
        key_column: key,
        rename_key,
        limit,
    };
    let summary = export_records(&df, &options, &mut sink)?;
    println!(
        "{} rows ingested into {} ({} skipped without key, {} failed)",
        summary.records_written, table, summary.missing_key, summary.failed
    );
    Ok(())
}
