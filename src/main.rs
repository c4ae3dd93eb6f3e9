//! GraphShift CLI — migrate a MySQL database to Dgraph RDF.

use clap::{Parser, ValueEnum};
use comfy_table::{ContentArrangement, Table};
use graphshift::config::Config;
use graphshift::pipeline::{Pipeline, RunOutcome};
use graphshift::validate::ValidationSummary;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "graphshift", version, about = "MySQL to Dgraph migration engine")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, default_value = "config/config.yaml", env = "GRAPHSHIFT_CONFIG")]
    config: PathBuf,

    /// Pipeline execution mode
    #[arg(long, value_enum, default_value = "full")]
    mode: Mode,

    /// Specific tables to process (comma-separated, empty = all)
    #[arg(long, default_value = "")]
    tables: String,

    /// Number of parallel workers (overrides config)
    #[arg(long)]
    parallel: Option<usize>,

    /// Rows per batch (overrides config)
    #[arg(long)]
    batch_size: Option<u64>,

    /// Analyze without writing output
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Extract the MySQL schema and generate the Dgraph schema
    Schema,
    /// Stream table data to RDF
    Data,
    /// Schema + data + validation
    Full,
    /// Validate source integrity and output files
    Validate,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(parallel) = cli.parallel {
        config.pipeline.workers = parallel;
    }
    if let Some(batch_size) = cli.batch_size {
        config.pipeline.batch_size = batch_size;
    }
    if cli.dry_run {
        config.pipeline.dry_run = true;
    }

    if let Err(e) = graphshift::logging::init(&config.logger) {
        eprintln!("Error: failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        version = graphshift::version(),
        workers = config.pipeline.workers,
        batch_size = config.pipeline.batch_size,
        dry_run = config.pipeline.dry_run,
        "starting graphshift"
    );

    let pipeline = match Pipeline::connect(config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    // First Ctrl-C requests a graceful drain; a second one kills the
    // process the hard way.
    let shutdown = pipeline.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received, draining");
            shutdown.cancel();
        }
        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });

    let code = match cli.mode {
        Mode::Schema => match pipeline.run_schema().await {
            Ok(()) => {
                info!("schema generation completed");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!("schema generation failed: {e}");
                ExitCode::FAILURE
            }
        },
        Mode::Data => match pipeline.run_data(&cli.tables).await {
            Ok(outcome) => report_outcome(outcome),
            Err(e) => {
                error!("data migration failed: {e}");
                ExitCode::FAILURE
            }
        },
        Mode::Full => match pipeline.run_full(&cli.tables).await {
            Ok(outcome) => report_outcome(outcome),
            Err(e) => {
                error!("pipeline failed: {e}");
                ExitCode::FAILURE
            }
        },
        Mode::Validate => match pipeline.run_validate().await {
            Ok(summary) => {
                print_validation_summary(&summary);
                if summary.is_success() {
                    ExitCode::SUCCESS
                } else {
                    error!(
                        "validation failed: {}/{} checks failed",
                        summary.failed(),
                        summary.total()
                    );
                    ExitCode::FAILURE
                }
            }
            Err(e) => {
                error!("validation failed: {e}");
                ExitCode::FAILURE
            }
        },
    };

    pipeline.close().await;
    code
}

fn report_outcome(outcome: RunOutcome) -> ExitCode {
    let stats = outcome.stats();
    match &outcome {
        RunOutcome::Completed(_) => {
            info!(
                rows = stats.processed_rows,
                triples = stats.triples,
                failed_batches = stats.failed_batches,
                "migration completed"
            );
            ExitCode::SUCCESS
        }
        RunOutcome::Cancelled(_) => {
            info!(
                rows = stats.processed_rows,
                triples = stats.triples,
                "migration cancelled; partial output finalized"
            );
            ExitCode::SUCCESS
        }
    }
}

fn print_validation_summary(summary: &ValidationSummary) {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Check", "Status", "Expected", "Actual"]);

    for check in summary.checks() {
        table.add_row(vec![
            check.name.clone(),
            if check.passed { "PASS" } else { "FAIL" }.to_string(),
            check.expected.clone(),
            check.actual.clone(),
        ]);
    }

    println!("{table}");
    println!(
        "{} check(s): {} passed, {} failed",
        summary.total(),
        summary.passed(),
        summary.failed()
    );
}
