///
/// This module implements the CLI interface for quay-bq-export: command parsing,
/// argument exposure, the async entrypoint and the exit policy.
///
/// All pipeline logic (fetching, planning, writing, loading) lives in the
/// [`quay-bq-export-core`] crate. This module wires the concrete clients together
/// and turns the run report into a process result.
///
/// ## Features
/// - Entry struct [`Cli`] with the `export` subcommand.
/// - Async entrypoint [`run`] for programmatic invocation and integration testing.
/// - A run fails when the load job fails, or when any day failed and
///   `--allow-partial` was not given.
///
/// [`quay-bq-export-core`]: ../../quay_bq_export_core/
use crate::load_config::load_config;
use crate::warehouse::BigQueryWarehouse;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use quay_bq_export_core::export::{export, ExportReport};
use quay_bq_export_core::fetch::{HttpTransport, PageFetcher};
use quay_bq_export_core::sink::ObjectStoreSink;
use std::path::PathBuf;
use std::sync::Arc;

/// CLI for quay-bq-export: copy repository logs into BigQuery via GCS.
#[derive(Parser, Debug)]
#[clap(
    name = "quay-bq-export",
    version,
    about = "Export quay.io repository logs to Google Cloud Storage and load them into BigQuery"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export every day in a date range that is not already in the bucket, then load it
    Export(ExportArgs),
}

#[derive(Args, Debug, Default, Clone)]
pub struct ExportArgs {
    /// Quay API token (falls back to QUAY_AUTH_TOKEN)
    #[arg(long)]
    pub auth_token: Option<String>,
    /// First day to export, MM/DD/YYYY (default: today, UTC)
    #[arg(long)]
    pub start: Option<String>,
    /// Last day to export, MM/DD/YYYY, inclusive (default: today, UTC)
    #[arg(long)]
    pub end: Option<String>,
    /// Repository namespace, e.g. `jetstack`
    #[arg(long)]
    pub namespace: Option<String>,
    /// Repository name within the namespace
    #[arg(long)]
    pub repo: Option<String>,
    /// Google Cloud project holding the dataset
    #[arg(long)]
    pub project_id: Option<String>,
    #[arg(long)]
    pub dataset: Option<String>,
    #[arg(long)]
    pub table: Option<String>,
    /// GCS bucket receiving the daily extracts
    #[arg(long)]
    pub bucket: Option<String>,
    /// Object name prefix inside the bucket
    #[arg(long)]
    pub prefix: Option<String>,
    /// Create the table on load when it does not exist
    #[arg(long)]
    pub create_table: bool,
    /// Exit successfully even when some days failed to export
    #[arg(long)]
    pub allow_partial: bool,
    /// Base URL of the quay API (default: https://quay.io)
    #[arg(long)]
    pub api_url: Option<String>,
    /// OAuth access token for BigQuery (falls back to BIGQUERY_ACCESS_TOKEN)
    #[arg(long)]
    pub bigquery_token: Option<String>,
    /// Path to a YAML file with non-secret settings
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Export(args) => {
            let config = load_config(&args)?;
            tracing::info!(command = "export", "Starting export");

            let transport = HttpTransport::with_timeout(config.retry.request_timeout)?;
            let fetcher = PageFetcher::new(transport, config.api.clone(), config.retry);
            let sink = ObjectStoreSink::gcs(config.sink.clone())?;
            let warehouse = BigQueryWarehouse::new(config.warehouse.clone());

            match export(config.range, Arc::new(fetcher), Arc::new(sink), &warehouse).await {
                Ok(report) => finish(&report, args.allow_partial),
                Err(e) => {
                    tracing::error!(command = "export", error = %e, "Export failed");
                    Err(anyhow::Error::new(e).context("export failed"))
                }
            }
        }
    }
}

/// Turn a finished report into the process result.
pub fn finish(report: &ExportReport, allow_partial: bool) -> Result<()> {
    let dropped = report.dropped_summary();
    if !dropped.is_empty() {
        tracing::warn!(command = "export", dropped = ?dropped, "Entries outside their requested day were not exported");
    }

    if report.is_complete() {
        tracing::info!(
            command = "export",
            days = report.run.days.len(),
            skipped = report.plan.existing.len(),
            entries = report.run.total_entries(),
            "Export complete"
        );
        return Ok(());
    }

    let failures = report.failure_summary();
    if allow_partial {
        tracing::warn!(command = "export", failures = ?failures, "Export finished with failures (allowed)");
        return Ok(());
    }
    tracing::error!(command = "export", failures = ?failures, "Export finished with failures");
    Err(anyhow::anyhow!(
        "{} day(s) failed to export:\n  {}",
        report.failed_days().len() + report.plan.probe_failures.len(),
        failures.join("\n  ")
    ))
}
