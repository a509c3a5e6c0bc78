/// `load_config` module: merges CLI flags, environment secrets and an optional YAML file into the core `ExportConfig`.
///
/// This module is the only place where untrusted user input is parsed and mapped to the strongly-typed
/// configuration the export pipeline runs with.
///
/// # Responsibilities
/// - Parse the optional YAML file (non-secret settings only; unknown keys, including secrets, are rejected)
/// - Merge, highest precedence first: flags, environment (secrets only), YAML file, defaults
/// - Validate required values, `MM/DD/YYYY` dates and `start <= end`
/// - Produce errors that name the offending flag, surfaced at the CLI boundary
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich diagnostics.
use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use quay_bq_export_core::config::{
    ApiConfig, ExportConfig, RetryPolicy, SinkConfig, WarehouseConfig, DEFAULT_API_URL,
};
use quay_bq_export_core::model::{DateRange, QUERY_DATE_FORMAT};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{error, info};

use crate::cli::ExportArgs;

pub const AUTH_TOKEN_ENV: &str = "QUAY_AUTH_TOKEN";
pub const BIGQUERY_TOKEN_ENV: &str = "BIGQUERY_ACCESS_TOKEN";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Static settings accepted from the YAML file. Every key is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub api_url: Option<String>,
    pub namespace: Option<String>,
    pub repo: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub project_id: Option<String>,
    pub dataset: Option<String>,
    pub table: Option<String>,
    pub create_table: Option<bool>,
    pub bucket: Option<String>,
    pub prefix: Option<String>,
    #[serde(default)]
    pub retry: RetrySection,
    pub poll_interval_secs: Option<u64>,
    pub load_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RetrySection {
    pub max_attempts: Option<u32>,
    pub delay_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
}

pub fn read_file_config<P: AsRef<Path>>(path: P) -> Result<FileConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let parsed: FileConfig = serde_yaml::from_str(&content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML: {e}")
    })?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");
    Ok(parsed)
}

/// Build the run configuration from parsed arguments.
pub fn load_config(args: &ExportArgs) -> Result<ExportConfig> {
    let file = match &args.config {
        Some(path) => read_file_config(path)?,
        None => FileConfig::default(),
    };

    let auth_token = secret(args.auth_token.as_deref(), AUTH_TOKEN_ENV)
        .ok_or_else(|| anyhow!("--auth-token must be specified (or set {AUTH_TOKEN_ENV})"))?;
    let access_token = secret(args.bigquery_token.as_deref(), BIGQUERY_TOKEN_ENV).ok_or_else(
        || anyhow!("--bigquery-token must be specified (or set {BIGQUERY_TOKEN_ENV})"),
    )?;

    let namespace = required(&args.namespace, &file.namespace, "--namespace")?;
    let repository = required(&args.repo, &file.repo, "--repo")?;
    let project_id = required(&args.project_id, &file.project_id, "--project-id")?;
    let dataset = required(&args.dataset, &file.dataset, "--dataset")?;
    let table = required(&args.table, &file.table, "--table")?;
    let bucket = required(&args.bucket, &file.bucket, "--bucket")?;

    let today = Utc::now().date_naive();
    let start = date(pick(&args.start, &file.start), "--start", today)?;
    let end = date(pick(&args.end, &file.end), "--end", today)?;
    if start > end {
        bail!("--start ({start}) must not be after --end ({end})");
    }

    let mut retry = RetryPolicy::default();
    if let Some(attempts) = file.retry.max_attempts {
        if attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        retry.max_attempts = attempts;
    }
    if let Some(secs) = file.retry.delay_secs {
        retry.delay = Duration::from_secs(secs);
    }
    if let Some(secs) = file.retry.timeout_secs {
        if secs == 0 {
            bail!("retry.timeout_secs must be at least 1");
        }
        retry.request_timeout = Duration::from_secs(secs);
    }

    let config = ExportConfig {
        api: ApiConfig {
            base_url: pick(&args.api_url, &file.api_url)
                .unwrap_or(DEFAULT_API_URL)
                .to_string(),
            namespace,
            repository,
            auth_token,
        },
        retry,
        range: DateRange::new(start, end),
        sink: SinkConfig {
            bucket,
            prefix: pick(&args.prefix, &file.prefix).map(str::to_string),
        },
        warehouse: WarehouseConfig {
            project_id,
            dataset,
            table,
            create_table: args.create_table || file.create_table.unwrap_or(false),
            access_token,
            poll_interval: file
                .poll_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_POLL_INTERVAL),
            max_wait: file
                .load_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_LOAD_TIMEOUT),
        },
    };
    config.trace_loaded();
    Ok(config)
}

fn pick<'a>(flag: &'a Option<String>, file: &'a Option<String>) -> Option<&'a str> {
    flag.as_deref()
        .or(file.as_deref())
        .filter(|v| !v.trim().is_empty())
}

fn required(flag: &Option<String>, file: &Option<String>, name: &str) -> Result<String> {
    pick(flag, file)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{name} must be specified"))
}

fn secret(flag: Option<&str>, env_key: &str) -> Option<String> {
    flag.map(str::to_string)
        .or_else(|| std::env::var(env_key).ok())
        .filter(|v| !v.trim().is_empty())
}

fn date(raw: Option<&str>, name: &str, default: NaiveDate) -> Result<NaiveDate> {
    match raw {
        None => Ok(default),
        Some(value) => NaiveDate::parse_from_str(value.trim(), QUERY_DATE_FORMAT)
            .with_context(|| format!("{name} must be a date in MM/DD/YYYY format, got {value:?}")),
    }
}
