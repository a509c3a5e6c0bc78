//! # BigQuery warehouse client
//!
//! Implements the core [`Warehouse`] trait against the BigQuery v2 REST API.
//! A load is one `jobs.insert` carrying a load configuration for every
//! source URI, followed by `jobs.get` polling until the job reports `DONE`.
//!
//! - The job id is generated client side (`quay_logs_<uuid>`) so a retried
//!   submission can be recognised in the BigQuery console.
//! - `errorResult` on a finished job is a failed load.
//! - Request bodies and status interpretation are plain functions, kept
//!   separate from the HTTP calls so they can be tested without a network.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use quay_bq_export_core::config::WarehouseConfig;
use quay_bq_export_core::contract::{LoadJobResult, Warehouse};
use quay_bq_export_core::ExportError;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, error, info};
use uuid::Uuid;

pub const DEFAULT_BIGQUERY_URL: &str = "https://bigquery.googleapis.com/bigquery/v2";

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobInsert {
    pub job_reference: JobReference,
    pub configuration: JobConfiguration,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobReference {
    pub project_id: String,
    pub job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct JobConfiguration {
    pub load: LoadConfiguration,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoadConfiguration {
    pub source_uris: Vec<String>,
    pub source_format: &'static str,
    pub autodetect: bool,
    pub write_disposition: &'static str,
    pub create_disposition: &'static str,
    pub destination_table: TableReference,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TableReference {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

/// The subset of a BigQuery `Job` resource the client reads.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_reference: Option<JobReference>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    #[serde(default)]
    pub state: String,
    pub error_result: Option<ErrorProto>,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ErrorProto {
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct JobStatistics {
    pub load: Option<LoadStatistics>,
}

/// BigQuery encodes int64 counters as JSON strings.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LoadStatistics {
    pub output_rows: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    Done { output_rows: Option<u64> },
    Failed(String),
}

impl JobResponse {
    pub fn state(&self) -> JobState {
        if self.status.state != "DONE" {
            return JobState::Running;
        }
        if let Some(err) = &self.status.error_result {
            let mut message = format!("{}: {}", err.reason, err.message);
            for extra in self.status.errors.iter().filter(|e| e.message != err.message) {
                message.push_str(&format!("; {}", extra.message));
            }
            return JobState::Failed(message);
        }
        let output_rows = self
            .statistics
            .as_ref()
            .and_then(|s| s.load.as_ref())
            .and_then(|l| l.output_rows.as_deref())
            .and_then(|rows| rows.parse().ok());
        JobState::Done { output_rows }
    }
}

pub fn new_job_id() -> String {
    format!("quay_logs_{}", Uuid::new_v4().simple())
}

pub fn load_job_request(
    config: &WarehouseConfig,
    job_id: &str,
    source_uris: Vec<String>,
) -> JobInsert {
    JobInsert {
        job_reference: JobReference {
            project_id: config.project_id.clone(),
            job_id: job_id.to_string(),
            location: None,
        },
        configuration: JobConfiguration {
            load: LoadConfiguration {
                source_uris,
                source_format: "NEWLINE_DELIMITED_JSON",
                autodetect: true,
                write_disposition: "WRITE_APPEND",
                create_disposition: if config.create_table {
                    "CREATE_IF_NEEDED"
                } else {
                    "CREATE_NEVER"
                },
                destination_table: TableReference {
                    project_id: config.project_id.clone(),
                    dataset_id: config.dataset.clone(),
                    table_id: config.table.clone(),
                },
            },
        },
    }
}

pub struct BigQueryWarehouse {
    client: reqwest::Client,
    base_url: String,
    config: WarehouseConfig,
}

impl BigQueryWarehouse {
    pub fn new(config: WarehouseConfig) -> Self {
        Self::with_base_url(reqwest::Client::new(), DEFAULT_BIGQUERY_URL, config)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str, config: WarehouseConfig) -> Self {
        info!(
            table = %config.table_id(),
            create_table = config.create_table,
            token_set = !config.access_token.is_empty(),
            "Initialized BigQueryWarehouse"
        );
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            config,
        }
    }

    fn jobs_url(&self) -> String {
        format!("{}/projects/{}/jobs", self.base_url, self.config.project_id)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<JobResponse, ExportError> {
        let response = request
            .bearer_auth(&self.config.access_token)
            .send()
            .await
            .map_err(|e| ExportError::Load(format!("request failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ExportError::Load(format!("reading response failed: {e}")))?;
        if !status.is_success() {
            return Err(ExportError::Load(format!("HTTP {}: {body}", status.as_u16())));
        }
        serde_json::from_str(&body)
            .map_err(|e| ExportError::Load(format!("unexpected job response: {e}")))
    }

    async fn insert(&self, body: &JobInsert) -> Result<JobResponse, ExportError> {
        debug!(url = %self.jobs_url(), job_id = %body.job_reference.job_id, "[LOAD] jobs.insert");
        self.send(self.client.post(self.jobs_url()).json(body)).await
    }

    async fn get(&self, reference: &JobReference) -> Result<JobResponse, ExportError> {
        let url = format!("{}/{}", self.jobs_url(), reference.job_id);
        let mut request = self.client.get(&url);
        if let Some(location) = &reference.location {
            request = request.query(&[("location", location)]);
        }
        self.send(request).await
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    async fn load(&self, references: Vec<String>) -> Result<LoadJobResult, ExportError> {
        let source_count = references.len();
        let job_id = new_job_id();
        let body = load_job_request(&self.config, &job_id, references);

        info!(job_id = %job_id, sources = source_count, table = %self.config.table_id(), "[LOAD] Submitting BigQuery load job");
        let mut job = self.insert(&body).await?;
        let reference = job
            .job_reference
            .take()
            .unwrap_or_else(|| body.job_reference.clone());

        let output_rows = wait_for_job(
            job,
            &reference.job_id,
            self.config.poll_interval,
            self.config.max_wait,
            || self.get(&reference),
        )
        .await?;
        info!(job_id = %reference.job_id, ?output_rows, "[LOAD] BigQuery load job done");
        Ok(LoadJobResult {
            job_id: reference.job_id,
            source_count,
            output_rows,
        })
    }
}

/// Poll a submitted job until it finishes, giving up once `max_wait` has
/// elapsed with the job still pending or running.
pub async fn wait_for_job<F, Fut>(
    mut job: JobResponse,
    job_id: &str,
    poll_interval: Duration,
    max_wait: Duration,
    mut poll: F,
) -> Result<Option<u64>, ExportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<JobResponse, ExportError>>,
{
    let deadline = Instant::now() + max_wait;
    loop {
        match job.state() {
            JobState::Done { output_rows } => return Ok(output_rows),
            JobState::Failed(message) => {
                error!(job_id = %job_id, error = %message, "[LOAD] BigQuery load job failed");
                return Err(ExportError::Load(message));
            }
            JobState::Running if Instant::now() >= deadline => {
                error!(job_id = %job_id, state = %job.status.state, ?max_wait, "[LOAD] Gave up waiting for load job");
                return Err(ExportError::Load(format!(
                    "load job {job_id} did not finish within {max_wait:?} (last state {:?})",
                    job.status.state
                )));
            }
            JobState::Running => {
                debug!(job_id = %job_id, state = %job.status.state, "[LOAD] Waiting for load job");
                tokio::time::sleep(poll_interval).await;
                job = poll().await?;
            }
        }
    }
}
