use std::time::Duration;

use tracing::{debug, info};

use crate::model::DateRange;

pub const DEFAULT_API_URL: &str = "https://quay.io";

/// Everything one export run needs. Built once at startup, then passed by
/// reference into the fetcher, the planner and the sink.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub api: ApiConfig,
    pub retry: RetryPolicy,
    pub range: DateRange,
    pub sink: SinkConfig,
    pub warehouse: WarehouseConfig,
}

impl ExportConfig {
    pub fn trace_loaded(&self) {
        info!(
            namespace = %self.api.namespace,
            repository = %self.api.repository,
            start = %self.range.start,
            end = %self.range.end,
            bucket = %self.sink.bucket,
            table = %self.warehouse.table_id(),
            "Loaded ExportConfig"
        );
        debug!(?self, "ExportConfig loaded (full debug)");
    }
}

#[derive(Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub namespace: String,
    pub repository: String,
    pub auth_token: String,
}

impl ApiConfig {
    pub fn logs_url(&self) -> String {
        format!(
            "{}/api/v1/repository/{}/{}/logs",
            self.base_url.trim_end_matches('/'),
            self.namespace,
            self.repository
        )
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("namespace", &self.namespace)
            .field("repository", &self.repository)
            .field("auth_token_set", &!self.auth_token.is_empty())
            .finish()
    }
}

/// Retry budget for connection-level failures of a single page request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub delay: Duration,
    /// Upper bound on one request; a stalled request counts as a
    /// connection failure and is retried.
    pub request_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SinkConfig {
    pub bucket: String,
    pub prefix: Option<String>,
}

#[derive(Clone)]
pub struct WarehouseConfig {
    pub project_id: String,
    pub dataset: String,
    pub table: String,
    /// Let the load job create the table when it does not exist.
    pub create_table: bool,
    pub access_token: String,
    pub poll_interval: Duration,
    /// Longest time to wait for a submitted load job to finish.
    pub max_wait: Duration,
}

impl WarehouseConfig {
    pub fn table_id(&self) -> String {
        format!("{}.{}.{}", self.project_id, self.dataset, self.table)
    }
}

impl std::fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("project_id", &self.project_id)
            .field("dataset", &self.dataset)
            .field("table", &self.table)
            .field("create_table", &self.create_table)
            .field("access_token_set", &!self.access_token.is_empty())
            .field("poll_interval", &self.poll_interval)
            .field("max_wait", &self.max_wait)
            .finish()
    }
}
