//! # contract: collaborator interfaces of the export pipeline
//!
//! The pipeline talks to three outside systems: the repository logs API,
//! an object store holding the per-day extracts, and the warehouse that
//! bulk-loads them. Each one sits behind a trait here so the orchestration
//! can run against real clients in production and `mockall` mocks in tests.
//!
//! ## Traits
//! - [`LogsTransport`]: one raw authenticated GET against the logs API.
//! - [`PageSource`]: one decoded page of logs for a day (see [`crate::fetch::PageFetcher`]).
//! - [`Sink`]: append-only per-day destinations with existence probe and close.
//! - [`Warehouse`]: submit a load job and wait for it.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; mocks are exported under the
//!   `test-export-mocks` feature (on by default) for integration tests.

use async_trait::async_trait;
use mockall::automock;

use crate::error::{ExportError, TransportError};
use crate::model::{DateWindow, Existence, LogEntry, LogPage};

/// A fully built request for one logs page.
#[derive(Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer_token: String,
}

impl PageRequest {
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl std::fmt::Debug for PageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageRequest")
            .field("url", &self.url)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Executes a single GET and returns the response body.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LogsTransport: Send + Sync {
    async fn get(&self, request: &PageRequest) -> Result<String, TransportError>;
}

/// Fetches one page of logs for a day window.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PageSource: Send + Sync {
    /// `page_token` is `None` for the first page of the window.
    async fn fetch(
        &self,
        page_token: Option<String>,
        window: DateWindow,
    ) -> Result<LogPage, ExportError>;
}

/// Append-only, day-keyed destination for exported entries.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Sink: Send + Sync {
    /// Append entries, each routed by its own timestamp's day.
    async fn write(&self, entries: &[LogEntry]) -> Result<(), ExportError>;

    /// Probe whether the day's destination already holds data.
    async fn exists(&self, window: DateWindow) -> Result<Existence, ExportError>;

    /// Finalize the day's destination. Closing an unopened day is a no-op.
    ///
    /// [`Finalize::Discard`] abandons everything written for the day so no
    /// object becomes visible and a later run extracts the day again.
    async fn close(&self, window: DateWindow, mode: Finalize) -> Result<(), ExportError>;
}

/// How a day's destination is finalized by [`Sink::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finalize {
    /// Complete the upload and make the object visible.
    Commit,
    /// Abort the upload; nothing is published for the day.
    Discard,
}

/// Outcome of a completed load job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadJobResult {
    pub job_id: String,
    pub source_count: usize,
    pub output_rows: Option<u64>,
}

/// Bulk-loads object store references into the destination table.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Submit one load job for all references and block until it is done.
    async fn load(&self, references: Vec<String>) -> Result<LoadJobResult, ExportError>;
}
