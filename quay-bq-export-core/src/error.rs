//! Error taxonomy for the export pipeline.
//!
//! Every stage reports failures as an [`ExportError`]. The variant tells the
//! caller how far the failure propagates:
//! - `TransientNetwork`: the fetcher already spent its retry budget; the day fails.
//! - `Protocol`, `Storage`, `TaskAborted`: the day fails, sibling days continue.
//! - `DedupCheck`: the day is left out of the plan, the run continues.
//! - `Load`: the run fails after every day pipeline has finished.

use chrono::NaiveDate;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("transient network failure after {attempts} attempt(s): {message}")]
    TransientNetwork { attempts: u32, message: String },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("storage error at {destination}: {message}")]
    Storage {
        destination: String,
        message: String,
    },

    #[error("existence check failed for {day}: {message}")]
    DedupCheck { day: NaiveDate, message: String },

    #[error("load job failed: {0}")]
    Load(String),

    #[error("pipeline task for {day} aborted: {message}")]
    TaskAborted { day: NaiveDate, message: String },
}

impl ExportError {
    pub fn storage(destination: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ExportError::Storage {
            destination: destination.into(),
            message: err.to_string(),
        }
    }

    /// Errors that abort the whole run rather than a single day.
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, ExportError::Load(_))
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Protocol(e.to_string())
    }
}

/// Failure reported by a [`crate::contract::LogsTransport`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connection-level failure: no usable HTTP response was received.
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: u16, body: String },
}
