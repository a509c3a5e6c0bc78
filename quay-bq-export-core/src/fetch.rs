//! Single-page requests against the repository logs API.
//!
//! [`PageFetcher`] builds the request for a day window, sends it through a
//! [`LogsTransport`], retries connection-level failures within the
//! configured [`RetryPolicy`] and decodes the body into a [`LogPage`].
//! HTTP error statuses and undecodable bodies are protocol errors and are
//! never retried.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::config::{ApiConfig, RetryPolicy};
use crate::contract::{LogsTransport, PageRequest, PageSource};
use crate::error::{ExportError, TransportError};
use crate::model::{DateWindow, LogPage};

pub struct PageFetcher<T> {
    transport: T,
    api: ApiConfig,
    retry: RetryPolicy,
}

impl<T: LogsTransport> PageFetcher<T> {
    pub fn new(transport: T, api: ApiConfig, retry: RetryPolicy) -> Self {
        Self {
            transport,
            api,
            retry,
        }
    }

    pub fn build_request(&self, page_token: Option<&str>, window: DateWindow) -> PageRequest {
        let day = window.query_param();
        let mut query = vec![
            ("starttime".to_string(), day.clone()),
            ("endtime".to_string(), day),
        ];
        if let Some(token) = page_token.filter(|t| !t.is_empty()) {
            query.push(("next_page".to_string(), token.to_string()));
        }
        PageRequest {
            url: self.api.logs_url(),
            query,
            bearer_token: self.api.auth_token.clone(),
        }
    }

    async fn get_with_retry(&self, request: &PageRequest, window: DateWindow) -> Result<String, ExportError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.transport.get(request).await {
                Ok(body) => return Ok(body),
                Err(TransportError::Connection(message)) if attempt < max_attempts => {
                    warn!(
                        day = %window,
                        attempt,
                        max_attempts,
                        error = %message,
                        "[FETCH] Request to logs API failed, will retry"
                    );
                    tokio::time::sleep(self.retry.delay).await;
                }
                Err(TransportError::Connection(message)) => {
                    error!(day = %window, attempt, error = %message, "[FETCH] Retry budget exhausted");
                    return Err(ExportError::TransientNetwork {
                        attempts: attempt,
                        message,
                    });
                }
                Err(e @ TransportError::Status { .. }) => {
                    error!(day = %window, error = %e, "[FETCH] Logs API returned an error status");
                    return Err(ExportError::Protocol(e.to_string()));
                }
            }
        }
    }
}

#[async_trait]
impl<T: LogsTransport> PageSource for PageFetcher<T> {
    async fn fetch(
        &self,
        page_token: Option<String>,
        window: DateWindow,
    ) -> Result<LogPage, ExportError> {
        let request = self.build_request(page_token.as_deref(), window);
        debug!(request = ?request, "[FETCH] Requesting logs page");
        let body = self.get_with_retry(&request, window).await?;
        let page = LogPage::decode(&body)?;
        debug!(
            day = %window,
            entries = page.logs.len(),
            has_next = page.next_token().is_some(),
            "[FETCH] Decoded logs page"
        );
        Ok(page)
    }
}

/// [`LogsTransport`] over reqwest.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Client whose requests fail with [`TransportError::Connection`] once
    /// `timeout` elapses without a complete response.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(format!("building HTTP client: {e}")))?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl LogsTransport for HttpTransport {
    async fn get(&self, request: &PageRequest) -> Result<String, TransportError> {
        let response = self
            .client
            .get(&request.url)
            .query(&request.query)
            .bearer_auth(&request.bearer_token)
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
