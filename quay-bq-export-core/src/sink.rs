//! Object store implementation of [`Sink`].
//!
//! Each day is written to `[prefix/]YYYY-MM-DD/export.json` as newline
//! delimited JSON. A destination's writer is opened lazily on its first
//! write, reused for every later write and finalized by [`Sink::close`].
//! Nothing is uploaded for a day that never received an entry, or whose
//! writer was closed with [`Finalize::Discard`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use object_store::buffered::BufWriter;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::SinkConfig;
use crate::contract::{Finalize, Sink};
use crate::error::ExportError;
use crate::model::{DateWindow, Existence, LogEntry, SinkDestination};
use crate::registry::KeyedRegistry;

pub struct ObjectStoreSink {
    store: Arc<dyn ObjectStore>,
    bucket: String,
    prefix: Option<String>,
    writers: KeyedRegistry<BufWriter>,
}

impl ObjectStoreSink {
    pub fn new(store: Arc<dyn ObjectStore>, config: SinkConfig) -> Self {
        Self {
            store,
            bucket: config.bucket,
            prefix: config.prefix,
            writers: KeyedRegistry::new(),
        }
    }

    /// Google Cloud Storage sink; credentials come from the environment
    /// (`GOOGLE_APPLICATION_CREDENTIALS` or `GOOGLE_SERVICE_ACCOUNT`).
    pub fn gcs(config: SinkConfig) -> Result<Self, ExportError> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&config.bucket)
            .build()
            .map_err(|e| ExportError::storage(format!("gs://{}", config.bucket), e))?;
        info!(bucket = %config.bucket, prefix = ?config.prefix, "[SINK] Initialized GCS sink");
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn destination(&self, window: DateWindow) -> SinkDestination {
        SinkDestination::for_window(self.prefix.as_deref(), window)
    }

    /// Loadable URI of a destination.
    pub fn reference(&self, destination: &SinkDestination) -> String {
        format!("gs://{}/{}", self.bucket, destination.path())
    }

    /// Destinations with a writer that has not been closed yet.
    pub fn open_writers(&self) -> usize {
        self.writers.len()
    }

    fn open_writer(&self, path: &str) -> BufWriter {
        debug!(destination = %path, "[SINK] Opening writer");
        BufWriter::new(Arc::clone(&self.store), ObjectPath::from(path))
    }
}

#[async_trait]
impl Sink for ObjectStoreSink {
    async fn write(&self, entries: &[LogEntry]) -> Result<(), ExportError> {
        let mut batches: BTreeMap<String, Vec<u8>> = BTreeMap::new();
        for entry in entries {
            let destination = self.destination(entry.window());
            let line = entry
                .to_export_line()
                .map_err(|e| ExportError::storage(destination.path(), e))?;
            batches
                .entry(destination.path().to_string())
                .or_default()
                .extend_from_slice(&line);
        }

        for (path, bytes) in batches {
            let slot = self
                .writers
                .acquire_or_insert_with(&path, || self.open_writer(&path));
            let mut writer = slot.lock().await;
            writer
                .write_all(&bytes)
                .await
                .map_err(|e| ExportError::storage(&path, e))?;
        }
        Ok(())
    }

    async fn exists(&self, window: DateWindow) -> Result<Existence, ExportError> {
        let destination = self.destination(window);
        match self.store.head(&ObjectPath::from(destination.path())).await {
            Ok(_) => Ok(Existence::Present {
                reference: self.reference(&destination),
            }),
            Err(object_store::Error::NotFound { .. }) => Ok(Existence::Absent),
            Err(e) => Err(ExportError::storage(destination.path(), e)),
        }
    }

    async fn close(&self, window: DateWindow, mode: Finalize) -> Result<(), ExportError> {
        let destination = self.destination(window);
        let Some(slot) = self.writers.release(destination.path()) else {
            debug!(%destination, ?mode, "[SINK] Nothing to close");
            return Ok(());
        };
        let mut writer = slot.lock().await;
        match mode {
            Finalize::Commit => {
                writer
                    .shutdown()
                    .await
                    .map_err(|e| ExportError::storage(destination.path(), e))?;
                info!(%destination, "[SINK] Finalized destination");
            }
            Finalize::Discard => {
                writer
                    .abort()
                    .await
                    .map_err(|e| ExportError::storage(destination.path(), e))?;
                warn!(%destination, "[SINK] Discarded partial destination");
            }
        }
        Ok(())
    }
}
