#![doc = "quay-bq-export-core: extraction and delivery pipeline for quay.io repository logs."]

//! This crate contains the data model, collaborator interfaces and pipeline
//! stages for exporting repository logs day by day into an object store and
//! loading them into a warehouse table. CLI glue lives in `quay-bq-export`.
//!
//! # Usage
//! Build an [`config::ExportConfig`], wire a [`fetch::PageFetcher`], a
//! [`sink::ObjectStoreSink`] and a [`contract::Warehouse`], then call
//! [`export::export`].

pub mod config;
pub mod contract;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod load;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod registry;
pub mod sink;
pub mod timestamp;

pub use error::{ExportError, TransportError};
