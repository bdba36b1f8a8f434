// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Storage backends and the idempotent exporter for Benchstore.
//!
//! # Architecture
//!
//! Every backend implements [`UpsertBackend`]: an idempotent, overwriting
//! `write(namespace, id, payload)` plus lazy namespace creation.
//! [`DocumentExporter`] drives a backend for identified documents, retrying
//! transient failures and isolating errors per document.
//!
//! - [`opensearch`] - OpenSearch over HTTP
//! - [`filesystem`] - one JSON file per record
//! - [`memory`] - in-memory reference backend with fault injection
//!
//! # Example
//!
//! ```no_run
//! use benchstore_adapters::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn run(documents: Vec<benchstore_core::IdentifiedDocument>) {
//! let exporter = DocumentExporter::new(Arc::new(InMemoryBackend::new()), ExportSettings::default());
//! let report = exporter.export_batch(&documents).await;
//! println!("written={} failed={}", report.written_count(), report.failed_count());
//! # }
//! ```

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod config;
pub mod exporter;
pub mod filesystem;
pub mod memory;
pub mod opensearch;
pub mod records;
pub mod retry;
pub mod upsert;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use super::config::{OpenSearchConfig, PipelineConfig};
    pub use super::exporter::{
        BatchReport, DocumentExporter, DocumentReport, ExportError, ExportSettings, ExportStatus,
    };
    pub use super::filesystem::JsonDirectoryBackend;
    pub use super::memory::InMemoryBackend;
    pub use super::opensearch::OpenSearchBackend;
    pub use super::retry::RetryPolicy;
    pub use super::upsert::{BackendError, NamespaceTemplate, UpsertBackend, WriteAck, WriteOutcome};
}

pub use exporter::{BatchReport, DocumentExporter, ExportError, ExportSettings, ExportStatus};
pub use upsert::{BackendError, UpsertBackend, WriteAck, WriteOutcome};
