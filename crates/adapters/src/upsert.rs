// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! The upsert contract every storage backend implements.
//!
//! - `write` is idempotent: the same identifier with the same payload any
//!   number of times leaves exactly one record.
//! - `write` replaces: a different payload under an existing identifier
//!   overwrites the stored record wholesale, without merging.
//! - Namespaces are created lazily from a [`NamespaceTemplate`] when absent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Failure reported by a backend for a single operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// Transient failure: timeout, connection reset, 408/429/5xx.
    #[error("Retryable backend error: {0}")]
    Retryable(String),

    /// Permanent failure; retrying would not help.
    #[error("Fatal backend error: {0}")]
    Fatal(String),

    /// The backend refuses writes with an explicit identifier.
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl BackendError {
    /// Whether the operation may succeed if attempted again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::Retryable(_))
    }
}

/// Whether a write created a new record or replaced an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOutcome {
    /// No record existed under the identifier.
    Created,
    /// An existing record was overwritten.
    Replaced,
}

impl fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteOutcome::Created => f.write_str("created"),
            WriteOutcome::Replaced => f.write_str("replaced"),
        }
    }
}

/// Acknowledgement of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAck {
    /// Identifier the record is stored under.
    pub id: String,
    /// Create or replace.
    pub outcome: WriteOutcome,
}

impl WriteAck {
    /// Ack for a newly created record.
    pub fn created(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: WriteOutcome::Created,
        }
    }

    /// Ack for an overwritten record.
    pub fn replaced(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: WriteOutcome::Replaced,
        }
    }
}

/// What a backend needs to create a missing namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceTemplate {
    /// Namespace (index, directory, table) name.
    pub name: String,
    /// Backend-specific creation body, e.g. OpenSearch index settings and mappings.
    pub body: Value,
}

impl NamespaceTemplate {
    /// Template with an explicit body.
    pub fn new(name: impl Into<String>, body: Value) -> Self {
        Self {
            name: name.into(),
            body,
        }
    }

    /// Template for the namespace holding parent result documents.
    pub fn results(name: impl Into<String>) -> Self {
        Self::new(
            name,
            json!({
                "settings": index_settings(),
                "mappings": {
                    "dynamic": true,
                    "properties": {
                        "metadata": {
                            "properties": {
                                "document_id": {"type": "keyword"},
                                "document_type": {"type": "keyword"},
                                "schema_version": {"type": "keyword"},
                                "collection_timestamp": {"type": "date"},
                                "processing_timestamp": {"type": "date"},
                                "os_vendor": {"type": "keyword"},
                                "cloud_provider": {"type": "keyword"},
                                "instance_type": {"type": "keyword"},
                                "scenario_name": {"type": "keyword"},
                                "iteration": {"type": "integer"}
                            }
                        },
                        "test": {
                            "properties": {
                                "name": {"type": "keyword"},
                                "version": {"type": "keyword"},
                                "description": {"type": "text"}
                            }
                        },
                        "results": {
                            "properties": {
                                "status": {"type": "keyword"},
                                "primary_metric": {
                                    "properties": {
                                        "name": {"type": "keyword"},
                                        "value": {"type": "double"},
                                        "unit": {"type": "keyword"}
                                    }
                                },
                                "runs": {"type": "object"}
                            }
                        },
                        "_export_metadata": {
                            "properties": {
                                "content_digest": {"type": "keyword"},
                                "exported_at": {"type": "date"},
                                "exporter": {"type": "keyword"},
                                "exporter_version": {"type": "keyword"}
                            }
                        }
                    }
                }
            }),
        )
    }

    /// Template for the namespace holding standalone time-series records.
    pub fn timeseries(name: impl Into<String>) -> Self {
        Self::new(
            name,
            json!({
                "settings": index_settings(),
                "mappings": {
                    "dynamic": true,
                    "properties": {
                        "document_id": {"type": "keyword"},
                        "test_name": {"type": "keyword"},
                        "test_version": {"type": "keyword"},
                        "run_number": {"type": "integer"},
                        "sequence": {"type": "integer"},
                        "iteration": {"type": "integer"},
                        "timestamp": {"type": "date"},
                        "value": {"type": "double"},
                        "unit": {"type": "keyword"},
                        "os_vendor": {"type": "keyword"},
                        "cloud_provider": {"type": "keyword"},
                        "instance_type": {"type": "keyword"},
                        "scenario_name": {"type": "keyword"}
                    }
                }
            }),
        )
    }
}

fn index_settings() -> Value {
    json!({
        "number_of_shards": 1,
        "number_of_replicas": 1,
        "index.mapping.total_fields.limit": 2000
    })
}

/// A storage backend honoring the upsert contract.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpsertBackend: Send + Sync {
    /// Short backend name used in logs and export metadata.
    fn name(&self) -> &'static str;

    /// Create the namespace from `template` if it does not exist yet.
    ///
    /// Returns `true` when the namespace was created by this call.
    async fn ensure_namespace(&self, template: &NamespaceTemplate) -> Result<bool, BackendError>;

    /// Create or wholesale replace the record `id` in `namespace`.
    async fn write(
        &self,
        namespace: &str,
        id: &str,
        payload: &Value,
    ) -> Result<WriteAck, BackendError>;
}
