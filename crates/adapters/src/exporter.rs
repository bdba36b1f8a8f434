// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Idempotent export of identified documents.
//!
//! For one document the steps are strictly sequential: ensure namespaces,
//! write the parent record, then write each time-series record. Across
//! documents, [`DocumentExporter::export_batch`] may run several documents
//! concurrently; nothing is shared between them except the backend handle and
//! the per-namespace "ensured" cells.
//!
//! Failures are isolated per document. A failed parent write fails only that
//! document; failed child writes make it *partial*. Both are reported with the
//! document's identifier so a retry can target exactly those documents.

use crate::records::{parent_record, timeseries_records};
use crate::retry::{RetryFailure, RetryPolicy};
use crate::upsert::{BackendError, NamespaceTemplate, UpsertBackend, WriteOutcome};
use benchstore_core::IdentifiedDocument;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Errors surfaced for a single document.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The write failed permanently, or kept failing until the retry budget ran out.
    #[error("Export of {id} failed after {attempts} attempt(s): {source}")]
    Fatal {
        id: String,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    /// The backend refused a write with an explicit identifier.
    #[error("Backend rejected explicit identifier {id}: {message}")]
    Conflict { id: String, message: String },

    /// The target namespace could not be created.
    #[error("Namespace {namespace} is unavailable after {attempts} attempt(s): {source}")]
    Namespace {
        namespace: String,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    /// The payload could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExportError {
    fn from_failure(id: &str, failure: RetryFailure) -> Self {
        match failure.error {
            BackendError::Conflict(message) => ExportError::Conflict {
                id: id.to_string(),
                message,
            },
            source => ExportError::Fatal {
                id: id.to_string(),
                attempts: failure.attempts,
                source,
            },
        }
    }
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Exporter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Namespace for parent result documents.
    pub results_namespace: String,
    /// Namespace for standalone time-series records.
    pub timeseries_namespace: String,
    /// Keep per-run `timeseries` arrays inside the parent record.
    pub embed_timeseries: bool,
    /// Also write every point as its own record.
    pub export_timeseries: bool,
    /// Upper bound for a single write attempt, in milliseconds.
    pub write_timeout_ms: u64,
    /// Documents exported concurrently by `export_batch`.
    pub concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            results_namespace: "benchstore-results".to_string(),
            timeseries_namespace: "benchstore-timeseries".to_string(),
            embed_timeseries: true,
            export_timeseries: true,
            write_timeout_ms: 30_000,
            concurrency: 1,
            retry: RetryPolicy::default(),
        }
    }
}

impl ExportSettings {
    fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.max(1))
    }
}

/// Final state of one document after export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    /// Parent and every time-series record were written.
    Written,
    /// The parent was written but some time-series records were not.
    Partial,
    /// The parent was not written.
    Failed,
}

/// Outcome of exporting one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document_id: String,
    pub test_name: String,
    pub content_digest: String,
    pub status: ExportStatus,
    /// Create/replace outcome of the parent write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<WriteOutcome>,
    pub timeseries_written: usize,
    /// Child ids that could not be written.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeseries_failed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DocumentReport {
    fn new(identified: &IdentifiedDocument) -> Self {
        Self {
            document_id: identified.id().to_string(),
            test_name: identified.document().test.name.clone(),
            content_digest: identified.identifiers().digest().to_string(),
            status: ExportStatus::Failed,
            parent: None,
            timeseries_written: 0,
            timeseries_failed: Vec::new(),
            error: None,
        }
    }

    fn failed(identified: &IdentifiedDocument, err: &ExportError) -> Self {
        Self {
            error: Some(err.to_string()),
            ..Self::new(identified)
        }
    }
}

/// Per-document outcomes of a batch, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub documents: Vec<DocumentReport>,
    pub elapsed_ms: u64,
}

impl BatchReport {
    fn with_status(&self, status: ExportStatus) -> impl Iterator<Item = &DocumentReport> {
        self.documents.iter().filter(move |d| d.status == status)
    }

    /// Documents fully written.
    pub fn written(&self) -> impl Iterator<Item = &DocumentReport> {
        self.with_status(ExportStatus::Written)
    }

    /// Documents whose parent was written but some children were not.
    pub fn partial(&self) -> impl Iterator<Item = &DocumentReport> {
        self.with_status(ExportStatus::Partial)
    }

    /// Documents whose parent was not written.
    pub fn failed(&self) -> impl Iterator<Item = &DocumentReport> {
        self.with_status(ExportStatus::Failed)
    }

    pub fn written_count(&self) -> usize {
        self.written().count()
    }

    pub fn partial_count(&self) -> usize {
        self.partial().count()
    }

    pub fn failed_count(&self) -> usize {
        self.failed().count()
    }

    /// Identifiers worth re-exporting: failed and partial documents.
    pub fn retry_ids(&self) -> Vec<&str> {
        self.documents
            .iter()
            .filter(|d| d.status != ExportStatus::Written)
            .map(|d| d.document_id.as_str())
            .collect()
    }

    /// Whether every document was fully written.
    pub fn is_complete(&self) -> bool {
        self.documents
            .iter()
            .all(|d| d.status == ExportStatus::Written)
    }
}

/// Running counters of an exporter session.
#[derive(Debug, Default)]
struct Counters {
    namespaces_created: AtomicU64,
    parents_written: AtomicU64,
    timeseries_written: AtomicU64,
    write_failures: AtomicU64,
}

/// Snapshot of exporter counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExporterStats {
    pub namespaces_created: u64,
    pub parents_written: u64,
    pub timeseries_written: u64,
    pub write_failures: u64,
}

/// Writes identified documents through an [`UpsertBackend`].
///
/// Each namespace is ensured at most once per exporter (one exporter is one
/// session); a failed ensure is retried by the next document.
pub struct DocumentExporter {
    backend: Arc<dyn UpsertBackend>,
    settings: ExportSettings,
    results_ready: OnceCell<()>,
    timeseries_ready: OnceCell<()>,
    counters: Counters,
}

impl DocumentExporter {
    /// Create an exporter over `backend`.
    pub fn new(backend: Arc<dyn UpsertBackend>, settings: ExportSettings) -> Self {
        Self {
            backend,
            settings,
            results_ready: OnceCell::new(),
            timeseries_ready: OnceCell::new(),
            counters: Counters::default(),
        }
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn stats(&self) -> ExporterStats {
        ExporterStats {
            namespaces_created: self.counters.namespaces_created.load(Ordering::Relaxed),
            parents_written: self.counters.parents_written.load(Ordering::Relaxed),
            timeseries_written: self.counters.timeseries_written.load(Ordering::Relaxed),
            write_failures: self.counters.write_failures.load(Ordering::Relaxed),
        }
    }

    async fn ensure(&self, cell: &OnceCell<()>, template: NamespaceTemplate) -> Result<()> {
        cell.get_or_try_init(|| async {
            let created = self
                .settings
                .retry
                .run("ensure_namespace", self.settings.write_timeout(), || {
                    self.backend.ensure_namespace(&template)
                })
                .await
                .map_err(|failure| ExportError::Namespace {
                    namespace: template.name.clone(),
                    attempts: failure.attempts,
                    source: failure.error,
                })?;
            if created {
                self.counters.namespaces_created.fetch_add(1, Ordering::Relaxed);
                info!(namespace = %template.name, backend = self.backend.name(), "Created namespace");
            } else {
                debug!(namespace = %template.name, "Namespace already exists");
            }
            Ok::<(), ExportError>(())
        })
        .await
        .map(|_| ())
    }

    async fn write(&self, namespace: &str, id: &str, payload: &Value) -> Result<WriteOutcome> {
        let result = self
            .settings
            .retry
            .run("write", self.settings.write_timeout(), || {
                self.backend.write(namespace, id, payload)
            })
            .await;
        match result {
            Ok(ack) => Ok(ack.outcome),
            Err(failure) => {
                self.counters.write_failures.fetch_add(1, Ordering::Relaxed);
                Err(ExportError::from_failure(id, failure))
            }
        }
    }

    /// Export one document: parent first, then each time-series record.
    ///
    /// Returns an error only when the parent could not be written. Child
    /// failures are listed in the returned report with status
    /// [`ExportStatus::Partial`].
    pub async fn export_document(&self, identified: &IdentifiedDocument) -> Result<DocumentReport> {
        let id = identified.id();
        self.ensure(
            &self.results_ready,
            NamespaceTemplate::results(&self.settings.results_namespace),
        )
        .await?;

        let payload = parent_record(
            identified,
            self.backend.name(),
            self.settings.embed_timeseries,
            Utc::now(),
        )?;
        let outcome = self
            .write(&self.settings.results_namespace, id, &payload)
            .await?;
        self.counters.parents_written.fetch_add(1, Ordering::Relaxed);
        debug!(document_id = %id, outcome = %outcome, "Wrote result document");

        let mut report = DocumentReport::new(identified);
        report.parent = Some(outcome);
        report.status = ExportStatus::Written;

        let records = if self.settings.export_timeseries {
            timeseries_records(identified)
        } else {
            Vec::new()
        };
        if records.is_empty() {
            return Ok(report);
        }

        if let Err(err) = self
            .ensure(
                &self.timeseries_ready,
                NamespaceTemplate::timeseries(&self.settings.timeseries_namespace),
            )
            .await
        {
            warn!(document_id = %id, error = %err, "Time-series namespace unavailable");
            report.status = ExportStatus::Partial;
            report.timeseries_failed = records.into_iter().map(|(child, _)| child).collect();
            report.error = Some(err.to_string());
            return Ok(report);
        }

        for (child, record) in records {
            let written = match serde_json::to_value(&record) {
                Ok(payload) => {
                    self.write(&self.settings.timeseries_namespace, &child, &payload)
                        .await
                }
                Err(err) => Err(err.into()),
            };
            match written {
                Ok(_) => {
                    report.timeseries_written += 1;
                    self.counters.timeseries_written.fetch_add(1, Ordering::Relaxed);
                }
                Err(err) => {
                    warn!(document_id = %id, child_id = %child, error = %err, "Time-series write failed");
                    report.error.get_or_insert_with(|| err.to_string());
                    report.timeseries_failed.push(child);
                }
            }
        }

        if !report.timeseries_failed.is_empty() {
            report.status = ExportStatus::Partial;
        }
        Ok(report)
    }

    /// Export many documents, isolating failures per document.
    ///
    /// Up to `settings.concurrency` documents are in flight at once. The
    /// report lists documents in input order.
    pub async fn export_batch(&self, documents: &[IdentifiedDocument]) -> BatchReport {
        let started = Instant::now();
        let concurrency = self.settings.concurrency.max(1);

        let mut indexed: Vec<(usize, DocumentReport)> = stream::iter(documents.iter().enumerate())
            .map(|(index, identified)| async move {
                let report = match self.export_document(identified).await {
                    Ok(report) => report,
                    Err(err) => {
                        error!(document_id = %identified.id(), error = %err, "Document export failed");
                        DocumentReport::failed(identified, &err)
                    }
                };
                (index, report)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);

        let report = BatchReport {
            documents: indexed.into_iter().map(|(_, report)| report).collect(),
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        info!(
            backend = self.backend.name(),
            written = report.written_count(),
            partial = report.partial_count(),
            failed = report.failed_count(),
            elapsed_ms = report.elapsed_ms,
            "Batch export finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upsert::{MockUpsertBackend, WriteAck};
    use benchstore_core::{Metadata, ResultDocument, ResultStatus, Results, RunRecord, TestInfo, TimeSeriesPoint};
    use chrono::TimeZone;
    use mockall::predicate::eq;

    fn settings() -> ExportSettings {
        ExportSettings {
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff_ms: 10,
                multiplier: 2.0,
                max_backoff_ms: 100,
            },
            ..ExportSettings::default()
        }
    }

    fn identified(points: u32) -> IdentifiedDocument {
        let at = Utc.timestamp_opt(1_762_439_400, 0).unwrap();
        let run = (0..points).fold(RunRecord::new(1), |run, seq| {
            run.point(TimeSeriesPoint::new(seq, at, f64::from(seq), "ops"))
        });
        ResultDocument::builder()
            .metadata(Metadata::processed_at(at))
            .test(TestInfo::new("coremark"))
            .results(Results::new(ResultStatus::Pass).run(run))
            .build()
            .unwrap()
            .identify()
            .unwrap()
    }

    fn base_mock() -> MockUpsertBackend {
        let mut mock = MockUpsertBackend::new();
        mock.expect_name().return_const("mock");
        mock
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_parent_failure_is_retried() {
        let doc = identified(0);
        let mut mock = base_mock();
        mock.expect_ensure_namespace().times(1).returning(|_| Ok(true));
        let mut calls = 0;
        mock.expect_write()
            .with(eq("benchstore-results"), eq(doc.id().to_string()), mockall::predicate::always())
            .times(3)
            .returning(move |_, id, _| {
                calls += 1;
                if calls < 3 {
                    Err(BackendError::Retryable("503 Service Unavailable".into()))
                } else {
                    Ok(WriteAck::created(id))
                }
            });

        let exporter = DocumentExporter::new(Arc::new(mock), settings());
        let report = exporter.export_document(&doc).await.unwrap();
        assert_eq!(report.status, ExportStatus::Written);
        assert_eq!(report.parent, Some(WriteOutcome::Created));
        assert_eq!(exporter.stats().namespaces_created, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_budget_becomes_fatal() {
        let doc = identified(0);
        let mut mock = base_mock();
        mock.expect_ensure_namespace().returning(|_| Ok(false));
        mock.expect_write()
            .times(3)
            .returning(|_, _, _| Err(BackendError::Retryable("connection reset".into())));

        let exporter = DocumentExporter::new(Arc::new(mock), settings());
        let err = exporter.export_document(&doc).await.unwrap_err();
        match err {
            ExportError::Fatal { id, attempts, .. } => {
                assert_eq!(id, doc.id());
                assert_eq!(attempts, 3);
            }
            other => panic!("expected fatal error, got {other:?}"),
        }
        assert_eq!(exporter.stats().write_failures, 1);
    }

    #[tokio::test]
    async fn test_conflict_is_not_retried() {
        let doc = identified(0);
        let mut mock = base_mock();
        mock.expect_ensure_namespace().returning(|_| Ok(false));
        mock.expect_write()
            .times(1)
            .returning(|_, _, _| Err(BackendError::Conflict("explicit ids disabled".into())));

        let exporter = DocumentExporter::new(Arc::new(mock), settings());
        let err = exporter.export_document(&doc).await.unwrap_err();
        assert!(matches!(err, ExportError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_child_failure_makes_document_partial() {
        let doc = identified(3);
        let failing_child = doc.identifiers().child(1, 1).unwrap().to_string();
        let mut mock = base_mock();
        mock.expect_ensure_namespace().times(2).returning(|_| Ok(true));
        let rejected = failing_child.clone();
        mock.expect_write().returning(move |_, id, _| {
            if id == rejected {
                Err(BackendError::Fatal("400 bad request".into()))
            } else {
                Ok(WriteAck::created(id))
            }
        });

        let exporter = DocumentExporter::new(Arc::new(mock), settings());
        let report = exporter.export_document(&doc).await.unwrap();
        assert_eq!(report.status, ExportStatus::Partial);
        assert_eq!(report.timeseries_written, 2);
        assert_eq!(report.timeseries_failed, vec![failing_child]);
        assert!(report.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_namespace_is_retried_by_next_document() {
        let doc = identified(0);
        let mut mock = base_mock();
        let mut ensure_calls = 0;
        mock.expect_ensure_namespace().returning(move |_| {
            ensure_calls += 1;
            if ensure_calls <= 3 {
                Err(BackendError::Retryable("cluster starting".into()))
            } else {
                Ok(true)
            }
        });
        mock.expect_write()
            .times(1)
            .returning(|_, id, _| Ok(WriteAck::created(id)));

        let exporter = DocumentExporter::new(Arc::new(mock), settings());
        let err = exporter.export_document(&doc).await.unwrap_err();
        assert!(matches!(err, ExportError::Namespace { attempts: 3, .. }));
        assert!(exporter.export_document(&doc).await.is_ok());
    }

    #[test]
    fn test_batch_report_counts() {
        let doc = identified(0);
        let mut written = DocumentReport::new(&doc);
        written.status = ExportStatus::Written;
        let mut partial = DocumentReport::new(&doc);
        partial.status = ExportStatus::Partial;
        partial.document_id = "coremark_partial".to_string();
        let mut failed = DocumentReport::new(&doc);
        failed.document_id = "coremark_failed".to_string();

        let report = BatchReport {
            documents: vec![written, partial, failed],
            elapsed_ms: 0,
        };
        assert_eq!(report.written_count(), 1);
        assert_eq!(report.partial_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.retry_ids(), vec!["coremark_partial", "coremark_failed"]);
        assert!(!report.is_complete());
    }
}
