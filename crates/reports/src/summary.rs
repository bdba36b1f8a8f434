// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Processing statistics for one pipeline invocation.

use benchstore_adapters::{BatchReport, ExportStatus, WriteOutcome};
use benchstore_core::normalize_test_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Write};

/// Per-test counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCounts {
    /// Inputs of this test that produced a document.
    pub processed: u64,
    /// Documents of this test that were not fully exported.
    pub failed: u64,
}

/// An input that could not be turned into a document, or a document that
/// could not be exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    /// Input path or document id.
    pub source: String,
    /// Error message.
    pub message: String,
}

/// Counters collected while processing inputs and exporting documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStats {
    /// Inputs discovered.
    pub total: u64,
    /// Inputs that produced an identified document.
    pub successful: u64,
    /// Inputs that failed validation or parsing.
    pub failed: u64,
    /// Inputs skipped without an attempt.
    pub skipped: u64,
    /// Counters per normalized test name.
    pub tests: BTreeMap<String, TestCounts>,
    /// Documents whose parent and children were written.
    pub documents_written: u64,
    /// Documents whose parent was written but some children were not.
    pub documents_partial: u64,
    /// Documents whose parent was not written.
    pub documents_failed: u64,
    /// Parent records written under an identifier that was new to the backend.
    #[serde(default)]
    pub documents_created: u64,
    /// Parent records that overwrote an existing record with the same content
    /// identifier, i.e. reprocessed duplicates.
    #[serde(default)]
    pub documents_replaced: u64,
    /// Time-series records written.
    pub timeseries_written: u64,
    /// Time-series records not written.
    pub timeseries_failed: u64,
    /// Identifiers of documents to re-export.
    pub retry_ids: Vec<String>,
    /// Every error, in the order it was recorded.
    pub errors: Vec<ProcessingError>,
    /// When processing started.
    pub started_at: DateTime<Utc>,
    /// When processing finished, once [`ProcessingStats::finish`] was called.
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for ProcessingStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingStats {
    /// Start collecting stats now.
    pub fn new() -> Self {
        Self {
            total: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            tests: BTreeMap::new(),
            documents_written: 0,
            documents_partial: 0,
            documents_failed: 0,
            documents_created: 0,
            documents_replaced: 0,
            timeseries_written: 0,
            timeseries_failed: 0,
            retry_ids: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record a discovered input.
    pub fn record_input(&mut self) {
        self.total += 1;
    }

    /// Record an input that produced a document for `test_name`.
    pub fn record_success(&mut self, test_name: &str) {
        self.successful += 1;
        self.tests.entry(normalize_test_name(test_name)).or_default().processed += 1;
    }

    /// Record an input that failed before export.
    pub fn record_failure(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(ProcessingError {
            source: source.into(),
            message: message.into(),
        });
    }

    /// Record a skipped input.
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    /// Fold the outcome of an export batch into the counters.
    pub fn record_export(&mut self, batch: &BatchReport) {
        for doc in &batch.documents {
            self.timeseries_written += doc.timeseries_written as u64;
            self.timeseries_failed += doc.timeseries_failed.len() as u64;
            match doc.status {
                ExportStatus::Written => self.documents_written += 1,
                ExportStatus::Partial => self.documents_partial += 1,
                ExportStatus::Failed => self.documents_failed += 1,
            }
            match doc.parent {
                Some(WriteOutcome::Created) => self.documents_created += 1,
                Some(WriteOutcome::Replaced) => self.documents_replaced += 1,
                None => {}
            }
            if doc.status != ExportStatus::Written {
                self.tests
                    .entry(normalize_test_name(&doc.test_name))
                    .or_default()
                    .failed += 1;
                self.retry_ids.push(doc.document_id.clone());
                self.errors.push(ProcessingError {
                    source: doc.document_id.clone(),
                    message: doc.error.clone().unwrap_or_else(|| "export incomplete".to_string()),
                });
            }
        }
    }

    /// Stamp the finish time.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock seconds between start and finish (or now).
    pub fn duration_seconds(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        end.signed_duration_since(self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Whether anything succeeded and nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed == 0
            && self.documents_failed == 0
            && self.documents_partial == 0
            && self.successful > 0
    }

    /// Plain-text summary for terminal output.
    pub fn summary_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_summary(&mut out);
        out
    }

    fn write_summary(&self, out: &mut String) -> fmt::Result {
        let rule = "=".repeat(60);
        writeln!(out, "{rule}")?;
        writeln!(out, "PROCESSING SUMMARY")?;
        writeln!(out, "{rule}")?;
        writeln!(out, "Inputs:             {}", self.total)?;
        writeln!(out, "  Processed:        {}", self.successful)?;
        writeln!(out, "  Failed:           {}", self.failed)?;
        writeln!(out, "  Skipped:          {}", self.skipped)?;
        writeln!(out, "Documents written:  {}", self.documents_written)?;
        writeln!(out, "  Partial:          {}", self.documents_partial)?;
        writeln!(out, "  Failed:           {}", self.documents_failed)?;
        writeln!(out, "  New:              {}", self.documents_created)?;
        writeln!(out, "  Duplicates:       {}", self.documents_replaced)?;
        writeln!(
            out,
            "Time series:        {} written, {} failed",
            self.timeseries_written, self.timeseries_failed
        )?;
        writeln!(out, "Duration:           {:.2}s", self.duration_seconds())?;

        if !self.tests.is_empty() {
            writeln!(out)?;
            writeln!(out, "Tests:")?;
            for (name, counts) in &self.tests {
                writeln!(
                    out,
                    "  {name:<24} {} processed, {} failed",
                    counts.processed, counts.failed
                )?;
            }
        }

        if !self.errors.is_empty() {
            writeln!(out)?;
            writeln!(out, "Errors ({}):", self.errors.len())?;
            for error in self.errors.iter().take(10) {
                writeln!(out, "  - {}: {}", error.source, error.message)?;
            }
            if self.errors.len() > 10 {
                writeln!(out, "  ... and {} more", self.errors.len() - 10)?;
            }
        }
        write!(out, "{rule}")
    }
}
