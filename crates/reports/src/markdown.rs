// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown rendering of processing reports.

use crate::ProcessingReport;
use benchstore_adapters::ExportStatus;
use std::fmt::{self, Write};

/// Generate a markdown summary of a processing report.
pub fn generate_summary(report: &ProcessingReport) -> String {
    let mut output = String::new();
    // Writing into a String cannot fail.
    let _ = write_summary(&mut output, report);
    output
}

fn write_summary(output: &mut String, report: &ProcessingReport) -> fmt::Result {
    let stats = &report.stats;

    writeln!(output, "# Benchstore Processing Summary")?;
    writeln!(output)?;
    writeln!(output, "Generated: {}", chrono::Utc::now().to_rfc3339())?;
    writeln!(output)?;
    writeln!(output, "## Totals")?;
    writeln!(output)?;
    writeln!(output, "| Metric | Count |")?;
    writeln!(output, "|--------|-------|")?;
    for (label, value) in [
        ("Inputs", stats.total),
        ("Processed", stats.successful),
        ("Failed inputs", stats.failed),
        ("Skipped", stats.skipped),
        ("Documents written", stats.documents_written),
        ("Documents partial", stats.documents_partial),
        ("Documents failed", stats.documents_failed),
        ("New documents", stats.documents_created),
        ("Duplicate documents", stats.documents_replaced),
        ("Time-series records written", stats.timeseries_written),
        ("Time-series records failed", stats.timeseries_failed),
    ] {
        writeln!(output, "| {label} | {value} |")?;
    }

    if !stats.tests.is_empty() {
        writeln!(output)?;
        writeln!(output, "## Tests")?;
        writeln!(output)?;
        writeln!(output, "| Test | Processed | Failed |")?;
        writeln!(output, "|------|-----------|--------|")?;
        for (name, counts) in &stats.tests {
            writeln!(output, "| {name} | {} | {} |", counts.processed, counts.failed)?;
        }
    }

    if !report.export.documents.is_empty() {
        writeln!(output)?;
        writeln!(output, "## Documents")?;
        writeln!(output)?;
        writeln!(output, "| Document ID | Status | Time Series | Digest |")?;
        writeln!(output, "|-------------|--------|-------------|--------|")?;
        for doc in &report.export.documents {
            let status = match doc.status {
                ExportStatus::Written => "written",
                ExportStatus::Partial => "partial",
                ExportStatus::Failed => "failed",
            };
            writeln!(
                output,
                "| {} | {} | {}/{} | `{}` |",
                doc.document_id,
                status,
                doc.timeseries_written,
                doc.timeseries_written + doc.timeseries_failed.len(),
                doc.content_digest
            )?;
        }
    }

    if !stats.errors.is_empty() {
        writeln!(output)?;
        writeln!(output, "## Errors")?;
        writeln!(output)?;
        for error in &stats.errors {
            writeln!(output, "- **{}**: {}", error.source, error.message.replace('\n', " "))?;
        }
    }

    writeln!(output)?;
    writeln!(output, "---")?;
    writeln!(
        output,
        "Duration: {:.2}s, export {}ms",
        stats.duration_seconds(),
        report.export.elapsed_ms
    )
}
