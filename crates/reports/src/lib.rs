// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Processing reports for Benchstore.
//!
//! Collects what happened during one pipeline invocation and renders it for
//! people (plain text, markdown) and for tooling (JSON).
//!
//! # Modules
//!
//! - [`summary`] - The `ProcessingStats` counters
//! - [`io`] - Input discovery, document loading and report files
//! - [`markdown`] - Markdown report generation

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod io;
pub mod markdown;
pub mod summary;

pub use summary::{ProcessingError, ProcessingStats, TestCounts};

use benchstore_adapters::BatchReport;
use serde::{Deserialize, Serialize};

/// Everything recorded by one pipeline invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingReport {
    /// Aggregate counters.
    pub stats: ProcessingStats,
    /// Per-document export outcomes.
    pub export: BatchReport,
}

impl ProcessingReport {
    /// Whether the invocation should exit successfully.
    pub fn is_success(&self) -> bool {
        self.stats.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_report_is_not_a_success() {
        assert!(!ProcessingReport::default().is_success());
    }
}
