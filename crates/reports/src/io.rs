// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Filesystem I/O: input discovery, document loading and report output.

use crate::markdown;
use crate::ProcessingReport;
use benchstore_core::ResultDocument;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors raised while loading an input document.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Input path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// The file is not a valid result document.
    #[error("Invalid document {path}: {source}")]
    Document {
        /// Input path.
        path: PathBuf,
        /// Validation, structural or parse error.
        #[source]
        source: benchstore_core::Error,
    },
}

/// Find every `*.json` file under `root`, recursively, sorted by path.
///
/// Hidden files and directories are skipped. A `root` that is itself a file
/// is returned as the only input.
pub fn discover_inputs(root: impl AsRef<Path>) -> io::Result<Vec<PathBuf>> {
    let root = root.as_ref();
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }

    let mut found = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let hidden = path
                .file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |n| n.starts_with('.'));
            if hidden {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().map_or(false, |ext| ext == "json") {
                found.push(path);
            }
        }
    }
    found.sort();
    debug!(root = %root.display(), inputs = found.len(), "Discovered input documents");
    Ok(found)
}

/// Read and validate one input document.
pub fn read_document(path: impl AsRef<Path>) -> Result<ResultDocument, LoadError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    ResultDocument::from_json(&content).map_err(|source| LoadError::Document {
        path: path.to_path_buf(),
        source,
    })
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
        _ => Ok(()),
    }
}

/// Write the full processing report as pretty JSON.
pub fn write_report_json(report: &ProcessingReport, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    fs::write(path, json)
}

/// Write the markdown summary of a processing report.
pub fn write_summary(report: &ProcessingReport, path: impl AsRef<Path>) -> io::Result<()> {
    let path = path.as_ref();
    ensure_parent(path)?;
    fs::write(path, markdown::generate_summary(report))
}

/// Read a report previously written by [`write_report_json`].
pub fn read_report_json(path: impl AsRef<Path>) -> io::Result<ProcessingReport> {
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}
