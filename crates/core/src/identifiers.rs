// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Identifier derivation.
//!
//! Identifiers are a pure function of the normalized test name and the
//! content digest:
//!
//! - parent: `{test_name}_{digest[..16]}`
//! - child:  `{parent_id}_run_{run_number}_sequence_{sequence}`
//!
//! Child identifiers need no hashing of their own: they are stable whenever
//! the parent is, and unique within a document because `(run_number,
//! sequence)` pairs are.

use crate::document::ResultDocument;
use crate::error::{Error, Result};
use crate::hashing::ContentDigest;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Position of a time-series point within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PointKey {
    pub run_number: u32,
    pub sequence: u32,
}

impl PointKey {
    pub fn new(run_number: u32, sequence: u32) -> Self {
        Self {
            run_number,
            sequence,
        }
    }
}

impl fmt::Display for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run_{}_sequence_{}", self.run_number, self.sequence)
    }
}

/// Lowercase a test name and replace identifier delimiters.
///
/// Every character outside `[a-z0-9-]` becomes `-`, runs of `-` collapse and
/// leading or trailing `-` are dropped, so `_` never appears in the result.
pub fn normalize_test_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Parent identifier for a test name and digest.
pub fn parent_id(test_name: &str, digest: &ContentDigest) -> String {
    format!("{}_{}", normalize_test_name(test_name), digest.short())
}

/// Child identifier for a point of the document identified by `parent_id`.
pub fn child_id(parent_id: &str, run_number: u32, sequence: u32) -> String {
    format!("{parent_id}_{}", PointKey::new(run_number, sequence))
}

/// Identifiers derived for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentifiers {
    parent_id: String,
    digest: ContentDigest,
    children: BTreeMap<PointKey, String>,
}

impl DocumentIdentifiers {
    /// The parent (document) identifier.
    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    /// The full digest the identifiers were derived from.
    pub fn digest(&self) -> &ContentDigest {
        &self.digest
    }

    /// Child identifiers keyed by point position, in `(run, sequence)` order.
    pub fn children(&self) -> &BTreeMap<PointKey, String> {
        &self.children
    }

    /// Child identifier of one point.
    pub fn child(&self, run_number: u32, sequence: u32) -> Option<&str> {
        self.children
            .get(&PointKey::new(run_number, sequence))
            .map(String::as_str)
    }
}

/// Derive the parent and child identifiers of a hashed document.
///
/// Never hashes. Fails with a precondition error when `document` has no
/// recorded digest (call [`ResultDocument::hash_content`] first) or when the
/// recorded digest is not `digest`.
pub fn derive_identifiers(
    document: &ResultDocument,
    digest: &ContentDigest,
) -> Result<DocumentIdentifiers> {
    match document.content_digest() {
        None => {
            return Err(Error::precondition(
                "content hash has not been computed for this document",
            ))
        }
        Some(recorded) if recorded != digest => {
            return Err(Error::precondition(format!(
                "digest {} does not match the recorded content hash {}",
                digest.short(),
                recorded.short()
            )))
        }
        Some(_) => {}
    }

    let parent = parent_id(&document.test.name, digest);
    let children = document
        .results
        .runs
        .iter()
        .flat_map(|run| {
            run.timeseries
                .iter()
                .map(move |point| PointKey::new(run.run_number, point.sequence))
        })
        .map(|key| (key, format!("{parent}_{key}")))
        .collect();

    Ok(DocumentIdentifiers {
        parent_id: parent,
        digest: digest.clone(),
        children,
    })
}

/// A document whose `document_id` has been assigned, paired with its identifiers.
///
/// This is the shape exporters accept. It can only be produced by
/// [`ResultDocument::identify`], so the id and content always agree.
#[derive(Debug, Clone)]
pub struct IdentifiedDocument {
    document: ResultDocument,
    identifiers: DocumentIdentifiers,
}

impl IdentifiedDocument {
    pub(crate) fn new(document: ResultDocument, identifiers: DocumentIdentifiers) -> Self {
        Self {
            document,
            identifiers,
        }
    }

    pub fn document(&self) -> &ResultDocument {
        &self.document
    }

    pub fn identifiers(&self) -> &DocumentIdentifiers {
        &self.identifiers
    }

    /// Shorthand for `identifiers().parent_id()`.
    pub fn id(&self) -> &str {
        self.identifiers.parent_id()
    }

    pub fn into_parts(self) -> (ResultDocument, DocumentIdentifiers) {
        (self.document, self.identifiers)
    }
}
