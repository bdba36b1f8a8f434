// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Content hashing of result documents.
//!
//! The digest covers the semantic content of a document: everything it
//! serializes to, minus the two self-referential or time-dependent fields of
//! `metadata` listed in [`EXCLUDED_METADATA_FIELDS`].

use crate::canonical::to_canonical_bytes;
use crate::document::ResultDocument;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Fields removed from `metadata` before hashing. No other section is filtered.
pub const EXCLUDED_METADATA_FIELDS: [&str; 2] = ["processing_timestamp", "document_id"];

/// Length of a rendered digest in hex characters.
pub const DIGEST_HEX_LEN: usize = 64;

/// Length of the digest prefix used in identifiers.
pub const SHORT_DIGEST_LEN: usize = 16;

/// A SHA-256 content digest rendered as 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Parse a rendered digest, accepting only 64 lowercase hex characters.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        let well_formed = hex.len() == DIGEST_HEX_LEN
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(Error::invalid_field(
                "content_digest",
                format!("expected {DIGEST_HEX_LEN} lowercase hex characters, got `{hex}`"),
            ));
        }
        Ok(Self(hex))
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// The full digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first 16 hex characters, as used in identifiers.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_DIGEST_LEN]
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::from_hex(value)
    }
}

impl From<ContentDigest> for String {
    fn from(digest: ContentDigest) -> Self {
        digest.0
    }
}

/// Compute the content digest of a document.
///
/// Pure: the document is not modified. Use [`ResultDocument::hash_content`]
/// to also record the digest on the document for identifier derivation.
pub fn compute_content_hash(document: &ResultDocument) -> Result<ContentDigest> {
    let mut value = serde_json::to_value(document)?;
    if let Some(metadata) = value.get_mut("metadata").and_then(|m| m.as_object_mut()) {
        for field in EXCLUDED_METADATA_FIELDS {
            metadata.remove(field);
        }
    }

    let bytes = to_canonical_bytes(&value)?;
    let digest = ContentDigest::from_bytes(&Sha256::digest(&bytes));
    tracing::trace!(
        test_name = %document.test.name,
        canonical_len = bytes.len(),
        digest = %digest,
        "Computed content hash"
    );
    Ok(digest)
}

/// Check that `digest` matches the current content of `document`.
pub fn verify_digest(document: &ResultDocument, digest: &ContentDigest) -> Result<bool> {
    Ok(compute_content_hash(document)? == *digest)
}
