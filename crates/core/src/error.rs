// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types for document construction, hashing and identifier derivation.

use thiserror::Error;

/// Errors raised by the core document pipeline.
///
/// None of these are retryable: they describe either bad upstream input or a
/// misuse of the API, and are surfaced to the caller immediately.
#[derive(Debug, Error)]
pub enum Error {
    /// A required section or field is missing or empty.
    #[error("Validation error in `{section}`: {message}")]
    Validation {
        /// The section (or dotted field path) that failed validation.
        section: String,
        /// Human-readable reason.
        message: String,
    },

    /// A structural invariant of the document does not hold.
    #[error("Structural error: {message} (offending: {})", offending.join(", "))]
    Structural {
        /// Human-readable reason.
        message: String,
        /// Identifiers of the offending elements, e.g. `run_2` or `run_1/sequence_4`.
        offending: Vec<String>,
    },

    /// The API was called out of order, e.g. deriving identifiers before hashing.
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Serialization to or from the canonical representation failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// A required section was never provided.
    pub fn missing_section(section: impl Into<String>) -> Self {
        Error::Validation {
            section: section.into(),
            message: "required section is missing".to_string(),
        }
    }

    /// A field carries a value that cannot be accepted.
    pub fn invalid_field(section: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Validation {
            section: section.into(),
            message: message.into(),
        }
    }

    /// A structural invariant was violated by the listed elements.
    pub fn structural(message: impl Into<String>, offending: Vec<String>) -> Self {
        Error::Structural {
            message: message.into(),
            offending,
        }
    }

    /// Create a precondition error.
    pub fn precondition(message: impl Into<String>) -> Self {
        Error::Precondition(message.into())
    }

    /// Whether this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Whether this error is a structural error.
    pub fn is_structural(&self) -> bool {
        matches!(self, Error::Structural { .. })
    }

    /// Whether this error is a precondition error.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Error::Precondition(_))
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
