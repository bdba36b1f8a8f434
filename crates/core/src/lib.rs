// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core document pipeline for Benchstore.
//!
//! Turns a validated benchmark result into a content-addressed record:
//!
//! ```text
//! ResultDocument ──hash_content──▶ ContentDigest ──derive_identifiers──▶ DocumentIdentifiers
//!   (builder)        (sha-256 over       (64 hex)        (pure)             parent + children
//!                     canonical JSON)
//! ```
//!
//! Reprocessing the same run converges on the same identifiers, because the
//! digest ignores `metadata.processing_timestamp` and `metadata.document_id`.
//!
//! # Quick Start
//!
//! ```no_run
//! use benchstore_core::{Metadata, ResultDocument, ResultStatus, Results, TestInfo};
//!
//! let document = ResultDocument::builder()
//!     .metadata(Metadata::new())
//!     .test(TestInfo::new("coremark").version("1.0"))
//!     .results(Results::new(ResultStatus::Pass))
//!     .build()?;
//!
//! let identified = document.identify()?;
//! println!("{}", identified.id());
//! # Ok::<(), benchstore_core::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`document`] - The canonical document model and its builder
//! - [`canonical`] - Numeric normalization and canonical JSON encoding
//! - [`hashing`] - Content digest computation
//! - [`identifiers`] - Parent and child identifier derivation
//! - [`statistics`] - Aggregate statistics over samples

#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod canonical;
pub mod document;
pub mod error;
pub mod hashing;
pub mod identifiers;
pub mod statistics;

pub use document::{
    CpuInfo, HardwareInfo, MemoryInfo, Metadata, OperatingSystemInfo, PrimaryMetric,
    ResultDocument, ResultDocumentBuilder, ResultStatus, Results, RunRecord, RuntimeInfo,
    SystemUnderTest, TestConfiguration, TestInfo, TimeSeriesPoint, ValidationArtifacts, ValueMap,
};
pub use error::{Error, Result};
pub use hashing::{compute_content_hash, verify_digest, ContentDigest};
pub use identifiers::{
    child_id, derive_identifiers, normalize_test_name, parent_id, DocumentIdentifiers,
    IdentifiedDocument, PointKey,
};
pub use statistics::StatisticalSummary;
