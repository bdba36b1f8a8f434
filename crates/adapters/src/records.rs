// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Stored record shapes.
//!
//! A document is persisted as one parent record keyed by its `document_id`,
//! plus one standalone record per time-series point keyed by its child id.
//! Point records carry a back-reference to the parent and enough provenance
//! to be queried by time range without loading the parent.

use benchstore_core::{IdentifiedDocument, PointKey, ValueMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Name written into `_export_metadata.exporter`.
pub const EXPORTER_NAME: &str = "benchstore";

/// Version written into `_export_metadata.exporter_version`.
pub const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Provenance attached to every parent record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportMetadata {
    /// Full 64-character content digest, kept for integrity verification.
    pub content_digest: String,
    pub exported_at: DateTime<Utc>,
    pub exporter: String,
    pub exporter_version: String,
    /// Backend the record was written through.
    pub backend: String,
}

/// One time-series point as a standalone record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesRecord {
    /// Parent `document_id`.
    pub document_id: String,
    pub test_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_version: Option<String>,
    pub run_number: u32,
    pub sequence: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
    #[serde(default, skip_serializing_if = "ValueMap::is_empty")]
    pub attributes: ValueMap,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
}

/// Build the parent payload.
///
/// With `embed_timeseries` off, the per-run `timeseries` arrays are dropped
/// from the payload (their summaries stay); the points then live only in the
/// time-series namespace.
pub fn parent_record(
    identified: &IdentifiedDocument,
    backend: &str,
    embed_timeseries: bool,
    exported_at: DateTime<Utc>,
) -> serde_json::Result<Value> {
    let mut payload = serde_json::to_value(identified.document())?;

    if !embed_timeseries {
        if let Some(runs) = payload
            .pointer_mut("/results/runs")
            .and_then(Value::as_array_mut)
        {
            for run in runs.iter_mut().filter_map(Value::as_object_mut) {
                run.remove("timeseries");
            }
        }
    }

    let export = ExportMetadata {
        content_digest: identified.identifiers().digest().to_string(),
        exported_at,
        exporter: EXPORTER_NAME.to_string(),
        exporter_version: EXPORTER_VERSION.to_string(),
        backend: backend.to_string(),
    };
    if let Some(object) = payload.as_object_mut() {
        object.insert("_export_metadata".to_string(), serde_json::to_value(export)?);
    }
    Ok(payload)
}

/// Build the standalone records of every point, keyed by child id.
pub fn timeseries_records(identified: &IdentifiedDocument) -> Vec<(String, TimeSeriesRecord)> {
    let document = identified.document();
    let identifiers = identified.identifiers();
    let metadata = &document.metadata;

    document
        .results
        .runs
        .iter()
        .flat_map(|run| run.timeseries.iter().map(move |point| (run.run_number, point)))
        .filter_map(|(run_number, point)| {
            let key = PointKey::new(run_number, point.sequence);
            let child = identifiers.children().get(&key)?;
            Some((
                child.clone(),
                TimeSeriesRecord {
                    document_id: identifiers.parent_id().to_string(),
                    test_name: document.test.name.clone(),
                    test_version: document.test.version.clone(),
                    run_number,
                    sequence: point.sequence,
                    iteration: point.iteration,
                    timestamp: point.timestamp,
                    value: point.value,
                    unit: point.unit.clone(),
                    attributes: point.attributes.clone(),
                    os_vendor: metadata.os_vendor.clone(),
                    cloud_provider: metadata.cloud_provider.clone(),
                    instance_type: metadata.instance_type.clone(),
                    scenario_name: metadata.scenario_name.clone(),
                },
            ))
        })
        .collect()
}
