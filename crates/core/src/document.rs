// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! Canonical result document model.
//!
//! A [`ResultDocument`] is the unit of storage for one benchmark execution. It
//! embeds a fully denormalized snapshot of the system under test, the test
//! configuration, the aggregate results and every run with its time series.
//!
//! Documents are built through [`ResultDocumentBuilder`] (or
//! [`ResultDocument::from_json`], which goes through the builder), so a
//! document that exists has passed validation:
//!
//! ```text
//! ResultDocument
//!   ├─ metadata            (required)
//!   ├─ test                (required)
//!   ├─ system_under_test
//!   ├─ test_configuration
//!   ├─ results             (required)
//!   │    └─ runs[]         run_number = 1, 2, 3, ...
//!   │         └─ timeseries[]   sequence = 0 < s1 < s2 < ...
//!   └─ runtime_info
//! ```

use crate::canonical::normalize_map;
use crate::error::{Error, Result};
use crate::hashing::{compute_content_hash, ContentDigest};
use crate::identifiers::{derive_identifiers, normalize_test_name, IdentifiedDocument};
use crate::statistics::StatisticalSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

/// Free-form, key-sorted value map used for parameters, metrics and extras.
pub type ValueMap = BTreeMap<String, Value>;

/// Document type written into every document's metadata.
pub const DOCUMENT_TYPE: &str = "benchmark_result";

/// Current document schema version.
pub const SCHEMA_VERSION: &str = "1.0";

/// Outcome of a test or of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// The test ran to completion and met its own success criteria.
    #[serde(alias = "PASS", alias = "SUCCESS", alias = "success")]
    Pass,
    /// The test ran but failed.
    #[serde(alias = "FAIL", alias = "FAILED", alias = "failed")]
    Fail,
    /// The test did not run to completion.
    #[serde(alias = "INCOMPLETE")]
    Incomplete,
}

impl ResultStatus {
    /// Lowercase label as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Incomplete => "incomplete",
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Derived identifier. Never author-set; assigned by [`ResultDocument::identify`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Document type label.
    #[serde(default = "default_document_type")]
    pub document_type: String,
    /// Schema version of this document layout.
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// When the benchmark originally ran and its artifacts were collected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_timestamp: Option<DateTime<Utc>>,
    /// When this document was produced. Excluded from the content hash.
    #[serde(default = "Utc::now")]
    pub processing_timestamp: DateTime<Utc>,
    /// Operating system vendor label, e.g. `rhel`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_vendor: Option<String>,
    /// Cloud provider label, e.g. `azure`, or `local`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_provider: Option<String>,
    /// Instance type label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    /// Scenario the run belonged to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_name: Option<String>,
    /// Iteration of the scenario on this system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
}

fn default_document_type() -> String {
    DOCUMENT_TYPE.to_string()
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Metadata {
    /// Metadata stamped with the current processing time.
    pub fn new() -> Self {
        Self::processed_at(Utc::now())
    }

    /// Metadata with an explicit processing time.
    pub fn processed_at(processing_timestamp: DateTime<Utc>) -> Self {
        Self {
            document_id: None,
            document_type: default_document_type(),
            schema_version: default_schema_version(),
            collection_timestamp: None,
            processing_timestamp,
            os_vendor: None,
            cloud_provider: None,
            instance_type: None,
            scenario_name: None,
            iteration: None,
        }
    }

    /// Set the collection timestamp.
    pub fn collected_at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.collection_timestamp = Some(timestamp);
        self
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self::new()
    }
}

/// What was run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestInfo {
    /// Test name, e.g. `coremark`.
    pub name: String,
    /// Test version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Human description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestInfo {
    /// Create test info with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            description: None,
        }
    }

    /// Set the version.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// CPU description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CpuInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cores: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads_per_core: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_mhz: Option<f64>,
}

/// Memory description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_gb: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub memory_type: Option<String>,
}

/// Hardware snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HardwareInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryInfo>,
    /// Anything else the extractor captured (NUMA layout, disks, NICs...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: ValueMap,
}

/// Operating system snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingSystemInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernel_version: Option<String>,
}

/// Hardware, OS and configuration of the system at the time of the run.
///
/// Fully denormalized: the whole state travels with the document since the
/// system's configuration can change between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemUnderTest {
    #[serde(default)]
    pub hardware: HardwareInfo,
    #[serde(default)]
    pub operating_system: OperatingSystemInfo,
    /// Tuned profile, sysctl values, kernel command line, and so on.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: ValueMap,
}

/// Parameters and environment of the run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestConfiguration {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: ValueMap,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: ValueMap,
}

/// The headline number of a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryMetric {
    pub name: String,
    pub value: f64,
    pub unit: String,
}

impl PrimaryMetric {
    /// Create a primary metric.
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit: unit.into(),
        }
    }
}

/// Checksums and other validation artifacts captured for a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationArtifacts {
    /// Checksums keyed by artifact name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub checksums: BTreeMap<String, String>,
    /// Whether the benchmark's own validation passed, when it reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,
}

/// One sample within a run's time series. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// 0-based, strictly increasing within the run.
    pub sequence: u32,
    /// Benchmark iteration the sample belongs to, when the benchmark has them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub unit: String,
    /// Side measurements taken with the sample (CPU frequency, RSS, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: ValueMap,
}

impl TimeSeriesPoint {
    /// Create a point.
    pub fn new(sequence: u32, timestamp: DateTime<Utc>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            sequence,
            iteration: None,
            timestamp,
            value,
            unit: unit.into(),
            attributes: ValueMap::new(),
        }
    }

    /// Set the iteration.
    pub fn iteration(mut self, iteration: u32) -> Self {
        self.iteration = Some(iteration);
        self
    }

    /// Add a side attribute.
    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// One executed repetition within a test. Owned exclusively by its document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// 1-based, unique and dense within the document.
    pub run_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResultStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    /// Run-specific configuration.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub configuration: ValueMap,
    /// Summary metrics of the run.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: ValueMap,
    /// Ordered samples. Order by `sequence` is significant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeseries: Vec<TimeSeriesPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeseries_summary: Option<StatisticalSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationArtifacts>,
}

impl RunRecord {
    /// Create an empty run.
    pub fn new(run_number: u32) -> Self {
        Self {
            run_number,
            status: None,
            start_time: None,
            end_time: None,
            duration_seconds: None,
            configuration: ValueMap::new(),
            metrics: ValueMap::new(),
            timeseries: Vec::new(),
            timeseries_summary: None,
            validation: None,
        }
    }

    /// Set the run status.
    pub fn status(mut self, status: ResultStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Add a summary metric.
    pub fn metric(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }

    /// Append a time-series point.
    pub fn point(mut self, point: TimeSeriesPoint) -> Self {
        self.timeseries.push(point);
        self
    }

    /// Set start and end time; the duration is derived from them.
    pub fn timed(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_time = Some(start);
        self.end_time = Some(end);
        self.duration_seconds =
            Some(end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0);
        self
    }

    /// Compute `timeseries_summary` from the point values.
    pub fn summarize(mut self) -> Self {
        let values: Vec<f64> = self.timeseries.iter().map(|p| p.value).collect();
        self.timeseries_summary = StatisticalSummary::from_values(&values);
        self
    }

    fn validate_sequences(&self) -> Result<()> {
        let mut previous: Option<u32> = None;
        for point in &self.timeseries {
            let in_order = match previous {
                None => point.sequence == 0,
                Some(prev) => point.sequence > prev,
            };
            if !in_order {
                let message = if previous.is_none() {
                    "time series must start at sequence 0"
                } else {
                    "sequence values must be strictly increasing"
                };
                return Err(Error::structural(
                    message,
                    vec![format!(
                        "run_{}/sequence_{}",
                        self.run_number, point.sequence
                    )],
                ));
            }
            previous = Some(point.sequence);
        }
        Ok(())
    }
}

/// Aggregate results of the test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Results {
    pub status: ResultStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_metric: Option<PrimaryMetric>,
    /// Summary across all runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<StatisticalSummary>,
    /// Runs in `run_number` order.
    #[serde(default)]
    pub runs: Vec<RunRecord>,
}

impl Results {
    /// Results with a status and nothing else.
    pub fn new(status: ResultStatus) -> Self {
        Self {
            status,
            primary_metric: None,
            statistics: None,
            runs: Vec::new(),
        }
    }

    /// Set the primary metric.
    pub fn primary_metric(mut self, metric: PrimaryMetric) -> Self {
        self.primary_metric = Some(metric);
        self
    }

    /// Set the aggregate statistics.
    pub fn statistics(mut self, statistics: StatisticalSummary) -> Self {
        self.statistics = Some(statistics);
        self
    }

    /// Append a run.
    pub fn run(mut self, run: RunRecord) -> Self {
        self.runs.push(run);
        self
    }

    /// Total number of time-series points across all runs.
    pub fn timeseries_len(&self) -> usize {
        self.runs.iter().map(|r| r.timeseries.len()).sum()
    }

    /// Check run numbering and per-run sequence ordering.
    pub fn validate_structure(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let duplicates: Vec<String> = self
            .runs
            .iter()
            .filter(|run| !seen.insert(run.run_number))
            .map(|run| format!("run_{}", run.run_number))
            .collect();
        if !duplicates.is_empty() {
            return Err(Error::structural("duplicate run_number", duplicates));
        }

        let misplaced: Vec<String> = self
            .runs
            .iter()
            .enumerate()
            .filter(|(index, run)| run.run_number as usize != index + 1)
            .map(|(_, run)| format!("run_{}", run.run_number))
            .collect();
        if !misplaced.is_empty() {
            return Err(Error::structural(
                "run_number values must be dense, ordered and start at 1",
                misplaced,
            ));
        }

        self.runs.iter().try_for_each(RunRecord::validate_sequences)
    }
}

/// Operational provenance of the processing run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

/// Canonical result document for one benchmark execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    pub metadata: Metadata,
    pub test: TestInfo,
    #[serde(default)]
    pub system_under_test: SystemUnderTest,
    #[serde(default)]
    pub test_configuration: TestConfiguration,
    pub results: Results,
    #[serde(default)]
    pub runtime_info: RuntimeInfo,
    /// Digest recorded by [`ResultDocument::hash_content`].
    #[serde(skip)]
    digest: Option<ContentDigest>,
}

impl ResultDocument {
    /// Create a new builder.
    pub fn builder() -> ResultDocumentBuilder {
        ResultDocumentBuilder::default()
    }

    /// Parse an upstream JSON hand-off and validate it through the builder.
    pub fn from_json(json: &str) -> Result<Self> {
        let draft: DraftDocument = serde_json::from_str(json)?;
        draft.into_builder().build()
    }

    /// Parse an upstream hand-off that is already a JSON value.
    pub fn from_value(value: Value) -> Result<Self> {
        let draft: DraftDocument = serde_json::from_value(value)?;
        draft.into_builder().build()
    }

    /// Re-check the invariants the builder enforces.
    pub fn validate(&self) -> Result<()> {
        if normalize_test_name(&self.test.name).is_empty() {
            return Err(Error::invalid_field(
                "test.name",
                "test name is empty after normalization",
            ));
        }
        self.results.validate_structure()?;
        self.validate_numbers()
    }

    /// JSON has no encoding for NaN or infinities, so every typed float must
    /// be finite.
    fn validate_numbers(&self) -> Result<()> {
        let hardware = &self.system_under_test.hardware;
        if let Some(mhz) = hardware.cpu.as_ref().and_then(|cpu| cpu.frequency_mhz) {
            ensure_finite("system_under_test.hardware.cpu.frequency_mhz", mhz)?;
        }
        if let Some(gb) = hardware.memory.as_ref().and_then(|memory| memory.total_gb) {
            ensure_finite("system_under_test.hardware.memory.total_gb", gb)?;
        }

        let results = &self.results;
        if let Some(metric) = &results.primary_metric {
            ensure_finite("results.primary_metric.value", metric.value)?;
        }
        if let Some(statistics) = &results.statistics {
            ensure_finite_summary("results.statistics", statistics)?;
        }
        for run in &results.runs {
            let section = format!("results.runs[{}]", run.run_number);
            if let Some(seconds) = run.duration_seconds {
                ensure_finite(format!("{section}.duration_seconds"), seconds)?;
            }
            if let Some(summary) = &run.timeseries_summary {
                ensure_finite_summary(&format!("{section}.timeseries_summary"), summary)?;
            }
            for point in &run.timeseries {
                ensure_finite(
                    format!("{section}.timeseries[{}].value", point.sequence),
                    point.value,
                )?;
            }
        }
        Ok(())
    }

    /// Validate, then compute the content hash and record it on the document.
    ///
    /// Fields are public, so a built document may have been edited since it
    /// was validated.
    pub fn hash_content(&mut self) -> Result<&ContentDigest> {
        self.validate()?;
        let digest = compute_content_hash(self)?;
        Ok(self.digest.insert(digest))
    }

    /// Digest recorded by the last [`ResultDocument::hash_content`] call.
    pub fn content_digest(&self) -> Option<&ContentDigest> {
        self.digest.as_ref()
    }

    /// Hash the document, derive its identifiers and assign `document_id`.
    pub fn identify(mut self) -> Result<IdentifiedDocument> {
        let digest = self.hash_content()?.clone();
        let identifiers = derive_identifiers(&self, &digest)?;
        self.metadata.document_id = Some(identifiers.parent_id().to_string());
        Ok(IdentifiedDocument::new(self, identifiers))
    }

    /// Serialize to pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn ensure_finite(field: impl Into<String>, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid_field(
            field,
            format!("{value} is not a finite number"),
        ))
    }
}

fn ensure_finite_summary(section: &str, summary: &StatisticalSummary) -> Result<()> {
    let fixed = [
        ("mean", summary.mean),
        ("median", summary.median),
        ("min", summary.min),
        ("max", summary.max),
    ];
    for (name, value) in fixed.into_iter().chain(summary.stddev.map(|v| ("stddev", v))) {
        ensure_finite(format!("{section}.{name}"), value)?;
    }
    for (name, value) in &summary.percentiles {
        ensure_finite(format!("{section}.percentiles.{name}"), *value)?;
    }
    Ok(())
}

/// Builder for [`ResultDocument`] instances.
#[derive(Debug, Default)]
pub struct ResultDocumentBuilder {
    metadata: Option<Metadata>,
    test: Option<TestInfo>,
    system_under_test: SystemUnderTest,
    test_configuration: TestConfiguration,
    results: Option<Results>,
    runtime_info: RuntimeInfo,
}

impl ResultDocumentBuilder {
    /// Set metadata (required).
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Set test info (required).
    pub fn test(mut self, test: TestInfo) -> Self {
        self.test = Some(test);
        self
    }

    /// Set the system-under-test snapshot.
    pub fn system_under_test(mut self, sut: SystemUnderTest) -> Self {
        self.system_under_test = sut;
        self
    }

    /// Set the test configuration.
    pub fn test_configuration(mut self, config: TestConfiguration) -> Self {
        self.test_configuration = config;
        self
    }

    /// Add a single test parameter.
    pub fn parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.test_configuration.parameters.insert(key.into(), value);
        self
    }

    /// Set results (required).
    pub fn results(mut self, results: Results) -> Self {
        self.results = Some(results);
        self
    }

    /// Set runtime info.
    pub fn runtime_info(mut self, runtime_info: RuntimeInfo) -> Self {
        self.runtime_info = runtime_info;
        self
    }

    /// Build the [`ResultDocument`].
    ///
    /// Fails with a validation error naming the first missing required
    /// section, or a structural error for run/sequence numbering problems.
    /// Free-form value maps are normalized here so the canonical encoding has
    /// exactly one representation per number.
    pub fn build(self) -> Result<ResultDocument> {
        let mut metadata = self
            .metadata
            .ok_or_else(|| Error::missing_section("metadata"))?;
        let test = self.test.ok_or_else(|| Error::missing_section("test"))?;
        let mut results = self
            .results
            .ok_or_else(|| Error::missing_section("results"))?;

        if let Some(discarded) = metadata.document_id.take() {
            tracing::debug!(
                document_id = %discarded,
                "Discarding supplied document_id; identifiers are derived from content"
            );
        }

        let mut sut = self.system_under_test;
        sut.hardware.extra = normalize_map(sut.hardware.extra);
        sut.configuration = normalize_map(sut.configuration);

        let mut test_configuration = self.test_configuration;
        test_configuration.parameters = normalize_map(test_configuration.parameters);
        test_configuration.environment = normalize_map(test_configuration.environment);

        for run in &mut results.runs {
            run.configuration = normalize_map(std::mem::take(&mut run.configuration));
            run.metrics = normalize_map(std::mem::take(&mut run.metrics));
            for point in &mut run.timeseries {
                point.attributes = normalize_map(std::mem::take(&mut point.attributes));
            }
        }

        let document = ResultDocument {
            metadata,
            test,
            system_under_test: sut,
            test_configuration,
            results,
            runtime_info: self.runtime_info,
            digest: None,
        };
        document.validate()?;
        Ok(document)
    }
}

/// Upstream JSON shape with every required section optional, so that a
/// missing section surfaces as a validation error instead of a parse error.
#[derive(Deserialize)]
struct DraftDocument {
    metadata: Option<Metadata>,
    test: Option<TestInfo>,
    #[serde(default)]
    system_under_test: SystemUnderTest,
    #[serde(default)]
    test_configuration: TestConfiguration,
    results: Option<Results>,
    #[serde(default)]
    runtime_info: RuntimeInfo,
}

impl DraftDocument {
    fn into_builder(self) -> ResultDocumentBuilder {
        ResultDocumentBuilder {
            metadata: self.metadata,
            test: self.test,
            system_under_test: self.system_under_test,
            test_configuration: self.test_configuration,
            results: self.results,
            runtime_info: self.runtime_info,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_762_439_400 + secs, 0).unwrap()
    }

    fn run_with_points(run_number: u32, sequences: &[u32]) -> RunRecord {
        sequences.iter().fold(RunRecord::new(run_number), |run, seq| {
            run.point(TimeSeriesPoint::new(*seq, ts(*seq as i64), 1.5, "ops/s"))
        })
    }

    fn builder_with_runs(runs: Vec<RunRecord>) -> ResultDocumentBuilder {
        let results = runs
            .into_iter()
            .fold(Results::new(ResultStatus::Pass), Results::run);
        ResultDocument::builder()
            .metadata(Metadata::processed_at(ts(0)))
            .test(TestInfo::new("coremark"))
            .results(results)
    }

    #[test]
    fn test_builder_requires_metadata() {
        let result = ResultDocument::builder()
            .test(TestInfo::new("coremark"))
            .results(Results::new(ResultStatus::Pass))
            .build();
        let err = result.unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("metadata"));
    }

    #[test]
    fn test_builder_requires_test() {
        let err = ResultDocument::builder()
            .metadata(Metadata::new())
            .results(Results::new(ResultStatus::Pass))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("`test`"));
    }

    #[test]
    fn test_builder_requires_results() {
        let err = ResultDocument::builder()
            .metadata(Metadata::new())
            .test(TestInfo::new("coremark"))
            .build()
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("results"));
    }

    #[test]
    fn test_builder_rejects_blank_test_name() {
        let err = ResultDocument::builder()
            .metadata(Metadata::new())
            .test(TestInfo::new(" __ "))
            .results(Results::new(ResultStatus::Pass))
            .build()
            .unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("test.name"));
    }

    #[test]
    fn test_duplicate_run_number_is_structural() {
        let err = builder_with_runs(vec![RunRecord::new(1), RunRecord::new(1)])
            .build()
            .unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("duplicate run_number"));
        assert!(err.to_string().contains("run_1"));
    }

    #[test]
    fn test_runs_must_be_dense_from_one() {
        let err = builder_with_runs(vec![RunRecord::new(1), RunRecord::new(3)])
            .build()
            .unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("run_3"));

        let err = builder_with_runs(vec![RunRecord::new(0)]).build().unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_sequence_must_start_at_zero() {
        let err = builder_with_runs(vec![run_with_points(1, &[1, 2])])
            .build()
            .unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("run_1/sequence_1"));
    }

    #[test]
    fn test_sequence_must_increase() {
        let err = builder_with_runs(vec![run_with_points(1, &[0, 2, 2])])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("strictly increasing"));
        assert!(err.to_string().contains("run_1/sequence_2"));
    }

    #[test]
    fn test_builder_rejects_non_finite_values() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let run = RunRecord::new(1).point(TimeSeriesPoint::new(0, ts(0), value, "ops/s"));
            let err = builder_with_runs(vec![run]).build().unwrap_err();
            assert!(err.is_validation());
            assert!(err.to_string().contains("results.runs[1].timeseries[0].value"));

            let err = builder_with_runs(vec![RunRecord::new(1)])
                .results(
                    Results::new(ResultStatus::Pass)
                        .primary_metric(PrimaryMetric::new("score", value, "ops/s")),
                )
                .build()
                .unwrap_err();
            assert!(err.to_string().contains("results.primary_metric.value"));
        }

        let mut sut = SystemUnderTest::default();
        sut.hardware.memory = Some(MemoryInfo {
            total_gb: Some(f64::INFINITY),
            memory_type: None,
        });
        let err = builder_with_runs(vec![])
            .system_under_test(sut)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("memory.total_gb"));
    }

    #[test]
    fn test_edited_document_is_revalidated_before_hashing() {
        let mut doc = builder_with_runs(vec![run_with_points(1, &[0, 1])])
            .build()
            .unwrap();
        let copy = doc.results.runs[0].clone();
        doc.results.runs.push(copy);

        let err = doc.clone().hash_content().map(|_| ()).unwrap_err();
        assert!(err.is_structural());
        assert!(doc.content_digest().is_none());

        let err = doc.identify().unwrap_err();
        assert!(err.is_structural());
        assert!(err.to_string().contains("run_1"));
    }

    #[test]
    fn test_edited_point_value_is_revalidated_before_hashing() {
        let mut doc = builder_with_runs(vec![run_with_points(1, &[0])])
            .build()
            .unwrap();
        doc.results.runs[0].timeseries[0].value = f64::NAN;
        assert!(doc.identify().unwrap_err().is_validation());
    }

    #[test]
    fn test_valid_document_builds() {
        let doc = builder_with_runs(vec![run_with_points(1, &[0, 1, 2]), run_with_points(2, &[0, 5])])
            .build()
            .unwrap();
        assert_eq!(doc.results.runs.len(), 2);
        assert_eq!(doc.results.timeseries_len(), 5);
        assert!(doc.content_digest().is_none());
    }

    #[test]
    fn test_builder_normalizes_free_form_numbers() {
        let doc = builder_with_runs(vec![RunRecord::new(1).metric("iterations", json!(100.0))])
            .parameter("threads", json!(8.0))
            .parameter("ratio", json!(0.5))
            .build()
            .unwrap();
        assert_eq!(doc.test_configuration.parameters["threads"], json!(8));
        assert_eq!(doc.test_configuration.parameters["ratio"], json!(0.5));
        assert_eq!(doc.results.runs[0].metrics["iterations"], json!(100));
    }

    #[test]
    fn test_builder_discards_supplied_document_id() {
        let mut metadata = Metadata::new();
        metadata.document_id = Some("author_chosen".to_string());
        let doc = ResultDocument::builder()
            .metadata(metadata)
            .test(TestInfo::new("coremark"))
            .results(Results::new(ResultStatus::Pass))
            .build()
            .unwrap();
        assert!(doc.metadata.document_id.is_none());
    }

    #[test]
    fn test_from_json_reports_missing_section() {
        let json = r#"{
            "metadata": {"document_type": "benchmark_result", "schema_version": "1.0",
                         "processing_timestamp": "2025-11-06T14:30:00Z"},
            "test": {"name": "streams"}
        }"#;
        let err = ResultDocument::from_json(json).unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("results"));
    }

    #[test]
    fn test_from_json_accepts_legacy_status_labels() {
        let json = r#"{
            "metadata": {"document_type": "benchmark_result", "schema_version": "1.0",
                         "processing_timestamp": "2025-11-06T14:30:00.000Z"},
            "test": {"name": "coremark", "version": "1.0"},
            "results": {"status": "SUCCESS", "runs": [{"run_number": 1, "status": "PASS"}]}
        }"#;
        let doc = ResultDocument::from_json(json).unwrap();
        assert_eq!(doc.results.status, ResultStatus::Pass);
        assert_eq!(doc.results.runs[0].status, Some(ResultStatus::Pass));
    }

    #[test]
    fn test_run_timing_and_summary() {
        let run = run_with_points(1, &[0, 1, 2]).timed(ts(0), ts(90)).summarize();
        assert_eq!(run.duration_seconds, Some(90.0));
        let summary = run.timeseries_summary.unwrap();
        assert_eq!(summary.count, 3);
        assert_eq!(summary.mean, 1.5);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_value(ResultStatus::Incomplete).unwrap(), json!("incomplete"));
        assert_eq!(ResultStatus::Fail.to_string(), "fail");
    }
}
