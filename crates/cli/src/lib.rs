// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI for Benchstore.
//!
//! `process` loads result documents, identifies them and exports them to one
//! backend; `hash` prints the identifiers of a single document; `status`
//! checks the configured OpenSearch cluster.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

use anyhow::Context;
use benchstore_adapters::prelude::*;
use benchstore_core::IdentifiedDocument;
use benchstore_reports::{io, ProcessingReport, ProcessingStats};
use clap::{ArgGroup, Args, Parser, Subcommand, ValueEnum};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Benchstore CLI.
#[derive(Parser, Debug)]
#[command(name = "benchstore")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (YAML, TOML or JSON).
    #[arg(short, long, global = true, env = "BENCHSTORE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per event.
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Identify result documents and export them to a backend.
    Process(ProcessArgs),

    /// Print the content digest and identifiers of one document.
    Hash {
        /// Result document (JSON).
        file: PathBuf,
    },

    /// Check connectivity to the configured OpenSearch cluster.
    Status,
}

/// Arguments of `process`.
#[derive(Args, Debug)]
#[command(group(
    ArgGroup::new("target")
        .required(true)
        .args(["opensearch", "output_json", "dry_run"])
))]
pub struct ProcessArgs {
    /// Input directory, searched recursively for `*.json`, or a single file.
    #[arg(short, long)]
    pub input: PathBuf,

    /// Export to the configured OpenSearch cluster.
    #[arg(long)]
    pub opensearch: bool,

    /// Export to a directory of JSON files.
    #[arg(long, value_name = "DIR")]
    pub output_json: Option<PathBuf>,

    /// Export to memory only; nothing is persisted.
    #[arg(long)]
    pub dry_run: bool,

    /// Documents exported concurrently.
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Write the full report as JSON.
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Write a markdown summary.
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `verbose` when set.
pub fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

/// Run a parsed command.
///
/// Returns `Ok(false)` when the command ran but the outcome should fail the
/// process (some document failed, or none succeeded).
pub async fn run(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Process(args) => {
            let config = load_config(cli.config.as_deref())?;
            let report = process(&config, &args).await?;
            println!("{}", report.stats.summary_text());
            Ok(report.is_success())
        }
        Commands::Hash { file } => {
            let document = io::read_document(&file)?;
            let identified = document.identify()?;
            println!("{}", serde_json::to_string_pretty(&describe(&identified))?);
            Ok(true)
        }
        Commands::Status => {
            let config = load_config(cli.config.as_deref())?;
            println!("Benchstore {}", env!("CARGO_PKG_VERSION"));
            println!("OpenSearch: {}", config.opensearch.url);
            let backend = OpenSearchBackend::new(config.opensearch)?;
            let info = backend
                .cluster_info()
                .await
                .context("OpenSearch is not reachable")?;
            println!("Cluster:    {} ({})", info.cluster_name, info.version.number);
            println!("Results:    {}", config.export.results_namespace);
            println!("Timeseries: {}", config.export.timeseries_namespace);
            Ok(true)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    PipelineConfig::load(path).with_context(|| match path {
        Some(path) => format!("loading configuration from {}", path.display()),
        None => "loading configuration".to_string(),
    })
}

fn describe(identified: &IdentifiedDocument) -> serde_json::Value {
    let identifiers = identified.identifiers();
    serde_json::json!({
        "document_id": identified.id(),
        "content_digest": identifiers.digest().as_str(),
        "test_name": identified.document().test.name,
        "runs": identified.document().results.runs.len(),
        "timeseries_ids": identifiers.children().values().collect::<Vec<_>>(),
    })
}

fn select_backend(
    config: &PipelineConfig,
    args: &ProcessArgs,
) -> anyhow::Result<Arc<dyn UpsertBackend>> {
    if args.opensearch {
        return Ok(Arc::new(OpenSearchBackend::new(config.opensearch.clone())?));
    }
    if args.dry_run {
        return Ok(Arc::new(InMemoryBackend::new()));
    }
    let dir = args
        .output_json
        .as_ref()
        .or(config.output_dir.as_ref())
        .context("no export target: pass --opensearch, --output-json or --dry-run")?;
    Ok(Arc::new(JsonDirectoryBackend::new(dir)))
}

/// Load, identify and export every input under `args.input`.
///
/// Inputs that fail validation are counted and reported without stopping
/// the run. An input whose identifier was already seen in this run is
/// skipped.
pub async fn process(config: &PipelineConfig, args: &ProcessArgs) -> anyhow::Result<ProcessingReport> {
    let mut stats = ProcessingStats::new();
    let inputs = io::discover_inputs(&args.input)
        .with_context(|| format!("reading inputs from {}", args.input.display()))?;
    info!(inputs = inputs.len(), input = %args.input.display(), "Discovered inputs");

    let mut seen = HashSet::new();
    let mut documents = Vec::new();
    for path in &inputs {
        stats.record_input();
        let identified = io::read_document(path)
            .map_err(anyhow::Error::from)
            .and_then(|doc| Ok(doc.identify()?));
        match identified {
            Ok(identified) => {
                if !seen.insert(identified.id().to_string()) {
                    info!(document_id = %identified.id(), path = %path.display(), "Skipping duplicate input");
                    stats.record_skip();
                    continue;
                }
                debug!(document_id = %identified.id(), path = %path.display(), "Identified document");
                stats.record_success(&identified.document().test.name);
                documents.push(identified);
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Skipping invalid input");
                stats.record_failure(path.display().to_string(), format!("{err:#}"));
            }
        }
    }

    let mut settings = config.export.clone();
    if let Some(concurrency) = args.concurrency {
        settings.concurrency = concurrency;
    }
    let exporter = DocumentExporter::new(select_backend(config, args)?, settings);
    info!(
        backend = exporter.backend_name(),
        documents = documents.len(),
        "Exporting documents"
    );
    let export = exporter.export_batch(&documents).await;
    stats.record_export(&export);
    stats.finish();

    let report = ProcessingReport { stats, export };
    if let Some(path) = &args.report {
        io::write_report_json(&report, path)
            .with_context(|| format!("writing report to {}", path.display()))?;
    }
    if let Some(path) = &args.summary {
        io::write_summary(&report, path)
            .with_context(|| format!("writing summary to {}", path.display()))?;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn input(name: &str, score: f64) -> String {
        format!(
            r#"{{
                "metadata": {{"document_type": "benchmark_result", "schema_version": "1.0",
                             "processing_timestamp": "2025-11-06T14:30:00Z"}},
                "test": {{"name": "{name}"}},
                "results": {{
                    "status": "pass",
                    "primary_metric": {{"name": "score", "value": {score}, "unit": "ops/s"}},
                    "runs": [{{"run_number": 1, "timeseries": [
                        {{"sequence": 0, "timestamp": "2025-11-06T14:00:00Z", "value": 1.0, "unit": "ops/s"}},
                        {{"sequence": 1, "timestamp": "2025-11-06T14:00:10Z", "value": 2.0, "unit": "ops/s"}}
                    ]}}]
                }}
            }}"#
        )
    }

    fn args(input: &Path) -> ProcessArgs {
        ProcessArgs {
            input: input.to_path_buf(),
            opensearch: false,
            output_json: None,
            dry_run: true,
            concurrency: None,
            report: None,
            summary: None,
        }
    }

    #[test]
    fn test_process_requires_a_target() {
        assert!(Cli::try_parse_from(["benchstore", "process", "--input", "in"]).is_err());
        assert!(Cli::try_parse_from(["benchstore", "process", "--input", "in", "--dry-run", "--opensearch"]).is_err());

        let cli = Cli::try_parse_from([
            "benchstore", "process", "-i", "in", "--output-json", "out", "--concurrency", "4", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Process(args) => {
                assert_eq!(args.output_json, Some(PathBuf::from("out")));
                assert_eq!(args.concurrency, Some(4));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_log_format_parses() {
        let cli = Cli::try_parse_from(["benchstore", "--log-format", "json", "status"]).unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
    }

    #[tokio::test]
    async fn test_process_dry_run_counts_everything() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), input("coremark", 1.5)).unwrap();
        fs::write(dir.path().join("b.json"), input("coremark", 1.5)).unwrap();
        fs::write(dir.path().join("c.json"), input("streams", 9.0)).unwrap();
        fs::write(dir.path().join("d.json"), r#"{"test": {"name": "broken"}}"#).unwrap();

        let report = process(&PipelineConfig::default(), &args(dir.path()))
            .await
            .unwrap();
        let stats = &report.stats;
        assert_eq!(stats.total, 4);
        assert_eq!(stats.successful, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.documents_written, 2);
        assert_eq!(stats.timeseries_written, 4);
        assert!(!report.is_success());
    }

    #[tokio::test]
    async fn test_process_to_json_directory_writes_reports() {
        let inputs = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        fs::write(inputs.path().join("a.json"), input("coremark", 1.5)).unwrap();

        let mut args = args(inputs.path());
        args.dry_run = false;
        args.output_json = Some(out.path().join("store"));
        args.report = Some(out.path().join("report.json"));
        args.summary = Some(out.path().join("summary.md"));

        let report = process(&PipelineConfig::default(), &args).await.unwrap();
        assert!(report.is_success());

        let id = &report.export.documents[0].document_id;
        assert!(id.starts_with("coremark_"));
        assert!(out
            .path()
            .join("store")
            .join("benchstore-results")
            .join(format!("{id}.json"))
            .exists());
        assert!(out
            .path()
            .join("store")
            .join("benchstore-timeseries")
            .join(format!("{id}_run_1_sequence_1.json"))
            .exists());
        assert_eq!(io::read_report_json(out.path().join("report.json")).unwrap(), report);
        assert!(out.path().join("summary.md").exists());
    }

    #[test]
    fn test_describe_lists_identifiers() {
        let document = benchstore_core::ResultDocument::from_json(&input("coremark", 2.0)).unwrap();
        let identified = document.identify().unwrap();
        let described = describe(&identified);
        assert_eq!(described["document_id"], identified.id());
        assert_eq!(described["timeseries_ids"].as_array().unwrap().len(), 2);
    }
}
