// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! JSON directory backend.
//!
//! Layout: `{root}/{namespace}/{id}.json`, one pretty-printed record per file,
//! plus `{root}/{namespace}/_template.json` recording the template the
//! namespace was created from. Writes go to a temporary file that is renamed
//! over the target, so a record is always either the old or the new payload.

use crate::upsert::{BackendError, NamespaceTemplate, UpsertBackend, WriteAck};
use async_trait::async_trait;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;

const TEMPLATE_FILE: &str = "_template.json";

/// Backend writing records as JSON files under a root directory.
#[derive(Debug)]
pub struct JsonDirectoryBackend {
    root: PathBuf,
    tmp_counter: AtomicU64,
}

impl JsonDirectoryBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            tmp_counter: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the record `id` in `namespace`.
    pub fn record_path(&self, namespace: &str, id: &str) -> PathBuf {
        self.root.join(namespace).join(format!("{id}.json"))
    }

    async fn write_atomic(&self, path: &Path, bytes: &[u8]) -> io::Result<()> {
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("json.{}-{n}.tmp", std::process::id()));
        fs::write(&tmp, bytes).await?;
        if let Err(err) = fs::rename(&tmp, path).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err);
        }
        Ok(())
    }
}

fn check_segment(kind: &str, segment: &str) -> Result<(), BackendError> {
    let bad = segment.is_empty()
        || segment.starts_with('.')
        || segment.contains(['/', '\\'])
        || segment == TEMPLATE_FILE.trim_end_matches(".json");
    if bad {
        return Err(BackendError::Fatal(format!("invalid {kind} `{segment}`")));
    }
    Ok(())
}

fn classify(context: &str, err: io::Error) -> BackendError {
    let message = format!("{context}: {err}");
    match err.kind() {
        io::ErrorKind::Interrupted
        | io::ErrorKind::TimedOut
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::WriteZero => BackendError::Retryable(message),
        _ => BackendError::Fatal(message),
    }
}

#[async_trait]
impl UpsertBackend for JsonDirectoryBackend {
    fn name(&self) -> &'static str {
        "json-directory"
    }

    async fn ensure_namespace(&self, template: &NamespaceTemplate) -> Result<bool, BackendError> {
        check_segment("namespace", &template.name)?;
        let dir = self.root.join(&template.name);
        if fs::try_exists(dir.join(TEMPLATE_FILE))
            .await
            .map_err(|e| classify("checking namespace", e))?
        {
            return Ok(false);
        }

        fs::create_dir_all(&dir)
            .await
            .map_err(|e| classify("creating namespace", e))?;
        let body = serde_json::to_vec_pretty(&template.body)
            .map_err(|e| BackendError::Fatal(format!("encoding template: {e}")))?;
        self.write_atomic(&dir.join(TEMPLATE_FILE), &body)
            .await
            .map_err(|e| classify("writing namespace template", e))?;
        Ok(true)
    }

    async fn write(
        &self,
        namespace: &str,
        id: &str,
        payload: &Value,
    ) -> Result<WriteAck, BackendError> {
        check_segment("namespace", namespace)?;
        check_segment("identifier", id)?;
        let dir = self.root.join(namespace);
        if !fs::try_exists(&dir)
            .await
            .map_err(|e| classify("checking namespace", e))?
        {
            return Err(BackendError::Fatal(format!("namespace {namespace} does not exist")));
        }

        let path = self.record_path(namespace, id);
        let existed = fs::try_exists(&path)
            .await
            .map_err(|e| classify("checking record", e))?;
        let bytes = serde_json::to_vec_pretty(payload)
            .map_err(|e| BackendError::Fatal(format!("encoding record {id}: {e}")))?;
        self.write_atomic(&path, &bytes)
            .await
            .map_err(|e| classify("writing record", e))?;

        Ok(if existed {
            WriteAck::replaced(id)
        } else {
            WriteAck::created(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upsert::WriteOutcome;
    use serde_json::json;

    #[tokio::test]
    async fn test_namespace_is_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonDirectoryBackend::new(dir.path());
        let template = NamespaceTemplate::results("benchstore-results");

        assert!(backend.ensure_namespace(&template).await.unwrap());
        assert!(!backend.ensure_namespace(&template).await.unwrap());
        assert!(dir.path().join("benchstore-results").join(TEMPLATE_FILE).exists());
    }

    #[tokio::test]
    async fn test_write_creates_then_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonDirectoryBackend::new(dir.path());
        backend
            .ensure_namespace(&NamespaceTemplate::new("results", json!({})))
            .await
            .unwrap();

        let first = backend
            .write("results", "coremark_0011223344556677", &json!({"v": 1, "extra": true}))
            .await
            .unwrap();
        let second = backend
            .write("results", "coremark_0011223344556677", &json!({"v": 2}))
            .await
            .unwrap();
        assert_eq!(first.outcome, WriteOutcome::Created);
        assert_eq!(second.outcome, WriteOutcome::Replaced);

        let path = backend.record_path("results", "coremark_0011223344556677");
        let stored: Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(stored, json!({"v": 2}));

        let files: Vec<_> = std::fs::read_dir(dir.path().join("results"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .filter(|name| name != TEMPLATE_FILE)
            .collect();
        assert_eq!(files, vec!["coremark_0011223344556677.json".to_string()]);
    }

    #[tokio::test]
    async fn test_rejects_path_like_identifiers() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonDirectoryBackend::new(dir.path());
        backend
            .ensure_namespace(&NamespaceTemplate::new("results", json!({})))
            .await
            .unwrap();
        for id in ["../escape", ".hidden", "", "_template"] {
            let err = backend.write("results", id, &json!({})).await.unwrap_err();
            assert!(matches!(err, BackendError::Fatal(_)), "{id}");
        }
    }

    #[tokio::test]
    async fn test_missing_namespace_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let backend = JsonDirectoryBackend::new(dir.path());
        let err = backend.write("nope", "x", &json!({})).await.unwrap_err();
        assert!(!err.is_retryable());
    }
}
