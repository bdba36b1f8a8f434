// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory reference backend.
//!
//! Implements the upsert contract exactly and supports fault injection, so it
//! backs the exporter tests and the CLI's `--dry-run` mode.

use crate::upsert::{BackendError, NamespaceTemplate, UpsertBackend, WriteAck};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Backend keeping every namespace in a concurrent map.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    namespaces: DashMap<String, Value>,
    records: DashMap<(String, String), Value>,
    permanent_failures: DashSet<String>,
    transient_failures: DashMap<String, u32>,
    reject_explicit_ids: AtomicBool,
    ensure_calls: AtomicU64,
    write_calls: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every write to `id` fails with a fatal error.
    pub fn fail_permanently(&self, id: impl Into<String>) {
        self.permanent_failures.insert(id.into());
    }

    /// The next `times` writes to `id` fail with a retryable error.
    pub fn fail_transiently(&self, id: impl Into<String>, times: u32) {
        self.transient_failures.insert(id.into(), times);
    }

    /// Refuse every write with a conflict, as a backend that disallows
    /// explicit identifiers would.
    pub fn reject_explicit_ids(&self, reject: bool) {
        self.reject_explicit_ids.store(reject, Ordering::SeqCst);
    }

    /// Stored record, if any.
    pub fn get(&self, namespace: &str, id: &str) -> Option<Value> {
        self.records
            .get(&(namespace.to_string(), id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Number of records in `namespace`.
    pub fn len(&self, namespace: &str) -> usize {
        self.records
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .count()
    }

    /// Identifiers stored in `namespace`, sorted.
    pub fn ids(&self, namespace: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == namespace)
            .map(|entry| entry.key().1.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn namespace_exists(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Number of `ensure_namespace` calls received.
    pub fn ensure_calls(&self) -> u64 {
        self.ensure_calls.load(Ordering::SeqCst)
    }

    /// Number of `write` calls received, including failed ones.
    pub fn write_calls(&self) -> u64 {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn injected_failure(&self, id: &str) -> Option<BackendError> {
        if self.reject_explicit_ids.load(Ordering::SeqCst) {
            return Some(BackendError::Conflict(format!(
                "explicit identifier {id} is not allowed"
            )));
        }
        if self.permanent_failures.contains(id) {
            return Some(BackendError::Fatal(format!("injected permanent failure for {id}")));
        }
        let mut remaining = self.transient_failures.get_mut(id)?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        Some(BackendError::Retryable(format!("injected transient failure for {id}")))
    }
}

#[async_trait]
impl UpsertBackend for InMemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_namespace(&self, template: &NamespaceTemplate) -> Result<bool, BackendError> {
        self.ensure_calls.fetch_add(1, Ordering::SeqCst);
        if self.namespaces.contains_key(&template.name) {
            return Ok(false);
        }
        Ok(self
            .namespaces
            .insert(template.name.clone(), template.body.clone())
            .is_none())
    }

    async fn write(
        &self,
        namespace: &str,
        id: &str,
        payload: &Value,
    ) -> Result<WriteAck, BackendError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.injected_failure(id) {
            return Err(err);
        }
        if !self.namespaces.contains_key(namespace) {
            return Err(BackendError::Fatal(format!("namespace {namespace} does not exist")));
        }

        let previous = self
            .records
            .insert((namespace.to_string(), id.to_string()), payload.clone());
        Ok(match previous {
            None => WriteAck::created(id),
            Some(_) => WriteAck::replaced(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upsert::WriteOutcome;
    use serde_json::json;

    async fn backend_with(namespace: &str) -> InMemoryBackend {
        let backend = InMemoryBackend::new();
        backend
            .ensure_namespace(&NamespaceTemplate::new(namespace, json!({})))
            .await
            .unwrap();
        backend
    }

    #[tokio::test]
    async fn test_write_replaces_without_merging() {
        let backend = backend_with("results").await;
        let first = backend
            .write("results", "doc_1", &json!({"a": 1, "b": 2}))
            .await
            .unwrap();
        let second = backend.write("results", "doc_1", &json!({"a": 3})).await.unwrap();

        assert_eq!(first.outcome, WriteOutcome::Created);
        assert_eq!(second.outcome, WriteOutcome::Replaced);
        assert_eq!(backend.len("results"), 1);
        assert_eq!(backend.get("results", "doc_1"), Some(json!({"a": 3})));
    }

    #[tokio::test]
    async fn test_ensure_namespace_reports_creation_once() {
        let backend = InMemoryBackend::new();
        let template = NamespaceTemplate::new("results", json!({"settings": {}}));
        assert!(backend.ensure_namespace(&template).await.unwrap());
        assert!(!backend.ensure_namespace(&template).await.unwrap());
        assert_eq!(backend.ensure_calls(), 2);
    }

    #[tokio::test]
    async fn test_write_to_missing_namespace_is_fatal() {
        let backend = InMemoryBackend::new();
        let err = backend.write("missing", "x", &json!({})).await.unwrap_err();
        assert!(matches!(err, BackendError::Fatal(_)));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let backend = backend_with("results").await;
        backend.fail_transiently("flaky", 2);
        backend.fail_permanently("broken");

        for _ in 0..2 {
            let err = backend.write("results", "flaky", &json!({})).await.unwrap_err();
            assert!(err.is_retryable());
        }
        assert!(backend.write("results", "flaky", &json!({})).await.is_ok());
        assert!(matches!(
            backend.write("results", "broken", &json!({})).await,
            Err(BackendError::Fatal(_))
        ));

        backend.reject_explicit_ids(true);
        assert!(matches!(
            backend.write("results", "flaky", &json!({})).await,
            Err(BackendError::Conflict(_))
        ));
        assert_eq!(backend.write_calls(), 5);
        assert_eq!(backend.ids("results"), vec!["flaky".to_string()]);
    }
}
