// Copyright 2025 Benchstore Contributors
// SPDX-License-Identifier: Apache-2.0

//! OpenSearch backend.
//!
//! - namespaces are indices: `HEAD /{index}`, then `PUT /{index}` with the
//!   template body when absent
//! - records are written with `PUT /{index}/_doc/{id}`, which replaces the
//!   whole document under an explicit id
//! - `GET /` reports cluster name and version
//!
//! Status classification: `409` is a conflict, `408`, `429` and `5xx` are
//! retryable, any other non-success status is fatal. Connection failures and
//! timeouts are retryable.

use crate::config::OpenSearchConfig;
use crate::upsert::{BackendError, NamespaceTemplate, UpsertBackend, WriteAck};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

/// Longest response body excerpt kept in error messages.
const ERROR_BODY_LIMIT: usize = 512;

/// Cluster identity returned by `GET /`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterInfo {
    pub cluster_name: String,
    #[serde(default)]
    pub version: ClusterVersion,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ClusterVersion {
    #[serde(default)]
    pub number: String,
    #[serde(default)]
    pub distribution: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    result: Option<String>,
}

/// Backend talking to an OpenSearch (or Elasticsearch-compatible) cluster.
#[derive(Debug, Clone)]
pub struct OpenSearchBackend {
    client: Client,
    base_url: String,
    config: OpenSearchConfig,
}

impl OpenSearchBackend {
    /// Build a backend and its HTTP client from `config`.
    pub fn new(config: OpenSearchConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms.max(1)))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| BackendError::Fatal(format!("building HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.config.api_token, &self.config.username) {
            (Some(token), _) => request.bearer_auth(token),
            (None, Some(user)) => request.basic_auth(user, self.config.password.as_ref()),
            (None, None) => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, BackendError> {
        self.authorize(request).send().await.map_err(classify_transport)
    }

    /// Fetch cluster identity; used as a connectivity check.
    pub async fn cluster_info(&self) -> Result<ClusterInfo, BackendError> {
        let response = self.send(self.client.get(self.url("/"))).await?;
        let response = check_status(response).await?;
        let info: ClusterInfo = response
            .json()
            .await
            .map_err(|e| BackendError::Fatal(format!("decoding cluster info: {e}")))?;
        info!(
            cluster = %info.cluster_name,
            version = %info.version.number,
            "Connected to OpenSearch"
        );
        Ok(info)
    }
}

fn classify_transport(err: reqwest::Error) -> BackendError {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        BackendError::Retryable(format!("transport error: {err}"))
    } else {
        BackendError::Fatal(format!("transport error: {err}"))
    }
}

/// Map an HTTP status to the backend error taxonomy.
pub fn classify_status(status: StatusCode, body: &str) -> BackendError {
    let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
    let message = format!("HTTP {status}: {excerpt}");
    match status {
        StatusCode::CONFLICT => BackendError::Conflict(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            BackendError::Retryable(message)
        }
        s if s.is_server_error() => BackendError::Retryable(message),
        _ => BackendError::Fatal(message),
    }
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, &body))
}

#[async_trait]
impl UpsertBackend for OpenSearchBackend {
    fn name(&self) -> &'static str {
        "opensearch"
    }

    async fn ensure_namespace(&self, template: &NamespaceTemplate) -> Result<bool, BackendError> {
        let index_url = self.url(&template.name);
        let head = self.send(self.client.head(&index_url)).await?;
        match head.status() {
            s if s.is_success() => return Ok(false),
            StatusCode::NOT_FOUND => {}
            s => return Err(classify_status(s, "")),
        }

        debug!(index = %template.name, "Creating index");
        let response = self
            .send(self.client.put(&index_url).json(&template.body))
            .await?;
        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        let body = response.text().await.unwrap_or_default();
        // Another writer created it between HEAD and PUT.
        if status == StatusCode::BAD_REQUEST && body.contains("resource_already_exists_exception") {
            return Ok(false);
        }
        Err(classify_status(status, &body))
    }

    async fn write(
        &self,
        namespace: &str,
        id: &str,
        payload: &Value,
    ) -> Result<WriteAck, BackendError> {
        let url = self.url(&format!("{namespace}/_doc/{id}"));
        let response = self.send(self.client.put(url).json(payload)).await?;
        let status = response.status();
        let response = check_status(response).await?;

        let result = response
            .json::<IndexResponse>()
            .await
            .ok()
            .and_then(|r| r.result);
        let created = match result.as_deref() {
            Some("created") => true,
            Some(_) => false,
            None => status == StatusCode::CREATED,
        };
        Ok(if created {
            WriteAck::created(id)
        } else {
            WriteAck::replaced(id)
        })
    }
}
