//! Bulk client for an OpenSearch-compatible index service

use crate::config::IndexConfig;
use crate::index::{BulkOperation, IndexError};
use reqwest::header::{CONTENT_TYPE, WARNING};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// A per-item error reported by the bulk endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItemFailure {
    pub action: String,
    pub id: Option<String>,
    pub status: u16,
    pub reason: String,
}

/// Per-item outcome counts of one bulk call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkSummary {
    pub succeeded: usize,

    /// `create` items rejected with 409 because the document already exists
    pub conflicts: usize,

    pub failures: Vec<BulkItemFailure>,
}

impl BulkSummary {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<HashMap<String, BulkItem>>,
}

#[derive(Debug, Deserialize)]
struct BulkItem {
    #[serde(rename = "_id")]
    id: Option<String>,
    status: u16,
    error: Option<serde_json::Value>,
}

/// Client for the index service's `_bulk` endpoint
pub struct IndexClient {
    client: Client,
    bulk_url: Url,
    username: Option<String>,
    password: Option<String>,
    timeout: Duration,
}

impl IndexClient {
    /// Builds a client from config, reading the password from the configured
    /// environment variable
    pub fn from_config(config: &IndexConfig) -> Result<Self, IndexError> {
        let password = match &config.password_env {
            Some(var) => Some(
                std::env::var(var).map_err(|_| IndexError::MissingPassword(var.clone()))?,
            ),
            None => None,
        };
        Self::new(Client::new(), config, password)
    }

    pub fn new(
        client: Client,
        config: &IndexConfig,
        password: Option<String>,
    ) -> Result<Self, IndexError> {
        let host = Url::parse(&config.host)
            .map_err(|e| IndexError::InvalidHost(format!("{}: {}", config.host, e)))?;

        let mut bulk_url = host
            .join(&format!("{}/_bulk", config.index))
            .map_err(|e| IndexError::InvalidHost(format!("{}: {}", config.host, e)))?;
        bulk_url
            .query_pairs_mut()
            .append_pair("pipeline", &config.pipeline);

        Ok(Self {
            client,
            bulk_url,
            username: config.username.clone(),
            password,
            timeout: Duration::from_millis(config.timeout),
        })
    }

    pub fn bulk_url(&self) -> &Url {
        &self.bulk_url
    }

    /// Sends one bulk request and classifies each item result
    ///
    /// A 409 on a `create` item is counted as a conflict, not a failure. Other item
    /// errors are logged and returned in the summary; only transport errors and a
    /// non-success response status fail the call as a whole.
    pub async fn bulk(&self, operations: &[BulkOperation]) -> Result<BulkSummary, IndexError> {
        if operations.is_empty() {
            return Ok(BulkSummary::default());
        }

        let body = encode_ndjson(operations)?;
        tracing::debug!(url = %self.bulk_url, operations = operations.len(), "Sending bulk request");

        let mut request = self
            .client
            .post(self.bulk_url.clone())
            .header(CONTENT_TYPE, "application/x-ndjson")
            .timeout(self.timeout)
            .body(body);
        if let Some(username) = &self.username {
            request = request.basic_auth(username, self.password.as_deref());
        }

        let response = request.send().await?;

        for warning in response.headers().get_all(WARNING) {
            if let Ok(text) = warning.to_str() {
                tracing::warn!(warning = text, "Index service warning");
            }
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IndexError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: BulkResponse = response.json().await?;
        Ok(summarize(parsed))
    }
}

fn encode_ndjson(operations: &[BulkOperation]) -> Result<String, IndexError> {
    let mut body = String::new();
    for operation in operations {
        let mut header = serde_json::Map::new();
        header.insert(
            operation.action().to_string(),
            json!({ "_id": operation.id().to_string() }),
        );
        body.push_str(&serde_json::to_string(&header)?);
        body.push('\n');

        if let BulkOperation::Index { document, .. } = operation {
            body.push_str(&serde_json::to_string(document)?);
            body.push('\n');
        }
    }
    Ok(body)
}

fn summarize(response: BulkResponse) -> BulkSummary {
    let mut summary = BulkSummary::default();

    for entry in response.items {
        for (action, item) in entry {
            match item.error {
                None => summary.succeeded += 1,
                Some(_) if action == "create" && item.status == 409 => summary.conflicts += 1,
                Some(error) => {
                    let reason = error
                        .get("reason")
                        .and_then(|r| r.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string());
                    tracing::error!(
                        action = %action,
                        id = ?item.id,
                        status = item.status,
                        reason = %reason,
                        "Error in bulk response"
                    );
                    summary.failures.push(BulkItemFailure {
                        action,
                        id: item.id,
                        status: item.status,
                        reason,
                    });
                }
            }
        }
    }

    summary
}
