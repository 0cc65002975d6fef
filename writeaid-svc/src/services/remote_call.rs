//! Remote call adapter for the upstream analysis API
//!
//! One generic `invoke(method, path, params)` entry point; every upstream
//! endpoint the workflow engine needs goes through it. GET parameters become
//! query pairs, POST/PUT parameters become the JSON body. No retries happen
//! at this layer.

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};
use writeaid_common::config::UpstreamConfig;

/// Remote call errors
#[derive(Debug, Error)]
pub enum RemoteCallError {
    /// Verb outside GET/POST/PUT
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(Method),

    /// Upstream answered with status >= 400
    #[error("{method} {url} failed with status {status}: {body}")]
    Status {
        method: Method,
        url: String,
        status: u16,
        body: String,
    },

    /// Connection failure or timeout
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Body was not valid JSON
    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Generic upstream invocation seam
#[async_trait]
pub trait RemoteCall: Send + Sync {
    /// Call `path` (relative to the upstream base URL) and return the decoded JSON body
    async fn invoke(
        &self,
        method: Method,
        path: &str,
        params: Value,
    ) -> Result<Value, RemoteCallError>;
}

/// reqwest-backed adapter
pub struct HttpRemoteCall {
    http_client: Client,
    base_url: String,
}

impl HttpRemoteCall {
    /// Build the adapter with the configured timeouts
    pub fn new(config: &UpstreamConfig) -> reqwest::Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Flatten a JSON object into query pairs; strings are sent unquoted
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    match params {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl RemoteCall for HttpRemoteCall {
    async fn invoke(
        &self,
        method: Method,
        path: &str,
        params: Value,
    ) -> Result<Value, RemoteCallError> {
        let url = self.url_for(path);

        let request = if method == Method::GET {
            self.http_client.get(&url).query(&query_pairs(&params))
        } else if method == Method::POST {
            self.http_client.post(&url).json(&params)
        } else if method == Method::PUT {
            self.http_client.put(&url).json(&params)
        } else {
            return Err(RemoteCallError::UnsupportedMethod(method));
        };

        info!(method = %method, url = %url, "Upstream call");
        debug!(params = %params, "Upstream call parameters");

        let response = request.send().await.map_err(|e| {
            error!(method = %method, url = %url, error = %e, "Upstream call failed");
            RemoteCallError::Transport(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        if status.as_u16() >= 400 {
            error!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                body = %body,
                "Upstream returned error status"
            );
            return Err(RemoteCallError::Status {
                method,
                url,
                status: status.as_u16(),
                body,
            });
        }

        debug!(status = status.as_u16(), body = %body, "Upstream response");

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}
