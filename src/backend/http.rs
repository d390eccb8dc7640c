use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;
use tracing::debug;

use super::{BackendReply, BackendResult, JobBackend};

/// HTTP client for the question-generation backend.
pub struct HttpJobBackend {
    base_url: String,
    client: Client,
}

impl HttpJobBackend {
    /// Create a client rooted at `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> BackendResult<Self> {
        // reqwest is built without a bundled rustls provider
        let _ = rustls::crypto::ring::default_provider().install_default();

        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { base_url, client })
    }

    /// Get the base URL being used
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join a route onto the base URL.
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// Read status and body without judging either.
    ///
    /// Non-2xx replies are returned as data: the orchestrator decides whether
    /// a 404 means "not ready", "wrong path" or "job gone".
    async fn read_reply(response: Response) -> BackendResult<BackendReply> {
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok(BackendReply::new(status, decode_body(&text)))
    }
}

impl JobBackend for HttpJobBackend {
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> BackendResult<BackendReply> {
        let url = self.url(path);
        debug!(%url, "GET");
        let response = self.client.get(&url).query(query).send().await?;
        Self::read_reply(response).await
    }

    async fn post(&self, path: &str, body: &Value) -> BackendResult<BackendReply> {
        let url = self.url(path);
        debug!(%url, "POST");
        let response = self.client.post(&url).json(body).send().await?;
        Self::read_reply(response).await
    }
}

/// Decode a response body, keeping non-JSON text around for error messages.
pub(crate) fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.trim().to_string()))
}
