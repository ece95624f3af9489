//! Streamable-HTTP transport: JSON-RPC over POST to a single MCP endpoint.
//!
//! Each request is one HTTP round-trip carrying a JSON body; the optional
//! bearer token authenticates every call. Servers that answer with SSE
//! streams are not supported by this transport.

use std::sync::atomic::{AtomicU64, Ordering};

use {
    anyhow::{Context, Result, bail},
    tracing::trace,
};

use crate::types::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse};

pub struct HttpTransport {
    endpoint: String,
    client: reqwest::Client,
    bearer_token: Option<String>,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(endpoint: &str, bearer_token: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
            bearer_token,
            next_id: AtomicU64::new(1),
        }
    }

    /// Send a JSON-RPC request and wait for the response.
    pub async fn request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let req = JsonRpcRequest::new(id, method, params);

        let response = self
            .post(serde_json::to_value(&req)?)
            .await
            .with_context(|| format!("MCP request {method} failed"))?;

        let status = response.status();
        let body = response.text().await?;
        trace!(%method, %status, "MCP server -> client");

        if !status.is_success() {
            bail!("MCP endpoint returned HTTP {status}: {body}");
        }

        let parsed: JsonRpcResponse = serde_json::from_str(&body)
            .with_context(|| format!("failed to parse MCP response for {method}"))?;
        if let Some(err) = &parsed.error {
            bail!("MCP error {} for {method}: {}", err.code, err.message);
        }
        Ok(parsed)
    }

    /// Send a notification (no response expected).
    pub async fn notify(&self, method: &str, params: Option<serde_json::Value>) -> Result<()> {
        let note = JsonRpcNotification::new(method, params);
        let response = self
            .post(serde_json::to_value(&note)?)
            .await
            .with_context(|| format!("MCP notification {method} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("MCP endpoint returned HTTP {status}: {body}");
        }
        Ok(())
    }

    async fn post(&self, body: serde_json::Value) -> Result<reqwest::Response> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "application/json")
            .json(&body);

        if let Some(token) = &self.bearer_token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        Ok(request.send().await?)
    }
}
