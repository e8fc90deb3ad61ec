use std::future::Future;
use std::pin::Pin;

use luci_rpc_core::{HttpReply, PostOptions, Result, RpcError, Transport};
use serde_json::Value;
use tracing::trace;

/// reqwest-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    anonymous: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with its own connection pools.
    ///
    /// Requests sent with credentials use a client that keeps a cookie
    /// store; the other client never sends cookies.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| RpcError::Transport(format!("Failed to build HTTP client: {}", e)))?;
        let anonymous = reqwest::Client::builder()
            .build()
            .map_err(|e| RpcError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, anonymous })
    }

    async fn send(&self, url: &str, body: Value, options: PostOptions) -> Result<HttpReply> {
        let client = if options.credentials {
            &self.client
        } else {
            &self.anonymous
        };

        let response = client
            .post(url)
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RpcError::Transport(format!("Request to {} timed out", url))
                } else {
                    RpcError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("").to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        trace!(%url, status = status.as_u16(), bytes = bytes.len(), "received rpc reply");

        Ok(HttpReply {
            status: status.as_u16(),
            status_text,
            body,
        })
    }
}

impl Transport for HttpTransport {
    fn post(
        &self,
        url: &str,
        body: Value,
        options: PostOptions,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply>> + Send + '_>> {
        let url = url.to_string();
        Box::pin(async move { self.send(&url, body, options).await })
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = HttpTransport::new().unwrap();
        let options = PostOptions {
            timeout: Duration::from_millis(500),
            credentials: false,
        };

        let result = transport
            .post("http://127.0.0.1:1/ubus", serde_json::json!({}), options)
            .await;
        assert!(matches!(result, Err(RpcError::Transport(_))));
    }
}
