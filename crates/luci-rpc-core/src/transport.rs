use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;

use crate::error::Result;

/// Options forwarded with every POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostOptions {
    /// Transport-level deadline for the whole exchange.
    pub timeout: Duration,
    /// Whether cookies and other credentials accompany the request.
    pub credentials: bool,
}

impl Default for PostOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            credentials: true,
        }
    }
}

/// HTTP-level reply to a POST.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    /// HTTP status code.
    pub status: u16,
    /// Reason phrase.
    pub status_text: String,
    /// Decoded JSON body, `Null` when the body was not JSON.
    pub body: Value,
}

impl HttpReply {
    /// A 200 reply carrying `body`.
    pub fn ok(body: Value) -> Self {
        Self {
            status: 200,
            status_text: "OK".to_string(),
            body,
        }
    }

    /// Whether the status is in the 2xx range.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport used by the RPC client.
///
/// Implementations perform exactly one POST per invocation and must not
/// interpret the JSON-RPC payload.
pub trait Transport: Send + Sync {
    /// POST `body` as JSON to `url`.
    fn post(
        &self,
        url: &str,
        body: Value,
        options: PostOptions,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_reply_is_ok() {
        assert!(HttpReply::ok(Value::Null).is_ok());

        let reply = HttpReply {
            status: 403,
            status_text: "Forbidden".to_string(),
            body: Value::Null,
        };
        assert!(!reply.is_ok());
    }

    #[test]
    fn test_default_post_options() {
        let options = PostOptions::default();
        assert_eq!(options.timeout, Duration::from_secs(5));
        assert!(options.credentials);
    }
}
