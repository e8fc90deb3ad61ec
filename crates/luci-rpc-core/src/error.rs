use serde_json::Value;
use thiserror::Error;

/// Error type for ubus RPC operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RpcError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC call to {object}/{method} failed with HTTP error {status}: {status_text}")]
    Http {
        object: String,
        method: String,
        status: u16,
        status_text: String,
    },

    #[error("RPC call failed with error {code}: {message}")]
    Server { code: i64, message: String },

    #[error("Invalid message frame received")]
    InvalidFrame,

    #[error("Received reply for unknown request id {0}")]
    OrphanReply(Value),

    #[error("Interceptor rejected reply: {0}")]
    Interceptor(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Call was dropped before a reply arrived")]
    Cancelled,
}

impl RpcError {
    /// Whether this error only affects the call it was delivered to.
    ///
    /// Transport and orphan errors describe the whole exchange instead.
    pub fn is_per_call(&self) -> bool {
        matches!(
            self,
            RpcError::Server { .. } | RpcError::InvalidFrame | RpcError::Interceptor(_)
        )
    }
}

impl From<serde_json::Error> for RpcError {
    fn from(e: serde_json::Error) -> Self {
        RpcError::Serialization(e.to_string())
    }
}

/// Result type alias using RpcError.
pub type Result<T> = std::result::Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_message() {
        let err = RpcError::Server {
            code: 6,
            message: "Permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "RPC call failed with error 6: Permission denied"
        );
        assert!(err.is_per_call());
    }

    #[test]
    fn test_http_error_message() {
        let err = RpcError::Http {
            object: "system".to_string(),
            method: "board".to_string(),
            status: 403,
            status_text: "Forbidden".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "RPC call to system/board failed with HTTP error 403: Forbidden"
        );
        assert!(!err.is_per_call());
    }

    #[test]
    fn test_invalid_frame_message() {
        assert_eq!(
            RpcError::InvalidFrame.to_string(),
            "Invalid message frame received"
        );
    }

    #[test]
    fn test_orphan_reply_shows_raw_id() {
        let err = RpcError::OrphanReply(Value::from("7"));
        assert_eq!(err.to_string(), "Received reply for unknown request id \"7\"");
        assert!(!err.is_per_call());
    }
}
