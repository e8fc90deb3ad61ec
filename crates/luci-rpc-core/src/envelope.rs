//! JSON-RPC 2.0 envelopes as spoken by the ubus HTTP bridge.
//!
//! Requests always use one of two methods: `call`, whose params are
//! `[session, object, method, args]`, and `list`, whose params are an
//! optional list of object name filters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC protocol version.
pub const JSON_RPC_VERSION: &str = "2.0";

/// Session id used before a login has happened.
pub const ANONYMOUS_SESSION_ID: &str = "00000000000000000000000000000000";

/// Outgoing JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Protocol version (always "2.0").
    pub jsonrpc: String,
    /// Request id, unique for the lifetime of the client.
    pub id: u64,
    /// Either `call` or `list`.
    pub method: String,
    /// Method parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RequestEnvelope {
    /// Build a `call` envelope addressing `object.method`.
    pub fn call(
        id: u64,
        session_id: &str,
        object: &str,
        method: &str,
        args: Map<String, Value>,
    ) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id,
            method: "call".to_string(),
            params: Some(Value::Array(vec![
                Value::String(session_id.to_string()),
                Value::String(object.to_string()),
                Value::String(method.to_string()),
                Value::Object(args),
            ])),
        }
    }

    /// Build a `list` envelope. No filters means no `params` on the wire.
    pub fn list(id: u64, objects: &[&str]) -> Self {
        let params = if objects.is_empty() {
            None
        } else {
            Some(Value::Array(
                objects
                    .iter()
                    .map(|o| Value::String((*o).to_string()))
                    .collect(),
            ))
        };

        Self {
            jsonrpc: JSON_RPC_VERSION.to_string(),
            id,
            method: "list".to_string(),
            params,
        }
    }

    /// The `(object, method)` pair addressed by a `call` envelope.
    pub fn target(&self) -> Option<(&str, &str)> {
        if self.method != "call" {
            return None;
        }
        let params = self.params.as_ref()?.as_array()?;
        let object = params.get(1)?.as_str()?;
        let method = params.get(2)?.as_str()?;
        Some((object, method))
    }

    /// The session id carried by a `call` envelope.
    pub fn session_id(&self) -> Option<&str> {
        self.params.as_ref()?.as_array()?.first()?.as_str()
    }

    /// The argument object carried by a `call` envelope.
    pub fn args(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref()?.as_array()?.get(3)?.as_object()
    }
}

/// Build the request path for one HTTP exchange.
///
/// The first call contributes `/<object>.<method>`, every later call
/// `;<object>.<method>`. Parameters never appear in the path.
pub fn request_path(requests: &[RequestEnvelope]) -> String {
    let mut path = String::new();

    for (object, method) in requests.iter().filter_map(RequestEnvelope::target) {
        path.push(if path.is_empty() { '/' } else { ';' });
        path.push_str(object);
        path.push('.');
        path.push_str(method);
    }

    path
}

/// Incoming JSON-RPC reply, parsed leniently.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReplyEnvelope {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
}

impl ReplyEnvelope {
    /// Parse a reply from an arbitrary JSON value.
    ///
    /// Returns `None` when the value is not shaped like a reply object.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Whether the reply declares JSON-RPC 2.0.
    pub fn is_valid_frame(&self) -> bool {
        self.jsonrpc.as_deref() == Some(JSON_RPC_VERSION)
    }

    /// Whether the reply carries a usable id.
    pub fn has_id(&self) -> bool {
        match &self.id {
            Some(Value::Number(n)) => n.as_u64().is_some_and(|n| n != 0),
            Some(Value::String(s)) => !s.is_empty(),
            _ => false,
        }
    }

    /// The server-signalled error, if the reply carries a complete one.
    pub fn server_error(&self) -> Option<(i64, String)> {
        let error = self.error.as_ref()?.as_object()?;
        let code = error.get("code")?.as_i64().filter(|c| *c != 0)?;
        let message = error.get("message")?.as_str().filter(|m| !m.is_empty())?;
        Some((code, message.to_string()))
    }

    /// Unwrap a ubus `[status, payload]` result.
    ///
    /// The payload wins when present, otherwise the status itself is the value.
    pub fn unwrap_ubus_result(&self) -> Value {
        match self.result.as_ref().and_then(Value::as_array) {
            Some(items) if items.len() > 1 => items[1].clone(),
            Some(items) if items.len() == 1 => items[0].clone(),
            _ => Value::Null,
        }
    }

    /// The ubus status code of a `call` result, if any.
    pub fn ubus_status(&self) -> Option<i64> {
        self.result.as_ref()?.as_array()?.first()?.as_i64()
    }
}
