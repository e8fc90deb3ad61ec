//! Reply demultiplexing.
//!
//! Replies are paired with the requests of the same exchange only, so a
//! reply can never settle a call that travelled in a different HTTP
//! request. Within an exchange a reply claims the request carrying its id;
//! the rest fill the still unclaimed requests in request order.

use luci_rpc_core::{status_text, ReplyEnvelope, RequestEnvelope, Result, RpcError};
use serde_json::Value;
use tracing::{debug, warn};

use super::interceptor::{CallInfo, InterceptorFn};
use super::pending::PendingRequest;

/// Replies paired with the requests of one exchange.
#[derive(Debug, Default)]
pub(crate) struct Pairing {
    /// Reply for each request position, `None` when the server sent none.
    pub(crate) replies: Vec<Option<Value>>,
    /// Ids of replies that matched no request, as sent by the server.
    pub(crate) orphans: Vec<Value>,
}

pub(crate) fn pair_replies(requests: &[RequestEnvelope], replies: Vec<Value>) -> Pairing {
    let mut slots: Vec<Option<Value>> = vec![None; requests.len()];
    let mut leftovers = Vec::new();

    for reply in replies {
        let claimed = reply
            .get("id")
            .and_then(Value::as_u64)
            .and_then(|id| requests.iter().position(|r| r.id == id))
            .filter(|&i| slots[i].is_none());

        match claimed {
            Some(i) => slots[i] = Some(reply),
            None => leftovers.push(reply),
        }
    }

    let mut orphans = Vec::new();
    for reply in leftovers {
        match slots.iter().position(Option::is_none) {
            Some(free) => slots[free] = Some(reply),
            None => orphans.push(reply.get("id").cloned().unwrap_or(Value::Null)),
        }
    }

    Pairing {
        replies: slots,
        orphans,
    }
}

/// Turn one raw reply into the value delivered to the caller.
pub(crate) fn resolve(
    pending: &PendingRequest,
    id: u64,
    reply: Option<&Value>,
    interceptors: &[InterceptorFn],
) -> Result<Value> {
    let decl = &pending.declaration;
    let reply = reply.ok_or_else(|| {
        warn!(id, object = %decl.object, method = %decl.method, "no reply for call");
        RpcError::InvalidFrame
    })?;

    let info = CallInfo {
        id,
        object: &decl.object,
        method: &decl.method,
        params: &pending.params,
    };
    for interceptor in interceptors {
        interceptor(reply, &info).map_err(RpcError::Interceptor)?;
    }

    let envelope = match ReplyEnvelope::from_value(reply) {
        Some(envelope) if envelope.is_valid_frame() => envelope,
        _ => {
            warn!(id, object = %decl.object, method = %decl.method, "invalid message frame");
            return Err(RpcError::InvalidFrame);
        }
    };

    if let Some((code, message)) = envelope.server_error() {
        warn!(id, object = %decl.object, method = %decl.method, code, %message, "call failed");
        return Err(RpcError::Server { code, message });
    }

    if let Some(status) = envelope.ubus_status().filter(|s| *s != 0) {
        debug!(id, object = %decl.object, method = %decl.method, status, text = status_text(status), "ubus status");
    }

    let mut result = envelope.unwrap_ubus_result();

    if let Some(expect) = &decl.expect {
        result = expect.project(result);
    }

    if let Some(filter) = &decl.filter {
        result = filter(result, &pending.params, &pending.private);
    }

    Ok(result)
}
