//! Batching ubus JSON-RPC client.
//!
//! [`RpcClient`] turns declared ubus methods into callable handles, sends
//! their JSON-RPC envelopes either one per HTTP request or collected into a
//! batch, and routes every reply back to the call that produced it.
//!
//! All mutable state (request id counter, pending registry, open batch,
//! session id, base URL, interceptors) lives behind one mutex that is never
//! held across an await point or while user callbacks run.

mod declare;
mod demux;
mod interceptor;
mod pending;

pub use declare::{Declaration, DeclaredCall, FilterFn};
pub use interceptor::{CallInfo, InterceptorFn, InterceptorId};
pub use pending::PendingCall;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use luci_rpc_core::{
    request_path, ClientConfig, PostOptions, ReplyEnvelope, RequestEnvelope, Result, RpcError,
    Transport,
};
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::http::HttpTransport;
use interceptor::Interceptors;
use pending::{DispatchFuture, PendingRequest};

struct ClientState {
    next_id: u64,
    pending: HashMap<u64, PendingRequest>,
    batch: Option<Vec<RequestEnvelope>>,
    session_id: String,
    base_url: String,
    interceptors: Interceptors,
}

impl ClientState {
    fn url_for(&self, requests: &[RequestEnvelope]) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            request_path(requests)
        )
    }
}

pub(crate) struct ClientInner {
    state: Mutex<ClientState>,
    transport: Arc<dyn Transport>,
    options: PostOptions,
}

impl ClientInner {
    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drop the registry entry of a call whose reply will never be processed.
    pub(crate) fn forget(&self, id: u64) {
        if self.lock().pending.remove(&id).is_some() {
            debug!(id, "discarded unsent call");
        }
    }

    /// Settle every call of a failed exchange with the same kind of error.
    fn fail_all<F>(&self, requests: &[RequestEnvelope], make_error: F)
    where
        F: Fn(&RequestEnvelope) -> RpcError,
    {
        let taken: Vec<_> = {
            let mut state = self.lock();
            requests
                .iter()
                .map(|r| (r, state.pending.remove(&r.id)))
                .collect()
        };

        for (request, pending) in taken {
            if let Some(pending) = pending {
                pending.settle(Err(make_error(request)));
            }
        }
    }

    /// Perform one HTTP exchange and settle every call it carried.
    ///
    /// Returns the batch result array, ordered by queue position.
    async fn exchange(
        &self,
        url: String,
        requests: Vec<RequestEnvelope>,
        batched: bool,
    ) -> Result<Vec<Value>> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let body = if batched {
            serde_json::to_value(&requests)
        } else {
            serde_json::to_value(&requests[0])
        };
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                let err = RpcError::from(e);
                self.fail_all(&requests, |_| err.clone());
                return Err(err);
            }
        };

        debug!(%url, calls = requests.len(), batched, "dispatching rpc exchange");

        let reply = match self.transport.post(&url, body, self.options).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(%url, error = %e, "rpc transport failure");
                self.fail_all(&requests, |_| e.clone());
                return Err(e);
            }
        };

        if !reply.is_ok() {
            error!(%url, status = reply.status, status_text = %reply.status_text, "rpc http failure");
            let http_error = |request: &RequestEnvelope| {
                let (object, method) = request.target().unwrap_or(("?", "?"));
                RpcError::Http {
                    object: object.to_string(),
                    method: method.to_string(),
                    status: reply.status,
                    status_text: if reply.status_text.is_empty() {
                        "?".to_string()
                    } else {
                        reply.status_text.clone()
                    },
                }
            };
            let first = http_error(&requests[0]);
            self.fail_all(&requests, http_error);
            return Err(first);
        }

        let replies = if batched {
            match reply.body {
                Value::Array(items) => items,
                _ => {
                    warn!(%url, "batched reply is not an array");
                    Vec::new()
                }
            }
        } else {
            vec![reply.body]
        };

        let pairing = demux::pair_replies(&requests, replies);

        let (taken, interceptors) = {
            let mut state = self.lock();
            let taken: Vec<Option<PendingRequest>> = requests
                .iter()
                .map(|r| state.pending.remove(&r.id))
                .collect();
            (taken, state.interceptors.snapshot())
        };

        let mut results = vec![Value::Null; requests.len()];
        let mut orphan = None;

        for ((request, pending), reply) in requests.iter().zip(taken).zip(&pairing.replies) {
            let Some(pending) = pending else {
                error!(id = request.id, "reply for a request that is not pending");
                orphan.get_or_insert(RpcError::OrphanReply(Value::from(request.id)));
                continue;
            };

            let outcome = demux::resolve(&pending, request.id, reply.as_ref(), &interceptors);
            if let (Ok(value), Some(index)) = (&outcome, pending.index) {
                if let Some(slot) = results.get_mut(index) {
                    *slot = value.clone();
                }
            }
            pending.settle(outcome);
        }

        for id in pairing.orphans {
            error!(%id, "reply matched no request of this exchange");
            orphan.get_or_insert(RpcError::OrphanReply(id));
        }

        match orphan {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}

/// Batching JSON-RPC client for the ubus HTTP bridge.
///
/// Cloning is cheap; clones share the same registry, batch and session.
#[derive(Clone)]
pub struct RpcClient {
    inner: Arc<ClientInner>,
}

impl RpcClient {
    /// Create a client talking HTTP via reqwest.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new()?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client on top of an arbitrary transport.
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let options = config.post_options();
        let state = ClientState {
            next_id: 1,
            pending: HashMap::new(),
            batch: None,
            session_id: config.session_id,
            base_url: config.base_url,
            interceptors: Interceptors::default(),
        };

        Self {
            inner: Arc::new(ClientInner {
                state: Mutex::new(state),
                transport,
                options,
            }),
        }
    }

    /// Bind a ubus method to this client.
    pub fn declare(&self, declaration: Declaration) -> DeclaredCall {
        DeclaredCall::new(self.clone(), declaration)
    }

    /// Register a call and either queue it or prepare its dispatch.
    pub(crate) fn register(
        &self,
        declaration: Arc<Declaration>,
        params: Map<String, Value>,
        private: Vec<Value>,
    ) -> PendingCall {
        let (tx, rx) = oneshot::channel();
        let mut state = self.inner.lock();

        let id = state.next_id;
        state.next_id += 1;

        let envelope = RequestEnvelope::call(
            id,
            &state.session_id,
            &declaration.object,
            &declaration.method,
            params.clone(),
        );

        let index = state.batch.as_mut().map(|batch| {
            batch.push(envelope.clone());
            batch.len() - 1
        });

        let dispatch = match index {
            Some(index) => {
                debug!(id, index, object = %declaration.object, method = %declaration.method, "queued call");
                None
            }
            None => {
                let url = state.url_for(std::slice::from_ref(&envelope));
                let inner = Arc::clone(&self.inner);
                let dispatch: DispatchFuture = Box::pin(async move {
                    // Errors have already been delivered to the call itself.
                    let _ = inner.exchange(url, vec![envelope], false).await;
                });
                Some(dispatch)
            }
        };

        state.pending.insert(
            id,
            PendingRequest {
                declaration,
                params,
                private,
                index,
                reply: tx,
            },
        );
        drop(state);

        PendingCall::new(id, dispatch, rx, Arc::downgrade(&self.inner))
    }

    /// Open a batch. Calls made until [`flush`](Self::flush) are queued.
    ///
    /// Does nothing if a batch is already open.
    pub fn batch(&self) {
        let mut state = self.inner.lock();
        if state.batch.is_none() {
            state.batch = Some(Vec::new());
        }
    }

    /// Whether a batch is currently open.
    pub fn is_batching(&self) -> bool {
        self.inner.lock().batch.is_some()
    }

    /// Send the open batch as one HTTP request.
    ///
    /// Resolves to one value per queued call, in queue order; calls that
    /// failed leave `null` in their slot. Without an open batch (or with an
    /// empty one) nothing is sent and the result is empty.
    pub async fn flush(&self) -> Result<Vec<Value>> {
        let (url, requests) = {
            let mut state = self.inner.lock();
            match state.batch.take() {
                Some(requests) if !requests.is_empty() => (state.url_for(&requests), requests),
                _ => return Ok(Vec::new()),
            }
        };

        self.inner.exchange(url, requests, true).await
    }

    /// List ubus objects (or the signatures of the given objects).
    ///
    /// Any malformed reply yields an empty list. Only transport and HTTP
    /// failures are reported as errors.
    pub async fn list(&self, objects: &[&str]) -> Result<Vec<String>> {
        let (url, envelope) = {
            let mut state = self.inner.lock();
            let id = state.next_id;
            state.next_id += 1;
            let envelope = RequestEnvelope::list(id, objects);
            (state.url_for(&[]), envelope)
        };

        let body = serde_json::to_value(&envelope)?;
        debug!(%url, id = envelope.id, "listing ubus objects");

        let reply = self
            .inner
            .transport
            .post(&url, body, self.inner.options)
            .await
            .map_err(|e| {
                error!(%url, error = %e, "rpc transport failure");
                e
            })?;

        if !reply.is_ok() {
            error!(%url, status = reply.status, "rpc http failure");
            return Err(RpcError::Transport(format!(
                "list failed with HTTP error {}: {}",
                reply.status, reply.status_text
            )));
        }

        Ok(parse_list_reply(&reply.body).unwrap_or_else(|| {
            warn!(id = envelope.id, "malformed list reply");
            Vec::new()
        }))
    }

    /// Current session id.
    pub fn session_id(&self) -> String {
        self.inner.lock().session_id.clone()
    }

    /// Replace the session id used by subsequent calls.
    pub fn set_session_id(&self, session_id: impl Into<String>) {
        self.inner.lock().session_id = session_id.into();
    }

    /// Current endpoint URL.
    pub fn base_url(&self) -> String {
        self.inner.lock().base_url.clone()
    }

    /// Replace the endpoint URL used by subsequent exchanges.
    pub fn set_base_url(&self, base_url: impl Into<String>) {
        self.inner.lock().base_url = base_url.into();
    }

    /// Observe every raw call reply before validation.
    pub fn add_interceptor<F>(&self, interceptor: F) -> InterceptorId
    where
        F: Fn(&Value, &CallInfo<'_>) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.inner.lock().interceptors.add(interceptor)
    }

    /// Remove an interceptor. Returns whether it was registered.
    pub fn remove_interceptor(&self, id: InterceptorId) -> bool {
        self.inner.lock().interceptors.remove(id)
    }

    /// Number of calls registered but not yet settled.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

fn parse_list_reply(body: &Value) -> Option<Vec<String>> {
    let envelope = ReplyEnvelope::from_value(body)?;
    if !envelope.is_valid_frame() || !envelope.has_id() {
        return None;
    }

    envelope
        .result?
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("RpcClient")
            .field("base_url", &state.base_url)
            .field("next_id", &state.next_id)
            .field("pending", &state.pending.len())
            .field("batching", &state.batch.is_some())
            .finish()
    }
}
