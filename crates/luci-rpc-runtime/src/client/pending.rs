use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use luci_rpc_core::{Result, RpcError};
use serde_json::{Map, Value};
use tokio::sync::oneshot;

use super::declare::Declaration;
use super::ClientInner;

/// Bookkeeping for one in-flight call.
pub(crate) struct PendingRequest {
    pub(crate) declaration: Arc<Declaration>,
    pub(crate) params: Map<String, Value>,
    pub(crate) private: Vec<Value>,
    /// Position inside the open batch, if the call was queued.
    pub(crate) index: Option<usize>,
    pub(crate) reply: oneshot::Sender<Result<Value>>,
}

impl PendingRequest {
    /// Deliver the outcome. A dropped receiver is not an error.
    pub(crate) fn settle(self, outcome: Result<Value>) {
        let _ = self.reply.send(outcome);
    }
}

pub(crate) type DispatchFuture = BoxFuture<'static, ()>;

/// Future resolving to the outcome of one declared call.
///
/// Unbatched calls are transmitted on first poll. Batched calls settle when
/// the batch is flushed. Dropping an unbatched call before its reply has
/// been processed removes it from the client registry.
#[must_use = "unbatched calls are only sent when polled"]
pub struct PendingCall {
    id: u64,
    batched: bool,
    dispatch: Option<DispatchFuture>,
    receiver: oneshot::Receiver<Result<Value>>,
    client: Weak<ClientInner>,
}

impl PendingCall {
    pub(crate) fn new(
        id: u64,
        dispatch: Option<DispatchFuture>,
        receiver: oneshot::Receiver<Result<Value>>,
        client: Weak<ClientInner>,
    ) -> Self {
        Self {
            id,
            batched: dispatch.is_none(),
            dispatch,
            receiver,
            client,
        }
    }

    /// A call that failed before it could be registered.
    pub(crate) fn failed(error: RpcError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self {
            id: 0,
            batched: false,
            dispatch: None,
            receiver: rx,
            client: Weak::new(),
        }
    }

    /// The JSON-RPC request id. Zero for calls rejected before registration.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the call was queued into a batch.
    pub fn is_batched(&self) -> bool {
        self.batched
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(dispatch) = self.dispatch.as_mut() {
            match dispatch.as_mut().poll(cx) {
                Poll::Ready(()) => self.dispatch = None,
                Poll::Pending => return Poll::Pending,
            }
        }

        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RpcError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        // An unfinished dispatch means nobody will ever process this reply.
        if self.dispatch.is_some() {
            if let Some(client) = self.client.upgrade() {
                client.forget(self.id);
            }
        }
    }
}
