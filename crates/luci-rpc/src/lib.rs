//! Batching JSON-RPC client for the OpenWrt ubus HTTP bridge.
//!
//! Declare each ubus method once, then call the returned handle. Calls made
//! between [`RpcClient::batch`] and [`RpcClient::flush`] travel in a single
//! HTTP request.
//!
//! ```ignore
//! use luci_rpc::prelude::*;
//!
//! let client = RpcClient::new(ClientConfig::with_base_url("http://192.168.1.1/ubus"))?;
//! let board = client.declare(Declaration::new("system", "board"));
//!
//! client.batch();
//! let a = board.call(vec![]);
//! let b = client.declare(Declaration::new("system", "info")).call(vec![]);
//! let results = client.flush().await?;
//! assert_eq!(results[0], a.await?);
//! ```

#[doc(hidden)]
pub use luci_rpc_core;

pub use luci_rpc_core::{
    status_text, ClientConfig, Expect, JsonKind, Result, RpcError, Transport, UbusStatus,
};
pub use luci_rpc_runtime::{
    CallInfo, Declaration, DeclaredCall, HttpTransport, InterceptorId, PendingCall, RpcClient,
};

#[cfg(feature = "testing")]
pub use luci_rpc_core::testing;

/// Prelude module for common imports.
pub mod prelude {
    pub use luci_rpc_core::{ClientConfig, Expect, Result, RpcError, UbusStatus};
    pub use luci_rpc_runtime::{Declaration, DeclaredCall, PendingCall, RpcClient};
    pub use serde_json::{json, Value};
}
