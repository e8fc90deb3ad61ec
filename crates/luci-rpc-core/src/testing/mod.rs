//! Testing utilities for code built on the RPC client.
//!
//! # Example
//!
//! ```ignore
//! use luci_rpc_core::testing::{success_reply, MockTransport};
//!
//! let mock = MockTransport::answering(|env| success_reply(env.id, json!({"up": true})));
//! let client = RpcClient::with_transport(ClientConfig::default(), Arc::new(mock.clone()));
//! ```

pub mod mock_transport;

pub use mock_transport::{
    error_reply, matches_pattern, success_reply, MockTransport, MockTransportBuilder,
    RecordedPost,
};
