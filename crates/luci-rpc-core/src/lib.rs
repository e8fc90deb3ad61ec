pub mod config;
pub mod envelope;
pub mod error;
pub mod expect;
pub mod status;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::ClientConfig;
pub use envelope::{
    request_path, ReplyEnvelope, RequestEnvelope, ANONYMOUS_SESSION_ID, JSON_RPC_VERSION,
};
pub use error::{Result, RpcError};
pub use expect::{Expect, JsonKind};
pub use status::{status_text, UbusStatus};
pub use transport::{HttpReply, PostOptions, Transport};
