pub mod client;
pub mod http;

pub use client::{
    CallInfo, Declaration, DeclaredCall, FilterFn, InterceptorFn, InterceptorId, PendingCall,
    RpcClient,
};
pub use http::HttpTransport;
