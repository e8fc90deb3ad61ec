use std::fmt;
use std::sync::Arc;

use luci_rpc_core::{Expect, RpcError};
use serde::Serialize;
use serde_json::{Map, Value};

use super::pending::PendingCall;
use super::RpcClient;

/// Post-processing applied to a call result before it is delivered.
///
/// Receives the (projected) result, the parameters that were sent and the
/// caller's private arguments.
pub type FilterFn = Arc<dyn Fn(Value, &Map<String, Value>, &[Value]) -> Value + Send + Sync>;

/// Static description of one ubus method.
#[derive(Clone)]
pub struct Declaration {
    pub(crate) object: String,
    pub(crate) method: String,
    pub(crate) params: Vec<String>,
    pub(crate) expect: Option<Expect>,
    pub(crate) filter: Option<FilterFn>,
}

impl Declaration {
    /// Declare `object.method` with no parameters.
    pub fn new(object: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            object: object.into(),
            method: method.into(),
            params: Vec::new(),
            expect: None,
            filter: None,
        }
    }

    /// Names of the positional parameter slots.
    pub fn params<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = names.into_iter().map(Into::into).collect();
        self
    }

    /// Project results onto an expected shape.
    pub fn expect(mut self, expect: Expect) -> Self {
        self.expect = Some(expect);
        self
    }

    /// Post-process results.
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(Value, &Map<String, Value>, &[Value]) -> Value + Send + Sync + 'static,
    {
        self.filter = Some(Arc::new(filter));
        self
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// Zip positional arguments onto the declared names.
    ///
    /// Slots without an argument are left out of the parameter object;
    /// surplus arguments are returned as private arguments.
    pub fn bind(&self, args: Vec<Value>) -> (Map<String, Value>, Vec<Value>) {
        let mut args = args.into_iter();
        let mut params = Map::new();

        for name in &self.params {
            match args.next() {
                Some(value) => {
                    params.insert(name.clone(), value);
                }
                None => break,
            }
        }

        (params, args.collect())
    }
}

impl fmt::Debug for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Declaration")
            .field("object", &self.object)
            .field("method", &self.method)
            .field("params", &self.params)
            .field("expect", &self.expect)
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

/// Callable handle produced by [`RpcClient::declare`].
#[derive(Clone)]
pub struct DeclaredCall {
    client: RpcClient,
    declaration: Arc<Declaration>,
}

impl DeclaredCall {
    pub(crate) fn new(client: RpcClient, declaration: Declaration) -> Self {
        Self {
            client,
            declaration: Arc::new(declaration),
        }
    }

    /// The underlying declaration.
    pub fn declaration(&self) -> &Declaration {
        &self.declaration
    }

    /// Invoke with positional arguments.
    ///
    /// The request is registered (and queued, if a batch is open) before
    /// this returns.
    pub fn call(&self, args: Vec<Value>) -> PendingCall {
        let (params, private) = self.declaration.bind(args);
        self.client
            .register(Arc::clone(&self.declaration), params, private)
    }

    /// Invoke with a typed parameter object and explicit private arguments.
    ///
    /// `params` must serialize to a JSON object (or unit/`None`, meaning no
    /// parameters).
    pub fn call_with<P: Serialize>(&self, params: P, private: Vec<Value>) -> PendingCall {
        let params = match serde_json::to_value(params) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(other) => {
                return PendingCall::failed(RpcError::Serialization(format!(
                    "call parameters must be an object, got {}",
                    other
                )))
            }
            Err(e) => return PendingCall::failed(e.into()),
        };

        self.client
            .register(Arc::clone(&self.declaration), params, private)
    }
}

impl fmt::Debug for DeclaredCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DeclaredCall").field(&self.declaration).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bind_zips_and_collects_private() {
        let decl = Declaration::new("file", "read").params(["path"]);
        let (params, private) = decl.bind(vec![json!("/etc/os-release"), json!(true), json!(3)]);

        assert_eq!(params.get("path"), Some(&json!("/etc/os-release")));
        assert_eq!(params.len(), 1);
        assert_eq!(private, vec![json!(true), json!(3)]);
    }

    #[test]
    fn test_bind_leaves_missing_slots_out() {
        let decl = Declaration::new("uci", "get").params(["config", "section", "option"]);
        let (params, private) = decl.bind(vec![json!("network")]);

        assert_eq!(Value::Object(params), json!({"config": "network"}));
        assert!(private.is_empty());
    }

    #[test]
    fn test_debug_hides_filter() {
        let decl = Declaration::new("system", "info").filter(|v, _, _| v);
        let debug = format!("{:?}", decl);
        assert!(debug.contains("system"));
        assert!(debug.contains("filter: true"));
    }
}
