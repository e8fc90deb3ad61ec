//! Scripted transport for testing.
//!
//! Records every POST and answers it from a handler closure. The
//! `answering` helpers take care of splitting batched bodies so tests
//! only describe the reply to a single envelope.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use serde_json::{json, Value};

use crate::envelope::RequestEnvelope;
use crate::error::{Result, RpcError};
use crate::transport::{HttpReply, PostOptions, Transport};

/// Handler turning a recorded POST into a reply.
pub type PostHandler = Arc<dyn Fn(&RecordedPost) -> Result<HttpReply> + Send + Sync>;

/// Per-envelope answer function.
pub type AnswerFn = Arc<dyn Fn(&RequestEnvelope) -> Value + Send + Sync>;

/// Reordering applied to batched replies before they are returned.
pub type ReorderFn = Arc<dyn Fn(&mut Vec<Value>) + Send + Sync>;

/// A POST seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedPost {
    /// Full request URL.
    pub url: String,
    /// JSON body.
    pub body: Value,
    /// Options passed by the client.
    pub options: PostOptions,
}

impl RecordedPost {
    /// Whether the body was a JSON array.
    pub fn is_batch(&self) -> bool {
        self.body.is_array()
    }

    /// The envelopes carried by the body.
    pub fn envelopes(&self) -> Vec<RequestEnvelope> {
        match &self.body {
            Value::Array(items) => items
                .iter()
                .filter_map(|item| serde_json::from_value(item.clone()).ok())
                .collect(),
            other => serde_json::from_value(other.clone())
                .map(|env| vec![env])
                .unwrap_or_default(),
        }
    }
}

/// Mock transport.
#[derive(Clone)]
pub struct MockTransport {
    handler: PostHandler,
    posts: Arc<RwLock<Vec<RecordedPost>>>,
}

impl MockTransport {
    /// Mock answering every POST with `handler`.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&RecordedPost) -> Result<HttpReply> + Send + Sync + 'static,
    {
        Self {
            handler: Arc::new(handler),
            posts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Create a builder.
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::new()
    }

    /// Answer each envelope with the reply produced by `answer`.
    pub fn answering<F>(answer: F) -> Self
    where
        F: Fn(&RequestEnvelope) -> Value + Send + Sync + 'static,
    {
        Self::builder().answer(answer).build()
    }

    /// Answer every call with ubus status 0 and `payload`.
    pub fn succeeding(payload: Value) -> Self {
        Self::answering(move |env| success_reply(env.id, payload.clone()))
    }

    /// Fail every POST at the HTTP level.
    pub fn http_error(status: u16, status_text: &str) -> Self {
        let status_text = status_text.to_string();
        Self::new(move |_| {
            Ok(HttpReply {
                status,
                status_text: status_text.clone(),
                body: Value::Null,
            })
        })
    }

    /// Fail every POST before a response arrives.
    pub fn unreachable(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| Err(RpcError::Transport(message.clone())))
    }

    /// Recorded POSTs, oldest first.
    pub fn posts(&self) -> Vec<RecordedPost> {
        self.posts.read().unwrap().clone()
    }

    /// The most recent POST.
    pub fn last_post(&self) -> Option<RecordedPost> {
        self.posts.read().unwrap().last().cloned()
    }

    /// Recorded POSTs whose URL matches `pattern`.
    pub fn posts_to(&self, pattern: &str) -> Vec<RecordedPost> {
        self.posts
            .read()
            .unwrap()
            .iter()
            .filter(|p| matches_pattern(&p.url, pattern))
            .cloned()
            .collect()
    }

    /// Clear recorded POSTs.
    pub fn clear_posts(&self) {
        self.posts.write().unwrap().clear();
    }

    // =========================================================================
    // VERIFICATION METHODS
    // =========================================================================

    /// Assert that a URL pattern was posted to.
    pub fn assert_posted(&self, pattern: &str) {
        let posts = self.posts();
        assert!(
            posts.iter().any(|p| matches_pattern(&p.url, pattern)),
            "Expected POST matching '{}', but none found. Recorded URLs: {:?}",
            pattern,
            posts.iter().map(|p| &p.url).collect::<Vec<_>>()
        );
    }

    /// Assert the total number of POSTs.
    pub fn assert_post_count(&self, expected: usize) {
        let count = self.posts.read().unwrap().len();
        assert_eq!(
            count, expected,
            "Expected {} POSTs, but found {}",
            expected, count
        );
    }

    /// Assert that nothing was posted.
    pub fn assert_not_posted(&self) {
        self.assert_post_count(0);
    }
}

impl Transport for MockTransport {
    fn post(
        &self,
        url: &str,
        body: Value,
        options: PostOptions,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply>> + Send + '_>> {
        let post = RecordedPost {
            url: url.to_string(),
            body,
            options,
        };
        self.posts.write().unwrap().push(post.clone());

        let reply = (self.handler)(&post);
        Box::pin(async move { reply })
    }
}

/// Builder for envelope-answering mocks.
pub struct MockTransportBuilder {
    answer: AnswerFn,
    reorder: Option<ReorderFn>,
}

impl MockTransportBuilder {
    /// Create a builder answering every call with `[0]`.
    pub fn new() -> Self {
        Self {
            answer: Arc::new(|env: &RequestEnvelope| json!({"jsonrpc": "2.0", "id": env.id, "result": [0]})),
            reorder: None,
        }
    }

    /// Per-envelope reply function.
    pub fn answer<F>(mut self, answer: F) -> Self
    where
        F: Fn(&RequestEnvelope) -> Value + Send + Sync + 'static,
    {
        self.answer = Arc::new(answer);
        self
    }

    /// Reorder batched replies before returning them.
    pub fn reorder<F>(mut self, reorder: F) -> Self
    where
        F: Fn(&mut Vec<Value>) + Send + Sync + 'static,
    {
        self.reorder = Some(Arc::new(reorder));
        self
    }

    /// Build the mock.
    pub fn build(self) -> MockTransport {
        let answer = self.answer;
        let reorder = self.reorder;

        MockTransport::new(move |post| {
            let body = match &post.body {
                Value::Array(items) => {
                    let mut replies: Vec<Value> = items
                        .iter()
                        .map(|item| match serde_json::from_value::<RequestEnvelope>(item.clone()) {
                            Ok(env) => answer(&env),
                            Err(_) => Value::Null,
                        })
                        .collect();
                    if let Some(reorder) = &reorder {
                        reorder(&mut replies);
                    }
                    Value::Array(replies)
                }
                single => match serde_json::from_value::<RequestEnvelope>(single.clone()) {
                    Ok(env) => answer(&env),
                    Err(_) => Value::Null,
                },
            };
            Ok(HttpReply::ok(body))
        })
    }
}

impl Default for MockTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Successful ubus reply carrying `payload`.
pub fn success_reply(id: u64, payload: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": [0, payload]})
}

/// JSON-RPC error reply.
pub fn error_reply(id: u64, code: i64, message: &str) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "error": {"code": code, "message": message}})
}

/// Simple glob matching where `*` matches any run of characters.
pub fn matches_pattern(url: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return url == pattern;
    }

    let mut remaining = url;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }

        if i == 0 {
            if !remaining.starts_with(part) {
                return false;
            }
            remaining = &remaining[part.len()..];
        } else if i == parts.len() - 1 {
            if !remaining.ends_with(part) {
                return false;
            }
        } else if let Some(pos) = remaining.find(part) {
            remaining = &remaining[pos + part.len()..];
        } else {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn envelope(id: u64) -> RequestEnvelope {
        RequestEnvelope::call(id, "s", "system", "board", Map::new())
    }

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("/ubus/system.board", "/ubus/system.board"));
        assert!(matches_pattern("/ubus/system.board", "/ubus/*"));
        assert!(matches_pattern("/ubus/system.board;luci.x", "/ubus/*;luci.x"));
        assert!(!matches_pattern("/other/system.board", "/ubus/*"));
    }

    #[tokio::test]
    async fn test_records_posts() {
        let mock = MockTransport::succeeding(json!({"model": "x"}));
        let body = serde_json::to_value(envelope(1)).unwrap();

        let reply = mock
            .post("/ubus/system.board", body, PostOptions::default())
            .await
            .unwrap();

        assert_eq!(reply.body["result"], json!([0, {"model": "x"}]));
        mock.assert_posted("/ubus/*");
        mock.assert_post_count(1);
        assert_eq!(mock.last_post().unwrap().envelopes(), vec![envelope(1)]);
    }

    #[tokio::test]
    async fn test_batch_reorder() {
        let mock = MockTransport::builder()
            .answer(|env| success_reply(env.id, json!(env.id)))
            .reorder(|replies| replies.reverse())
            .build();
        let body = json!([envelope(1), envelope(2)]);

        let reply = mock.post("/ubus", body, PostOptions::default()).await.unwrap();
        let ids: Vec<u64> = reply
            .body
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        assert_eq!(ids, vec![2, 1]);
        assert!(mock.last_post().unwrap().is_batch());
    }

    #[test]
    fn test_unreachable() {
        let mock = MockTransport::unreachable("connection refused");
        let result = tokio_test::block_on(mock.post("/ubus", Value::Null, PostOptions::default()));
        assert!(matches!(result, Err(RpcError::Transport(_))));
    }
}
