use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use luci_rpc::prelude::*;
use serde::Deserialize;
use serde_json::Map;
use tracing::{info, warn};

use super::{print_json, ConnectionArgs};

/// Send several calls from a JSON file as one batch.
#[derive(Parser, Debug)]
pub struct BatchCommand {
    /// JSON file holding `[{"object": .., "method": .., "params": {..}}, ..]`.
    pub file: PathBuf,
}

/// One entry of a batch file.
#[derive(Debug, Deserialize)]
pub(crate) struct BatchEntry {
    pub object: String,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl BatchCommand {
    pub async fn execute(self, connection: &ConnectionArgs) -> Result<()> {
        let entries = load_entries(&self.file)?;
        let client = connection.client()?;

        print_json(&run_batch(&client, &entries).await)
    }
}

/// Send `entries` as one batch and report every call's outcome.
///
/// A failed exchange is logged only; each call still carries its own error.
pub(crate) async fn run_batch(client: &RpcClient, entries: &[BatchEntry]) -> Value {
    client.batch();
    let calls: Vec<PendingCall> = entries
        .iter()
        .map(|entry| {
            client
                .declare(Declaration::new(&entry.object, &entry.method))
                .call_with(&entry.params, vec![])
        })
        .collect();

    info!(calls = calls.len(), "flushing batch");
    if let Err(e) = client.flush().await {
        warn!(error = %e, "batch exchange failed");
    }

    let mut report = Vec::with_capacity(entries.len());
    for (entry, call) in entries.iter().zip(calls) {
        let outcome = match call.await {
            Ok(result) => json!({"result": result}),
            Err(e) => json!({"error": e.to_string(), "per_call": e.is_per_call()}),
        };
        report.push(json!({
            "object": entry.object,
            "method": entry.method,
            "outcome": outcome,
        }));
    }

    Value::Array(report)
}

pub(crate) fn load_entries(path: &Path) -> Result<Vec<BatchEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use luci_rpc_core::testing::{success_reply, MockTransport};
    use luci_rpc_core::HttpReply;

    fn entries() -> Vec<BatchEntry> {
        serde_json::from_value(json!([
            {"object": "system", "method": "board"},
            {"object": "uci", "method": "get", "params": {"config": "network"}}
        ]))
        .unwrap()
    }

    #[test]
    fn test_load_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(
            &path,
            r#"[
                {"object": "system", "method": "board"},
                {"object": "uci", "method": "get", "params": {"config": "network"}}
            ]"#,
        )
        .unwrap();

        let entries = load_entries(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].params.is_empty());
        assert_eq!(entries[1].params["config"], json!("network"));
    }

    #[test]
    fn test_load_entries_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(load_entries(&path).is_err());
    }

    #[tokio::test]
    async fn test_report_survives_failed_exchange() {
        let mock = MockTransport::new(|post| {
            let mut replies: Vec<Value> = post
                .envelopes()
                .iter()
                .map(|env| success_reply(env.id, json!(env.id)))
                .collect();
            replies.push(success_reply(999, json!("stray")));
            Ok(HttpReply::ok(Value::Array(replies)))
        });
        let client = RpcClient::with_transport(ClientConfig::default(), Arc::new(mock));

        let report = run_batch(&client, &entries()).await;
        assert_eq!(report[0]["outcome"], json!({"result": 1}));
        assert_eq!(report[1]["method"], "get");
        assert_eq!(report[1]["outcome"], json!({"result": 2}));
    }

    #[tokio::test]
    async fn test_report_carries_http_errors_per_call() {
        let mock = MockTransport::http_error(403, "Forbidden");
        let client = RpcClient::with_transport(ClientConfig::default(), Arc::new(mock));

        let report = run_batch(&client, &entries()).await;
        assert_eq!(
            report[1]["outcome"]["error"],
            "RPC call to uci/get failed with HTTP error 403: Forbidden"
        );
        assert_eq!(report[1]["outcome"]["per_call"], false);
    }
}
