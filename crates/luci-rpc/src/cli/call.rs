use anyhow::{bail, Result};
use clap::Parser;
use luci_rpc::prelude::*;
use serde_json::Map;

use super::{print_json, ConnectionArgs};

/// Call one ubus method.
#[derive(Parser, Debug)]
pub struct CallCommand {
    /// ubus object, e.g. `system`.
    pub object: String,

    /// Method on the object, e.g. `board`.
    pub method: String,

    /// Arguments as `key=value`; values are parsed as JSON when possible.
    pub args: Vec<String>,
}

impl CallCommand {
    pub async fn execute(self, connection: &ConnectionArgs) -> Result<()> {
        let params = parse_args(&self.args)?;
        let client = connection.client()?;

        let value = client
            .declare(Declaration::new(&self.object, &self.method))
            .call_with(params, vec![])
            .await?;

        print_json(&value)
    }
}

/// Parse `key=value` pairs into a parameter object.
pub(crate) fn parse_args(args: &[String]) -> Result<Map<String, Value>> {
    let mut params = Map::new();

    for arg in args {
        let Some((key, raw)) = arg.split_once('=') else {
            bail!("argument {:?} is not of the form key=value", arg);
        };
        if key.is_empty() {
            bail!("argument {:?} has an empty key", arg);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        params.insert(key.to_string(), value);
    }

    Ok(params)
}
