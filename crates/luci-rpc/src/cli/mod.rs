mod batch;
mod call;
mod list;
mod status;

pub use batch::BatchCommand;
pub use call::CallCommand;
pub use list::ListCommand;
pub use status::StatusCommand;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use luci_rpc::prelude::*;
use tracing::debug;

/// Talk to the ubus JSON-RPC bridge of an OpenWrt device.
#[derive(Parser)]
#[command(name = "luci-rpc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options selecting the endpoint and session.
#[derive(Args, Debug, Default)]
pub struct ConnectionArgs {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Endpoint URL (overrides config).
    #[arg(short, long, global = true)]
    pub url: Option<String>,

    /// Session id (overrides config).
    #[arg(short, long, global = true)]
    pub session: Option<String>,

    /// Transport timeout in seconds (overrides config).
    #[arg(short, long, global = true)]
    pub timeout: Option<u64>,
}

impl ConnectionArgs {
    /// Resolve the effective client configuration.
    ///
    /// Precedence: command line, then environment, then config file.
    pub fn resolve(&self) -> Result<ClientConfig> {
        let config = match &self.config {
            Some(path) => ClientConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ClientConfig::default(),
        };
        let mut config = config.overlay_env()?;

        if let Some(url) = &self.url {
            config.base_url = url.clone();
        }
        if let Some(session) = &self.session {
            config.session_id = session.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }

        config.validate()?;
        debug!(base_url = %config.base_url, timeout = config.timeout_secs, "resolved client config");
        Ok(config)
    }

    /// Build a client for the resolved configuration.
    pub fn client(&self) -> Result<RpcClient> {
        Ok(RpcClient::new(self.resolve()?)?)
    }
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Call one ubus method.
    Call(CallCommand),

    /// List ubus objects or their signatures.
    List(ListCommand),

    /// Send several calls from a JSON file as one batch.
    Batch(BatchCommand),

    /// Describe a ubus status code.
    Status(StatusCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        dotenvy::dotenv().ok();

        let log_level = if self.verbose { "debug" } else { "warn" };
        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.to_string()))
            .with_writer(std::io::stderr)
            .init();

        match self.command {
            Commands::Call(cmd) => cmd.execute(&self.connection).await,
            Commands::List(cmd) => cmd.execute(&self.connection).await,
            Commands::Batch(cmd) => cmd.execute(&self.connection).await,
            Commands::Status(cmd) => cmd.execute(),
        }
    }
}

/// Print a JSON value the way every command does.
pub(crate) fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_call() {
        let cli = Cli::try_parse_from([
            "luci-rpc",
            "--url",
            "http://192.168.1.1/ubus",
            "call",
            "system",
            "board",
        ]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_cli_parse_list_and_status() {
        assert!(Cli::try_parse_from(["luci-rpc", "list", "system", "network"]).is_ok());
        assert!(Cli::try_parse_from(["luci-rpc", "status", "6"]).is_ok());
        assert!(Cli::try_parse_from(["luci-rpc", "status"]).is_err());
    }

    #[test]
    fn test_resolve_applies_overrides() {
        let args = ConnectionArgs {
            url: Some("http://10.0.0.1/ubus".to_string()),
            session: Some("0123456789abcdef0123456789abcdef".to_string()),
            timeout: Some(9),
            ..Default::default()
        };

        let config = args.resolve().unwrap();
        assert_eq!(config.base_url, "http://10.0.0.1/ubus");
        assert_eq!(config.session_id, "0123456789abcdef0123456789abcdef");
        assert_eq!(config.timeout_secs, 9);
    }

    #[test]
    fn test_resolve_rejects_bad_session() {
        let args = ConnectionArgs {
            session: Some("short".to_string()),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn test_resolve_reads_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("luci-rpc.toml");
        std::fs::write(&path, "base_url = \"http://router/ubus\"\ntimeout_secs = 3\n").unwrap();

        let args = ConnectionArgs {
            config: Some(path),
            ..Default::default()
        };
        let config = args.resolve().unwrap();
        assert_eq!(config.base_url, "http://router/ubus");
        assert_eq!(config.timeout_secs, 3);
    }
}
