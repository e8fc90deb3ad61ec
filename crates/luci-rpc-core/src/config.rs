use std::path::Path;
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::envelope::ANONYMOUS_SESSION_ID;
use crate::error::{Result, RpcError};
use crate::transport::PostOptions;

/// Environment variable overriding the endpoint URL.
pub const ENV_BASE_URL: &str = "LUCI_RPC_BASE_URL";
/// Environment variable overriding the session id.
pub const ENV_SESSION_ID: &str = "LUCI_RPC_SESSION_ID";
/// Environment variable overriding the timeout (seconds).
pub const ENV_TIMEOUT: &str = "LUCI_RPC_TIMEOUT";

/// RPC client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Endpoint every call is POSTed to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Initial session id.
    #[serde(default = "default_session_id")]
    pub session_id: String,

    /// Transport timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Send credentials (cookies) along with requests.
    #[serde(default = "default_credentials")]
    pub credentials: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_id: default_session_id(),
            timeout_secs: default_timeout(),
            credentials: default_credentials(),
        }
    }
}

fn default_base_url() -> String {
    "/ubus".to_string()
}

fn default_session_id() -> String {
    ANONYMOUS_SESSION_ID.to_string()
}

fn default_timeout() -> u64 {
    5
}

fn default_credentials() -> bool {
    true
}

impl ClientConfig {
    /// Config pointing at `base_url` with every other field defaulted.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| RpcError::Config(format!("Failed to read config file: {}", e)))?;

        let config = Self::parse_toml(&content)?;
        tracing::debug!(path = %path.as_ref().display(), base_url = %config.base_url, "loaded rpc client config");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        let config: Self = toml::from_str(&content)
            .map_err(|e| RpcError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overlaid with the `LUCI_RPC_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env()
    }

    /// Overlay the `LUCI_RPC_*` environment variables onto this config.
    pub fn overlay_env(mut self) -> Result<Self> {
        if let Ok(url) = std::env::var(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Ok(sid) = std::env::var(ENV_SESSION_ID) {
            self.session_id = sid;
        }
        if let Ok(timeout) = std::env::var(ENV_TIMEOUT) {
            self.timeout_secs = timeout
                .parse()
                .map_err(|e| RpcError::Config(format!("Invalid {}: {}", ENV_TIMEOUT, e)))?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check field invariants.
    pub fn validate(&self) -> Result<()> {
        if !is_session_id(&self.session_id) {
            return Err(RpcError::Config(format!(
                "session_id must be 32 hex characters, got {:?}",
                self.session_id
            )));
        }
        if self.timeout_secs == 0 {
            return Err(RpcError::Config("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }

    /// Transport timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Options forwarded to the transport with every POST.
    pub fn post_options(&self) -> PostOptions {
        PostOptions {
            timeout: self.timeout(),
            credentials: self.credentials,
        }
    }
}

/// Whether `sid` looks like a ubus session id.
pub fn is_session_id(sid: &str) -> bool {
    sid.len() == 32 && sid.bytes().all(|b| b.is_ascii_hexdigit())
}

static ENV_VAR_RE: Lazy<regex_lite::Regex> = Lazy::new(|| {
    regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex is valid")
});

/// Substitute `${VAR}` references with environment values.
fn substitute_env_vars(content: &str) -> String {
    let mut result = content.to_string();

    for cap in ENV_VAR_RE.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
