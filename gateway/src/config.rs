//! Application configuration loaded from environment variables.

use cfp_registry::Address;

use crate::errors::{GatewayError, Result};

#[derive(Debug, Clone)]
pub struct Config {
    /// Ledger JSON-RPC endpoint (e.g. http://127.0.0.1:8545)
    pub rpc_url: String,
    /// The gateway's own ledger identity: caller for owner-only reads and
    /// recorded sender for proxied proposal registrations
    pub signer_address: Address,
    /// Port for the REST API server
    pub api_port: u16,
    /// Per-request timeout for ledger RPC calls
    pub rpc_timeout_secs: u64,
    /// How often to poll for commitment of a submitted mutation
    pub commit_poll_interval_ms: u64,
    /// Give up waiting for commitment after this long
    pub commit_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key → value lookup.  `from_env` passes the
    /// process environment; tests pass a closure over fixed maps so they
    /// never touch process-global state.
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Config {
            rpc_url: or_default("RPC_URL", "http://127.0.0.1:8545"),
            signer_address: lookup("SIGNER_ADDRESS")
                .ok_or_else(|| {
                    GatewayError::Config("SIGNER_ADDRESS environment variable is required".to_string())
                })?
                .parse()
                .map_err(|_| GatewayError::Config("Invalid SIGNER_ADDRESS".to_string()))?,
            api_port: or_default("API_PORT", "5000")
                .parse()
                .map_err(|_| GatewayError::Config("Invalid API_PORT".to_string()))?,
            rpc_timeout_secs: or_default("RPC_TIMEOUT_SECS", "30")
                .parse()
                .map_err(|_| GatewayError::Config("Invalid RPC_TIMEOUT_SECS".to_string()))?,
            commit_poll_interval_ms: or_default("COMMIT_POLL_INTERVAL_MS", "500")
                .parse()
                .map_err(|_| GatewayError::Config("Invalid COMMIT_POLL_INTERVAL_MS".to_string()))?,
            commit_timeout_secs: or_default("COMMIT_TIMEOUT_SECS", "120")
                .parse()
                .map_err(|_| GatewayError::Config("Invalid COMMIT_TIMEOUT_SECS".to_string()))?,
        })
    }
}
