//! Configuration loading for the routing core
//!
//! Configuration comes from a TOML file with serde defaults for every
//! tunable, plus environment overrides for deployment-specific values.
//! A missing router section never crashes the client; it silently uses
//! the fallback base URL.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, RouterError};

/// Fallback base URL for the remote routing service, used when neither
/// the config file nor the environment provides one.
pub const DEFAULT_ROUTER_URL: &str = "http://127.0.0.1:3001";

/// Environment variable that overrides the router base URL.
pub const ROUTER_URL_ENV: &str = "SHARDSWAP_ROUTER_URL";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// RPC endpoint pool configuration
    pub rpc: RpcConfig,

    /// Remote routing service configuration
    #[serde(default)]
    pub router: RouterConfig,

    /// Quoting and execution configuration
    #[serde(default)]
    pub trading: TradingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// List of RPC endpoint URLs, in priority order
    pub endpoints: Vec<String>,

    /// Max retries per pooled call
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Consecutive failures before an endpoint is demoted
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// Seconds an unhealthy endpoint sits out before automatic recovery
    #[serde(default = "default_recovery_window")]
    pub recovery_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Base URL of the remote routing service
    #[serde(default = "default_router_url")]
    pub base_url: String,

    /// Hard timeout for every remote routing call, in milliseconds
    #[serde(default = "default_router_timeout")]
    pub timeout_ms: u64,

    /// Disable the remote router entirely (local quoting only)
    #[serde(default)]
    pub disabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Default slippage tolerance applied to minimum-output amounts
    #[serde(default = "default_slippage")]
    pub slippage_bps: u32,

    /// Price-impact ceiling; quotes above it are marked, not rejected
    #[serde(default = "default_max_impact")]
    pub max_price_impact_bps: u32,

    /// Concurrency cap for per-shard reserve reads
    #[serde(default = "default_reserve_concurrency")]
    pub reserve_read_concurrency: usize,
}

// Default value functions
fn default_max_retries() -> u32 {
    3
}
fn default_failure_threshold() -> u32 {
    3
}
fn default_recovery_window() -> u64 {
    30
}
fn default_router_url() -> String {
    DEFAULT_ROUTER_URL.to_string()
}
fn default_router_timeout() -> u64 {
    5_000
}
fn default_slippage() -> u32 {
    50
}
fn default_max_impact() -> u32 {
    1_000
}
fn default_reserve_concurrency() -> usize {
    4
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            base_url: default_router_url(),
            timeout_ms: default_router_timeout(),
            disabled: false,
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage(),
            max_price_impact_bps: default_max_impact(),
            reserve_read_concurrency: default_reserve_concurrency(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RouterError::Configuration(format!("read {path}: {e}")))?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| RouterError::Configuration(format!("parse {path}: {e}")))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration after sourcing a `.env` file, if present.
    pub fn from_file_with_env(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_file(path)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ROUTER_URL_ENV) {
            if !url.is_empty() {
                self.router.base_url = url;
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.rpc.endpoints.is_empty() {
            return Err(RouterError::Configuration(
                "rpc.endpoints must list at least one endpoint".to_string(),
            ));
        }
        if self.trading.slippage_bps > 10_000 {
            return Err(RouterError::Configuration(format!(
                "trading.slippage_bps {} exceeds 10000",
                self.trading.slippage_bps
            )));
        }
        if self.trading.reserve_read_concurrency == 0 {
            return Err(RouterError::Configuration(
                "trading.reserve_read_concurrency must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc: RpcConfig {
                endpoints: vec!["https://api.mainnet-beta.solana.com".to_string()],
                max_retries: default_max_retries(),
                failure_threshold: default_failure_threshold(),
                recovery_window_secs: default_recovery_window(),
            },
            router: RouterConfig::default(),
            trading: TradingConfig::default(),
        }
    }
}
