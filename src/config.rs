//! Application configuration loading and validation.
//!
//! Configuration is loaded from a TOML file; `WALLET_PRIVATE_KEY` (the
//! one secret a live-mode run needs) is read from the environment or a
//! `.env` file, never from the config file itself.

use std::path::Path;
use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
    DryRun,
}

impl From<ExecutionMode> for crate::core::domain::ExecutionMode {
    fn from(mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Live => Self::Live,
            ExecutionMode::Paper | ExecutionMode::DryRun => Self::Paper,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Console,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub poll_interval_secs: u64,
    pub market_limit: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { poll_interval_secs: 30, market_limit: 0 }
    }
}

impl DiscoveryConfig {
    #[must_use]
    pub fn to_discovery(&self) -> crate::core::discovery::DiscoveryConfig {
        crate::core::discovery::DiscoveryConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            market_limit: self.market_limit,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub ws_url: String,
    pub catalog_url: String,
    pub orders_url: String,
    pub data_api_url: String,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws-subscriptions-clob.polymarket.com/ws/market".into(),
            catalog_url: "https://gamma-api.polymarket.com".into(),
            orders_url: "https://clob.polymarket.com".into(),
            data_api_url: "https://data-api.polymarket.com".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArbConfig {
    pub scan_interval_ms: u64,
    pub fee: Decimal,
    pub profit_threshold: Decimal,
    pub max_trade_size: Decimal,
    pub min_trade_size: Decimal,
}

impl Default for ArbConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 250,
            fee: dec!(0),
            profit_threshold: dec!(1),
            max_trade_size: dec!(1000),
            min_trade_size: dec!(1),
        }
    }
}

impl ArbConfig {
    #[must_use]
    pub fn to_detector(&self) -> crate::core::detector::DetectorConfig {
        crate::core::detector::DetectorConfig {
            scan_interval: Duration::from_millis(self.scan_interval_ms),
            fee: self.fee,
            profit_threshold: self.profit_threshold,
            max_trade_size: self.max_trade_size,
            min_trade_size: self.min_trade_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    pub aggression_ticks: i64,
    pub min_profit_bps: i64,
    pub max_position_size: Decimal,
    pub fill_poll_initial_ms: u64,
    pub fill_poll_max_ms: u64,
    pub fill_timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            aggression_ticks: 0,
            min_profit_bps: 0,
            max_position_size: dec!(10000),
            fill_poll_initial_ms: 100,
            fill_poll_max_ms: 5000,
            fill_timeout_secs: 30,
        }
    }
}

impl ExecutionConfig {
    /// `fee` comes from `ArbConfig::fee` — the same taker-fee rate the
    /// detector uses to find opportunities is what actually realizes
    /// against executed fills.
    #[must_use]
    pub fn to_executor(&self, fee: Decimal) -> crate::core::executor::ExecutorConfig {
        crate::core::executor::ExecutorConfig {
            mode: self.mode.into(),
            aggression_ticks: self.aggression_ticks,
            min_profit_bps: self.min_profit_bps,
            max_position_size: self.max_position_size,
            fill_poll_initial: Duration::from_millis(self.fill_poll_initial_ms),
            fill_poll_max: Duration::from_millis(self.fill_poll_max_ms),
            fill_timeout: Duration::from_secs(self.fill_timeout_secs),
            fee,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub min_absolute: Decimal,
    pub trade_multiplier: Decimal,
    pub hysteresis_ratio: Decimal,
    pub check_interval_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            min_absolute: dec!(5),
            trade_multiplier: dec!(3),
            hysteresis_ratio: dec!(1.5),
            check_interval_secs: 30,
        }
    }
}

impl CircuitBreakerConfig {
    #[must_use]
    pub fn to_breaker(&self) -> crate::core::breaker::CircuitBreakerConfig {
        crate::core::breaker::CircuitBreakerConfig {
            min_absolute: self.min_absolute,
            trade_multiplier: self.trade_multiplier,
            hysteresis_ratio: self.hysteresis_ratio,
            check_interval: Duration::from_secs(self.check_interval_secs),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub mode: StorageMode,
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { mode: StorageMode::Sqlite, database_path: "arbcore.db".into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into(), format: "pretty".into() }
    }
}

/// Top-level application configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub discovery: DiscoveryConfig,
    pub stream: StreamConfig,
    pub arb: ArbConfig,
    pub execution: ExecutionConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
    #[serde(skip)]
    pub wallet_private_key: Option<String>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))?;
        config.wallet_private_key = std::env::var("WALLET_PRIVATE_KEY").ok();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.stream.ws_url.is_empty() {
            return Err(Error::Config("stream.ws_url must not be empty".into()));
        }
        if self.execution.mode == ExecutionMode::Live && self.wallet_private_key.is_none() {
            return Err(Error::Config(
                "execution.mode = \"live\" requires WALLET_PRIVATE_KEY in the environment".into(),
            ));
        }
        if self.circuit_breaker.hysteresis_ratio < Decimal::ONE {
            return Err(Error::Config("circuit_breaker.hysteresis_ratio must be >= 1".into()));
        }
        if self.arb.min_trade_size > self.arb.max_trade_size {
            return Err(Error::Config("arb.min_trade_size must not exceed arb.max_trade_size".into()));
        }
        Ok(())
    }

    /// Initializes the global tracing subscriber from `logging`.
    pub fn init_logging(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.logging.level));

        match self.logging.format.as_str() {
            "json" => {
                fmt().json().with_env_filter(filter).init();
            }
            _ => {
                fmt().with_env_filter(filter).init();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn live_mode_without_private_key_fails_validation() {
        let mut config = Config::default();
        config.execution.mode = ExecutionMode::Live;
        config.wallet_private_key = None;
        assert!(config.validate().is_err());
    }

    #[test]
    fn hysteresis_ratio_below_one_fails_validation() {
        let mut config = Config::default();
        config.circuit_breaker.hysteresis_ratio = dec!(0.9);
        assert!(config.validate().is_err());
    }

    #[test]
    fn min_trade_size_above_max_fails_validation() {
        let mut config = Config::default();
        config.arb.min_trade_size = dec!(2000);
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_toml_with_overrides() {
        let toml = r#"
            [arb]
            fee = "0.02"
            profit_threshold = "0.99"

            [storage]
            mode = "console"
        "#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, toml).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.arb.fee, dec!(0.02));
        assert_eq!(config.storage.mode, StorageMode::Console);
    }
}
