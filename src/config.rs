//! Application configuration, loaded from environment (via `.env` and the
//! process environment) and validated before the server accepts traffic.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AppConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[validate(length(min = 1))]
    pub database_url: String,

    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    #[validate(length(min = 16))]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_seconds: u64,

    #[serde(default = "default_trading_pairs")]
    pub trading_pairs: String,

    #[serde(default = "default_min_order_qty")]
    pub min_order_qty: String,

    #[serde(default = "default_max_order_qty")]
    pub max_order_qty: String,

    #[serde(default = "default_commission_rate")]
    pub commission_rate: String,

    #[serde(default = "default_slippage_bps")]
    pub market_order_slippage_bps: u32,

    #[serde(default = "default_daily_trade_cap")]
    pub default_daily_trade_cap: String,

    #[serde(default = "default_session_ceiling")]
    pub session_ceiling: usize,

    #[serde(default = "default_write_deadline_ms")]
    pub session_write_deadline_ms: u64,

    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,

    #[serde(default = "default_expiry_sweep_interval_secs")]
    pub expiry_sweep_interval_secs: u64,

    #[serde(default = "default_order_rate_limit_per_sec")]
    pub order_rate_limit_per_sec: u32,

    #[serde(default = "default_auth_disabled")]
    pub auth_disabled: bool,
}

fn default_environment() -> String {
    "development".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}
fn default_jwt_expiry() -> u64 {
    3600
}
fn default_trading_pairs() -> String {
    "BTC-USDT,ETH-USDT".to_string()
}
fn default_min_order_qty() -> String {
    "0.0001".to_string()
}
fn default_max_order_qty() -> String {
    "10000".to_string()
}
fn default_commission_rate() -> String {
    "0.001".to_string()
}
fn default_slippage_bps() -> u32 {
    50
}
fn default_daily_trade_cap() -> String {
    "1000000".to_string()
}
fn default_session_ceiling() -> usize {
    10_000
}
fn default_write_deadline_ms() -> u64 {
    5_000
}
fn default_heartbeat_interval_secs() -> u64 {
    30
}
fn default_expiry_sweep_interval_secs() -> u64 {
    5
}
fn default_order_rate_limit_per_sec() -> u32 {
    10
}
fn default_auth_disabled() -> bool {
    false
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        let cfg: AppConfig = settings.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn get_trading_pairs(&self) -> Vec<String> {
        self.trading_pairs
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn is_auth_disabled(&self) -> bool {
        self.auth_disabled
    }

    pub fn min_order_qty(&self) -> Decimal {
        Decimal::from_str(&self.min_order_qty).unwrap_or_default()
    }

    pub fn max_order_qty(&self) -> Decimal {
        Decimal::from_str(&self.max_order_qty).unwrap_or_default()
    }

    pub fn commission_rate(&self) -> Decimal {
        Decimal::from_str(&self.commission_rate).unwrap_or_default()
    }

    pub fn default_daily_trade_cap(&self) -> Decimal {
        Decimal::from_str(&self.default_daily_trade_cap).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trading_pairs() {
        let cfg = AppConfig {
            environment: "test".into(),
            port: 8080,
            database_url: "postgres://localhost/test".into(),
            redis_url: default_redis_url(),
            jwt_secret: "x".repeat(32),
            jwt_expiry_seconds: 3600,
            trading_pairs: " btc-usdt , eth-usdt ".into(),
            min_order_qty: default_min_order_qty(),
            max_order_qty: default_max_order_qty(),
            commission_rate: default_commission_rate(),
            market_order_slippage_bps: 50,
            default_daily_trade_cap: default_daily_trade_cap(),
            session_ceiling: 10,
            session_write_deadline_ms: 5000,
            heartbeat_interval_secs: 30,
            expiry_sweep_interval_secs: 5,
            order_rate_limit_per_sec: 10,
            auth_disabled: false,
        };
        assert_eq!(cfg.get_trading_pairs(), vec!["BTC-USDT", "ETH-USDT"]);
    }
}
