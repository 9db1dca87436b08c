//! Candle (kline) queries backing `/candles/{symbol}?interval=`.
//!
//! Candles are expected to live in continuous aggregates (or plain rolled-up
//! tables) keyed by interval; this module only reads them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Candle {
    pub symbol: String,
    #[sqlx(rename = "bucket")]
    pub open_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub trade_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandleInterval {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    OneHour,
    FourHours,
    OneDay,
}

impl CandleInterval {
    pub fn table_name(&self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "candles_1m",
            CandleInterval::FiveMinutes => "candles_5m",
            CandleInterval::FifteenMinutes => "candles_15m",
            CandleInterval::OneHour => "candles_1h",
            CandleInterval::FourHours => "candles_4h",
            CandleInterval::OneDay => "candles_1d",
        }
    }

    pub fn interval_seconds(&self) -> i64 {
        match self {
            CandleInterval::OneMinute => 60,
            CandleInterval::FiveMinutes => 300,
            CandleInterval::FifteenMinutes => 900,
            CandleInterval::OneHour => 3600,
            CandleInterval::FourHours => 14400,
            CandleInterval::OneDay => 86400,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "1m" => Some(CandleInterval::OneMinute),
            "5m" => Some(CandleInterval::FiveMinutes),
            "15m" => Some(CandleInterval::FifteenMinutes),
            "1h" => Some(CandleInterval::OneHour),
            "4h" => Some(CandleInterval::FourHours),
            "1d" => Some(CandleInterval::OneDay),
            _ => None,
        }
    }

    pub fn to_str(&self) -> &'static str {
        match self {
            CandleInterval::OneMinute => "1m",
            CandleInterval::FiveMinutes => "5m",
            CandleInterval::FifteenMinutes => "15m",
            CandleInterval::OneHour => "1h",
            CandleInterval::FourHours => "4h",
            CandleInterval::OneDay => "1d",
        }
    }
}

pub struct TimescaleOps {
    pool: PgPool,
}

impl TimescaleOps {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_recent_candles(
        &self,
        symbol: &str,
        interval: CandleInterval,
        limit: i32,
    ) -> Result<Vec<Candle>, sqlx::Error> {
        let table = interval.table_name();

        // table name is drawn from a closed enum, never request input.
        let query = format!(
            r#"
            SELECT symbol, bucket, open, high, low, close, volume, quote_volume, trade_count
            FROM {}
            WHERE symbol = $1
            ORDER BY bucket DESC
            LIMIT $2
            "#,
            table
        );

        sqlx::query_as::<_, Candle>(&query)
            .bind(symbol.to_uppercase())
            .bind(limit)
            .fetch_all(&self.pool)
            .await
    }

    pub async fn get_latest_candle(
        &self,
        symbol: &str,
        interval: CandleInterval,
    ) -> Result<Option<Candle>, sqlx::Error> {
        let table = interval.table_name();
        let query = format!(
            r#"
            SELECT symbol, bucket, open, high, low, close, volume, quote_volume, trade_count
            FROM {}
            WHERE symbol = $1
            ORDER BY bucket DESC
            LIMIT 1
            "#,
            table
        );

        sqlx::query_as::<_, Candle>(&query)
            .bind(symbol.to_uppercase())
            .fetch_optional(&self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_round_trips_through_str() {
        for raw in ["1m", "5m", "15m", "1h", "4h", "1d"] {
            let interval = CandleInterval::from_str(raw).unwrap();
            assert_eq!(interval.to_str(), raw);
        }
        assert_eq!(CandleInterval::from_str("1w"), None);
    }

    #[test]
    fn table_names_are_closed_and_injection_safe() {
        assert_eq!(CandleInterval::OneHour.table_name(), "candles_1h");
    }
}
