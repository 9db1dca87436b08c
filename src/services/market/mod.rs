//! Market data service: read-only views over the order book, trade log, and
//! candle store for the public price/ticker/candle endpoints. Holds no
//! state of its own beyond the handles it wraps.

use crate::config::AppConfig;
use crate::db::timescale::{Candle, CandleInterval, TimescaleOps};
use crate::error::AppError;
use crate::services::matching::{MatchingEngine, TradeLog};
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

const TICKER_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize)]
pub struct Ticker {
    pub symbol: String,
    pub last_price: Decimal,
    pub bid_price: Option<Decimal>,
    pub ask_price: Option<Decimal>,
    pub high_24h: Decimal,
    pub low_24h: Decimal,
    pub open_24h: Decimal,
    pub volume_24h: Decimal,
    pub quote_volume_24h: Decimal,
    pub change_pct_24h: f64,
    pub trade_count_24h: i64,
}

pub struct MarketService {
    engine: Arc<MatchingEngine>,
    trade_log: Arc<TradeLog>,
    timescale: TimescaleOps,
    symbols: Vec<String>,
}

impl MarketService {
    pub fn new(
        engine: Arc<MatchingEngine>,
        trade_log: Arc<TradeLog>,
        timescale: TimescaleOps,
        config: &AppConfig,
    ) -> Self {
        Self {
            engine,
            trade_log,
            timescale,
            symbols: config.get_trading_pairs(),
        }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn check_symbol(&self, symbol: &str) -> Result<(), AppError> {
        if self.engine.is_valid_symbol(symbol) {
            Ok(())
        } else {
            Err(AppError::Validation(format!("unknown symbol: {symbol}")))
        }
    }

    /// Last traded price for a symbol, falling back to the book mid when the
    /// symbol has no trade history yet.
    pub async fn current_price(&self, symbol: &str) -> Result<Decimal, AppError> {
        self.check_symbol(symbol)?;
        if let Some(trade) = self.trade_log.recent(symbol, 1).into_iter().next() {
            return Ok(trade.price);
        }
        let snapshot = self.engine.depth(symbol, 1).await?;
        match (snapshot.bids.first(), snapshot.asks.first()) {
            (Some(bid), Some(ask)) => Ok((bid.price + ask.price) / Decimal::TWO),
            (Some(bid), None) => Ok(bid.price),
            (None, Some(ask)) => Ok(ask.price),
            (None, None) => Ok(Decimal::ZERO),
        }
    }

    pub async fn prices(&self) -> Result<Vec<(String, Decimal)>, AppError> {
        let mut out = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            out.push((symbol.clone(), self.current_price(symbol).await?));
        }
        Ok(out)
    }

    /// 24h ticker: trailing-window OHLCV from the trade log, best bid/ask
    /// from the live book.
    pub async fn ticker(&self, symbol: &str) -> Result<Ticker, AppError> {
        self.check_symbol(symbol)?;
        let since = Utc::now() - Duration::hours(TICKER_WINDOW_HOURS);
        let stats = self.trade_log.stats(symbol, since).await?;
        let snapshot = self.engine.depth(symbol, 1).await?;
        let bid_price = snapshot.bids.first().map(|l| l.price);
        let ask_price = snapshot.asks.first().map(|l| l.price);

        let last_price = self
            .trade_log
            .recent(symbol, 1)
            .into_iter()
            .next()
            .map(|t| t.price)
            .unwrap_or(stats.close);
        let change_pct_24h = if stats.open.is_zero() {
            0.0
        } else {
            ((last_price - stats.open) / stats.open * Decimal::ONE_HUNDRED)
                .to_string()
                .parse()
                .unwrap_or(0.0)
        };

        Ok(Ticker {
            symbol: symbol.to_string(),
            last_price,
            bid_price,
            ask_price,
            high_24h: stats.high,
            low_24h: stats.low,
            open_24h: stats.open,
            volume_24h: stats.volume,
            quote_volume_24h: stats.quote_volume,
            change_pct_24h,
            trade_count_24h: stats.trade_count,
        })
    }

    pub async fn tickers(&self) -> Result<Vec<Ticker>, AppError> {
        let mut out = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            out.push(self.ticker(symbol).await?);
        }
        Ok(out)
    }

    pub async fn candles(
        &self,
        symbol: &str,
        interval: CandleInterval,
        limit: i64,
    ) -> Result<Vec<Candle>, AppError> {
        self.check_symbol(symbol)?;
        self.timescale
            .get_recent_candles(symbol, interval, limit as i32)
            .await
            .map_err(AppError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_pct_computes_from_open_and_last() {
        let open = Decimal::new(2000, 0);
        let last = Decimal::new(2100, 0);
        let pct: f64 = ((last - open) / open * Decimal::ONE_HUNDRED).to_string().parse().unwrap();
        assert!((pct - 5.0).abs() < 1e-6);
    }
}
