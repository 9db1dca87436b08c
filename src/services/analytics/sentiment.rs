//! Market sentiment over a trailing window (component F). Grounded on
//! `AIAnalyticsService.analyze_market_sentiment`: buy/sell pressure from
//! taker-side prints, plus first-half/second-half comparisons for price
//! and volume trend.

use super::stats::{mean, to_f64};
use crate::models::order::OrderSide;
use crate::models::trade::Trade;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Bullish,
    SlightlyBullish,
    Neutral,
    SlightlyBearish,
    Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceTrend {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketSentiment {
    pub symbol: String,
    pub sentiment: SentimentLabel,
    pub buy_pressure_pct: f64,
    pub sell_pressure_pct: f64,
    pub price_trend: PriceTrend,
    pub volume_trend: VolumeTrend,
}

fn neutral(symbol: &str) -> MarketSentiment {
    MarketSentiment {
        symbol: symbol.to_string(),
        sentiment: SentimentLabel::Neutral,
        buy_pressure_pct: 50.0,
        sell_pressure_pct: 50.0,
        price_trend: PriceTrend::Flat,
        volume_trend: VolumeTrend::Stable,
    }
}

/// `prints_chronological` must be the symbol's taker-side prints, oldest
/// first, over the sentiment window (24h).
pub fn analyze_market_sentiment(symbol: &str, prints_chronological: &[Trade]) -> MarketSentiment {
    if prints_chronological.is_empty() {
        return neutral(symbol);
    }

    let buy_volume: f64 = prints_chronological
        .iter()
        .filter(|t| t.side == OrderSide::Buy)
        .map(|t| to_f64(t.qty))
        .sum();
    let sell_volume: f64 = prints_chronological
        .iter()
        .filter(|t| t.side == OrderSide::Sell)
        .map(|t| to_f64(t.qty))
        .sum();
    let total = (buy_volume + sell_volume).max(1e-9);
    let buy_pressure_pct = buy_volume / total * 100.0;
    let sell_pressure_pct = 100.0 - buy_pressure_pct;

    let sentiment = if buy_pressure_pct > 65.0 {
        SentimentLabel::Bullish
    } else if buy_pressure_pct > 55.0 {
        SentimentLabel::SlightlyBullish
    } else if buy_pressure_pct < 35.0 {
        SentimentLabel::Bearish
    } else if buy_pressure_pct < 45.0 {
        SentimentLabel::SlightlyBearish
    } else {
        SentimentLabel::Neutral
    };

    let mid = (prints_chronological.len() / 2).max(1);
    let (first_half, second_half) = prints_chronological.split_at(mid);
    let first_mean = mean(&first_half.iter().map(|t| to_f64(t.price)).collect::<Vec<_>>());
    let second_mean = mean(&second_half.iter().map(|t| to_f64(t.price)).collect::<Vec<_>>());
    let price_change_pct = if first_mean.abs() > 1e-9 {
        (second_mean - first_mean) / first_mean * 100.0
    } else {
        0.0
    };
    let price_trend = if price_change_pct > 2.0 {
        PriceTrend::Up
    } else if price_change_pct < -2.0 {
        PriceTrend::Down
    } else {
        PriceTrend::Flat
    };

    let first_count = first_half.len() as f64;
    let second_count = second_half.len() as f64;
    let volume_change_pct = if first_count > 0.0 {
        (second_count - first_count) / first_count * 100.0
    } else {
        0.0
    };
    let volume_trend = if volume_change_pct > 50.0 {
        VolumeTrend::Increasing
    } else if volume_change_pct < -40.0 {
        VolumeTrend::Decreasing
    } else {
        VolumeTrend::Stable
    };

    MarketSentiment {
        symbol: symbol.to_string(),
        sentiment,
        buy_pressure_pct,
        sell_pressure_pct,
        price_trend,
        volume_trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trade::Liquidity;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn print(side: OrderSide, price: rust_decimal::Decimal, qty: rust_decimal::Decimal) -> Trade {
        Trade {
            trade_id: 1,
            symbol: "ETH-USDT".to_string(),
            maker_order_id: Uuid::new_v4(),
            taker_order_id: Uuid::new_v4(),
            maker_principal: Uuid::new_v4(),
            taker_principal: Uuid::new_v4(),
            side,
            price,
            qty,
            quote_qty: price * qty,
            commission: dec!(0),
            commission_asset: "ETH".to_string(),
            liquidity: Liquidity::Taker,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn heavy_buy_pressure_reads_bullish() {
        let mut prints: Vec<Trade> = (0..8).map(|_| print(OrderSide::Buy, dec!(2000), dec!(1))).collect();
        prints.extend((0..2).map(|_| print(OrderSide::Sell, dec!(2000), dec!(1))));
        let sentiment = analyze_market_sentiment("ETH-USDT", &prints);
        assert_eq!(sentiment.sentiment, SentimentLabel::Bullish);
    }

    #[test]
    fn no_trades_is_neutral() {
        let sentiment = analyze_market_sentiment("ETH-USDT", &[]);
        assert_eq!(sentiment.sentiment, SentimentLabel::Neutral);
    }
}
