//! Anomaly detection over a trade-log lookback window (component F).
//! Grounded on `AIAnalyticsService.detect_anomalies` and its four
//! `_detect_*` helpers: volume spikes, large trades, rapid trading, and
//! wash-trading suspicion.

use super::stats::{mean, percentile, stdev, to_f64};
use super::ParticipantFill;
use crate::models::order::OrderSide;
use crate::models::trade::Trade;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

const VOLUME_SPIKE_K: f64 = 3.0;
const LARGE_TRADE_PERCENTILE: f64 = 0.95;
const RAPID_TRADE_THRESHOLD: usize = 10;
const WASH_TRADE_RATIO: f64 = 0.9;
const WASH_TRADE_MIN_VOLUME: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyKind {
    VolumeSpike,
    LargeTrade,
    RapidTrading,
    WashTrading,
}

#[derive(Debug, Clone, Serialize)]
pub struct Anomaly {
    pub symbol: String,
    pub kind: AnomalyKind,
    pub severity: f64,
    pub detected_at: DateTime<Utc>,
    pub description: String,
    pub metrics: serde_json::Value,
}

fn hour_bucket(ts: DateTime<Utc>) -> i64 {
    ts.timestamp() / 3600
}

fn bucket_to_time(bucket: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(bucket * 3600, 0).unwrap_or_else(Utc::now)
}

fn minute_to_time(minute: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(minute * 60, 0).unwrap_or_else(Utc::now)
}

fn detect_volume_spikes(symbol: &str, prints: &[Trade]) -> Vec<Anomaly> {
    if prints.len() < 2 {
        return Vec::new();
    }
    let mut bins: HashMap<i64, f64> = HashMap::new();
    for t in prints {
        *bins.entry(hour_bucket(t.executed_at)).or_insert(0.0) += to_f64(t.qty);
    }
    let volumes: Vec<f64> = bins.values().copied().collect();
    let m = mean(&volumes);
    let sd = stdev(&volumes, m);
    if sd == 0.0 {
        return Vec::new();
    }
    let threshold = m + VOLUME_SPIKE_K * sd;

    let mut buckets: Vec<(i64, f64)> = bins.into_iter().collect();
    buckets.sort_by_key(|(b, _)| *b);
    buckets
        .into_iter()
        .filter(|(_, volume)| *volume > threshold)
        .map(|(bucket, volume)| {
            let spike_ratio = volume / m.max(1e-9);
            Anomaly {
                symbol: symbol.to_string(),
                kind: AnomalyKind::VolumeSpike,
                severity: (spike_ratio * 2.0).clamp(1.0, 10.0),
                detected_at: bucket_to_time(bucket),
                description: format!(
                    "hourly volume {:.4} is {:.1}x the window mean {:.4}",
                    volume, spike_ratio, m
                ),
                metrics: serde_json::json!({"volume": volume, "mean": m, "stdev": sd}),
            }
        })
        .collect()
}

fn detect_large_trades(symbol: &str, prints: &[Trade]) -> Vec<Anomaly> {
    if prints.len() < 5 {
        return Vec::new();
    }
    let mut qtys: Vec<f64> = prints.iter().map(|t| to_f64(t.qty)).collect();
    qtys.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let threshold = percentile(&qtys, LARGE_TRADE_PERCENTILE);
    let m = mean(&qtys).max(1e-9);

    prints
        .iter()
        .filter(|t| to_f64(t.qty) > threshold)
        .map(|t| {
            let qty = to_f64(t.qty);
            Anomaly {
                symbol: symbol.to_string(),
                kind: AnomalyKind::LargeTrade,
                severity: (qty / m).clamp(1.0, 10.0),
                detected_at: t.executed_at,
                description: format!(
                    "trade {} of size {} exceeds the 95th percentile ({:.4})",
                    t.trade_id, t.qty, threshold
                ),
                metrics: serde_json::json!({
                    "trade_id": t.trade_id,
                    "qty": qty,
                    "percentile_95": threshold,
                }),
            }
        })
        .collect()
}

fn detect_rapid_trading(fills: &[ParticipantFill]) -> Vec<Anomaly> {
    let mut per_minute: HashMap<(Uuid, String, i64), usize> = HashMap::new();
    for f in fills {
        let minute = f.executed_at.timestamp() / 60;
        *per_minute
            .entry((f.principal, f.symbol.clone(), minute))
            .or_insert(0) += 1;
    }

    let mut flagged: Vec<((Uuid, String, i64), usize)> = per_minute
        .into_iter()
        .filter(|(_, count)| *count > RAPID_TRADE_THRESHOLD)
        .collect();
    flagged.sort_by_key(|((_, _, minute), _)| *minute);

    flagged
        .into_iter()
        .map(|((principal, symbol, minute), count)| Anomaly {
            symbol,
            kind: AnomalyKind::RapidTrading,
            severity: (count as f64 / RAPID_TRADE_THRESHOLD as f64).min(10.0),
            detected_at: minute_to_time(minute),
            description: format!("{count} fills inside one minute"),
            metrics: serde_json::json!({"principal": principal, "trades_per_minute": count}),
        })
        .collect()
}

fn detect_wash_trading(fills: &[ParticipantFill]) -> Vec<Anomaly> {
    let mut volumes: HashMap<(Uuid, String), (f64, f64, DateTime<Utc>)> = HashMap::new();
    for f in fills {
        let entry = volumes
            .entry((f.principal, f.symbol.clone()))
            .or_insert((0.0, 0.0, f.executed_at));
        match f.side {
            OrderSide::Buy => entry.0 += to_f64(f.qty),
            OrderSide::Sell => entry.1 += to_f64(f.qty),
        }
        if f.executed_at > entry.2 {
            entry.2 = f.executed_at;
        }
    }

    volumes
        .into_iter()
        .filter_map(|((principal, symbol), (buy, sell, last_seen))| {
            let (min_vol, max_vol) = if buy < sell { (buy, sell) } else { (sell, buy) };
            if max_vol <= 0.0 {
                return None;
            }
            let ratio = min_vol / max_vol;
            if ratio > WASH_TRADE_RATIO && min_vol > WASH_TRADE_MIN_VOLUME {
                Some(Anomaly {
                    symbol,
                    kind: AnomalyKind::WashTrading,
                    severity: 8.0,
                    detected_at: last_seen,
                    description: format!(
                        "buy/sell volumes nearly balanced (ratio {:.2}) at {:.2} minimum volume",
                        ratio, min_vol
                    ),
                    metrics: serde_json::json!({
                        "principal": principal,
                        "buy_volume": buy,
                        "sell_volume": sell,
                        "ratio": ratio,
                    }),
                })
            } else {
                None
            }
        })
        .collect()
}

/// Runs all four detectors and returns findings sorted by severity, then
/// recency, both descending — the order the dashboard feed expects.
pub fn detect_anomalies(prints: &[Trade], fills: &[ParticipantFill]) -> Vec<Anomaly> {
    let mut by_symbol: HashMap<&str, Vec<Trade>> = HashMap::new();
    for t in prints {
        by_symbol.entry(t.symbol.as_str()).or_default().push(t.clone());
    }

    let mut anomalies = Vec::new();
    for (symbol, trades) in &by_symbol {
        anomalies.extend(detect_volume_spikes(symbol, trades));
        anomalies.extend(detect_large_trades(symbol, trades));
    }
    anomalies.extend(detect_rapid_trading(fills));
    anomalies.extend(detect_wash_trading(fills));

    anomalies.sort_by(|a, b| {
        b.severity
            .partial_cmp(&a.severity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.detected_at.cmp(&a.detected_at))
    });
    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::trade::Liquidity;
    use rust_decimal_macros::dec;

    fn fill(principal: Uuid, side: OrderSide, qty: rust_decimal::Decimal, at: DateTime<Utc>) -> ParticipantFill {
        ParticipantFill {
            principal,
            symbol: "ETH-USDT".to_string(),
            side,
            qty,
            quote_qty: qty * dec!(2000),
            executed_at: at,
        }
    }

    #[test]
    fn rapid_trading_flags_eleven_fills_in_one_minute() {
        let principal = Uuid::new_v4();
        let base = Utc::now();
        let fills: Vec<ParticipantFill> = (0..11)
            .map(|i| fill(principal, OrderSide::Buy, dec!(1), base + chrono::Duration::seconds(i)))
            .collect();

        let anomalies = detect_rapid_trading(&fills);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::RapidTrading);
        assert_eq!(anomalies[0].metrics["trades_per_minute"], 11);
    }

    #[test]
    fn ten_fills_in_one_minute_does_not_flag() {
        let principal = Uuid::new_v4();
        let base = Utc::now();
        let fills: Vec<ParticipantFill> = (0..10)
            .map(|i| fill(principal, OrderSide::Buy, dec!(1), base + chrono::Duration::seconds(i)))
            .collect();

        assert!(detect_rapid_trading(&fills).is_empty());
    }

    #[test]
    fn wash_trading_flags_balanced_high_volume() {
        let principal = Uuid::new_v4();
        let base = Utc::now();
        let fills = vec![
            fill(principal, OrderSide::Buy, dec!(150), base),
            fill(principal, OrderSide::Sell, dec!(145), base + chrono::Duration::minutes(1)),
        ];

        let anomalies = detect_wash_trading(&fills);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::WashTrading);
    }

    #[test]
    fn wash_trading_ignores_small_volume() {
        let principal = Uuid::new_v4();
        let base = Utc::now();
        let fills = vec![
            fill(principal, OrderSide::Buy, dec!(5), base),
            fill(principal, OrderSide::Sell, dec!(5), base),
        ];
        assert!(detect_wash_trading(&fills).is_empty());
    }

    #[test]
    fn large_trade_detection_flags_outlier_size() {
        let base = Utc::now();
        let mut prints: Vec<Trade> = (0..20)
            .map(|i| Trade {
                trade_id: i,
                symbol: "ETH-USDT".to_string(),
                maker_order_id: Uuid::new_v4(),
                taker_order_id: Uuid::new_v4(),
                maker_principal: Uuid::new_v4(),
                taker_principal: Uuid::new_v4(),
                side: OrderSide::Buy,
                price: dec!(2000),
                qty: dec!(1),
                quote_qty: dec!(2000),
                commission: dec!(0),
                commission_asset: "ETH".to_string(),
                liquidity: Liquidity::Taker,
                executed_at: base + chrono::Duration::seconds(i),
            })
            .collect();
        prints.push(Trade {
            trade_id: 99,
            qty: dec!(50),
            quote_qty: dec!(100000),
            executed_at: base + chrono::Duration::seconds(21),
            ..prints[0].clone()
        });

        let anomalies = detect_large_trades("ETH-USDT", &prints);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].metrics["trade_id"], 99);
    }
}
