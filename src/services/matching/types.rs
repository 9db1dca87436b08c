//! Shared types for the order book and matching engine.

use crate::models::order::{OrderSide, OrderType, TimeInForce};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicI64, Ordering as AtomicOrdering};
use uuid::Uuid;

/// Fixed-point price, scaled by 1e8, used as the `BTreeMap` key so price
/// levels compare and hash exactly instead of through `Decimal`'s rescaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceLevel(i64);

const SCALE: i64 = 100_000_000;

impl PriceLevel {
    pub fn from_decimal(price: Decimal) -> Self {
        let scaled = (price * Decimal::from(SCALE)).trunc();
        let value = scaled.mantissa() / 10i128.pow(scaled.scale());
        PriceLevel(value as i64)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::from(self.0) / Decimal::from(SCALE)
    }

    pub fn raw(self) -> i64 {
        self.0
    }
}

impl Ord for PriceLevel {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for PriceLevel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Process-wide monotonic clock for `arrival_ts`, immune to wall-clock skew
/// or NTP adjustments mid-session.
static ARRIVAL_CLOCK: AtomicI64 = AtomicI64::new(0);

pub fn next_arrival_ts() -> i64 {
    ARRIVAL_CLOCK.fetch_add(1, AtomicOrdering::Relaxed)
}

/// A resting order's presence on the book.
#[derive(Debug, Clone)]
pub struct BookEntry {
    pub order_id: Uuid,
    pub client_order_id: Option<String>,
    pub principal: Uuid,
    pub side: OrderSide,
    pub price: Decimal,
    pub remaining_qty: Decimal,
    pub arrival_ts: i64,
    pub time_in_force: TimeInForce,
}

/// One leg of a fill produced while walking the book; the engine turns a
/// pair of these (maker + taker) into `models::trade::Trade` rows.
#[derive(Debug, Clone)]
pub struct Fill {
    pub maker_order_id: Uuid,
    pub maker_principal: Uuid,
    pub maker_client_order_id: Option<String>,
    pub price: Decimal,
    pub qty: Decimal,
    pub maker_exhausted: bool,
}

/// Outcome of walking the book for one incoming (taker) order.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub fills: Vec<Fill>,
    pub filled_qty: Decimal,
    pub remaining_qty: Decimal,
}

/// Aggregated depth row returned by `Orderbook::depth`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Decimal,
    pub qty: Decimal,
    pub order_count: usize,
}

/// A full depth snapshot, tagged with the book's mutation sequence so
/// subscribers can detect gaps between consecutive snapshots. Also the
/// payload cached read-through in front of `/book` (2.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderbookSnapshot {
    pub symbol: String,
    pub bids: Vec<DepthLevel>,
    pub asks: Vec<DepthLevel>,
    pub sequence: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum MatchingError {
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("order not found")]
    OrderNotFound,
    #[error("order is not cancellable")]
    NotCancellable,
}

/// Commission and slippage policy applied uniformly across symbols; carried
/// on the engine rather than per order.
#[derive(Debug, Clone)]
pub struct FeeConfig {
    pub commission_rate: Decimal,
    pub market_slippage_bps: u32,
}

pub fn order_type_is_stop(order_type: OrderType) -> bool {
    order_type.is_stop()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_level_round_trips() {
        let price = dec!(97500.50);
        let level = PriceLevel::from_decimal(price);
        assert_eq!(level.to_decimal(), price);
    }

    #[test]
    fn price_level_orders_numerically() {
        let low = PriceLevel::from_decimal(dec!(100.0));
        let high = PriceLevel::from_decimal(dec!(200.0));
        assert!(low < high);
    }

    #[test]
    fn arrival_ts_strictly_increases() {
        let a = next_arrival_ts();
        let b = next_arrival_ts();
        assert!(b > a);
    }
}
