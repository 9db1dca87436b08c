//! Stop-order trigger table keyed by `(stop_price, direction)` within a
//! symbol. A buy stop triggers once a trade prints at or above its
//! stop price; a sell stop triggers once a trade prints at or below it.

use super::types::PriceLevel;
use crate::models::order::OrderSide;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Default)]
pub struct StopTable {
    buy_stops: Mutex<BTreeMap<PriceLevel, Vec<Uuid>>>,
    sell_stops: Mutex<BTreeMap<PriceLevel, Vec<Uuid>>>,
}

impl StopTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, side: OrderSide, stop_price: Decimal, order_id: Uuid) {
        let level = PriceLevel::from_decimal(stop_price);
        let table = match side {
            OrderSide::Buy => &self.buy_stops,
            OrderSide::Sell => &self.sell_stops,
        };
        table.lock().entry(level).or_default().push(order_id);
    }

    pub fn remove(&self, side: OrderSide, stop_price: Decimal, order_id: Uuid) {
        let level = PriceLevel::from_decimal(stop_price);
        let table = match side {
            OrderSide::Buy => &self.buy_stops,
            OrderSide::Sell => &self.sell_stops,
        };
        let mut guard = table.lock();
        if let Some(ids) = guard.get_mut(&level) {
            ids.retain(|id| *id != order_id);
            if ids.is_empty() {
                guard.remove(&level);
            }
        }
    }

    /// Stop orders whose trigger condition a trade at `price` satisfies.
    /// Removes them from the table — callers re-enter each as a fresh
    /// order via the normal admission path.
    pub fn triggered_by(&self, price: Decimal) -> Vec<Uuid> {
        let level = PriceLevel::from_decimal(price);
        let mut triggered = Vec::new();

        let mut buy = self.buy_stops.lock();
        let keys: Vec<PriceLevel> = buy.range(..=level).map(|(k, _)| *k).collect();
        for key in keys {
            if let Some(ids) = buy.remove(&key) {
                triggered.extend(ids);
            }
        }
        drop(buy);

        let mut sell = self.sell_stops.lock();
        let keys: Vec<PriceLevel> = sell.range(level..).map(|(k, _)| *k).collect();
        for key in keys {
            if let Some(ids) = sell.remove(&key) {
                triggered.extend(ids);
            }
        }

        triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn buy_stop_triggers_when_price_rises_through_it() {
        let table = StopTable::new();
        let id = Uuid::new_v4();
        table.insert(OrderSide::Buy, dec!(100.0), id);

        assert!(table.triggered_by(dec!(99.0)).is_empty());
        assert_eq!(table.triggered_by(dec!(100.0)), vec![id]);
        // Consumed: triggering again does nothing.
        assert!(table.triggered_by(dec!(101.0)).is_empty());
    }

    #[test]
    fn sell_stop_triggers_when_price_falls_through_it() {
        let table = StopTable::new();
        let id = Uuid::new_v4();
        table.insert(OrderSide::Sell, dec!(100.0), id);

        assert!(table.triggered_by(dec!(101.0)).is_empty());
        assert_eq!(table.triggered_by(dec!(100.0)), vec![id]);
    }

    #[test]
    fn remove_before_trigger_prevents_firing() {
        let table = StopTable::new();
        let id = Uuid::new_v4();
        table.insert(OrderSide::Buy, dec!(100.0), id);
        table.remove(OrderSide::Buy, dec!(100.0), id);

        assert!(table.triggered_by(dec!(100.0)).is_empty());
    }
}
