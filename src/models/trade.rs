use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Which side of a fill a trade row records. The original source collapsed
/// both legs into a single ambiguous record; this core emits one row per leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "liquidity_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Liquidity {
    Maker,
    Taker,
}

/// An immutable execution record. `trade_id` is globally monotonic per engine.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Trade {
    pub trade_id: i64,
    pub symbol: String,
    pub maker_order_id: Uuid,
    pub taker_order_id: Uuid,
    pub maker_principal: Uuid,
    pub taker_principal: Uuid,
    /// The taker's side.
    pub side: super::order::OrderSide,
    /// Equals the maker's limit price.
    pub price: Decimal,
    pub qty: Decimal,
    pub quote_qty: Decimal,
    pub commission: Decimal,
    pub commission_asset: String,
    pub liquidity: Liquidity,
    pub executed_at: DateTime<Utc>,
}

impl Trade {
    /// Split a single fill into the maker and taker rows persisted for it.
    pub fn pair(
        trade_id: i64,
        symbol: &str,
        maker_order_id: Uuid,
        taker_order_id: Uuid,
        maker_principal: Uuid,
        taker_principal: Uuid,
        taker_side: super::order::OrderSide,
        price: Decimal,
        qty: Decimal,
        commission_rate: Decimal,
        executed_at: DateTime<Utc>,
    ) -> (Trade, Trade) {
        let quote_qty = price * qty;
        let commission_asset = base_asset(symbol).to_string();
        let commission = qty * commission_rate;

        let taker = Trade {
            trade_id,
            symbol: symbol.to_string(),
            maker_order_id,
            taker_order_id,
            maker_principal,
            taker_principal,
            side: taker_side,
            price,
            qty,
            quote_qty,
            commission,
            commission_asset: commission_asset.clone(),
            liquidity: Liquidity::Taker,
            executed_at,
        };
        let maker = Trade {
            liquidity: Liquidity::Maker,
            side: taker_side.opposite(),
            ..taker.clone()
        };
        (maker, taker)
    }
}

pub fn base_asset(symbol: &str) -> &str {
    symbol.split('-').next().unwrap_or(symbol)
}

pub fn quote_asset(symbol: &str) -> &str {
    symbol.split('-').nth(1).unwrap_or(symbol)
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct TradeQuery {
    pub symbol: Option<String>,
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
}

impl TradeQuery {
    pub fn get_limit(&self) -> usize {
        self.limit.unwrap_or(50).clamp(1, 500)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeStats {
    pub symbol: String,
    pub period: String,
    pub trade_count: i64,
    pub volume: Decimal,
    pub quote_volume: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub open: Decimal,
    pub close: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn pair_splits_liquidity_and_keeps_trade_id() {
        let (maker, taker) = Trade::pair(
            1,
            "ETH-USDT",
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            super::super::order::OrderSide::Buy,
            dec!(2000),
            dec!(1),
            dec!(0.001),
            Utc::now(),
        );
        assert_eq!(maker.trade_id, taker.trade_id);
        assert_eq!(maker.liquidity, Liquidity::Maker);
        assert_eq!(taker.liquidity, Liquidity::Taker);
        assert_eq!(maker.side, super::super::order::OrderSide::Sell);
        assert_eq!(taker.side, super::super::order::OrderSide::Buy);
        assert_eq!(taker.commission_asset, "ETH");
    }
}
