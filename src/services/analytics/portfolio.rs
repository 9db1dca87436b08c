//! Portfolio reconstruction and trading-performance metrics (component F).
//! Grounded on `AIAnalyticsService.analyze_portfolio`,
//! `_calculate_trading_metrics`, and `_generate_insights`.

use super::stats::{mean, stdev, to_f64};
use super::ParticipantFill;
use crate::models::order::OrderSide;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioPosition {
    pub symbol: String,
    pub net_qty: Decimal,
    pub avg_cost: Decimal,
    pub cost_basis: Decimal,
    pub current_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl: Decimal,
    pub unrealized_pnl_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradingMetrics {
    pub total_trades: usize,
    pub closed_round_trips: usize,
    pub win_rate: f64,
    pub avg_profit: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PortfolioAnalysis {
    pub positions: Vec<PortfolioPosition>,
    pub metrics: TradingMetrics,
    pub insights: Vec<String>,
}

/// Folds a principal's fills into net long positions per symbol. Only
/// positions with positive net quantity are reported — a principal who has
/// fully exited a symbol, or who nets short, has no position to show here.
pub fn fold_positions(
    fills: &[ParticipantFill],
    current_prices: &HashMap<String, Decimal>,
) -> Vec<PortfolioPosition> {
    let mut ordered: Vec<&ParticipantFill> = fills.iter().collect();
    ordered.sort_by_key(|f| f.executed_at);

    let mut state: HashMap<String, (Decimal, Decimal)> = HashMap::new();
    for f in ordered {
        let entry = state
            .entry(f.symbol.clone())
            .or_insert((Decimal::ZERO, Decimal::ZERO));
        match f.side {
            OrderSide::Buy => {
                entry.0 += f.qty;
                entry.1 += f.quote_qty;
            }
            OrderSide::Sell => {
                if entry.0 > Decimal::ZERO {
                    let avg_cost = entry.1 / entry.0;
                    let sell_qty = f.qty.min(entry.0);
                    entry.1 -= avg_cost * sell_qty;
                    entry.0 -= sell_qty;
                } else {
                    entry.0 -= f.qty;
                }
            }
        }
    }

    state
        .into_iter()
        .filter(|(_, (qty, _))| *qty > Decimal::ZERO)
        .map(|(symbol, (qty, cost_basis))| {
            let avg_cost = cost_basis / qty;
            let current_price = current_prices.get(&symbol).copied().unwrap_or(avg_cost);
            let market_value = current_price * qty;
            let unrealized_pnl = market_value - cost_basis;
            let unrealized_pnl_pct = if cost_basis.is_zero() {
                0.0
            } else {
                to_f64(unrealized_pnl / cost_basis) * 100.0
            };
            PortfolioPosition {
                symbol,
                net_qty: qty,
                avg_cost,
                cost_basis,
                current_price,
                market_value,
                unrealized_pnl,
                unrealized_pnl_pct,
            }
        })
        .collect()
}

/// Pairs consecutive opposite-side fills on the same symbol into realized
/// round trips and derives win rate, profit factor, Sharpe, and max
/// drawdown from that P&L sequence — the same consecutive-pair heuristic
/// the original analytics used in place of full FIFO lot accounting.
pub fn calculate_trading_metrics(fills: &[ParticipantFill]) -> TradingMetrics {
    let mut ordered: Vec<&ParticipantFill> = fills.iter().collect();
    ordered.sort_by_key(|f| f.executed_at);

    let mut by_symbol: HashMap<&str, Vec<&ParticipantFill>> = HashMap::new();
    for f in &ordered {
        by_symbol.entry(f.symbol.as_str()).or_default().push(f);
    }

    let mut returns: Vec<f64> = Vec::new();
    for seq in by_symbol.values() {
        let mut i = 0;
        while i + 1 < seq.len() {
            let a = seq[i];
            let b = seq[i + 1];
            if a.side != b.side {
                let qty = to_f64(a.qty.min(b.qty));
                let pnl = match a.side {
                    OrderSide::Buy => (b.price() - a.price()) * qty,
                    OrderSide::Sell => (a.price() - b.price()) * qty,
                };
                returns.push(pnl);
                i += 2;
            } else {
                i += 1;
            }
        }
    }

    if returns.is_empty() {
        return TradingMetrics {
            total_trades: fills.len(),
            closed_round_trips: 0,
            win_rate: 0.0,
            avg_profit: 0.0,
            avg_loss: 0.0,
            profit_factor: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown_pct: 0.0,
        };
    }

    let wins: Vec<f64> = returns.iter().copied().filter(|p| *p > 0.0).collect();
    let losses: Vec<f64> = returns.iter().copied().filter(|p| *p < 0.0).collect();
    let win_rate = wins.len() as f64 / returns.len() as f64;
    let avg_profit = mean(&wins);
    let avg_loss = mean(&losses);
    let total_profit: f64 = wins.iter().sum();
    let total_loss: f64 = losses.iter().sum::<f64>().abs();
    let profit_factor = if total_loss > 0.0 {
        total_profit / total_loss
    } else if total_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let m = mean(&returns);
    let sd = stdev(&returns, m);
    let sharpe_ratio = if sd > 0.0 { m / sd } else { 0.0 };

    let mut cumulative = 0.0;
    let mut peak = 0.0;
    let mut max_drawdown_pct = 0.0;
    for r in &returns {
        cumulative += r;
        if cumulative > peak {
            peak = cumulative;
        }
        if peak > 0.0 {
            let drawdown = (peak - cumulative) / peak;
            if drawdown > max_drawdown_pct {
                max_drawdown_pct = drawdown;
            }
        }
    }

    TradingMetrics {
        total_trades: fills.len(),
        closed_round_trips: returns.len(),
        win_rate,
        avg_profit,
        avg_loss,
        profit_factor,
        sharpe_ratio,
        max_drawdown_pct,
    }
}

pub fn generate_insights(metrics: &TradingMetrics, positions: &[PortfolioPosition]) -> Vec<String> {
    let mut insights = Vec::new();

    if metrics.closed_round_trips >= 5 {
        if metrics.win_rate < 0.4 {
            insights.push(format!(
                "win rate {:.0}% is below average — review entry criteria",
                metrics.win_rate * 100.0
            ));
        } else if metrics.win_rate > 0.6 {
            insights.push(format!("win rate {:.0}% is strong", metrics.win_rate * 100.0));
        }
    }

    if metrics.profit_factor > 0.0 && metrics.profit_factor < 1.0 {
        insights.push("profit factor below 1.0 — losses outweigh gains".to_string());
    }

    if !positions.is_empty() {
        let total_value: f64 = positions.iter().map(|p| to_f64(p.market_value)).sum();
        if total_value > 0.0 {
            if let Some(largest) = positions.iter().max_by(|a, b| a.market_value.cmp(&b.market_value)) {
                let share = to_f64(largest.market_value) / total_value;
                if share > 0.5 {
                    insights.push(format!(
                        "concentrated: {:.0}% of portfolio value in {}",
                        share * 100.0,
                        largest.symbol
                    ));
                }
            }
        }
        for p in positions {
            if p.unrealized_pnl_pct > 50.0 {
                insights.push(format!(
                    "{} unrealized gain of {:.0}% — consider taking profit",
                    p.symbol, p.unrealized_pnl_pct
                ));
            } else if p.unrealized_pnl_pct < -30.0 {
                insights.push(format!(
                    "{} unrealized loss of {:.0}% — review stop-loss placement",
                    p.symbol, p.unrealized_pnl_pct
                ));
            }
        }
    }

    if metrics.max_drawdown_pct > 0.2 {
        insights.push(format!(
            "max drawdown of {:.0}% exceeds the comfort threshold",
            metrics.max_drawdown_pct * 100.0
        ));
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn fill(side: OrderSide, qty: rust_decimal::Decimal, price: rust_decimal::Decimal, at_secs: i64) -> ParticipantFill {
        ParticipantFill {
            principal: Uuid::nil(),
            symbol: "ETH-USDT".to_string(),
            side,
            qty,
            quote_qty: qty * price,
            executed_at: Utc::now() + Duration::seconds(at_secs),
        }
    }

    #[test]
    fn fold_positions_keeps_only_net_long() {
        let prices = HashMap::from([("ETH-USDT".to_string(), dec!(2100))]);
        let fills = vec![
            fill(OrderSide::Buy, dec!(2), dec!(2000), 0),
            fill(OrderSide::Sell, dec!(1), dec!(2050), 1),
        ];
        let positions = fold_positions(&fills, &prices);
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].net_qty, dec!(1));
    }

    #[test]
    fn fully_closed_position_does_not_appear() {
        let fills = vec![
            fill(OrderSide::Buy, dec!(1), dec!(2000), 0),
            fill(OrderSide::Sell, dec!(1), dec!(2100), 1),
        ];
        let positions = fold_positions(&fills, &HashMap::new());
        assert!(positions.is_empty());
    }

    #[test]
    fn round_trip_profit_is_recorded_as_a_win() {
        let fills = vec![
            fill(OrderSide::Buy, dec!(1), dec!(2000), 0),
            fill(OrderSide::Sell, dec!(1), dec!(2100), 1),
        ];
        let metrics = calculate_trading_metrics(&fills);
        assert_eq!(metrics.closed_round_trips, 1);
        assert_eq!(metrics.win_rate, 1.0);
        assert!(metrics.avg_profit > 0.0);
    }
}
