//! Per-principal risk scoring (component F). Grounded on
//! `AIAnalyticsService.calculate_user_risk_score`: four weighted factors,
//! each clipped to `[0, 10]`, summed into a level.

use super::stats::{mean, stdev, to_f64};
use super::ParticipantFill;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

const VOLUME_WEIGHT: f64 = 0.25;
const FREQUENCY_WEIGHT: f64 = 0.20;
const CONCENTRATION_WEIGHT: f64 = 0.30;
const VOLATILITY_WEIGHT: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskScore {
    pub principal: Uuid,
    pub overall_score: f64,
    pub level: RiskLevel,
    pub volume_factor: f64,
    pub frequency_factor: f64,
    pub concentration_factor: f64,
    pub volatility_factor: f64,
    pub recommendations: Vec<String>,
}

pub fn calculate_user_risk_score(
    principal: Uuid,
    fills: &[ParticipantFill],
    window_days: f64,
) -> RiskScore {
    if fills.is_empty() {
        return RiskScore {
            principal,
            overall_score: 0.0,
            level: RiskLevel::Low,
            volume_factor: 0.0,
            frequency_factor: 0.0,
            concentration_factor: 0.0,
            volatility_factor: 0.0,
            recommendations: vec!["no trading activity in the window".to_string()],
        };
    }

    let total_volume: f64 = fills.iter().map(|f| to_f64(f.quote_qty)).sum();
    let volume_factor = (total_volume / 100_000.0).min(10.0);

    let avg_trades_per_day = fills.len() as f64 / window_days.max(1.0);
    let frequency_factor = (avg_trades_per_day / 10.0).min(10.0);

    let mut per_symbol: HashMap<&str, f64> = HashMap::new();
    for f in fills {
        *per_symbol.entry(f.symbol.as_str()).or_insert(0.0) += to_f64(f.quote_qty);
    }
    let max_symbol_volume = per_symbol.values().copied().fold(0.0, f64::max);
    let max_symbol_share = max_symbol_volume / total_volume.max(1e-9);
    let concentration_factor = (max_symbol_share * 10.0).min(10.0);

    let volatility_factor = if fills.len() < 10 {
        5.0
    } else {
        let prices: Vec<f64> = fills.iter().map(|f| f.price()).collect();
        let m = mean(&prices);
        let sd = stdev(&prices, m);
        if m.abs() < 1e-9 {
            0.0
        } else {
            ((sd / m) * 10.0).abs().min(10.0)
        }
    };

    let overall_score = volume_factor * VOLUME_WEIGHT
        + frequency_factor * FREQUENCY_WEIGHT
        + concentration_factor * CONCENTRATION_WEIGHT
        + volatility_factor * VOLATILITY_WEIGHT;

    let level = if overall_score < 3.0 {
        RiskLevel::Low
    } else if overall_score < 5.0 {
        RiskLevel::Medium
    } else if overall_score < 7.0 {
        RiskLevel::High
    } else {
        RiskLevel::Critical
    };

    let mut recommendations = Vec::new();
    if volume_factor > 7.0 {
        recommendations.push("high notional volume — verify source of funds".to_string());
    }
    if frequency_factor > 7.0 {
        recommendations.push("unusually frequent trading — screen for automated activity".to_string());
    }
    if concentration_factor > 7.0 {
        recommendations.push(format!(
            "concentrated in one symbol — {:.0}% of notional volume",
            max_symbol_share * 100.0
        ));
    }
    if volatility_factor > 7.0 {
        recommendations.push("trading at highly volatile price points".to_string());
    }
    if recommendations.is_empty() {
        recommendations.push("no elevated risk factors detected".to_string());
    }

    RiskScore {
        principal,
        overall_score,
        level,
        volume_factor,
        frequency_factor,
        concentration_factor,
        volatility_factor,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::OrderSide;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn fill(symbol: &str, qty: rust_decimal::Decimal, price: rust_decimal::Decimal) -> ParticipantFill {
        ParticipantFill {
            principal: Uuid::nil(),
            symbol: symbol.to_string(),
            side: OrderSide::Buy,
            qty,
            quote_qty: qty * price,
            executed_at: Utc::now(),
        }
    }

    #[test]
    fn empty_history_is_low_risk() {
        let score = calculate_user_risk_score(Uuid::new_v4(), &[], 30.0);
        assert_eq!(score.level, RiskLevel::Low);
        assert_eq!(score.overall_score, 0.0);
    }

    #[test]
    fn single_symbol_concentration_dominates_when_volume_is_modest() {
        let fills: Vec<ParticipantFill> = (0..12)
            .map(|_| fill("ETH-USDT", dec!(1), dec!(2000)))
            .collect();
        let score = calculate_user_risk_score(Uuid::new_v4(), &fills, 30.0);
        assert_eq!(score.concentration_factor, 10.0);
    }
}
