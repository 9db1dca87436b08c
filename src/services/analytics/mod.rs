//! Trade-stream analytics (component F): pure, read-only derivations over
//! a time window of the trade log for one principal or one symbol. Every
//! public computation here is stateless and recomputable from `TradeLog`
//! alone — grounded on `ai_analytics.py`'s `AIAnalyticsService`.

mod anomaly;
mod portfolio;
mod prediction;
mod risk;
mod sentiment;
mod stats;

pub use anomaly::{Anomaly, AnomalyKind};
pub use portfolio::{PortfolioAnalysis, PortfolioPosition, TradingMetrics};
pub use prediction::{PredictionDirection, PricePrediction};
pub use risk::{RiskLevel, RiskScore};
pub use sentiment::{MarketSentiment, PriceTrend, SentimentLabel, VolumeTrend};

use crate::error::AppError;
use crate::models::order::OrderSide;
use crate::models::trade::{Liquidity, Trade};
use crate::services::matching::TradeLog;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// A single principal's side of one fill. `Trade` rows are split into maker
/// and taker legs; folding either leg's `side`/`quote_qty` onto the right
/// principal is what lets per-principal detectors see a principal's resting
/// activity, not just the orders they submitted as the aggressor.
#[derive(Debug, Clone)]
pub struct ParticipantFill {
    pub principal: Uuid,
    pub symbol: String,
    pub side: OrderSide,
    pub qty: Decimal,
    pub quote_qty: Decimal,
    pub executed_at: DateTime<Utc>,
}

impl ParticipantFill {
    pub fn price(&self) -> f64 {
        stats::to_f64(self.quote_qty) / stats::to_f64(self.qty).max(1e-9)
    }
}

pub fn participant_fills(trades: &[Trade]) -> Vec<ParticipantFill> {
    trades
        .iter()
        .map(|t| ParticipantFill {
            principal: match t.liquidity {
                Liquidity::Maker => t.maker_principal,
                Liquidity::Taker => t.taker_principal,
            },
            symbol: t.symbol.clone(),
            side: t.side,
            qty: t.qty,
            quote_qty: t.quote_qty,
            executed_at: t.executed_at,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct TradingSummary {
    pub principal: Uuid,
    pub since: DateTime<Utc>,
    pub total_trades: usize,
    pub total_volume: Decimal,
    pub unique_symbols: usize,
    pub win_rate: f64,
}

const ANOMALY_SCAN_LIMIT: i64 = 10_000;
const PARTICIPANT_SCAN_LIMIT: i64 = 20_000;
const PORTFOLIO_SCAN_LIMIT: i64 = 50_000;

pub struct AnalyticsService {
    trade_log: Arc<TradeLog>,
}

impl AnalyticsService {
    pub fn new(trade_log: Arc<TradeLog>) -> Self {
        Self { trade_log }
    }

    pub async fn detect_anomalies(
        &self,
        symbols: &[String],
        lookback_hours: i64,
    ) -> Result<Vec<Anomaly>, AppError> {
        let lookback_hours = lookback_hours.clamp(1, 168);
        let since = Utc::now() - Duration::hours(lookback_hours);

        let mut prints = Vec::new();
        for symbol in symbols {
            prints.extend(self.trade_log.for_symbol(symbol, since, ANOMALY_SCAN_LIMIT).await?);
        }
        let participants = self.trade_log.participants_since(since, PARTICIPANT_SCAN_LIMIT).await?;
        let fills = participant_fills(&participants);

        Ok(anomaly::detect_anomalies(&prints, &fills))
    }

    pub async fn user_risk(&self, principal: Uuid) -> Result<RiskScore, AppError> {
        let since = Utc::now() - Duration::days(30);
        let trades = self
            .trade_log
            .for_principal(principal, None, Some(since), PORTFOLIO_SCAN_LIMIT)
            .await?;
        let fills = participant_fills(&trades);
        Ok(risk::calculate_user_risk_score(principal, &fills, 30.0))
    }

    pub async fn portfolio(
        &self,
        principal: Uuid,
        current_prices: &HashMap<String, Decimal>,
    ) -> Result<PortfolioAnalysis, AppError> {
        let trades = self
            .trade_log
            .for_principal(principal, None, None, PORTFOLIO_SCAN_LIMIT)
            .await?;
        let fills = participant_fills(&trades);
        let positions = portfolio::fold_positions(&fills, current_prices);
        let metrics = portfolio::calculate_trading_metrics(&fills);
        let insights = portfolio::generate_insights(&metrics, &positions);
        Ok(PortfolioAnalysis { positions, metrics, insights })
    }

    pub async fn predict_price(&self, symbol: &str, horizon_minutes: i64) -> Result<PricePrediction, AppError> {
        let since = Utc::now() - Duration::hours(24);
        let prints = self.trade_log.for_symbol(symbol, since, ANOMALY_SCAN_LIMIT).await?;
        let prices: Vec<(DateTime<Utc>, f64)> =
            prints.iter().map(|t| (t.executed_at, stats::to_f64(t.price))).collect();
        let volumes: Vec<f64> = prints.iter().map(|t| stats::to_f64(t.qty)).collect();
        Ok(prediction::predict_price(symbol, &prices, &volumes, horizon_minutes))
    }

    pub async fn sentiment(&self, symbol: &str) -> Result<MarketSentiment, AppError> {
        let since = Utc::now() - Duration::hours(24);
        let prints = self.trade_log.for_symbol(symbol, since, ANOMALY_SCAN_LIMIT).await?;
        Ok(sentiment::analyze_market_sentiment(symbol, &prints))
    }

    /// Total trades, total volume, unique symbols, and win rate for a
    /// principal over a caller-specified window — a thin fold reusing the
    /// same trade-grouping helper `portfolio` uses.
    pub async fn trading_summary(
        &self,
        principal: Uuid,
        since: DateTime<Utc>,
    ) -> Result<TradingSummary, AppError> {
        let trades = self
            .trade_log
            .for_principal(principal, None, Some(since), PORTFOLIO_SCAN_LIMIT)
            .await?;
        let fills = participant_fills(&trades);
        let total_volume: Decimal = fills.iter().map(|f| f.quote_qty).sum();
        let unique_symbols: HashSet<&str> = fills.iter().map(|f| f.symbol.as_str()).collect();
        let metrics = portfolio::calculate_trading_metrics(&fills);

        Ok(TradingSummary {
            principal,
            since,
            total_trades: fills.len(),
            total_volume,
            unique_symbols: unique_symbols.len(),
            win_rate: metrics.win_rate,
        })
    }

    /// Combines the anomaly, risk, and sentiment outputs into a short list
    /// of human-readable strings — no new numerical model, just thresholds
    /// already computed above.
    pub async fn insight_feed(
        &self,
        principal: Uuid,
        symbol: &str,
        current_prices: &HashMap<String, Decimal>,
    ) -> Result<Vec<String>, AppError> {
        let risk = self.user_risk(principal).await?;
        let portfolio = self.portfolio(principal, current_prices).await?;
        let sentiment = self.sentiment(symbol).await?;

        let mut feed = Vec::new();
        if matches!(risk.level, RiskLevel::High | RiskLevel::Critical) {
            feed.push(format!(
                "elevated risk: concentration {:.0}% in your largest symbol",
                risk.concentration_factor * 10.0
            ));
        }
        feed.extend(portfolio.insights);
        feed.push(match sentiment.sentiment {
            SentimentLabel::Bullish | SentimentLabel::SlightlyBullish => format!(
                "{} sentiment is bullish ({:.0}% buy pressure)",
                symbol, sentiment.buy_pressure_pct
            ),
            SentimentLabel::Bearish | SentimentLabel::SlightlyBearish => format!(
                "{} sentiment is bearish ({:.0}% sell pressure)",
                symbol, sentiment.sell_pressure_pct
            ),
            SentimentLabel::Neutral => format!("{symbol} sentiment is neutral"),
        });

        if feed.is_empty() {
            feed.push("no notable signals in this window".to_string());
        }
        Ok(feed)
    }
}
