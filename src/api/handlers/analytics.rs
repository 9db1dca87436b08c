//! Trade-stream analytics surface (4.F, 4.F.1).

use axum::extract::{Path, Query};
use axum::{extract::State, Extension, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::services::analytics::{Anomaly, MarketSentiment, PortfolioAnalysis, PricePrediction, RiskScore};
use crate::services::analytics::TradingSummary;
use crate::utils::response::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AnomaliesQuery {
    pub symbols: Option<String>,
    pub lookback_hours: Option<i64>,
}

pub async fn anomalies(
    State(state): State<Arc<AppState>>,
    Query(q): Query<AnomaliesQuery>,
) -> Result<Json<ApiResponse<Vec<Anomaly>>>, AppError> {
    let symbols: Vec<String> = match q.symbols {
        Some(list) => list.split(',').map(|s| s.trim().to_uppercase()).filter(|s| !s.is_empty()).collect(),
        None => state.market.symbols().to_vec(),
    };
    let found = state.analytics.detect_anomalies(&symbols, q.lookback_hours.unwrap_or(24)).await?;
    Ok(Json(ApiResponse::success(found)))
}

pub async fn risk_user(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<RiskScore>>, AppError> {
    let score = state.analytics.user_risk(user.principal_id).await?;
    Ok(Json(ApiResponse::success(score)))
}

#[derive(Debug, Deserialize)]
pub struct PredictionQuery {
    pub horizon_minutes: Option<i64>,
}

pub async fn predictions(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(q): Query<PredictionQuery>,
) -> Result<Json<ApiResponse<PricePrediction>>, AppError> {
    let prediction = state
        .analytics
        .predict_price(&symbol.to_uppercase(), q.horizon_minutes.unwrap_or(60))
        .await?;
    Ok(Json(ApiResponse::success(prediction)))
}

async fn current_prices(state: &AppState) -> Result<HashMap<String, rust_decimal::Decimal>, AppError> {
    Ok(state.market.prices().await?.into_iter().collect())
}

pub async fn portfolio(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<PortfolioAnalysis>>, AppError> {
    let prices = current_prices(&state).await?;
    let analysis = state.analytics.portfolio(user.principal_id, &prices).await?;
    Ok(Json(ApiResponse::success(analysis)))
}

pub async fn sentiment(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<MarketSentiment>>, AppError> {
    let sentiment = state.analytics.sentiment(&symbol.to_uppercase()).await?;
    Ok(Json(ApiResponse::success(sentiment)))
}

#[derive(Debug, Deserialize)]
pub struct SummaryQuery {
    pub days: Option<i64>,
}

pub async fn summary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<SummaryQuery>,
) -> Result<Json<ApiResponse<TradingSummary>>, AppError> {
    let since = Utc::now() - Duration::days(q.days.unwrap_or(30));
    let summary = state.analytics.trading_summary(user.principal_id, since).await?;
    Ok(Json(ApiResponse::success(summary)))
}

#[derive(Debug, Deserialize)]
pub struct InsightsQuery {
    pub symbol: String,
}

pub async fn insights(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<InsightsQuery>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let prices = current_prices(&state).await?;
    let feed = state
        .analytics
        .insight_feed(user.principal_id, &q.symbol.to_uppercase(), &prices)
        .await?;
    Ok(Json(ApiResponse::success(feed)))
}

#[derive(Debug, serde::Serialize)]
pub struct AnalyticsMetrics {
    pub symbols_tracked: usize,
    pub anomalies_last_hour: usize,
}

/// A cheap operational snapshot of the analytics subsystem — not a
/// per-symbol or per-principal derivation, so it takes no parameters.
pub async fn analytics_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<AnalyticsMetrics>>, AppError> {
    let symbols = state.market.symbols().to_vec();
    let found = state.analytics.detect_anomalies(&symbols, 1).await?;
    Ok(Json(ApiResponse::success(AnalyticsMetrics {
        symbols_tracked: symbols.len(),
        anomalies_last_hour: found.len(),
    })))
}
