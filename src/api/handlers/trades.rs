//! Public and per-principal trade history surface (4.C.1).

use axum::extract::{Path, Query};
use axum::{extract::State, Extension, Json};
use chrono::{Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::trade::{Trade, TradeStats};
use crate::utils::response::ApiResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    pub symbol: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_trades(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<TradesQuery>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, AppError> {
    let limit = q.limit.unwrap_or(100).clamp(1, 500);
    let trades = state
        .trade_log
        .for_principal(user.principal_id, q.symbol.as_deref(), None, limit)
        .await?;
    Ok(Json(ApiResponse::success(trades)))
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub symbol: String,
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    "24h".to_string()
}

fn period_duration(period: &str) -> Result<Duration, AppError> {
    match period {
        "1h" => Ok(Duration::hours(1)),
        "24h" => Ok(Duration::hours(24)),
        "7d" => Ok(Duration::days(7)),
        "30d" => Ok(Duration::days(30)),
        other => Err(AppError::Validation(format!("unsupported period: {other}"))),
    }
}

pub async fn trade_stats(
    State(state): State<Arc<AppState>>,
    Query(q): Query<StatsQuery>,
) -> Result<Json<ApiResponse<TradeStats>>, AppError> {
    let since = Utc::now() - period_duration(&q.period)?;
    let stats = state.trade_log.stats(&q.symbol.to_uppercase(), since).await?;
    Ok(Json(ApiResponse::success(stats)))
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    pub limit: Option<usize>,
}

pub async fn recent_for_symbol(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(q): Query<RecentQuery>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, AppError> {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let trades = state.trade_log.recent(&symbol.to_uppercase(), limit);
    Ok(Json(ApiResponse::success(trades)))
}
