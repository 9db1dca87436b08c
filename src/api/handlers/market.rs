//! Public price/ticker/candle/symbol surface backed by `MarketService`.

use axum::extract::{Path, Query};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::timescale::CandleInterval;
use crate::error::AppError;
use crate::utils::response::ApiResponse;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PriceResponse {
    pub symbol: String,
    pub price: rust_decimal::Decimal,
}

pub async fn price(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<PriceResponse>>, AppError> {
    let symbol = symbol.to_uppercase();
    let price = state.market.current_price(&symbol).await?;
    Ok(Json(ApiResponse::success(PriceResponse { symbol, price })))
}

pub async fn prices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<PriceResponse>>>, AppError> {
    let prices = state
        .market
        .prices()
        .await?
        .into_iter()
        .map(|(symbol, price)| PriceResponse { symbol, price })
        .collect();
    Ok(Json(ApiResponse::success(prices)))
}

pub async fn ticker(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
) -> Result<Json<ApiResponse<crate::services::market::Ticker>>, AppError> {
    let ticker = state.market.ticker(&symbol.to_uppercase()).await?;
    Ok(Json(ApiResponse::success(ticker)))
}

pub async fn tickers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<crate::services::market::Ticker>>>, AppError> {
    let tickers = state.market.tickers().await?;
    Ok(Json(ApiResponse::success(tickers)))
}

#[derive(Debug, Deserialize)]
pub struct CandlesQuery {
    #[serde(default = "default_interval")]
    pub interval: String,
    pub limit: Option<i64>,
}

fn default_interval() -> String {
    "1h".to_string()
}

pub async fn candles(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(q): Query<CandlesQuery>,
) -> Result<Json<ApiResponse<Vec<crate::db::timescale::Candle>>>, AppError> {
    let interval = CandleInterval::from_str(&q.interval)
        .ok_or_else(|| AppError::Validation(format!("unsupported interval: {}", q.interval)))?;
    let limit = q.limit.unwrap_or(200).clamp(1, 1000);
    let candles = state.market.candles(&symbol.to_uppercase(), interval, limit).await?;
    Ok(Json(ApiResponse::success(candles)))
}

pub async fn symbols(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<String>>> {
    Json(ApiResponse::success(state.market.symbols().to_vec()))
}
