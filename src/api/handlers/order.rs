//! Order submission, lookup, cancellation, and book depth (4.B).

use axum::extract::{Path, Query};
use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::AppError;
use crate::models::order::{CreateOrderRequest, Order, OrderResponse};
use crate::models::principal::Principal;
use crate::services::matching::OrderbookSnapshot;
use crate::utils::response::ApiResponse;
use crate::AppState;

async fn fetch_principal(state: &AppState, id: Uuid) -> Result<Principal, AppError> {
    sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE id = $1")
        .bind(id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, AppError> {
    let principal = fetch_principal(&state, user.principal_id).await?;
    let (order, _trades) = state.matching_engine.submit_order(&principal, req).await?;
    Ok(Json(ApiResponse::success(order.into())))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub symbol: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(q): Query<ListOrdersQuery>,
) -> Result<Json<ApiResponse<Vec<OrderResponse>>>, AppError> {
    let limit = q.limit.unwrap_or(100).clamp(1, 500);
    let orders: Vec<Order> = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE principal_id = $1
          AND ($2::text IS NULL OR symbol = $2)
          AND ($3::text IS NULL OR status = $3::order_status)
        ORDER BY sequence_number DESC
        LIMIT $4
        "#,
    )
    .bind(user.principal_id)
    .bind(q.symbol.map(|s| s.to_uppercase()))
    .bind(q.status)
    .bind(limit)
    .fetch_all(&state.db.pool)
    .await?;

    Ok(Json(ApiResponse::success(orders.into_iter().map(Into::into).collect())))
}

pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, AppError> {
    let order: Order = sqlx::query_as("SELECT * FROM orders WHERE id = $1 AND principal_id = $2")
        .bind(order_id)
        .bind(user.principal_id)
        .fetch_optional(&state.db.pool)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(ApiResponse::success(order.into())))
}

pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(order_id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, AppError> {
    let order = state.matching_engine.cancel_order(user.principal_id, order_id).await?;
    Ok(Json(ApiResponse::success(order.into())))
}

pub async fn cancel_all(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ApiResponse<Vec<Uuid>>>, AppError> {
    let open: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM orders WHERE principal_id = $1 AND status IN ('pending', 'open', 'partially_filled')",
    )
    .bind(user.principal_id)
    .fetch_all(&state.db.pool)
    .await?;

    let mut cancelled = Vec::with_capacity(open.len());
    for (order_id,) in open {
        if state.matching_engine.cancel_order(user.principal_id, order_id).await.is_ok() {
            cancelled.push(order_id);
        }
    }
    Ok(Json(ApiResponse::success(cancelled)))
}

#[derive(Debug, Deserialize)]
pub struct DepthQuery {
    pub levels: Option<usize>,
}

pub async fn book(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(q): Query<DepthQuery>,
) -> Result<Json<ApiResponse<OrderbookSnapshot>>, AppError> {
    let levels = q.levels.unwrap_or(20).clamp(1, 200);
    let symbol = symbol.to_uppercase();
    let cache_key = format!("book_snapshot:{symbol}:{levels}");

    if let Some(cache) = &state.book_cache {
        let timer = crate::metrics::Timer::new();
        let result = cache.get::<String>(&cache_key).await;
        crate::metrics::record_cache_operation("orderbook", "get", timer.elapsed_secs());
        match result {
            Ok(Some(raw)) => {
                if let Ok(snapshot) = serde_json::from_str::<OrderbookSnapshot>(&raw) {
                    crate::metrics::record_cache_hit("orderbook");
                    return Ok(Json(ApiResponse::success(snapshot)));
                }
            }
            Ok(None) => crate::metrics::record_cache_miss("orderbook"),
            Err(e) => tracing::debug!("book cache read failed: {e}"),
        }
    }

    let snapshot = state.matching_engine.depth(&symbol, levels).await?;

    if let Some(cache) = &state.book_cache {
        if let Ok(raw) = serde_json::to_string(&snapshot) {
            // Short TTL: the book mutates on every fill, this only absorbs
            // read bursts between matches rather than serving stale depth.
            let timer = crate::metrics::Timer::new();
            let _ = cache.set_ex(&cache_key, raw, 1).await;
            crate::metrics::record_cache_operation("orderbook", "set", timer.elapsed_secs());
        }
    }

    Ok(Json(ApiResponse::success(snapshot)))
}
