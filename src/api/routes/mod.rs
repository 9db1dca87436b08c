use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::api::handlers;
use crate::auth::middleware::auth_middleware;
use crate::auth::rate_limit::{rate_limit_by_header, RateLimiterState};
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let public_routes = Router::new()
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        .route("/trades", get(handlers::trades::list_trades))
        .route("/trades/stats", get(handlers::trades::trade_stats))
        .route("/trades/recent/:symbol", get(handlers::trades::recent_for_symbol))
        .route("/market/price/:symbol", get(handlers::market::price))
        .route("/market/prices", get(handlers::market::prices))
        .route("/market/ticker/:symbol", get(handlers::market::ticker))
        .route("/market/tickers", get(handlers::market::tickers))
        .route("/market/candles/:symbol", get(handlers::market::candles))
        .route("/market/symbols", get(handlers::market::symbols))
        .route("/orders/book/:symbol", get(handlers::order::book))
        .route("/analytics/anomalies", get(handlers::analytics::anomalies))
        .route("/analytics/predictions/:symbol", get(handlers::analytics::predictions))
        .route("/analytics/sentiment/:symbol", get(handlers::analytics::sentiment))
        .route("/analytics/metrics", get(handlers::analytics::analytics_metrics));

    // `POST /orders` carries its own 10 req/s-per-caller limiter (6.) on
    // top of the global auth gate below.
    let order_submission_limiter = RateLimiterState::order_submission();
    let order_routes = Router::new()
        .route("/orders", post(handlers::order::create_order))
        .layer(axum_middleware::from_fn_with_state(
            order_submission_limiter,
            rate_limit_by_header,
        ));

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .merge(order_routes)
        .route("/orders", get(handlers::order::list_orders))
        .route("/orders/:order_id", get(handlers::order::get_order))
        .route("/orders/:order_id", delete(handlers::order::cancel_order))
        .route("/orders/cancel-all", post(handlers::order::cancel_all))
        .route("/wallets/sign-message", post(handlers::wallets::sign_message))
        .route("/wallets/bind", post(handlers::wallets::bind))
        .route("/wallets", get(handlers::wallets::list_wallets))
        .route("/wallets/balances", get(handlers::wallets::balances))
        .route("/wallets/withdraw", post(handlers::wallets::withdraw))
        .route("/wallets/transactions", get(handlers::wallets::transactions))
        .route("/analytics/risk/user", get(handlers::analytics::risk_user))
        .route("/analytics/portfolio", get(handlers::analytics::portfolio))
        .route("/analytics/summary", get(handlers::analytics::summary))
        .route("/analytics/insights", get(handlers::analytics::insights))
        .layer(axum_middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}
