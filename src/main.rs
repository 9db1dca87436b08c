use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod cache;
mod config;
mod db;
mod error;
mod metrics;
mod models;
mod services;
mod utils;
mod websocket;

use crate::cache::{EventBus, InMemoryBus, RedisBus, RedisClient};
use crate::config::AppConfig;
use crate::db::timescale::TimescaleOps;
use crate::db::Database;
use crate::services::matching::{MatchingEngine, TradeLog};
use crate::services::{AnalyticsService, MarketService, WalletGate};
use crate::websocket::hub::SessionHub;

pub struct AppState {
    pub config: AppConfig,
    pub db: Database,
    pub matching_engine: Arc<MatchingEngine>,
    pub trade_log: Arc<TradeLog>,
    pub wallet: Arc<WalletGate>,
    pub market: Arc<MarketService>,
    pub analytics: Arc<AnalyticsService>,
    pub bus: Arc<dyn EventBus>,
    pub session_hub: Arc<SessionHub>,
    pub book_cache: Option<Arc<RedisClient>>,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        tracing::error!("fatal error: {e:#}");
        std::process::exit(2);
    }
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ledgerbook=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = match AppConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("invalid configuration: {e:#}");
            std::process::exit(1);
        }
    };

    tracing::info!("starting spot trading backend v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("environment: {}", config.environment);

    let metrics_handle = metrics::init_metrics();

    let db = Database::connect(&config.database_url).await?;
    tracing::info!("database connected");

    let bus: Arc<dyn EventBus> = match RedisBus::new(&config.redis_url) {
        Ok(redis) => {
            tracing::info!("pub/sub bridge: redis at {}", config.redis_url);
            Arc::new(redis)
        }
        Err(e) => {
            tracing::warn!("redis unavailable ({e}); falling back to in-memory pub/sub bridge");
            Arc::new(InMemoryBus::new())
        }
    };

    let trade_log = Arc::new(TradeLog::new(db.clone()).await?);
    let wallet = Arc::new(WalletGate::new(db.clone()));
    let config_arc = Arc::new(config.clone());
    let matching_engine = Arc::new(
        MatchingEngine::new(db.clone(), trade_log.clone(), wallet.clone(), bus.clone(), config_arc.clone())
            .await?,
    );
    tracing::info!("matching engine initialized for {:?}", config.get_trading_pairs());

    let timescale = TimescaleOps::new(db.pool.clone());
    let market = Arc::new(MarketService::new(
        matching_engine.clone(),
        trade_log.clone(),
        timescale,
        &config,
    ));
    let analytics = Arc::new(AnalyticsService::new(trade_log.clone()));

    let session_hub = Arc::new(SessionHub::new(
        bus.clone(),
        config.session_ceiling,
        std::time::Duration::from_millis(config.session_write_deadline_ms),
    ));

    let book_cache = match RedisClient::from_url(&config.redis_url).await {
        Ok(client) => {
            tracing::info!("order book read-through cache: redis at {}", config.redis_url);
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::warn!("redis unavailable for book cache ({e}); `/book` will read the engine directly");
            None
        }
    };

    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        matching_engine,
        trade_log,
        wallet,
        market,
        analytics,
        bus,
        session_hub,
        book_cache,
    });

    spawn_expiry_sweep(state.clone());
    spawn_heartbeat(state.clone());
    spawn_pool_metrics(state.clone());

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(move || render_metrics(metrics_handle.clone())))
        .nest("/api/v1", api::routes::create_router(state.clone()))
        .nest("/ws", websocket::routes::create_router(state.clone()))
        .layer(axum::middleware::from_fn(api::middleware::metrics_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Periodically expires resting limit/stop orders past their time-in-force
/// deadline (4.B).
fn spawn_expiry_sweep(state: Arc<AppState>) {
    let interval = std::time::Duration::from_secs(state.config.expiry_sweep_interval_secs);
    tokio::spawn(async move {
        tracing::info!("expiry sweep loop started ({interval:?} interval)");
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match state.matching_engine.sweep_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::info!("expiry sweep expired {n} orders"),
                Err(e) => tracing::warn!("expiry sweep failed: {e}"),
            }
        }
    });
}

/// Emits `{type: heartbeat, timestamp}` to every session on a fixed
/// interval (4.E).
fn spawn_heartbeat(state: Arc<AppState>) {
    let interval = std::time::Duration::from_secs(state.config.heartbeat_interval_secs);
    tokio::spawn(async move {
        tracing::info!("session hub heartbeat loop started ({interval:?} interval)");
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            state.session_hub.broadcast_heartbeat();
        }
    });
}

/// Polls the Postgres pool's live/idle connection counts onto the
/// `db_connections_*` gauges (2.1).
fn spawn_pool_metrics(state: Arc<AppState>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(15));
        loop {
            ticker.tick().await;
            let idle = state.db.pool.num_idle() as i64;
            let active = state.db.pool.size() as i64 - idle;
            metrics::set_db_connections(active, idle);
        }
    });
}

async fn render_metrics(handle: metrics_exporter_prometheus::PrometheusHandle) -> String {
    handle.render()
}

async fn health_check() -> &'static str {
    "OK"
}
