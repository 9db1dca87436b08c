//! Transactional key/row store access. This module treats Postgres as the
//! abstract durable record referenced by the core: the order and trade
//! tables, plus the balance ledger, live here behind a plain connection
//! pool.

pub mod timescale;

use sqlx::postgres::{PgPool, PgPoolOptions};

#[derive(Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// The maximum `trade_id` and per-symbol sequence number already
    /// persisted, used to seed the engine's monotonic counters at startup
    /// (see design notes on process-local singleton counters).
    pub async fn max_trade_id(&self) -> anyhow::Result<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(trade_id) FROM trades")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(None);
        Ok(max.unwrap_or(0))
    }

    pub async fn max_sequence_number(&self) -> anyhow::Result<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(sequence_number) FROM orders")
            .fetch_one(&self.pool)
            .await
            .unwrap_or(None);
        Ok(max.unwrap_or(0))
    }
}
