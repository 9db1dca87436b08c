//! Append-only trade log (component C). `trade_id` is a single monotonic
//! counter per engine; rows are persisted synchronously with the order
//! status update that produced them, never updated in place afterward.

use crate::db::Database;
use crate::error::AppError;
use crate::models::trade::{Trade, TradeStats};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, Ordering};
use uuid::Uuid;

const RECENT_CACHE_DEPTH: usize = 2_000;

pub struct TradeLog {
    db: Database,
    counter: AtomicI64,
    recent: DashMap<String, Mutex<VecDeque<Trade>>>,
}

impl TradeLog {
    pub async fn new(db: Database) -> anyhow::Result<Self> {
        let seed = db.max_trade_id().await?;
        Ok(Self {
            db,
            counter: AtomicI64::new(seed),
            recent: DashMap::new(),
        })
    }

    pub fn next_trade_id(&self) -> i64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Persist both legs of a fill in one transaction and update the
    /// in-memory recency cache used by cheap read paths.
    pub async fn append(&self, maker: &Trade, taker: &Trade) -> Result<(), AppError> {
        let mut tx = self.db.pool.begin().await?;

        for trade in [maker, taker] {
            sqlx::query(
                r#"
                INSERT INTO trades (
                    trade_id, symbol, maker_order_id, taker_order_id,
                    maker_principal, taker_principal, side, price, qty,
                    quote_qty, commission, commission_asset, liquidity, executed_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7::order_side, $8, $9, $10, $11, $12, $13::liquidity_role, $14)
                "#,
            )
            .bind(trade.trade_id)
            .bind(&trade.symbol)
            .bind(trade.maker_order_id)
            .bind(trade.taker_order_id)
            .bind(trade.maker_principal)
            .bind(trade.taker_principal)
            .bind(trade.side)
            .bind(trade.price)
            .bind(trade.qty)
            .bind(trade.quote_qty)
            .bind(trade.commission)
            .bind(&trade.commission_asset)
            .bind(trade.liquidity)
            .bind(trade.executed_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        self.cache(maker.clone());
        self.cache(taker.clone());
        Ok(())
    }

    fn cache(&self, trade: Trade) {
        let entry = self
            .recent
            .entry(trade.symbol.clone())
            .or_insert_with(|| Mutex::new(VecDeque::new()));
        let mut queue = entry.lock();
        queue.push_back(trade);
        if queue.len() > RECENT_CACHE_DEPTH {
            queue.pop_front();
        }
    }

    /// Most recent trades for a symbol, newest first, served from memory.
    pub fn recent(&self, symbol: &str, limit: usize) -> Vec<Trade> {
        self.recent
            .get(symbol)
            .map(|q| q.lock().iter().rev().take(limit).cloned().collect())
            .unwrap_or_default()
    }

    /// Aggregate OHLCV-style stats for a symbol over the trailing window,
    /// computed from the durable log rather than the in-memory cache so the
    /// window can exceed the cache depth.
    pub async fn stats(&self, symbol: &str, since: DateTime<Utc>) -> Result<TradeStats, AppError> {
        let row: (i64, Option<Decimal>, Option<Decimal>, Option<Decimal>, Option<Decimal>) = sqlx::query_as(
            r#"
            SELECT COUNT(*), SUM(qty), SUM(quote_qty), MAX(price), MIN(price)
            FROM trades
            WHERE symbol = $1 AND executed_at >= $2 AND liquidity = 'taker'
            "#,
        )
        .bind(symbol)
        .bind(since)
        .fetch_one(&self.db.pool)
        .await?;

        let open: Option<Decimal> = sqlx::query_scalar(
            "SELECT price FROM trades WHERE symbol = $1 AND executed_at >= $2 AND liquidity = 'taker' ORDER BY trade_id ASC LIMIT 1",
        )
        .bind(symbol)
        .bind(since)
        .fetch_optional(&self.db.pool)
        .await?;

        let close: Option<Decimal> = sqlx::query_scalar(
            "SELECT price FROM trades WHERE symbol = $1 AND executed_at >= $2 AND liquidity = 'taker' ORDER BY trade_id DESC LIMIT 1",
        )
        .bind(symbol)
        .bind(since)
        .fetch_optional(&self.db.pool)
        .await?;

        Ok(TradeStats {
            symbol: symbol.to_string(),
            period: since.to_rfc3339(),
            trade_count: row.0,
            volume: row.1.unwrap_or_default(),
            quote_volume: row.2.unwrap_or_default(),
            high: row.3.unwrap_or_default(),
            low: row.4.unwrap_or_default(),
            open: open.unwrap_or_default(),
            close: close.unwrap_or_default(),
        })
    }

    /// All taker-side prints for a symbol since a start time, oldest first —
    /// the feed analytics folds into bins, percentiles, and moving averages.
    pub async fn for_symbol(
        &self,
        symbol: &str,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Trade>, AppError> {
        let trades = sqlx::query_as::<_, Trade>(
            r#"
            SELECT * FROM trades
            WHERE symbol = $1 AND executed_at >= $2 AND liquidity = 'taker'
            ORDER BY trade_id ASC
            LIMIT $3
            "#,
        )
        .bind(symbol)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(trades)
    }

    /// Every principal's taker-side prints since a start time, across all
    /// symbols — the slice risk scoring and rapid-trading detection fold
    /// over without knowing which symbols a principal touched in advance.
    pub async fn since(&self, since: DateTime<Utc>, limit: i64) -> Result<Vec<Trade>, AppError> {
        let trades = sqlx::query_as::<_, Trade>(
            r#"
            SELECT * FROM trades
            WHERE executed_at >= $1 AND liquidity = 'taker'
            ORDER BY trade_id ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(trades)
    }

    /// Both legs of every fill since a start time, across all principals and
    /// symbols — per-principal detectors (rapid trading, wash trading, risk
    /// scoring) fold over this rather than `since`, which collapses each
    /// fill to its single taker print and would undercount a principal whose
    /// activity was resting liquidity.
    pub async fn participants_since(
        &self,
        since: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Trade>, AppError> {
        let trades = sqlx::query_as::<_, Trade>(
            r#"
            SELECT * FROM trades
            WHERE executed_at >= $1
            ORDER BY trade_id ASC
            LIMIT $2
            "#,
        )
        .bind(since)
        .bind(limit)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(trades)
    }

    /// A principal's fills, optionally scoped to a symbol and a start time.
    pub async fn for_principal(
        &self,
        principal: Uuid,
        symbol: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Trade>, AppError> {
        let trades = sqlx::query_as::<_, Trade>(
            r#"
            SELECT * FROM trades
            WHERE (maker_principal = $1 OR taker_principal = $1)
              AND ($2::text IS NULL OR symbol = $2)
              AND ($3::timestamptz IS NULL OR executed_at >= $3)
            ORDER BY trade_id DESC
            LIMIT $4
            "#,
        )
        .bind(principal)
        .bind(symbol)
        .bind(since)
        .bind(limit)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(trades)
    }
}
