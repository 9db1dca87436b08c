//! The matching engine (component B): one `SymbolState` per configured
//! symbol, each behind its own async mutex so concurrent orders on
//! different symbols run in parallel while orders on the same symbol
//! serialize end to end, persistence and publish included.

use super::orderbook::Orderbook;
use super::stops::StopTable;
use super::trade_log::TradeLog;
use super::types::{next_arrival_ts, BookEntry, OrderbookSnapshot};
use crate::cache::{CacheKey, EventBus};
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::AppError;
use crate::models::order::{CreateOrderRequest, Order, OrderSide, OrderStatus, OrderType, TimeInForce};
use crate::models::principal::Principal;
use crate::metrics::{self, Timer};
use crate::models::trade::{base_asset, quote_asset, Trade};
use crate::services::wallet::WalletGate;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::{info, warn};
use uuid::Uuid;

struct SymbolState {
    book: Orderbook,
    stops: StopTable,
}

pub struct MatchingEngine {
    symbols: DashMap<String, Arc<TokioMutex<SymbolState>>>,
    sequence: AtomicI64,
    trade_log: Arc<TradeLog>,
    wallet: Arc<WalletGate>,
    bus: Arc<dyn EventBus>,
    db: Database,
    config: Arc<AppConfig>,
}

impl MatchingEngine {
    pub async fn new(
        db: Database,
        trade_log: Arc<TradeLog>,
        wallet: Arc<WalletGate>,
        bus: Arc<dyn EventBus>,
        config: Arc<AppConfig>,
    ) -> anyhow::Result<Self> {
        let seed = db.max_sequence_number().await?;
        let symbols = DashMap::new();
        for symbol in config.get_trading_pairs() {
            symbols.insert(
                symbol.clone(),
                Arc::new(TokioMutex::new(SymbolState {
                    book: Orderbook::new(symbol),
                    stops: StopTable::new(),
                })),
            );
        }
        Ok(Self {
            symbols,
            sequence: AtomicI64::new(seed),
            trade_log,
            wallet,
            bus,
            db,
            config,
        })
    }

    pub fn is_valid_symbol(&self, symbol: &str) -> bool {
        self.symbols.contains_key(symbol)
    }

    fn next_sequence(&self) -> i64 {
        self.sequence.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn state_for(&self, symbol: &str) -> Result<Arc<TokioMutex<SymbolState>>, AppError> {
        self.symbols
            .get(symbol)
            .map(|entry| entry.clone())
            .ok_or_else(|| AppError::Validation(format!("unknown symbol {}", symbol)))
    }

    pub async fn depth(&self, symbol: &str, levels: usize) -> Result<OrderbookSnapshot, AppError> {
        let state = self.state_for(symbol)?;
        let guard = state.lock().await;
        Ok(guard.book.depth(levels))
    }

    // ------------------------------------------------------------------
    // Admission (4.B.1)
    // ------------------------------------------------------------------

    async fn admit(&self, req: &CreateOrderRequest, principal: &Principal) -> Result<(), AppError> {
        if !self.is_valid_symbol(&req.symbol.to_uppercase()) {
            return Err(AppError::Validation(format!("malformed or unknown symbol {}", req.symbol)));
        }
        if req.qty < self.config.min_order_qty() {
            return Err(AppError::Validation("qty below minimum size".into()));
        }
        if req.qty > self.config.max_order_qty() {
            return Err(AppError::Validation("qty above maximum size".into()));
        }
        if matches!(req.order_type, OrderType::Limit) && req.price.is_none() {
            return Err(AppError::Validation("limit order requires a price".into()));
        }
        if req.order_type.is_stop() && req.stop_price.is_none() {
            return Err(AppError::Validation("stop order requires a stop_price".into()));
        }

        let since_midnight = Utc::now().date_naive().and_hms_opt(0, 0, 0).unwrap().and_utc();
        let traded_today = self
            .trade_log
            .for_principal(principal.id, Some(&req.symbol.to_uppercase()), Some(since_midnight), 10_000)
            .await?
            .iter()
            .map(|t| t.quote_qty)
            .sum::<Decimal>();

        let est_price = req.price.unwrap_or_default();
        if traded_today + est_price * req.qty > principal.daily_trade_cap {
            return Err(AppError::Validation("principal exceeds daily trade cap".into()));
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Submission (4.B)
    // ------------------------------------------------------------------

    pub async fn submit_order(
        &self,
        principal: &Principal,
        req: CreateOrderRequest,
    ) -> Result<(Order, Vec<Trade>), AppError> {
        let symbol = req.symbol.to_uppercase();
        if let Err(e) = self.admit(&req, principal).await {
            metrics::record_order_rejected();
            return Err(e);
        }

        let state_arc = self.state_for(&symbol)?;
        let mut state = state_arc.lock().await;

        let now = Utc::now();
        let mut order = Order {
            id: Uuid::new_v4(),
            client_order_id: req.client_order_id.clone(),
            principal_id: principal.id,
            symbol: symbol.clone(),
            side: req.side,
            order_type: req.order_type,
            time_in_force: req.time_in_force,
            price: req.price,
            stop_price: req.stop_price,
            qty: req.qty,
            filled_qty: Decimal::ZERO,
            avg_fill_price: None,
            status: OrderStatus::Pending,
            sequence_number: self.next_sequence(),
            created_at: now,
            updated_at: now,
            expires_at: req.expires_at,
        };
        metrics::record_order_submitted(&order.side.to_string(), &order.order_type.to_string());
        self.insert_order_row(&order).await?;

        if order.order_type.is_stop() {
            let stop_price = order.stop_price.expect("validated in admit");
            state.stops.insert(order.side, stop_price, order.id);
            order.status = OrderStatus::Open;
            order.updated_at = Utc::now();
            self.update_order_row(&order).await?;
            drop(state);
            self.publish_order_event(&order).await;
            return Ok((order, Vec::new()));
        }

        let base = base_asset(&symbol).to_string();
        let quote = quote_asset(&symbol).to_string();
        let limit_price = if order.order_type == OrderType::Market { None } else { order.price };

        let (reserve_asset, reserve_amount) = match order.side {
            OrderSide::Buy => {
                let slippage = if order.order_type == OrderType::Market {
                    Decimal::from(self.config.market_order_slippage_bps) / Decimal::from(10_000)
                } else {
                    Decimal::ZERO
                };
                let est_price = order
                    .price
                    .or_else(|| state.book.best_ask())
                    .unwrap_or(Decimal::ZERO);
                (quote.clone(), est_price * order.qty * (Decimal::ONE + slippage))
            }
            OrderSide::Sell => (base.clone(), order.qty),
        };

        if let Err(e) = self.wallet.reserve(principal.id, &reserve_asset, reserve_amount).await {
            order.status = OrderStatus::Rejected;
            order.updated_at = Utc::now();
            self.update_order_row(&order).await?;
            drop(state);
            metrics::record_order_rejected();
            self.publish_order_event(&order).await;
            return Err(e);
        }

        if order.time_in_force == TimeInForce::Fok {
            let available = state.book.available_to_fill(order.side, limit_price);
            if available < order.qty {
                order.status = OrderStatus::Rejected;
                order.updated_at = Utc::now();
                self.update_order_row(&order).await?;
                self.wallet.release(principal.id, &reserve_asset, reserve_amount).await?;
                drop(state);
                metrics::record_order_rejected();
                self.publish_order_event(&order).await;
                return Ok((order, Vec::new()));
            }
        }

        let match_timer = Timer::new();
        let (outcome, self_matched) = state.book.walk(order.side, order.qty, limit_price, principal.id);

        for cancelled in &self_matched {
            self.cancel_resting_row(cancelled.order_id).await?;
            self.wallet
                .release(
                    cancelled.principal,
                    if cancelled.side == OrderSide::Buy { &quote } else { &base },
                    cancelled.price * cancelled.remaining_qty,
                )
                .await
                .ok();
        }

        let mut trades = Vec::new();
        let mut triggered_stops = Vec::new();
        let mut weighted_price_sum = Decimal::ZERO;

        for fill in &outcome.fills {
            let trade_id = self.trade_log.next_trade_id();
            let (maker_trade, taker_trade) = Trade::pair(
                trade_id,
                &symbol,
                fill.maker_order_id,
                order.id,
                fill.maker_principal,
                principal.id,
                order.side,
                fill.price,
                fill.qty,
                self.config.commission_rate(),
                Utc::now(),
            );
            self.trade_log.append(&maker_trade, &taker_trade).await?;
            self.settle_fill(&maker_trade, &taker_trade, &base, &quote).await?;
            self.apply_fill_to_resting_order(fill.maker_order_id, fill.qty, fill.price, fill.maker_exhausted)
                .await?;
            self.publish_trade_event(&taker_trade, state.book.best_bid(), state.book.best_ask())
                .await;

            let match_type = if fill.maker_exhausted { "full" } else { "partial" };
            metrics::record_order_matched(match_type);
            metrics::record_trade_executed(&symbol, (fill.price * fill.qty).to_f64().unwrap_or(0.0));

            weighted_price_sum += fill.price * fill.qty;
            triggered_stops.extend(state.stops.triggered_by(fill.price));
            trades.push(taker_trade);
        }

        order.filled_qty = outcome.filled_qty;
        if outcome.filled_qty > Decimal::ZERO {
            order.avg_fill_price = Some(weighted_price_sum / outcome.filled_qty);
        }

        let remaining = outcome.remaining_qty;
        if remaining > Decimal::ZERO {
            match order.time_in_force {
                TimeInForce::Gtc | TimeInForce::Gtd => {
                    state.book.insert(BookEntry {
                        order_id: order.id,
                        client_order_id: order.client_order_id.clone(),
                        principal: principal.id,
                        side: order.side,
                        price: order.price.unwrap_or_default(),
                        remaining_qty: remaining,
                        arrival_ts: next_arrival_ts(),
                        time_in_force: order.time_in_force,
                    });
                    order.status = if order.filled_qty > Decimal::ZERO {
                        OrderStatus::PartiallyFilled
                    } else {
                        OrderStatus::Open
                    };
                }
                TimeInForce::Ioc => {
                    order.status = if order.filled_qty > Decimal::ZERO {
                        OrderStatus::PartiallyFilled
                    } else {
                        OrderStatus::Cancelled
                    };
                }
                TimeInForce::Fok => unreachable!("feasibility checked before walking the book"),
            }
        } else {
            order.status = OrderStatus::Filled;
        }
        order.updated_at = Utc::now();
        self.update_order_row(&order).await?;
        metrics::record_order_match_duration(match_timer.elapsed_secs());

        if order.side == OrderSide::Buy && order.status.is_terminal() {
            let spent: Decimal = trades.iter().map(|t| t.quote_qty).sum();
            let excess = reserve_amount - spent;
            if excess > Decimal::ZERO {
                self.wallet.release(principal.id, &reserve_asset, excess).await.ok();
            }
        }

        let snapshot = state.book.depth(20);
        metrics::set_orderbook_depth(&symbol, "bid", snapshot.bids.len() as i64);
        metrics::set_orderbook_depth(&symbol, "ask", snapshot.asks.len() as i64);
        if let (Some(bid), Some(ask)) = (snapshot.bids.first(), snapshot.asks.first()) {
            metrics::set_orderbook_spread(&symbol, (ask.price - bid.price).to_f64().unwrap_or(0.0));
        }
        drop(state);

        self.publish_order_event(&order).await;
        self.publish_book_event(&symbol, &snapshot).await;

        for stop_id in triggered_stops {
            self.reenter_stop(&symbol, stop_id).await;
        }

        Ok((order, trades))
    }

    // ------------------------------------------------------------------
    // Cancel (4.B)
    // ------------------------------------------------------------------

    pub async fn cancel_order(&self, principal: Uuid, order_id: Uuid) -> Result<Order, AppError> {
        let mut order = self.fetch_order_row(order_id).await?;
        if order.principal_id != principal || !order.status.is_cancellable() {
            return Err(AppError::NotCancellable);
        }

        let state_arc = self.state_for(&order.symbol)?;
        let mut state = state_arc.lock().await;
        state.book.cancel(order_id);
        state.stops.remove(order.side, order.stop_price.unwrap_or_default(), order_id);
        drop(state);

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        self.update_order_row(&order).await?;

        let base = base_asset(&order.symbol);
        let quote = quote_asset(&order.symbol);
        let (asset, amount) = match order.side {
            OrderSide::Buy => (quote, order.remaining_qty() * order.price.unwrap_or_default()),
            OrderSide::Sell => (base, order.remaining_qty()),
        };
        self.wallet.release(principal, asset, amount).await?;
        metrics::record_order_cancelled();

        self.publish_order_event(&order).await;
        Ok(order)
    }

    async fn cancel_resting_row(&self, order_id: Uuid) -> Result<(), AppError> {
        let mut order = self.fetch_order_row(order_id).await?;
        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        self.update_order_row(&order).await?;
        self.publish_order_event(&order).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Expiry sweep (4.B, 4.E)
    // ------------------------------------------------------------------

    pub async fn sweep_expired(&self) -> Result<usize, AppError> {
        let now = Utc::now();
        let rows: Vec<(Uuid, String, Uuid)> = sqlx::query_as(
            r#"
            SELECT id, symbol, principal_id FROM orders
            WHERE time_in_force = 'gtd' AND expires_at IS NOT NULL AND expires_at <= $1
              AND status IN ('pending', 'open', 'partially_filled')
            "#,
        )
        .bind(now)
        .fetch_all(&self.db.pool)
        .await?;

        let mut count = 0;
        for (order_id, _symbol, principal_id) in rows {
            if self.cancel_order(principal_id, order_id).await.is_ok() {
                count += 1;
            }
        }
        if count > 0 {
            info!("expiry sweep cancelled {} orders", count);
        }
        Ok(count)
    }

    // ------------------------------------------------------------------
    // Stop re-entry
    // ------------------------------------------------------------------

    async fn reenter_stop(&self, symbol: &str, order_id: Uuid) {
        let Ok(mut order) = self.fetch_order_row(order_id).await else {
            warn!("triggered stop {} has no order row", order_id);
            return;
        };
        let Ok(principal) = self.fetch_principal(order.principal_id).await else {
            return;
        };

        let triggered_type = order.order_type.triggered_form();
        let req = CreateOrderRequest {
            client_order_id: order.client_order_id.clone(),
            symbol: symbol.to_string(),
            side: order.side,
            order_type: triggered_type,
            time_in_force: order.time_in_force,
            price: order.price,
            stop_price: None,
            qty: order.remaining_qty(),
            expires_at: order.expires_at,
        };

        order.status = OrderStatus::Cancelled;
        order.updated_at = Utc::now();
        if let Err(e) = self.update_order_row(&order).await {
            warn!("failed to retire triggered stop {}: {}", order_id, e);
        }

        if let Err(e) = Box::pin(self.submit_order(&principal, req)).await {
            warn!("failed to re-enter triggered stop {}: {}", order_id, e);
        }
    }

    // ------------------------------------------------------------------
    // Settlement of a fill across both legs
    // ------------------------------------------------------------------

    async fn settle_fill(&self, maker: &Trade, taker: &Trade, base: &str, quote: &str) -> Result<(), AppError> {
        // Commission is always denominated in the base asset (`Trade::pair`),
        // so it comes out of whichever side is receiving base, not whichever
        // side is the taker.
        let (buyer_principal, seller_principal) = match taker.side {
            OrderSide::Buy => (taker.taker_principal, maker.maker_principal),
            OrderSide::Sell => (maker.maker_principal, taker.taker_principal),
        };

        self.wallet.settle(seller_principal, base, taker.qty).await?;
        self.wallet.credit(seller_principal, quote, taker.quote_qty).await?;

        self.wallet.settle(buyer_principal, quote, taker.quote_qty).await?;
        self.wallet.credit(buyer_principal, base, taker.qty - taker.commission).await?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Persistence helpers
    // ------------------------------------------------------------------

    async fn insert_order_row(&self, order: &Order) -> Result<(), AppError> {
        let timer = Timer::new();
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, client_order_id, principal_id, symbol, side, order_type, time_in_force,
                price, stop_price, qty, filled_qty, avg_fill_price, status, sequence_number,
                created_at, updated_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5::order_side, $6::order_type, $7::time_in_force, $8, $9, $10, $11, $12, $13::order_status, $14, $15, $16, $17)
            "#,
        )
        .bind(order.id)
        .bind(&order.client_order_id)
        .bind(order.principal_id)
        .bind(&order.symbol)
        .bind(order.side)
        .bind(order.order_type)
        .bind(order.time_in_force)
        .bind(order.price)
        .bind(order.stop_price)
        .bind(order.qty)
        .bind(order.filled_qty)
        .bind(order.avg_fill_price)
        .bind(order.status)
        .bind(order.sequence_number)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.expires_at)
        .execute(&self.db.pool)
        .await?;
        metrics::record_db_query("insert_order", timer.elapsed_secs());
        Ok(())
    }

    async fn update_order_row(&self, order: &Order) -> Result<(), AppError> {
        let timer = Timer::new();
        sqlx::query(
            r#"
            UPDATE orders SET
                filled_qty = $1, avg_fill_price = $2, status = $3::order_status, updated_at = $4
            WHERE id = $5
            "#,
        )
        .bind(order.filled_qty)
        .bind(order.avg_fill_price)
        .bind(order.status)
        .bind(order.updated_at)
        .bind(order.id)
        .execute(&self.db.pool)
        .await?;
        metrics::record_db_query("update_order", timer.elapsed_secs());
        Ok(())
    }

    async fn fetch_order_row(&self, order_id: Uuid) -> Result<Order, AppError> {
        let timer = Timer::new();
        let row = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.db.pool)
            .await?;
        metrics::record_db_query("fetch_order", timer.elapsed_secs());
        row.ok_or(AppError::NotFound)
    }

    async fn fetch_principal(&self, principal_id: Uuid) -> Result<Principal, AppError> {
        sqlx::query_as::<_, Principal>("SELECT * FROM principals WHERE id = $1")
            .bind(principal_id)
            .fetch_optional(&self.db.pool)
            .await?
            .ok_or(AppError::NotFound)
    }

    async fn apply_fill_to_resting_order(
        &self,
        order_id: Uuid,
        fill_qty: Decimal,
        fill_price: Decimal,
        exhausted: bool,
    ) -> Result<(), AppError> {
        let mut maker_order = self.fetch_order_row(order_id).await?;
        let prior_filled = maker_order.filled_qty;
        let prior_notional = maker_order.avg_fill_price.unwrap_or_default() * prior_filled;
        maker_order.filled_qty += fill_qty;
        maker_order.avg_fill_price = Some((prior_notional + fill_price * fill_qty) / maker_order.filled_qty);
        maker_order.status = if exhausted {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        maker_order.updated_at = Utc::now();
        self.update_order_row(&maker_order).await?;
        self.publish_order_event(&maker_order).await;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Publication (4.D) — fire-and-forget, logged on failure
    // ------------------------------------------------------------------

    async fn publish_trade_event(&self, trade: &Trade, best_bid: Option<Decimal>, best_ask: Option<Decimal>) {
        let payload = format!("{}|{}|{}|{}", trade.trade_id, trade.price, trade.qty, trade.side);
        let trades_channel = CacheKey::channel_trades(&trade.symbol);
        if let Err(e) = self.bus.publish(&trades_channel, payload).await {
            warn!("publish to {} failed: {}", trades_channel, e);
            metrics::record_pubsub_publish_failure(&trades_channel);
        }
        let price_payload = format!(
            "{}|{}|{}|{}",
            trade.price,
            best_bid.unwrap_or(trade.price),
            best_ask.unwrap_or(trade.price),
            trade.executed_at.to_rfc3339(),
        );
        let prices_channel = CacheKey::channel_prices(&trade.symbol);
        if let Err(e) = self.bus.publish(&prices_channel, price_payload).await {
            warn!("publish to {} failed: {}", prices_channel, e);
            metrics::record_pubsub_publish_failure(&prices_channel);
        }
    }

    async fn publish_order_event(&self, order: &Order) {
        let payload = format!(
            "{}|{}|{}|{}",
            order.id,
            order.status,
            order.filled_qty,
            order.avg_fill_price.map(|p| p.to_string()).unwrap_or_default(),
        );
        let channel = CacheKey::channel_orders(order.principal_id);
        if let Err(e) = self.bus.publish(&channel, payload).await {
            warn!("publish to {} failed: {}", channel, e);
            metrics::record_pubsub_publish_failure(&channel);
        }
    }

    async fn publish_book_event(&self, symbol: &str, snapshot: &OrderbookSnapshot) {
        let json = serde_json::to_string(snapshot).unwrap_or_default();
        let channel = CacheKey::channel_book(symbol);
        if let Err(e) = self.bus.publish(&channel, json).await {
            warn!("publish to {} failed: {}", channel, e);
            metrics::record_pubsub_publish_failure(&channel);
        }
    }
}
