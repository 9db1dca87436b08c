//! Single-symbol order book: a pair of price ladders plus an index for
//! O(1) cancellation. One instance lives per symbol behind the engine's
//! per-symbol mutex — nothing in here is internally synchronized, callers
//! serialize access.

use super::types::{BookEntry, DepthLevel, Fill, MatchOutcome, OrderbookSnapshot, PriceLevel};
use crate::models::order::OrderSide;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use uuid::Uuid;

pub struct Orderbook {
    symbol: String,
    /// Keyed ascending; bids are read back-to-front for highest-first.
    bids: BTreeMap<PriceLevel, VecDeque<BookEntry>>,
    asks: BTreeMap<PriceLevel, VecDeque<BookEntry>>,
    index: DashMap<Uuid, (OrderSide, PriceLevel)>,
    sequence: AtomicU64,
}

impl Orderbook {
    pub fn new(symbol: String) -> Self {
        Self {
            symbol,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            index: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.load(AtomicOrdering::Relaxed)
    }

    fn bump_sequence(&self) {
        self.sequence.fetch_add(1, AtomicOrdering::Relaxed);
    }

    fn side_book(&self, side: OrderSide) -> &BTreeMap<PriceLevel, VecDeque<BookEntry>> {
        match side {
            OrderSide::Buy => &self.bids,
            OrderSide::Sell => &self.asks,
        }
    }

    fn side_book_mut(&mut self, side: OrderSide) -> &mut BTreeMap<PriceLevel, VecDeque<BookEntry>> {
        match side {
            OrderSide::Buy => &mut self.bids,
            OrderSide::Sell => &mut self.asks,
        }
    }

    /// Append a resting entry on its side, in arrival order at its price.
    pub fn insert(&mut self, entry: BookEntry) {
        let level = PriceLevel::from_decimal(entry.price);
        let side = entry.side;
        let order_id = entry.order_id;
        self.side_book_mut(side).entry(level).or_default().push_back(entry);
        self.index.insert(order_id, (side, level));
        self.bump_sequence();
    }

    /// Peek the most aggressive live entry on a side: highest bid or lowest
    /// ask. Ties are resolved by earlier `arrival_ts` because entries are
    /// pushed to the back of their level's queue in arrival order.
    pub fn best(&self, side: OrderSide) -> Option<&BookEntry> {
        match side {
            OrderSide::Buy => self.bids.iter().next_back().and_then(|(_, q)| q.front()),
            OrderSide::Sell => self.asks.iter().next().and_then(|(_, q)| q.front()),
        }
    }

    pub fn cancel(&mut self, order_id: Uuid) -> Option<BookEntry> {
        let (side, level) = self.index.remove(&order_id)?.1;
        let book = self.side_book_mut(side);
        let queue = book.get_mut(&level)?;
        let pos = queue.iter().position(|e| e.order_id == order_id)?;
        let entry = queue.remove(pos);
        if queue.is_empty() {
            book.remove(&level);
        }
        self.bump_sequence();
        entry
    }

    /// Return the top entry on the opposite side of `side` if it crosses
    /// `limit_price` (`None` crosses at any price, i.e. a market taker).
    /// Does not mutate the book; callers call `fill_top` to consume it.
    pub fn match_top(&self, side: OrderSide, limit_price: Option<Decimal>) -> Option<&BookEntry> {
        let opposite = self.best(side.opposite())?;
        match side {
            OrderSide::Buy => {
                if let Some(limit) = limit_price {
                    if opposite.price > limit {
                        return None;
                    }
                }
            }
            OrderSide::Sell => {
                if let Some(limit) = limit_price {
                    if opposite.price < limit {
                        return None;
                    }
                }
            }
        }
        Some(opposite)
    }

    /// Consume up to `qty` from the top entry on `opposite_side`. Returns
    /// the fill and whether the maker was exhausted (and thus removed).
    fn fill_top(&mut self, opposite_side: OrderSide, qty: Decimal) -> Fill {
        let level = match opposite_side {
            OrderSide::Buy => *self.bids.iter().next_back().unwrap().0,
            OrderSide::Sell => *self.asks.iter().next().unwrap().0,
        };
        let book = self.side_book_mut(opposite_side);
        let queue = book.get_mut(&level).expect("level observed by match_top");
        let maker = queue.front_mut().expect("entry observed by match_top");

        let fill_qty = qty.min(maker.remaining_qty);
        let price = maker.price;
        let maker_order_id = maker.order_id;
        let maker_principal = maker.principal;
        let maker_client_order_id = maker.client_order_id.clone();
        maker.remaining_qty -= fill_qty;
        let exhausted = maker.remaining_qty <= Decimal::ZERO;

        if exhausted {
            queue.pop_front();
        }
        let queue_empty = queue.is_empty();
        if queue_empty {
            book.remove(&level);
        }
        if exhausted {
            self.index.remove(&maker_order_id);
        }
        self.bump_sequence();

        Fill {
            maker_order_id,
            maker_principal,
            maker_client_order_id,
            price,
            qty: fill_qty,
            maker_exhausted: exhausted,
        }
    }

    /// Walk the book against an incoming taker, optionally skipping resting
    /// entries belonging to `self_principal` (decrement-take self-match
    /// avoidance — those are cancelled rather than filled). Stops when
    /// `qty` is exhausted, the book runs dry, or nothing crosses `limit_price`
    /// anymore.
    pub fn walk(
        &mut self,
        side: OrderSide,
        mut qty: Decimal,
        limit_price: Option<Decimal>,
        self_principal: Uuid,
    ) -> (MatchOutcome, Vec<BookEntry>) {
        let mut outcome = MatchOutcome::default();
        let mut self_matched = Vec::new();

        while qty > Decimal::ZERO {
            let Some(top) = self.match_top(side, limit_price) else {
                break;
            };
            if top.principal == self_principal {
                let order_id = top.order_id;
                if let Some(cancelled) = self.cancel(order_id) {
                    self_matched.push(cancelled);
                }
                continue;
            }
            let fill = self.fill_top(side.opposite(), qty);
            qty -= fill.qty;
            outcome.filled_qty += fill.qty;
            outcome.fills.push(fill);
        }

        outcome.remaining_qty = qty;
        (outcome, self_matched)
    }

    /// Aggregated (price, total_qty, order_count) rows, bids descending,
    /// asks ascending, at most `levels` rows per side.
    pub fn depth(&self, levels: usize) -> OrderbookSnapshot {
        let bids = self
            .bids
            .iter()
            .rev()
            .take(levels)
            .map(|(level, queue)| DepthLevel {
                price: level.to_decimal(),
                qty: queue.iter().map(|e| e.remaining_qty).sum(),
                order_count: queue.len(),
            })
            .collect();

        let asks = self
            .asks
            .iter()
            .take(levels)
            .map(|(level, queue)| DepthLevel {
                price: level.to_decimal(),
                qty: queue.iter().map(|e| e.remaining_qty).sum(),
                order_count: queue.len(),
            })
            .collect();

        OrderbookSnapshot {
            symbol: self.symbol.clone(),
            bids,
            asks,
            sequence: self.sequence(),
        }
    }

    /// Total quantity available to an incoming `side` order up to
    /// `limit_price` without mutating the book — used to decide FOK
    /// feasibility before committing to a walk.
    pub fn available_to_fill(&self, side: OrderSide, limit_price: Option<Decimal>) -> Decimal {
        let mut total = Decimal::ZERO;
        match side {
            OrderSide::Buy => {
                for (level, queue) in self.asks.iter() {
                    if let Some(limit) = limit_price {
                        if level.to_decimal() > limit {
                            break;
                        }
                    }
                    total += queue.iter().map(|e| e.remaining_qty).sum::<Decimal>();
                }
            }
            OrderSide::Sell => {
                for (level, queue) in self.bids.iter().rev() {
                    if let Some(limit) = limit_price {
                        if level.to_decimal() < limit {
                            break;
                        }
                    }
                    total += queue.iter().map(|e| e.remaining_qty).sum::<Decimal>();
                }
            }
        }
        total
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.keys().next_back().map(|p| p.to_decimal())
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.keys().next().map(|p| p.to_decimal())
    }

    pub fn has_order(&self, order_id: &Uuid) -> bool {
        self.index.contains_key(order_id)
    }

    pub fn order_count(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::matching::types::next_arrival_ts;
    use rust_decimal_macros::dec;

    fn entry(side: OrderSide, price: Decimal, qty: Decimal, principal: Uuid) -> BookEntry {
        BookEntry {
            order_id: Uuid::new_v4(),
            client_order_id: None,
            principal,
            side,
            price,
            remaining_qty: qty,
            arrival_ts: next_arrival_ts(),
            time_in_force: crate::models::order::TimeInForce::Gtc,
        }
    }

    #[test]
    fn insert_and_cancel_round_trip() {
        let mut book = Orderbook::new("BTC-USDT".into());
        let order = entry(OrderSide::Buy, dec!(100.0), dec!(1.0), Uuid::new_v4());
        let id = order.order_id;

        book.insert(order);
        assert!(book.has_order(&id));
        assert_eq!(book.order_count(), 1);

        let cancelled = book.cancel(id);
        assert!(cancelled.is_some());
        assert!(!book.has_order(&id));
        assert_eq!(book.order_count(), 0);
    }

    #[test]
    fn best_picks_highest_bid_and_lowest_ask() {
        let mut book = Orderbook::new("BTC-USDT".into());
        book.insert(entry(OrderSide::Buy, dec!(100.0), dec!(1.0), Uuid::new_v4()));
        book.insert(entry(OrderSide::Buy, dec!(101.0), dec!(1.0), Uuid::new_v4()));
        book.insert(entry(OrderSide::Sell, dec!(103.0), dec!(1.0), Uuid::new_v4()));
        book.insert(entry(OrderSide::Sell, dec!(102.0), dec!(1.0), Uuid::new_v4()));

        assert_eq!(book.best_bid(), Some(dec!(101.0)));
        assert_eq!(book.best_ask(), Some(dec!(102.0)));
    }

    #[test]
    fn ties_at_price_resolve_by_arrival_order() {
        let mut book = Orderbook::new("BTC-USDT".into());
        let first = entry(OrderSide::Sell, dec!(100.0), dec!(1.0), Uuid::new_v4());
        let first_id = first.order_id;
        book.insert(first);
        book.insert(entry(OrderSide::Sell, dec!(100.0), dec!(1.0), Uuid::new_v4()));

        assert_eq!(book.best(OrderSide::Buy).unwrap().order_id, first_id);
    }

    #[test]
    fn walk_fills_across_levels_and_stops_at_limit() {
        let mut book = Orderbook::new("BTC-USDT".into());
        let maker1 = Uuid::new_v4();
        let maker2 = Uuid::new_v4();
        book.insert(entry(OrderSide::Sell, dec!(100.0), dec!(1.0), maker1));
        book.insert(entry(OrderSide::Sell, dec!(101.0), dec!(2.0), maker2));

        let taker_principal = Uuid::new_v4();
        let (outcome, self_matched) =
            book.walk(OrderSide::Buy, dec!(1.5), Some(dec!(101.0)), taker_principal);

        assert!(self_matched.is_empty());
        assert_eq!(outcome.filled_qty, dec!(1.5));
        assert_eq!(outcome.remaining_qty, dec!(0));
        assert_eq!(outcome.fills.len(), 2);
        assert_eq!(outcome.fills[0].price, dec!(100.0));
        assert_eq!(outcome.fills[0].qty, dec!(1.0));
        assert!(outcome.fills[0].maker_exhausted);
        assert_eq!(outcome.fills[1].price, dec!(101.0));
        assert_eq!(outcome.fills[1].qty, dec!(0.5));
        assert!(!outcome.fills[1].maker_exhausted);
    }

    #[test]
    fn walk_cancels_self_match_without_filling() {
        let mut book = Orderbook::new("BTC-USDT".into());
        let trader = Uuid::new_v4();
        let other = Uuid::new_v4();
        let own_order = entry(OrderSide::Sell, dec!(100.0), dec!(1.0), trader);
        let own_id = own_order.order_id;
        book.insert(own_order);
        book.insert(entry(OrderSide::Sell, dec!(100.0), dec!(1.0), other));

        let (outcome, self_matched) = book.walk(OrderSide::Buy, dec!(1.0), None, trader);

        assert_eq!(self_matched.len(), 1);
        assert_eq!(self_matched[0].order_id, own_id);
        assert_eq!(outcome.filled_qty, dec!(1.0));
        assert_eq!(outcome.fills.len(), 1);
        assert_eq!(outcome.fills[0].maker_principal, other);
    }

    #[test]
    fn depth_aggregates_by_price_level() {
        let mut book = Orderbook::new("BTC-USDT".into());
        book.insert(entry(OrderSide::Buy, dec!(100.0), dec!(1.0), Uuid::new_v4()));
        book.insert(entry(OrderSide::Buy, dec!(100.0), dec!(2.0), Uuid::new_v4()));
        book.insert(entry(OrderSide::Sell, dec!(102.0), dec!(1.5), Uuid::new_v4()));

        let snapshot = book.depth(10);
        assert_eq!(snapshot.bids.len(), 1);
        assert_eq!(snapshot.bids[0].qty, dec!(3.0));
        assert_eq!(snapshot.bids[0].order_count, 2);
        assert_eq!(snapshot.asks.len(), 1);
        assert!(snapshot.sequence >= 3);
    }
}
