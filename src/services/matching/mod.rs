//! Order matching core: a per-symbol price-time-priority book, a stop
//! trigger table, an append-only trade log, and the engine that ties
//! admission, matching, persistence, and publication into one operation.

mod engine;
mod orderbook;
mod stops;
mod trade_log;
mod types;

pub use engine::MatchingEngine;
pub use orderbook::Orderbook;
pub use stops::StopTable;
pub use trade_log::TradeLog;
pub use types::{
    BookEntry, DepthLevel, Fill, MatchOutcome, MatchingError, OrderbookSnapshot, PriceLevel,
};
