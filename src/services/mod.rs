pub mod analytics;
pub mod market;
pub mod matching;
pub mod wallet;

pub use analytics::AnalyticsService;
pub use market::MarketService;
pub use wallet::WalletGate;
