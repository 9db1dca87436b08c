//! Channel name construction for the pub/sub bridge.

pub struct CacheKey;

impl CacheKey {
    pub fn channel_prices(symbol: &str) -> String {
        format!("prices:{}", symbol)
    }

    pub fn channel_trades(symbol: &str) -> String {
        format!("trades:{}", symbol)
    }

    pub fn channel_book(symbol: &str) -> String {
        format!("book:{}", symbol)
    }

    pub fn channel_orders(principal: uuid::Uuid) -> String {
        format!("orders:{}", principal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_match_the_wire_format() {
        assert_eq!(CacheKey::channel_prices("BTC-USDT"), "prices:BTC-USDT");
        assert_eq!(CacheKey::channel_trades("BTC-USDT"), "trades:BTC-USDT");
        assert_eq!(CacheKey::channel_book("BTC-USDT"), "book:BTC-USDT");
    }
}
