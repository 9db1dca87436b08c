//! Prometheus metrics for the trading backend: HTTP request latency, order
//! and trade counters, order book depth/spread gauges, cache/db timing, and
//! websocket session/publish counters (2.1's ambient metrics surface).

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Instant;

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "http_requests_in_flight";

    pub const ORDERS_SUBMITTED_TOTAL: &str = "orders_submitted_total";
    pub const ORDERS_MATCHED_TOTAL: &str = "orders_matched_total";
    pub const ORDERS_CANCELLED_TOTAL: &str = "orders_cancelled_total";
    pub const ORDERS_REJECTED_TOTAL: &str = "orders_rejected_total";
    pub const ORDER_MATCH_DURATION_SECONDS: &str = "order_match_duration_seconds";
    pub const TRADES_EXECUTED_TOTAL: &str = "trades_executed_total";
    pub const TRADE_VOLUME_QUOTE: &str = "trade_volume_quote";

    pub const ORDERBOOK_DEPTH: &str = "orderbook_depth";
    pub const ORDERBOOK_SPREAD: &str = "orderbook_spread";

    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_OPERATION_DURATION_SECONDS: &str = "cache_operation_duration_seconds";
    pub const PUBSUB_PUBLISH_FAILURES_TOTAL: &str = "pubsub_publish_failures_total";

    pub const DB_QUERY_DURATION_SECONDS: &str = "db_query_duration_seconds";
    pub const DB_CONNECTIONS_ACTIVE: &str = "db_connections_active";
    pub const DB_CONNECTIONS_IDLE: &str = "db_connections_idle";

    pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
    pub const WS_MESSAGES_SENT_TOTAL: &str = "ws_messages_sent_total";
    pub const WS_MESSAGES_RECEIVED_TOTAL: &str = "ws_messages_received_total";
    pub const WS_DISCONNECTS_TOTAL: &str = "ws_disconnects_total";
}

pub mod labels {
    pub const METHOD: &str = "method";
    pub const ENDPOINT: &str = "endpoint";
    pub const STATUS: &str = "status";
    pub const ORDER_SIDE: &str = "side";
    pub const ORDER_TYPE: &str = "order_type";
    pub const MATCH_TYPE: &str = "match_type";
    pub const SYMBOL: &str = "symbol";
    pub const CACHE_TYPE: &str = "cache_type";
    pub const OPERATION: &str = "operation";
    pub const QUERY_TYPE: &str = "query_type";
    pub const CHANNEL: &str = "channel";
}

/// Installs the Prometheus recorder; call once before anything records.
pub fn init_metrics() -> PrometheusHandle {
    let builder = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(names::HTTP_REQUEST_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0],
        )
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full(names::ORDER_MATCH_DURATION_SECONDS.to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.5],
        )
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full(names::CACHE_OPERATION_DURATION_SECONDS.to_string()),
            &[0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1],
        )
        .unwrap()
        .set_buckets_for_metric(
            Matcher::Full(names::DB_QUERY_DURATION_SECONDS.to_string()),
            &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0],
        )
        .unwrap();

    builder
        .install_recorder()
        .expect("Failed to install Prometheus recorder")
}

pub fn record_http_request(method: &str, endpoint: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    counter!(
        names::HTTP_REQUESTS_TOTAL,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status_str.clone()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        labels::METHOD => method.to_string(),
        labels::ENDPOINT => endpoint.to_string(),
        labels::STATUS => status_str
    )
    .record(duration_secs);
}

pub fn set_http_requests_in_flight(count: i64) {
    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).set(count as f64);
}

pub fn record_order_submitted(side: &str, order_type: &str) {
    counter!(
        names::ORDERS_SUBMITTED_TOTAL,
        labels::ORDER_SIDE => side.to_string(),
        labels::ORDER_TYPE => order_type.to_string()
    )
    .increment(1);
}

pub fn record_order_matched(match_type: &str) {
    counter!(names::ORDERS_MATCHED_TOTAL, labels::MATCH_TYPE => match_type.to_string()).increment(1);
}

pub fn record_order_cancelled() {
    counter!(names::ORDERS_CANCELLED_TOTAL).increment(1);
}

pub fn record_order_rejected() {
    counter!(names::ORDERS_REJECTED_TOTAL).increment(1);
}

pub fn record_order_match_duration(duration_secs: f64) {
    histogram!(names::ORDER_MATCH_DURATION_SECONDS).record(duration_secs);
}

pub fn record_trade_executed(symbol: &str, volume_quote: f64) {
    counter!(names::TRADES_EXECUTED_TOTAL, labels::SYMBOL => symbol.to_string()).increment(1);
    counter!(names::TRADE_VOLUME_QUOTE, labels::SYMBOL => symbol.to_string()).increment(volume_quote as u64);
}

pub fn set_orderbook_depth(symbol: &str, side: &str, depth: i64) {
    gauge!(
        names::ORDERBOOK_DEPTH,
        labels::SYMBOL => symbol.to_string(),
        labels::ORDER_SIDE => side.to_string()
    )
    .set(depth as f64);
}

pub fn set_orderbook_spread(symbol: &str, spread: f64) {
    gauge!(names::ORDERBOOK_SPREAD, labels::SYMBOL => symbol.to_string()).set(spread);
}

pub fn record_cache_hit(cache_type: &str) {
    counter!(names::CACHE_HITS_TOTAL, labels::CACHE_TYPE => cache_type.to_string()).increment(1);
}

pub fn record_cache_miss(cache_type: &str) {
    counter!(names::CACHE_MISSES_TOTAL, labels::CACHE_TYPE => cache_type.to_string()).increment(1);
}

pub fn record_cache_operation(cache_type: &str, operation: &str, duration_secs: f64) {
    histogram!(
        names::CACHE_OPERATION_DURATION_SECONDS,
        labels::CACHE_TYPE => cache_type.to_string(),
        labels::OPERATION => operation.to_string()
    )
    .record(duration_secs);
}

pub fn record_pubsub_publish_failure(channel: &str) {
    counter!(names::PUBSUB_PUBLISH_FAILURES_TOTAL, labels::CHANNEL => channel.to_string()).increment(1);
}

pub fn record_db_query(query_type: &str, duration_secs: f64) {
    histogram!(names::DB_QUERY_DURATION_SECONDS, labels::QUERY_TYPE => query_type.to_string()).record(duration_secs);
}

pub fn set_db_connections(active: i64, idle: i64) {
    gauge!(names::DB_CONNECTIONS_ACTIVE).set(active as f64);
    gauge!(names::DB_CONNECTIONS_IDLE).set(idle as f64);
}

pub fn set_ws_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

pub fn record_ws_message_sent() {
    counter!(names::WS_MESSAGES_SENT_TOTAL).increment(1);
}

pub fn record_ws_message_received() {
    counter!(names::WS_MESSAGES_RECEIVED_TOTAL).increment(1);
}

pub fn record_ws_disconnect() {
    counter!(names::WS_DISCONNECTS_TOTAL).increment(1);
}

pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer() {
        let timer = Timer::new();
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = timer.elapsed_secs();
        assert!(elapsed >= 0.01);
        assert!(elapsed < 0.1);
    }

    #[test]
    fn test_metric_names() {
        assert_eq!(names::HTTP_REQUESTS_TOTAL, "http_requests_total");
        assert_eq!(names::ORDERS_SUBMITTED_TOTAL, "orders_submitted_total");
        assert_eq!(names::CACHE_HITS_TOTAL, "cache_hits_total");
    }

    #[test]
    fn test_label_keys() {
        assert_eq!(labels::METHOD, "method");
        assert_eq!(labels::SYMBOL, "symbol");
        assert_eq!(labels::CACHE_TYPE, "cache_type");
    }
}
