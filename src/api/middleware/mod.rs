//! API Middleware
//!
//! Contains middleware for:
//! - HTTP metrics recording
//! - Request logging (order-submission rate limiting lives in
//!   `auth::rate_limit`, layered directly onto the order route)

pub mod metrics;

pub use metrics::metrics_middleware;
