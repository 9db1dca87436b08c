//! Wire frames for the `/ws` surface (4.E, 6.). Frames are plain JSON; the
//! payload carried inside a `data` frame is whatever pipe-delimited text
//! the publishing side put on the bus (4.D.1) — this layer forwards it
//! without re-parsing it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum ClientFrame {
    Subscribe { channel: String },
    Unsubscribe { channel: String },
    Ping,
}

#[derive(Debug, Serialize, Clone)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    Connected { id: String, ts: i64 },
    Data { channel: String, data: String, timestamp: i64 },
    Subscribed { channel: String },
    Unsubscribed { channel: String },
    Heartbeat { timestamp: i64 },
    Pong { ts: i64 },
    Error { code: String, message: String },
}

/// A session may only subscribe to `orders:<p>` where `p` matches its own
/// authenticated principal (4.E); bare `orders` is shorthand for that.
pub fn resolve_channel(requested: &str, principal_id: Option<Uuid>) -> Result<String, &'static str> {
    if requested == "orders" {
        return match principal_id {
            Some(id) => Ok(format!("orders:{id}")),
            None => Err("orders channel requires authentication"),
        };
    }
    if let Some(target) = requested.strip_prefix("orders:") {
        return match principal_id {
            Some(id) if target == id.to_string() => Ok(requested.to_string()),
            _ => Err("cannot subscribe to another principal's order channel"),
        };
    }
    Ok(requested.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_orders_channel_is_rewritten_to_principal() {
        let id = Uuid::new_v4();
        assert_eq!(resolve_channel("orders", Some(id)).unwrap(), format!("orders:{id}"));
    }

    #[test]
    fn mismatched_principal_order_channel_is_rejected() {
        let id = Uuid::new_v4();
        let other = Uuid::new_v4();
        assert!(resolve_channel(&format!("orders:{other}"), Some(id)).is_err());
    }

    #[test]
    fn unauthenticated_orders_subscribe_is_rejected() {
        assert!(resolve_channel("orders", None).is_err());
    }

    #[test]
    fn public_channel_passes_through() {
        assert_eq!(resolve_channel("prices:BTC-USDT", None).unwrap(), "prices:BTC-USDT");
    }
}
