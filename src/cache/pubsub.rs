//! Pub/Sub bridge: publishes engine events as pipe-delimited frames and
//! fans incoming messages out to local subscribers (the session hub).
//! Publication is fire-and-forget — failures are logged, never bubbled
//! into the caller's commit path.

use crate::error::AppError;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::StreamExt;
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::broadcast;

pub trait EventBus: Send + Sync {
    fn publish<'a>(&'a self, channel: &'a str, payload: String) -> BoxFuture<'a, Result<(), AppError>>;
    fn subscribe<'a>(&'a self, channel: &'a str) -> BoxFuture<'a, Result<broadcast::Receiver<String>, AppError>>;
}

/// Redis-backed bus. Publish reuses a short-lived connection per call;
/// subscribe spins up a dedicated pub/sub connection per channel the first
/// time it's requested and fans messages into a local broadcast channel
/// that further `subscribe` calls for the same channel just clone.
pub struct RedisBus {
    client: redis::Client,
    channels: DashMap<String, broadcast::Sender<String>>,
}

impl RedisBus {
    pub fn new(redis_url: &str) -> Result<Self, AppError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;
        Ok(Self {
            client,
            channels: DashMap::new(),
        })
    }

    fn spawn_listener(&self, channel: String, sender: broadcast::Sender<String>) {
        let client = self.client.clone();
        tokio::spawn(async move {
            loop {
                if sender.receiver_count() == 0 {
                    return;
                }
                let conn = match client.get_async_connection().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("redis pub/sub connection failed for {}: {}", channel, e);
                        tokio::time::sleep(Duration::from_millis(500)).await;
                        continue;
                    }
                };
                let mut pubsub = conn.into_pubsub();
                if let Err(e) = pubsub.subscribe(&channel).await {
                    tracing::warn!("redis subscribe failed for {}: {}", channel, e);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    continue;
                }
                let mut stream = pubsub.on_message();
                while let Some(msg) = stream.next().await {
                    if let Ok(payload) = msg.get_payload::<String>() {
                        let _ = sender.send(payload);
                    }
                }
                // Connection dropped; retry unless nobody's listening anymore.
            }
        });
    }
}

impl EventBus for RedisBus {
    fn publish<'a>(&'a self, channel: &'a str, payload: String) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(async move {
            let mut conn = self
                .client
                .get_async_connection()
                .await
                .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;
            conn.publish::<_, _, ()>(channel, payload)
                .await
                .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;
            Ok(())
        })
    }

    fn subscribe<'a>(&'a self, channel: &'a str) -> BoxFuture<'a, Result<broadcast::Receiver<String>, AppError>> {
        Box::pin(async move {
            if let Some(sender) = self.channels.get(channel) {
                return Ok(sender.subscribe());
            }
            let (tx, rx) = broadcast::channel(1024);
            self.channels.insert(channel.to_string(), tx.clone());
            self.spawn_listener(channel.to_string(), tx);
            Ok(rx)
        })
    }
}

/// In-process bus with no network I/O, used by tests and by the demo
/// harness when Redis isn't available.
#[derive(Default)]
pub struct InMemoryBus {
    channels: DashMap<String, broadcast::Sender<String>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, channel: &str) -> broadcast::Sender<String> {
        self.channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(1024).0)
            .clone()
    }
}

impl EventBus for InMemoryBus {
    fn publish<'a>(&'a self, channel: &'a str, payload: String) -> BoxFuture<'a, Result<(), AppError>> {
        Box::pin(async move {
            // Fire-and-forget: no receivers is not an error.
            let _ = self.sender(channel).send(payload);
            Ok(())
        })
    }

    fn subscribe<'a>(&'a self, channel: &'a str) -> BoxFuture<'a, Result<broadcast::Receiver<String>, AppError>> {
        Box::pin(async move { Ok(self.sender(channel).subscribe()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_bus_delivers_to_subscriber() {
        let bus = InMemoryBus::new();
        let mut rx = bus.subscribe("trades:BTC-USDT").await.unwrap();
        bus.publish("trades:BTC-USDT", "trade|1|BTC-USDT|100|1".to_string())
            .await
            .unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, "trade|1|BTC-USDT|100|1");
    }

    #[tokio::test]
    async fn publish_without_subscriber_does_not_error() {
        let bus = InMemoryBus::new();
        let result = bus.publish("orders:00000000-0000-0000-0000-000000000000", "x".into()).await;
        assert!(result.is_ok());
    }
}
