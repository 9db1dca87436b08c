//! Session Hub (4.E): tracks active sessions and the `channel -> set<session>`
//! map, bridges channels lazily to the Pub/Sub Bridge (4.D), and fans
//! `deliver`ed payloads out to subscribed sessions under a write deadline.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::cache::EventBus;
use crate::websocket::channels::ServerFrame;

struct Session {
    sender: mpsc::UnboundedSender<ServerFrame>,
    principal_id: Option<Uuid>,
}

struct ChannelBridge {
    subscribers: HashSet<Uuid>,
    listener: JoinHandle<()>,
}

pub struct SessionHub {
    bus: Arc<dyn EventBus>,
    sessions: Arc<DashMap<Uuid, Session>>,
    channels: Arc<DashMap<String, ChannelBridge>>,
    ceiling: usize,
    write_deadline: Duration,
    disconnects: AtomicU64,
}

impl SessionHub {
    pub fn new(bus: Arc<dyn EventBus>, ceiling: usize, write_deadline: Duration) -> Self {
        Self {
            bus,
            sessions: Arc::new(DashMap::new()),
            channels: Arc::new(DashMap::new()),
            ceiling,
            write_deadline,
            disconnects: AtomicU64::new(0),
        }
    }

    pub fn write_deadline(&self) -> Duration {
        self.write_deadline
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Admits a session unless the hub is at capacity; returns its id and a
    /// frame receiver the caller's write loop should drain.
    pub fn connect(
        &self,
        principal_id: Option<Uuid>,
    ) -> Result<(Uuid, mpsc::UnboundedReceiver<ServerFrame>), &'static str> {
        if self.sessions.len() >= self.ceiling {
            return Err("too many active websocket sessions");
        }
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        self.sessions.insert(id, Session { sender: tx, principal_id });
        crate::metrics::set_ws_connections(self.active_sessions() as i64);
        Ok((id, rx))
    }

    pub fn disconnect(&self, session_id: Uuid) {
        if self.sessions.remove(&session_id).is_none() {
            return;
        }
        for mut entry in self.channels.iter_mut() {
            entry.subscribers.remove(&session_id);
        }
        self.channels.retain(|_, bridge| {
            if bridge.subscribers.is_empty() {
                bridge.listener.abort();
                false
            } else {
                true
            }
        });
        crate::metrics::set_ws_connections(self.active_sessions() as i64);
    }

    pub async fn subscribe(&self, session_id: Uuid, channel: &str) -> Result<(), &'static str> {
        if !self.sessions.contains_key(&session_id) {
            return Err("unknown session");
        }
        if !self.channels.contains_key(channel) {
            let rx = self
                .bus
                .subscribe(channel)
                .await
                .map_err(|_| "pub/sub bridge unavailable")?;
            let hub_channel = channel.to_string();
            let sessions = self.sessions.clone();
            let channels = self.channels.clone();
            let listener = tokio::spawn(Self::relay(hub_channel, rx, sessions, channels));
            self.channels.insert(
                channel.to_string(),
                ChannelBridge { subscribers: HashSet::new(), listener },
            );
        }
        self.channels.get_mut(channel).unwrap().subscribers.insert(session_id);
        Ok(())
    }

    pub fn unsubscribe(&self, session_id: Uuid, channel: &str) {
        if let Some(mut bridge) = self.channels.get_mut(channel) {
            bridge.subscribers.remove(&session_id);
        }
        self.channels.retain(|_, bridge| {
            if bridge.subscribers.is_empty() {
                bridge.listener.abort();
                false
            } else {
                true
            }
        });
    }

    /// Fans a channel's broadcast payloads out to only the sessions still
    /// listed in that channel's `ChannelBridge.subscribers` at delivery
    /// time — looked up fresh on every message rather than against a
    /// point-in-time snapshot, so a session that subscribes after this
    /// task starts still receives it, and one that unsubscribes or
    /// disconnects stops receiving it immediately.
    async fn relay(
        channel: String,
        mut rx: tokio::sync::broadcast::Receiver<String>,
        sessions: Arc<DashMap<Uuid, Session>>,
        channels: Arc<DashMap<String, ChannelBridge>>,
    ) {
        loop {
            match rx.recv().await {
                Ok(payload) => {
                    let Some(bridge) = channels.get(&channel) else { return };
                    let frame = ServerFrame::Data {
                        channel: channel.clone(),
                        data: payload,
                        timestamp: chrono::Utc::now().timestamp_millis(),
                    };
                    for subscriber in bridge.subscribers.iter() {
                        if let Some(session) = sessions.get(subscriber) {
                            let _ = session.sender.send(frame.clone());
                        }
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(channel = %channel, skipped = n, "session hub relay lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    /// Sends `{heartbeat, ts}` to every session; called on a fixed interval
    /// from the process's background-loop set.
    pub fn broadcast_heartbeat(&self) {
        let frame = ServerFrame::Heartbeat { timestamp: chrono::Utc::now().timestamp_millis() };
        for entry in self.sessions.iter() {
            let _ = entry.value().sender.send(frame.clone());
        }
    }

    pub fn principal_of(&self, session_id: Uuid) -> Option<Uuid> {
        self.sessions.get(&session_id).and_then(|s| s.principal_id)
    }

    pub fn note_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
        crate::metrics::record_ws_disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryBus;

    #[tokio::test]
    async fn connect_respects_ceiling() {
        let hub = SessionHub::new(Arc::new(InMemoryBus::new()), 1, Duration::from_secs(5));
        assert!(hub.connect(None).is_ok());
        assert!(hub.connect(None).is_err());
    }

    #[tokio::test]
    async fn subscribe_and_deliver_round_trip() {
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
        let hub = SessionHub::new(bus.clone(), 10, Duration::from_secs(5));
        let (id, mut rx) = hub.connect(None).unwrap();
        hub.subscribe(id, "prices:BTC-USDT").await.unwrap();
        bus.publish("prices:BTC-USDT", "100|99|101|2026-01-01T00:00:00Z".to_string())
            .await
            .unwrap();
        let frame = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap()
            .unwrap();
        matches!(frame, ServerFrame::Data { .. });
    }

    #[tokio::test]
    async fn relay_only_delivers_to_subscribed_sessions() {
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
        let hub = SessionHub::new(bus.clone(), 10, Duration::from_secs(5));

        // present when the channel's bridge is first created, but never subscribes
        let (_bystander_id, mut bystander_rx) = hub.connect(None).unwrap();

        let (subscriber_id, mut subscriber_rx) = hub.connect(None).unwrap();
        hub.subscribe(subscriber_id, "prices:BTC-USDT").await.unwrap();

        // joins after the relay task is already running
        let (late_id, mut late_rx) = hub.connect(None).unwrap();
        hub.subscribe(late_id, "prices:BTC-USDT").await.unwrap();

        bus.publish("prices:BTC-USDT", "100|99|101|2026-01-01T00:00:00Z".to_string())
            .await
            .unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(1), subscriber_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(frame, ServerFrame::Data { .. }));

        let frame = tokio::time::timeout(Duration::from_secs(1), late_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(frame, ServerFrame::Data { .. }));

        assert!(tokio::time::timeout(Duration::from_millis(100), bystander_rx.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn unsubscribed_session_stops_receiving() {
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
        let hub = SessionHub::new(bus.clone(), 10, Duration::from_secs(5));
        let (id, mut rx) = hub.connect(None).unwrap();
        hub.subscribe(id, "prices:BTC-USDT").await.unwrap();
        hub.unsubscribe(id, "prices:BTC-USDT");

        bus.publish("prices:BTC-USDT", "100|99|101|2026-01-01T00:00:00Z".to_string())
            .await
            .unwrap();

        assert!(tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn disconnect_clears_subscriptions() {
        let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());
        let hub = SessionHub::new(bus, 10, Duration::from_secs(5));
        let (id, _rx) = hub.connect(None).unwrap();
        hub.subscribe(id, "trades:BTC-USDT").await.unwrap();
        hub.disconnect(id);
        assert_eq!(hub.active_sessions(), 0);
        assert!(hub.channels.is_empty());
    }
}
