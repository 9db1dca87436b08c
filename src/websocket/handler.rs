//! `/ws` connection handler: upgrades a socket into a Session Hub session
//! (4.E), relays frames produced by `SessionHub::connect`'s receiver to the
//! socket under a write deadline, and applies inbound `subscribe` /
//! `unsubscribe` / `ping` frames (6.).

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::jwt::validate_token;
use crate::websocket::channels::{resolve_channel, ClientFrame, ServerFrame};
use crate::AppState;

pub async fn handle_socket(socket: WebSocket, state: Arc<AppState>, bearer: Option<String>) {
    let principal_id = bearer.as_deref().and_then(|token| {
        validate_token(token, &state.config.jwt_secret)
            .ok()
            .and_then(|claims| Uuid::parse_str(&claims.sub).ok())
    });

    let (session_id, mut frames) = match state.session_hub.connect(principal_id) {
        Ok(pair) => pair,
        Err(reason) => {
            tracing::warn!("websocket connect refused: {reason}");
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let connected = ServerFrame::Connected {
        id: session_id.to_string(),
        ts: chrono::Utc::now().timestamp_millis(),
    };
    let deadline = state.session_hub.write_deadline();
    if send(&mut sink, &connected, deadline).await.is_err() {
        state.session_hub.disconnect(session_id);
        return;
    }

    loop {
        tokio::select! {
            frame = frames.recv() => {
                match frame {
                    Some(frame) => {
                        if send(&mut sink, &frame, deadline).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        crate::metrics::record_ws_message_received();
                        if let Some(reply) = handle_client_frame(&state, session_id, principal_id, &text).await {
                            if send(&mut sink, &reply, deadline).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::warn!("websocket session {} disconnected: {}", session_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    state.session_hub.disconnect(session_id);
    state.session_hub.note_disconnect();
}

async fn send(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    frame: &ServerFrame,
    deadline: std::time::Duration,
) -> Result<(), ()> {
    let text = serde_json::to_string(frame).map_err(|_| ())?;
    match tokio::time::timeout(deadline, sink.send(Message::Text(text))).await {
        Ok(Ok(())) => {
            crate::metrics::record_ws_message_sent();
            Ok(())
        }
        _ => Err(()),
    }
}

async fn handle_client_frame(
    state: &Arc<AppState>,
    session_id: Uuid,
    principal_id: Option<Uuid>,
    text: &str,
) -> Option<ServerFrame> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            return Some(ServerFrame::Error {
                code: "INVALID_FRAME".to_string(),
                message: e.to_string(),
            })
        }
    };

    match frame {
        ClientFrame::Ping => Some(ServerFrame::Pong { ts: chrono::Utc::now().timestamp_millis() }),
        ClientFrame::Subscribe { channel } => match resolve_channel(&channel, principal_id) {
            Ok(resolved) => match state.session_hub.subscribe(session_id, &resolved).await {
                Ok(()) => Some(ServerFrame::Subscribed { channel: resolved }),
                Err(reason) => Some(ServerFrame::Error {
                    code: "SUBSCRIBE_FAILED".to_string(),
                    message: reason.to_string(),
                }),
            },
            Err(reason) => Some(ServerFrame::Error {
                code: "FORBIDDEN_CHANNEL".to_string(),
                message: reason.to_string(),
            }),
        },
        ClientFrame::Unsubscribe { channel } => {
            let resolved = resolve_channel(&channel, principal_id).unwrap_or(channel);
            state.session_hub.unsubscribe(session_id, &resolved);
            Some(ServerFrame::Unsubscribed { channel: resolved })
        }
    }
}
