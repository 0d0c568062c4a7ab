use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use crate::AppState;

/// Inbound messages accepted from overlay clients on `/overlay/ws`.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
enum InboundEvent {
    PlayComplete { id: Uuid },
    Error { id: Uuid, #[allow(dead_code)] error: Option<String> },
    Ready {},
}

pub async fn handle_overlay_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_overlay_socket(socket, state))
}

async fn handle_overlay_socket(mut socket: WebSocket, state: AppState) {
    tracing::info!("overlay client connected");
    let mut events = state.outbound.subscribe();

    // Bring a newly-connected client up to date immediately.
    let snapshot = state.dispatcher.current_status().await;
    let payload = serde_json::to_string(&crate::transport::OutboundEvent::QueueUpdate(snapshot));
    if let Ok(payload) = payload {
        if socket.send(Message::Text(payload.into())).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::info!("overlay client disconnected");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!("overlay websocket error: {e}");
                        break;
                    }
                    _ => continue,
                };

                match serde_json::from_str::<InboundEvent>(&text) {
                    Ok(InboundEvent::PlayComplete { id }) => {
                        state.dispatcher.play_complete(id).await;
                        state.dispatcher.notify_queue_update().await;
                    }
                    Ok(InboundEvent::Error { id, .. }) => {
                        tracing::warn!(%id, "overlay reported playback error");
                        state.dispatcher.playback_error(id).await;
                        state.dispatcher.notify_queue_update().await;
                    }
                    Ok(InboundEvent::Ready {}) => {
                        tracing::debug!("overlay reported ready");
                    }
                    Err(e) => {
                        tracing::warn!("failed to parse inbound overlay event: {e}");
                    }
                }
            }

            outgoing = events.recv() => {
                match outgoing {
                    Ok(event) => {
                        if let Ok(payload) = serde_json::to_string(&event) {
                            if socket.send(Message::Text(payload.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "overlay client lagged behind broadcast");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}
