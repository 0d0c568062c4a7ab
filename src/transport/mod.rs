pub mod audio;
pub mod ws;

use serde::Serialize;
use tokio::sync::broadcast;

use crate::message::TtsReadyPayload;

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitsPayload {
    pub twitch: u32,
    pub youtube: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueUpdatePayload {
    pub size: usize,
    pub max_size: usize,
    pub current: Option<TtsReadyPayload>,
    pub rate_limits: RateLimitsPayload,
}

/// Outbound events fanned out to every connected overlay client (SPEC_FULL §6).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum OutboundEvent {
    TtsReady(TtsReadyPayload),
    Skip,
    QueueUpdate(QueueUpdatePayload),
}

/// Fan-out broadcaster for outbound transport events. Each connected
/// WebSocket subscribes and forwards everything it receives to its client.
pub struct Outbound {
    sender: broadcast::Sender<OutboundEvent>,
}

impl Outbound {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OutboundEvent> {
        self.sender.subscribe()
    }

    pub async fn broadcast(&self, event: OutboundEvent) {
        // No receivers (no overlay connected) is a normal, silent case.
        let _ = self.sender.send(event);
    }
}

impl Default for Outbound {
    fn default() -> Self {
        Self::new()
    }
}
