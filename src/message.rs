use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::events::StreamEvent;

/// A message ready for (or already sent for) text-to-speech playback.
///
/// Immutable after construction. `audio_id` is a *weak* reference to a cache
/// artifact — the cache may evict it out from under a still-queued message,
/// which the dispatcher must treat as a fatal per-message error (SPEC_FULL §9).
#[derive(Debug, Clone)]
pub struct TtsMessage {
    pub id: Uuid,
    pub text: String,
    pub display_text: String,
    pub priority: i32,
    pub event: StreamEvent,
    pub audio_id: String,
    pub created_at: DateTime<Utc>,
}

impl TtsMessage {
    pub fn new(
        text: String,
        display_text: String,
        priority: i32,
        event: StreamEvent,
        audio_id: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            text,
            display_text,
            priority,
            event,
            audio_id,
            created_at: Utc::now(),
        }
    }

    /// Summary sent to overlay clients in the `tts_ready` event.
    pub fn to_ready_payload(&self) -> TtsReadyPayload {
        TtsReadyPayload {
            id: self.id,
            audio_id: self.audio_id.clone(),
            text: self.display_text.clone(),
            event_type: self.event.kind().as_str(),
            platform: self.event.platform().as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TtsReadyPayload {
    pub id: Uuid,
    pub audio_id: String,
    pub text: String,
    pub event_type: &'static str,
    pub platform: &'static str,
}
