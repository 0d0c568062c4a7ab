use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::message::TtsMessage;
use crate::queue::PriorityQueue;
use crate::ratelimit::RateLimiter;
use crate::transport::{Outbound, OutboundEvent};
use crate::tts::Synthesizer;

/// Single-message-in-flight state machine sitting between the priority queue
/// and the outbound transport. At most one message is PENDING at a time.
pub struct Dispatcher {
    queue: Arc<PriorityQueue>,
    rate_limiters: RateLimiters,
    outbound: Arc<Outbound>,
    synthesizer: Arc<Synthesizer>,
    current: AsyncMutex<Option<TtsMessage>>,
}

pub struct RateLimiters {
    pub twitch: Arc<RateLimiter>,
    pub youtube: Arc<RateLimiter>,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<PriorityQueue>,
        rate_limiters: RateLimiters,
        outbound: Arc<Outbound>,
        synthesizer: Arc<Synthesizer>,
    ) -> Self {
        Self {
            queue,
            rate_limiters,
            outbound,
            synthesizer,
            current: AsyncMutex::new(None),
        }
    }

    /// Must be called after every enqueue (SPEC_FULL §4.7): if IDLE, tries to
    /// pull the next message and send it. The cache may have evicted a
    /// message's artifact between enqueue and dispatch; such messages are
    /// dropped with a logged warning rather than sent to the overlay.
    ///
    /// Never holds the `current` lock and the queue's lock at the same time
    /// (SPEC_FULL §5: one component lock at a time) — the queue is drained
    /// first with `current` unlocked, and `current` is only (re-)locked to
    /// either install the chosen message or, on a rare race with another
    /// `advance()` call, push it back onto the queue.
    pub async fn advance(&self) {
        {
            let current = self.current.lock().await;
            if current.is_some() {
                return;
            }
        }

        let mut next = None;
        while let Some(message) = self.queue.pop() {
            if self.synthesizer.path_for(&message.audio_id).is_none() {
                tracing::warn!(
                    message_id = %message.id,
                    audio_id = %message.audio_id,
                    "cache artifact missing at dispatch time, dropping message"
                );
                continue;
            }
            next = Some(message);
            break;
        }

        if let Some(message) = next {
            let mut current = self.current.lock().await;
            if current.is_some() {
                drop(current);
                self.queue.push(message);
            } else {
                self.outbound
                    .broadcast(OutboundEvent::TtsReady(message.to_ready_payload()))
                    .await;
                *current = Some(message);
            }
        }

        self.notify_queue_update().await;
    }

    /// `play_complete{id}` from a client. Stale acks (wrong id) are ignored.
    pub async fn play_complete(&self, id: Uuid) {
        let became_idle = {
            let mut current = self.current.lock().await;
            match current.as_ref() {
                Some(m) if m.id == id => {
                    *current = None;
                    true
                }
                _ => false,
            }
        };
        if became_idle {
            self.advance().await;
        }
    }

    /// `error{id}` from a client — treated as a completion to avoid stalling
    /// the dispatcher on a client-side playback failure.
    pub async fn playback_error(&self, id: Uuid) {
        self.play_complete(id).await;
    }

    /// Operator/admin `skip` command: drop the current message unconditionally.
    pub async fn skip(&self) {
        {
            let mut current = self.current.lock().await;
            *current = None;
        }
        self.outbound.broadcast(OutboundEvent::Skip).await;
        self.advance().await;
    }

    /// Operator/admin `clear` command: drain the queue, leaving any currently
    /// PENDING message alone.
    pub async fn clear(&self) {
        self.queue.clear();
        self.notify_queue_update().await;
    }

    /// Snapshots `current` (dropping its lock before touching the queue or
    /// the rate limiters) and broadcasts a `queue_update` event.
    pub async fn notify_queue_update(&self) {
        let payload = self.current_status().await;
        self.outbound
            .broadcast(OutboundEvent::QueueUpdate(payload))
            .await;
    }

    pub async fn current_status(&self) -> crate::transport::QueueUpdatePayload {
        let current_payload = {
            let current = self.current.lock().await;
            current.as_ref().map(|m| m.to_ready_payload())
        };
        let status = self.queue.status();
        crate::transport::QueueUpdatePayload {
            size: status.size,
            max_size: status.max_size,
            current: current_payload,
            rate_limits: crate::transport::RateLimitsPayload {
                twitch: self.rate_limiters.twitch.remaining("twitch"),
                youtube: self.rate_limiters.youtube.remaining("youtube"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, TtsConfig};
    use crate::events::StreamEvent;
    use serde_json::Value;

    fn make_synthesizer(dir: &std::path::Path) -> Arc<Synthesizer> {
        let tts = TtsConfig {
            backend_host: "127.0.0.1".to_string(),
            backend_port: 0,
            voice: "test".to_string(),
            speed: 1.0,
            max_length: 300,
            profanity_filter: false,
        };
        let cache = CacheConfig {
            path: dir.to_path_buf(),
            max_size_mb: 100,
            ttl_hours: 24,
        };
        Arc::new(Synthesizer::new(&tts, cache).unwrap())
    }

    /// Drops a stand-in artifact at the cache path so `Dispatcher::advance`
    /// treats this message's `audio_id` as still present.
    fn make_message(priority: i32, audio_id: &str, dir: &std::path::Path) -> TtsMessage {
        std::fs::write(dir.join(format!("{audio_id}.wav")), b"fake").unwrap();
        let event = StreamEvent::new_twitch_bits("Bob", 1, "", false, Value::Null);
        TtsMessage::new(
            "text".to_string(),
            "text".to_string(),
            priority,
            event,
            audio_id.to_string(),
        )
    }

    fn make_dispatcher(dir: &std::path::Path) -> Dispatcher {
        let queue = Arc::new(PriorityQueue::new(10));
        let outbound = Arc::new(Outbound::new());
        let synthesizer = make_synthesizer(dir);
        let rate_limiters = RateLimiters {
            twitch: Arc::new(RateLimiter::new(30, 60)),
            youtube: Arc::new(RateLimiter::new(30, 60)),
        };
        Dispatcher::new(queue, rate_limiters, outbound, synthesizer)
    }

    #[tokio::test]
    async fn stale_ack_ignored_then_correct_ack_advances() {
        // S6: a `play_complete` for a message that isn't PENDING is ignored;
        // the correct ack transitions IDLE and immediately polls the next message.
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = make_dispatcher(dir.path());

        let m1 = make_message(5, "aaaaaaaa", dir.path());
        let m1_id = m1.id;
        let m2 = make_message(3, "bbbbbbbb", dir.path());
        let m2_id = m2.id;

        dispatcher.queue.push(m1);
        dispatcher.queue.push(m2);
        dispatcher.advance().await;

        {
            let current = dispatcher.current.lock().await;
            assert_eq!(current.as_ref().unwrap().id, m1_id);
        }

        let unrelated_id = Uuid::new_v4();
        dispatcher.play_complete(unrelated_id).await;
        {
            let current = dispatcher.current.lock().await;
            assert_eq!(
                current.as_ref().unwrap().id,
                m1_id,
                "stale ack must not clear the PENDING message"
            );
        }

        dispatcher.play_complete(m1_id).await;
        {
            let current = dispatcher.current.lock().await;
            assert_eq!(current.as_ref().unwrap().id, m2_id);
        }
    }

    #[tokio::test]
    async fn at_most_one_message_pending_at_a_time() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = make_dispatcher(dir.path());

        let m1 = make_message(5, "cccccccc", dir.path());
        let m2 = make_message(5, "dddddddd", dir.path());

        dispatcher.queue.push(m1);
        dispatcher.queue.push(m2);

        dispatcher.advance().await;
        // Already PENDING: a second advance() must not also pull m2.
        dispatcher.advance().await;

        assert_eq!(dispatcher.queue.status().size, 1);
    }

    #[tokio::test]
    async fn missing_artifact_is_dropped_at_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = make_dispatcher(dir.path());

        // No file written for this audio_id: the artifact is "missing".
        let event = StreamEvent::new_twitch_bits("Bob", 1, "", false, Value::Null);
        let missing = TtsMessage::new(
            "text".to_string(),
            "text".to_string(),
            5,
            event,
            "eeeeeeee".to_string(),
        );
        let present = make_message(3, "ffffffff", dir.path());
        let present_id = present.id;

        dispatcher.queue.push(missing);
        dispatcher.queue.push(present);
        dispatcher.advance().await;

        let current = dispatcher.current.lock().await;
        assert_eq!(current.as_ref().unwrap().id, present_id);
    }
}
