use std::sync::Arc;

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::duplicate::DuplicateDetector;
use crate::events::{EventData, EventKind, Platform, StreamEvent};
use crate::message::TtsMessage;
use crate::queue::PriorityQueue;
use crate::ratelimit::RateLimiter;
use crate::templates;
use crate::tts::Synthesizer;

/// Turns normalized stream events into queued TTS messages: enable/threshold
/// gating, template rendering, profanity/sanitize cleanup, synthesis, and
/// enqueue — mirroring the original processor's single `process_event` entry
/// point.
pub struct EventProcessor {
    config: Config,
    synthesizer: Arc<Synthesizer>,
    queue: Arc<PriorityQueue>,
    dispatcher: Arc<Dispatcher>,
    duplicate_detector: DuplicateDetector,
    twitch_rate_limiter: Arc<RateLimiter>,
    youtube_rate_limiter: Arc<RateLimiter>,
}

impl EventProcessor {
    pub fn new(
        config: Config,
        synthesizer: Arc<Synthesizer>,
        queue: Arc<PriorityQueue>,
        dispatcher: Arc<Dispatcher>,
        twitch_rate_limiter: Arc<RateLimiter>,
        youtube_rate_limiter: Arc<RateLimiter>,
    ) -> Self {
        let duplicate_detector = DuplicateDetector::new(config.queue.duplicate_window_secs);
        Self {
            config,
            synthesizer,
            queue,
            dispatcher,
            duplicate_detector,
            twitch_rate_limiter,
            youtube_rate_limiter,
        }
    }

    /// Process one event end to end. Returns `true` if it was queued.
    pub async fn process(&self, event: StreamEvent) -> bool {
        if !self.is_enabled(&event) {
            tracing::debug!(kind = event.kind().as_str(), "event type disabled");
            return false;
        }

        if !self.meets_threshold(&event) {
            tracing::debug!(kind = event.kind().as_str(), "event below threshold");
            return false;
        }

        let text = match templates::render(
            &event,
            &self.config.templates,
            &self.config.twitch,
            &self.config.youtube,
        ) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(event_id = %event.id, "failed to format message: {e}");
                return false;
            }
        };

        let text = if self.config.tts.profanity_filter {
            templates::censor(&text)
        } else {
            text
        };
        // Truncation to `max_length` happens inside `Synthesizer::synthesize`
        // itself (every caller gets it, including the debug TTS test route) —
        // the message text recorded here intentionally stays untruncated.
        let text = templates::sanitize(&text);

        if self.duplicate_detector.is_duplicate(&text) {
            tracing::debug!("rejected duplicate message");
            return false;
        }

        let platform_key = event.platform().as_str();
        let allowed = match event.platform() {
            Platform::Twitch => self.twitch_rate_limiter.is_allowed(platform_key),
            Platform::YouTube => self.youtube_rate_limiter.is_allowed(platform_key),
        };
        if !allowed {
            tracing::warn!(platform = platform_key, "rate limit exceeded");
            return false;
        }

        let priority = event.priority(&self.config.priority);

        let (audio_id, _path) = match self.synthesizer.synthesize(&text).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("TTS generation failed: {e}");
                return false;
            }
        };

        let message = TtsMessage::new(text.clone(), text, priority, event, audio_id);
        let queued = self.queue.push(message);
        self.dispatcher.advance().await;
        queued
    }

    fn is_enabled(&self, event: &StreamEvent) -> bool {
        match event.kind() {
            EventKind::TwitchBits => self.config.twitch.bits_enabled,
            EventKind::TwitchSubNew | EventKind::TwitchSubResub => self.config.twitch.subs_enabled,
            EventKind::TwitchGiftSingle | EventKind::TwitchGiftMulti => {
                self.config.twitch.gift_subs_enabled
            }
            EventKind::TwitchChannelPoints => self.config.twitch.channel_points_enabled,
            EventKind::YoutubeSuperchat => self.config.youtube.superchat_enabled,
            EventKind::YoutubeSupersticker => self.config.youtube.supersticker_enabled,
            EventKind::YoutubeMembershipNew => self.config.youtube.membership_enabled,
            EventKind::YoutubeMembershipMilestone => {
                self.config.youtube.membership_milestone_enabled
            }
        }
    }

    fn meets_threshold(&self, event: &StreamEvent) -> bool {
        match &event.data {
            EventData::TwitchBits(b) => b.amount >= self.config.twitch.bits_minimum,
            EventData::TwitchGiftMulti(g) => g.count >= self.config.twitch.gift_subs_minimum,
            EventData::TwitchGiftSingle(_) => 1 >= self.config.twitch.gift_subs_minimum,
            EventData::TwitchChannelPoints(c) => {
                let rewards = &self.config.twitch.channel_points_rewards;
                rewards.is_empty() || rewards.contains(&c.reward_id)
            }
            EventData::YoutubeSuperchat(s) => {
                let cents = (s.amount * 100.0).round() as i64;
                cents >= self.config.youtube.superchat_minimum_cents
            }
            EventData::YoutubeSupersticker(s) => {
                let cents = (s.amount * 100.0).round() as i64;
                cents >= self.config.youtube.superchat_minimum_cents
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn base_config() -> Config {
        toml::from_str(
            r#"
            [server]
            host = "127.0.0.1"
            port = 8080

            [tts]
            backend_host = "127.0.0.1"
            backend_port = 10200
        "#,
        )
        .unwrap()
    }

    #[test]
    fn bits_below_minimum_fails_threshold() {
        let config = base_config();
        let event = StreamEvent::new_twitch_bits("Bob", 10, "", false, Value::Null);
        let processor_meets = {
            // mirror meets_threshold logic without constructing a full processor
            event_meets_threshold_for_test(&config, &event)
        };
        assert!(!processor_meets);
    }

    fn event_meets_threshold_for_test(config: &Config, event: &StreamEvent) -> bool {
        match &event.data {
            EventData::TwitchBits(b) => b.amount >= config.twitch.bits_minimum,
            _ => true,
        }
    }
}
