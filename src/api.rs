use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;

use crate::events::{StreamEvent, Tier};
use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let tts_reachable = state.synthesizer.health_check().await;
    Json(serde_json::json!({
        "status": "ok",
        "tts_backend_reachable": tts_reachable,
    }))
}

pub async fn queue_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.dispatcher.current_status().await)
}

pub async fn queue_clear(State(state): State<AppState>) -> impl IntoResponse {
    state.dispatcher.clear().await;
    StatusCode::NO_CONTENT
}

pub async fn queue_skip(State(state): State<AppState>) -> impl IntoResponse {
    state.dispatcher.skip().await;
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum TestEventRequest {
    TwitchBits {
        #[serde(default = "default_username")]
        username: String,
        #[serde(default = "default_bits_amount")]
        amount: i64,
        #[serde(default = "default_bits_message")]
        message: String,
    },
    TwitchSub {
        #[serde(default = "default_username")]
        username: String,
        #[serde(default = "default_tier")]
        tier: String,
        #[serde(default = "default_months")]
        months: u32,
        #[serde(default)]
        message: String,
        #[serde(default)]
        is_resub: bool,
    },
    TwitchGift {
        #[serde(default = "default_username")]
        username: String,
        #[serde(default = "default_tier")]
        tier: String,
        #[serde(default = "default_count")]
        count: u32,
        #[serde(default = "default_recipient")]
        recipient: String,
    },
    YoutubeSuperchat {
        #[serde(default = "default_username")]
        username: String,
        #[serde(default = "default_superchat_amount")]
        amount: f64,
        #[serde(default = "default_currency")]
        currency: String,
        #[serde(default = "default_superchat_message")]
        message: String,
    },
    YoutubeMembership {
        #[serde(default = "default_username")]
        username: String,
        #[serde(default = "default_member_level")]
        level: String,
        #[serde(default = "default_months")]
        months: u32,
        #[serde(default)]
        is_milestone: bool,
    },
}

fn default_username() -> String {
    "TestUser".to_string()
}
fn default_bits_amount() -> i64 {
    100
}
fn default_bits_message() -> String {
    "Test cheer message!".to_string()
}
fn default_tier() -> String {
    "1000".to_string()
}
fn default_months() -> u32 {
    1
}
fn default_count() -> u32 {
    1
}
fn default_recipient() -> String {
    "LuckyViewer".to_string()
}
fn default_superchat_amount() -> f64 {
    5.00
}
fn default_currency() -> String {
    "$".to_string()
}
fn default_superchat_message() -> String {
    "Test super chat!".to_string()
}
fn default_member_level() -> String {
    "Member".to_string()
}

/// `POST /api/test` — debug-only synthetic event injection through the full
/// processing pipeline. 403 outside debug mode.
pub async fn inject_test_event(
    State(state): State<AppState>,
    Json(req): Json<TestEventRequest>,
) -> impl IntoResponse {
    if !state.config.debug {
        return StatusCode::FORBIDDEN.into_response();
    }

    let event = match req {
        TestEventRequest::TwitchBits {
            username,
            amount,
            message,
        } => StreamEvent::new_twitch_bits(username, amount, message, false, Value::Null),
        TestEventRequest::TwitchSub {
            username,
            tier,
            months,
            message,
            is_resub,
        } => StreamEvent::new_twitch_sub(
            username,
            Tier::from_provider_code(&tier),
            months,
            message,
            is_resub,
            Value::Null,
        ),
        TestEventRequest::TwitchGift {
            username,
            tier,
            count,
            recipient,
        } => StreamEvent::new_twitch_gift(
            username,
            Tier::from_provider_code(&tier),
            count,
            recipient,
            false,
            Value::Null,
        ),
        TestEventRequest::YoutubeSuperchat {
            username,
            amount,
            currency,
            message,
        } => StreamEvent::new_youtube_superchat(username, amount, currency, message, Value::Null),
        TestEventRequest::YoutubeMembership {
            username,
            level,
            months,
            is_milestone,
        } => StreamEvent::new_youtube_membership(username, level, months, is_milestone, Value::Null),
    };

    tracing::info!(kind = event.kind().as_str(), "injecting test event");
    let queued = state.processor.process(event).await;
    Json(serde_json::json!({ "queued": queued })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct TtsTestRequest {
    text: String,
}

/// `POST /api/tts/test` — debug-only: synthesize and enqueue arbitrary text
/// at priority 1, bypassing event gating/templates/profanity/sanitize.
pub async fn tts_test(
    State(state): State<AppState>,
    Json(req): Json<TtsTestRequest>,
) -> impl IntoResponse {
    if !state.config.debug {
        return StatusCode::FORBIDDEN.into_response();
    }

    if req.text.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, "text must not be empty").into_response();
    }

    let event = StreamEvent::new_twitch_bits("debug", 0, "", false, Value::Null);

    let (audio_id, _path) = match state.synthesizer.synthesize(&req.text).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("debug TTS synthesis failed: {e}");
            return (StatusCode::BAD_GATEWAY, e.to_string()).into_response();
        }
    };

    let message = crate::message::TtsMessage::new(
        req.text.clone(),
        req.text,
        1,
        event,
        audio_id,
    );
    state.queue.push(message);
    state.dispatcher.advance().await;
    StatusCode::NO_CONTENT.into_response()
}
