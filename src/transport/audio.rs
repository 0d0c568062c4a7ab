use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::AppState;

/// `GET /audio/:audio_id` — serves cached WAV bytes. Rejects any id containing
/// a path separator or `..` before it ever touches the filesystem.
pub async fn handle_get_audio(
    Path(audio_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if !is_safe_audio_id(&audio_id) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match state.synthesizer.path_for(&audio_id) {
        Some(path) => match tokio::fs::read(&path).await {
            Ok(bytes) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "audio/wav")],
                bytes,
            )
                .into_response(),
            Err(e) => {
                tracing::warn!("failed to read cached audio {}: {e}", path.display());
                StatusCode::NOT_FOUND.into_response()
            }
        },
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

fn is_safe_audio_id(id: &str) -> bool {
    !id.is_empty()
        && !id.contains('/')
        && !id.contains('\\')
        && !id.contains("..")
        && id.chars().all(|c| c.is_ascii_alphanumeric())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_traversal_attempts() {
        assert!(!is_safe_audio_id("../../etc/passwd"));
        assert!(!is_safe_audio_id("a/b"));
        assert!(!is_safe_audio_id("a\\b"));
        assert!(!is_safe_audio_id(""));
    }

    #[test]
    fn accepts_hex_ids() {
        assert!(is_safe_audio_id("0123456789abcdef"));
    }
}
