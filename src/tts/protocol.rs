use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum TtsError {
    #[error("cannot connect to TTS backend at {host}:{port}: {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("TTS request timed out")]
    Timeout,
    #[error("TTS backend closed the connection unexpectedly")]
    ConnectionClosed,
    #[error("TTS backend protocol error: {0}")]
    Protocol(String),
    #[error("TTS backend returned an error: {0}")]
    Backend(String),
    #[error("TTS backend returned no audio data")]
    NoAudio,
    #[error("text is empty")]
    EmptyText,
}

#[derive(Serialize)]
struct SynthesizeData<'a> {
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    voice: Option<VoiceSpec<'a>>,
}

#[derive(Serialize)]
struct VoiceSpec<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    data: SynthesizeData<'a>,
}

#[derive(Deserialize)]
struct BackendEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload_length: usize,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Client for the length-prefixed JSON event protocol the TTS backend speaks
/// (a Wyoming-style wire format: an ASCII byte length, a newline, then that
/// many bytes of JSON header; `audio-chunk` headers are followed by a raw PCM
/// payload of `payload_length` bytes).
pub struct TtsProtocolClient {
    host: String,
    port: u16,
}

impl TtsProtocolClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Synthesize `text` and return raw 16-bit PCM samples (mono, 22050 Hz).
    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<i16>, TtsError> {
        if text.trim().is_empty() {
            return Err(TtsError::EmptyText);
        }

        timeout(REQUEST_TIMEOUT, self.synthesize_inner(text, voice))
            .await
            .map_err(|_| TtsError::Timeout)?
    }

    async fn synthesize_inner(&self, text: &str, voice: Option<&str>) -> Result<Vec<i16>, TtsError> {
        let mut stream =
            TcpStream::connect((self.host.as_str(), self.port))
                .await
                .map_err(|e| TtsError::Connect {
                    host: self.host.clone(),
                    port: self.port,
                    source: e,
                })?;

        let request = SynthesizeRequest {
            kind: "synthesize",
            data: SynthesizeData {
                text,
                voice: voice.map(|name| VoiceSpec { name }),
            },
        };
        send_event(&mut stream, &request).await?;

        let mut reader = BufReader::new(stream);
        let mut raw = Vec::new();

        loop {
            let event = match receive_event(&mut reader).await? {
                Some(e) => e,
                None => return Err(TtsError::ConnectionClosed),
            };

            match event.kind.as_str() {
                "audio-chunk" => {
                    if event.payload_length > 0 {
                        let mut buf = vec![0u8; event.payload_length];
                        reader
                            .read_exact(&mut buf)
                            .await
                            .map_err(|_| TtsError::ConnectionClosed)?;
                        raw.extend_from_slice(&buf);
                    }
                }
                "audio-stop" => break,
                "error" => {
                    let msg = event
                        .data
                        .as_ref()
                        .and_then(|d| d.get("text"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error")
                        .to_string();
                    return Err(TtsError::Backend(msg));
                }
                other => {
                    return Err(TtsError::Protocol(format!("unexpected event type '{other}'")));
                }
            }
        }

        if raw.is_empty() {
            return Err(TtsError::NoAudio);
        }

        Ok(bytes_to_pcm(&raw))
    }

    /// Probe connectivity to the backend without synthesizing anything.
    pub async fn health_check(&self) -> bool {
        timeout(
            Duration::from_secs(5),
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false)
    }
}

async fn send_event<T: Serialize>(stream: &mut TcpStream, event: &T) -> Result<(), TtsError> {
    let body = serde_json::to_vec(event).map_err(|e| TtsError::Protocol(e.to_string()))?;
    let header = format!("{}\n", body.len());
    stream
        .write_all(header.as_bytes())
        .await
        .map_err(|_| TtsError::ConnectionClosed)?;
    stream
        .write_all(&body)
        .await
        .map_err(|_| TtsError::ConnectionClosed)?;
    Ok(())
}

async fn receive_event(
    reader: &mut BufReader<TcpStream>,
) -> Result<Option<BackendEvent>, TtsError> {
    let mut length_buf = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        let n = reader
            .read(&mut byte)
            .await
            .map_err(|_| TtsError::ConnectionClosed)?;
        if n == 0 {
            return Ok(None);
        }
        if byte[0] == b'\n' {
            break;
        }
        length_buf.push(byte[0]);
    }

    let length: usize = std::str::from_utf8(&length_buf)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| TtsError::Protocol("malformed length header".into()))?;

    let mut body = vec![0u8; length];
    reader
        .read_exact(&mut body)
        .await
        .map_err(|_| TtsError::ConnectionClosed)?;

    let event: BackendEvent =
        serde_json::from_slice(&body).map_err(|e| TtsError::Protocol(e.to_string()))?;
    Ok(Some(event))
}

fn bytes_to_pcm(raw: &[u8]) -> Vec<i16> {
    raw.chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_to_pcm_little_endian() {
        let samples = bytes_to_pcm(&[0x00, 0x01, 0xff, 0xff]);
        assert_eq!(samples, vec![256, -1]);
    }
}
