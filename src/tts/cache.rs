use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use sha2::{Digest, Sha256};
use tokio::sync::{broadcast, Mutex};

use crate::config::{CacheConfig, TtsConfig};
use crate::tts::protocol::{TtsError, TtsProtocolClient};

const WAV_SAMPLE_RATE: u32 = 22050;

#[derive(Debug, thiserror::Error)]
pub enum SynthesizeError {
    #[error(transparent)]
    Tts(#[from] TtsError),
    #[error("failed to encode audio: {0}")]
    Encode(#[from] hound::Error),
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
}

// Clone is cheap: TtsError/hound::Error/io::Error don't implement Clone, so the
// single-flight broadcast carries a string rendering instead of the error itself.
type InFlightResult = Result<Arc<PathBuf>, String>;

/// Synthesizes and disk-caches TTS audio, content-addressed by
/// `sha256(text|voice|speed)`. Concurrent requests for the same key are
/// coalesced into a single backend call (single-flight).
pub struct Synthesizer {
    client: TtsProtocolClient,
    voice: String,
    speed: f64,
    max_length: usize,
    cache: CacheConfig,
    in_flight: Mutex<HashMap<String, broadcast::Sender<InFlightResult>>>,
}

impl Synthesizer {
    pub fn new(tts: &TtsConfig, cache: CacheConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&cache.path)?;
        Ok(Self {
            client: TtsProtocolClient::new(tts.backend_host.clone(), tts.backend_port),
            voice: tts.voice.clone(),
            speed: tts.speed,
            max_length: tts.max_length,
            cache,
            in_flight: Mutex::new(HashMap::new()),
        })
    }

    /// Synthesize `text`, returning the cache key (`audio_id`) and the path to
    /// the cached WAV file. Truncates to the configured max length (appending
    /// `...`) before hashing or sending anything to the backend, so every
    /// caller gets the same bound regardless of what it passes in.
    pub async fn synthesize(&self, text: &str) -> Result<(String, Arc<PathBuf>), SynthesizeError> {
        let text = truncate(text, self.max_length);
        let audio_id = self.cache_key(&text);
        let path = self.cache.path.join(format!("{audio_id}.wav"));

        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok((audio_id, Arc::new(path)));
        }

        let result = self.synthesize_coalesced(&audio_id, &text, &path).await?;
        Ok((audio_id, result))
    }

    async fn synthesize_coalesced(
        &self,
        key: &str,
        text: &str,
        path: &Path,
    ) -> Result<Arc<PathBuf>, SynthesizeError> {
        loop {
            let mut receiver = {
                let mut in_flight = self.in_flight.lock().await;
                if let Some(tx) = in_flight.get(key) {
                    tx.subscribe()
                } else {
                    let (tx, rx) = broadcast::channel(1);
                    in_flight.insert(key.to_string(), tx);
                    drop(in_flight);
                    return self.run_synthesis(key, text, path).await;
                }
            };

            match receiver.recv().await {
                Ok(Ok(path)) => return Ok(path),
                Ok(Err(msg)) => return Err(SynthesizeError::Tts(TtsError::Backend(msg))),
                // Leader task dropped the sender without a value (e.g. panicked).
                // Loop back around and retry, becoming the leader if nobody beat us to it.
                Err(_) => continue,
            }
        }
    }

    async fn run_synthesis(
        &self,
        key: &str,
        text: &str,
        path: &Path,
    ) -> Result<Arc<PathBuf>, SynthesizeError> {
        let result = self.fetch_and_write(text, path).await;

        let mut in_flight = self.in_flight.lock().await;
        if let Some(tx) = in_flight.remove(key) {
            let broadcast_result: InFlightResult = match &result {
                Ok(p) => Ok(Arc::clone(p)),
                Err(e) => Err(e.to_string()),
            };
            let _ = tx.send(broadcast_result);
        }
        drop(in_flight);

        result
    }

    async fn fetch_and_write(&self, text: &str, path: &Path) -> Result<Arc<PathBuf>, SynthesizeError> {
        let samples = self.client.synthesize(text, Some(&self.voice)).await?;
        let wav_bytes = pcm_to_wav(&samples)?;

        let tmp_path = path.with_extension("wav.tmp");
        tokio::fs::write(&tmp_path, &wav_bytes).await?;
        tokio::fs::rename(&tmp_path, path).await?;

        self.evict_stale().await;

        Ok(Arc::new(path.to_path_buf()))
    }

    fn cache_key(&self, text: &str) -> String {
        let key_data = format!("{text}|{}|{}", self.voice, self.speed);
        let digest = Sha256::digest(key_data.as_bytes());
        hex_prefix(&digest, 16)
    }

    pub async fn health_check(&self) -> bool {
        self.client.health_check().await
    }

    /// Resolve an audio_id to a cache path, if it still exists. Used by both
    /// the dispatcher's retry path and the `GET /audio/:audio_id` handler.
    pub fn path_for(&self, audio_id: &str) -> Option<PathBuf> {
        if !audio_id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }
        let path = self.cache.path.join(format!("{audio_id}.wav"));
        path.exists().then_some(path)
    }

    async fn evict_stale(&self) {
        if let Err(e) = self.evict_stale_inner().await {
            tracing::warn!("cache eviction failed: {e}");
        }
    }

    async fn evict_stale_inner(&self) -> std::io::Result<()> {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&self.cache.path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("wav") {
                continue;
            }
            let metadata = entry.metadata().await?;
            let modified = metadata.modified()?;
            entries.push((entry.path(), modified, metadata.len()));
        }

        let ttl = Duration::from_secs(self.cache.ttl_hours * 3600);
        let now = SystemTime::now();
        entries.retain(|(path, modified, _)| {
            let expired = now.duration_since(*modified).unwrap_or_default() > ttl;
            if expired {
                if let Err(e) = std::fs::remove_file(path) {
                    tracing::debug!("failed to remove expired cache file {}: {e}", path.display());
                }
            }
            !expired
        });

        let max_bytes = self.cache.max_size_mb * 1024 * 1024;
        let mut total: u64 = entries.iter().map(|(_, _, size)| size).sum();
        if total <= max_bytes {
            return Ok(());
        }

        entries.sort_by_key(|(_, modified, _)| *modified);
        for (path, _, size) in entries {
            if total <= max_bytes {
                break;
            }
            if std::fs::remove_file(&path).is_ok() {
                total = total.saturating_sub(size);
            }
        }

        Ok(())
    }
}

/// Truncate to at most `max_length` characters, appending `...` when the
/// text was actually cut (mirrors `TTSService.synthesize`'s truncation).
fn truncate(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(max_length).collect();
    truncated.push_str("...");
    truncated
}

fn hex_prefix(digest: &[u8], len: usize) -> String {
    let mut out = String::with_capacity(len);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
        if out.len() >= len {
            break;
        }
    }
    out.truncate(len);
    out
}

/// Wrap raw PCM samples in a WAV container (22050 Hz, 16-bit, mono), matching
/// the sample rate the backend streams at.
pub fn pcm_to_wav(pcm_data: &[i16]) -> Result<Vec<u8>, hound::Error> {
    let mut buffer = std::io::Cursor::new(Vec::new());

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: WAV_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::new(&mut buffer, spec)?;
    for &sample in pcm_data {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;

    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_prefix_is_sixteen_chars() {
        let digest = Sha256::digest(b"hello|voice|1.0");
        let key = hex_prefix(&digest, 16);
        assert_eq!(key.len(), 16);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn wav_roundtrip_header_present() {
        let samples: Vec<i16> = (0..100).map(|i| (i * 10) as i16).collect();
        let wav = pcm_to_wav(&samples).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
    }

    #[test]
    fn truncate_appends_ellipsis_only_when_cut() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("this is long", 4), "this...");
    }

    /// A minimal fake backend speaking the length-prefixed protocol from
    /// `tts/protocol.rs`: consumes one request, replies with a single
    /// audio-chunk and an audio-stop.
    async fn write_event(
        stream: &mut tokio::net::TcpStream,
        json: serde_json::Value,
        payload: Option<&[u8]>,
    ) {
        use tokio::io::AsyncWriteExt;
        let body = serde_json::to_vec(&json).unwrap();
        let header = format!("{}\n", body.len());
        stream.write_all(header.as_bytes()).await.unwrap();
        stream.write_all(&body).await.unwrap();
        if let Some(p) = payload {
            stream.write_all(p).await.unwrap();
        }
    }

    async fn skip_incoming_request(stream: &mut tokio::net::TcpStream) {
        use tokio::io::AsyncReadExt;
        let mut len_buf = Vec::new();
        let mut byte = [0u8; 1];
        loop {
            stream.read_exact(&mut byte).await.unwrap();
            if byte[0] == b'\n' {
                break;
            }
            len_buf.push(byte[0]);
        }
        let len: usize = std::str::from_utf8(&len_buf).unwrap().parse().unwrap();
        let mut body = vec![0u8; len];
        stream.read_exact(&mut body).await.unwrap();
    }

    #[tokio::test]
    async fn single_flight_coalesces_concurrent_synthesize_calls() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let accepted = Arc::clone(&connections);

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    skip_incoming_request(&mut stream).await;
                    let payload: [u8; 4] = [0, 1, 2, 3];
                    write_event(
                        &mut stream,
                        serde_json::json!({"type": "audio-chunk", "payload_length": payload.len()}),
                        Some(&payload),
                    )
                    .await;
                    write_event(&mut stream, serde_json::json!({"type": "audio-stop"}), None).await;
                });
            }
        });

        let dir = tempfile::tempdir().unwrap();
        let tts = TtsConfig {
            backend_host: "127.0.0.1".to_string(),
            backend_port: addr.port(),
            voice: "test-voice".to_string(),
            speed: 1.0,
            max_length: 300,
            profanity_filter: false,
        };
        let cache = CacheConfig {
            path: dir.path().to_path_buf(),
            max_size_mb: 100,
            ttl_hours: 24,
        };
        let synth = Arc::new(Synthesizer::new(&tts, cache).unwrap());

        let a = Arc::clone(&synth);
        let b = Arc::clone(&synth);
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { a.synthesize("hello world").await }),
            tokio::spawn(async move { b.synthesize("hello world").await }),
        );

        let (id1, path1) = r1.unwrap().unwrap();
        let (id2, path2) = r2.unwrap().unwrap();
        assert_eq!(id1, id2);
        assert_eq!(path1, path2);
        assert_eq!(connections.load(Ordering::SeqCst), 1);
    }
}
