use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub twitch: TwitchEventConfig,
    #[serde(default)]
    pub youtube: YoutubeEventConfig,
    pub tts: TtsConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    #[serde(default = "default_templates")]
    pub templates: HashMap<String, String>,
    #[serde(default)]
    pub tokens: TokenStoreConfig,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TwitchEventConfig {
    #[serde(default = "default_true")]
    pub bits_enabled: bool,
    #[serde(default = "default_bits_minimum")]
    pub bits_minimum: i64,
    #[serde(default = "default_true")]
    pub bits_read_message: bool,
    #[serde(default = "default_true")]
    pub subs_enabled: bool,
    #[serde(default = "default_true")]
    pub subs_read_message: bool,
    #[serde(default = "default_true")]
    pub gift_subs_enabled: bool,
    #[serde(default = "default_gift_subs_minimum")]
    pub gift_subs_minimum: u32,
    #[serde(default)]
    pub channel_points_enabled: bool,
    #[serde(default)]
    pub channel_points_rewards: Vec<String>,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

impl Default for TwitchEventConfig {
    fn default() -> Self {
        Self {
            bits_enabled: true,
            bits_minimum: default_bits_minimum(),
            bits_read_message: true,
            subs_enabled: true,
            subs_read_message: true,
            gift_subs_enabled: true,
            gift_subs_minimum: default_gift_subs_minimum(),
            channel_points_enabled: false,
            channel_points_rewards: Vec::new(),
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct YoutubeEventConfig {
    #[serde(default = "default_true")]
    pub superchat_enabled: bool,
    #[serde(default = "default_superchat_minimum_cents")]
    pub superchat_minimum_cents: i64,
    #[serde(default = "default_true")]
    pub superchat_read_message: bool,
    #[serde(default = "default_true")]
    pub supersticker_enabled: bool,
    #[serde(default = "default_true")]
    pub membership_enabled: bool,
    #[serde(default = "default_true")]
    pub membership_milestone_enabled: bool,
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,
}

impl Default for YoutubeEventConfig {
    fn default() -> Self {
        Self {
            superchat_enabled: true,
            superchat_minimum_cents: default_superchat_minimum_cents(),
            superchat_read_message: true,
            supersticker_enabled: true,
            membership_enabled: true,
            membership_milestone_enabled: true,
            rate_limit_per_minute: default_rate_limit(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct TtsConfig {
    pub backend_host: String,
    #[serde(default = "default_backend_port")]
    pub backend_port: u16,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_max_length")]
    pub max_length: usize,
    #[serde(default = "default_true")]
    pub profanity_filter: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
    #[serde(default = "default_cache_max_size_mb")]
    pub max_size_mb: u64,
    #[serde(default = "default_cache_ttl_hours")]
    pub ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: default_cache_path(),
            max_size_mb: default_cache_max_size_mb(),
            ttl_hours: default_cache_ttl_hours(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "default_queue_max_size")]
    pub max_size: usize,
    #[serde(default = "default_duplicate_window")]
    pub duplicate_window_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_size: default_queue_max_size(),
            duplicate_window_secs: default_duplicate_window(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PriorityConfig {
    #[serde(default = "default_priority_bits")]
    pub twitch_bits: i32,
    #[serde(default = "default_priority_subs")]
    pub twitch_subs: i32,
    #[serde(default = "default_priority_bits")]
    pub twitch_gift_subs: i32,
    #[serde(default = "default_priority_points")]
    pub twitch_channel_points: i32,
    #[serde(default = "default_priority_bits")]
    pub youtube_superchat: i32,
    #[serde(default = "default_priority_subs")]
    pub youtube_membership: i32,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            twitch_bits: default_priority_bits(),
            twitch_subs: default_priority_subs(),
            twitch_gift_subs: default_priority_bits(),
            twitch_channel_points: default_priority_points(),
            youtube_superchat: default_priority_bits(),
            youtube_membership: default_priority_subs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TokenStoreConfig {
    #[serde(default = "default_token_path")]
    pub path: PathBuf,
}

fn default_token_path() -> PathBuf {
    PathBuf::from("tokens.json")
}

fn default_true() -> bool {
    true
}
fn default_bits_minimum() -> i64 {
    100
}
fn default_gift_subs_minimum() -> u32 {
    1
}
fn default_rate_limit() -> u32 {
    30
}
fn default_superchat_minimum_cents() -> i64 {
    100
}
fn default_backend_port() -> u16 {
    10200
}
fn default_voice() -> String {
    "en_GB-alan-medium".to_string()
}
fn default_speed() -> f64 {
    1.0
}
fn default_max_length() -> usize {
    300
}
fn default_cache_path() -> PathBuf {
    PathBuf::from("audio_cache")
}
fn default_cache_max_size_mb() -> u64 {
    100
}
fn default_cache_ttl_hours() -> u64 {
    24
}
fn default_queue_max_size() -> usize {
    50
}
fn default_duplicate_window() -> u64 {
    5
}
fn default_priority_bits() -> i32 {
    2
}
fn default_priority_subs() -> i32 {
    3
}
fn default_priority_points() -> i32 {
    1
}

pub fn default_templates() -> HashMap<String, String> {
    let pairs: &[(&str, &str)] = &[
        ("twitch_bits", "{username} cheered {amount} bits: {message}"),
        ("twitch_bits_no_message", "{username} cheered {amount} bits!"),
        ("twitch_sub_new", "{username} just subscribed at tier {tier}!"),
        (
            "twitch_sub_resub",
            "{username} resubscribed for {months} months at tier {tier}! {message}",
        ),
        (
            "twitch_sub_resub_no_message",
            "{username} resubscribed for {months} months at tier {tier}!",
        ),
        (
            "twitch_gift_single",
            "{username} gifted a tier {tier} sub to {recipient}!",
        ),
        (
            "twitch_gift_multi",
            "{username} gifted {count} tier {tier} subs to the community!",
        ),
        (
            "twitch_channel_points",
            "{username} redeemed {reward_name}: {user_input}",
        ),
        (
            "twitch_channel_points_no_input",
            "{username} redeemed {reward_name}!",
        ),
        (
            "youtube_superchat",
            "{username} sent {currency}{amount}: {message}",
        ),
        (
            "youtube_superchat_no_message",
            "{username} sent a {currency}{amount} Super Chat!",
        ),
        (
            "youtube_supersticker",
            "{username} sent a Super Sticker worth {currency}{amount}!",
        ),
        (
            "youtube_membership_new",
            "{username} just became a {level} member!",
        ),
        (
            "youtube_membership_milestone",
            "{username} has been a {level} member for {months} months!",
        ),
    ];
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let env_path = config_dir().join(".env");
        match dotenvy::from_path(&env_path) {
            Ok(()) => tracing::info!("Loaded .env from {}", env_path.display()),
            Err(dotenvy::Error::Io(_)) => {
                tracing::debug!(
                    "No .env file at {}, using environment only",
                    env_path.display()
                );
            }
            Err(e) => tracing::warn!("Failed to parse .env: {e}"),
        }

        let path = config_path();
        tracing::info!("Loading config from {}", path.display());

        let contents = std::fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.clone(),
            source: e,
        })?;

        let mut config: Config = toml::from_str(&contents)?;

        if let Ok(v) = std::env::var("ALERTCAST_TTS_HOST") {
            config.tts.backend_host = v;
        }
        if let Ok(v) = std::env::var("ALERTCAST_TTS_PORT") {
            if let Ok(port) = v.parse() {
                config.tts.backend_port = port;
            }
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.5..=2.0).contains(&self.tts.speed) {
            return Err(ConfigError::Invalid(format!(
                "tts.speed must be between 0.5 and 2.0, got {}",
                self.tts.speed
            )));
        }
        if self.queue.max_size == 0 {
            return Err(ConfigError::Invalid("queue.max_size must be > 0".into()));
        }

        const REQUIRED_KEYS: &[&str] = &[
            "twitch_bits",
            "twitch_bits_no_message",
            "twitch_sub_new",
            "twitch_sub_resub",
            "twitch_sub_resub_no_message",
            "twitch_gift_single",
            "twitch_gift_multi",
            "twitch_channel_points",
            "twitch_channel_points_no_input",
            "youtube_superchat",
            "youtube_superchat_no_message",
            "youtube_supersticker",
            "youtube_membership_new",
            "youtube_membership_milestone",
        ];
        for key in REQUIRED_KEYS {
            if !self.templates.contains_key(*key) {
                return Err(ConfigError::Invalid(format!(
                    "templates is missing required key '{key}'"
                )));
            }
        }

        Ok(())
    }
}

fn config_dir() -> PathBuf {
    if let Ok(p) = std::env::var("ALERTCAST_CONFIG") {
        let path = PathBuf::from(p);
        return path.parent().map(|p| p.to_path_buf()).unwrap_or(path);
    }
    PathBuf::from(".")
}

fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("ALERTCAST_CONFIG") {
        return PathBuf::from(p);
    }
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_templates_cover_required_keys() {
        let templates = default_templates();
        for key in [
            "twitch_bits",
            "youtube_membership_milestone",
            "twitch_gift_multi",
        ] {
            assert!(templates.contains_key(key), "missing default key {key}");
        }
    }
}
