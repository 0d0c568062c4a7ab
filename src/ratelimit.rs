use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Sliding-window rate limiter, one independent window per key.
pub struct RateLimiter {
    rate: u32,
    window: Duration,
    hits: Mutex<HashMap<String, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(rate: u32, window_secs: u64) -> Self {
        Self {
            rate,
            window: Duration::from_secs(window_secs),
            hits: Mutex::new(HashMap::new()),
        }
    }

    /// Record an attempt for `key` and report whether it's within the limit.
    pub fn is_allowed(&self, key: &str) -> bool {
        let mut hits = self.hits.lock().unwrap();
        let now = Instant::now();
        let entry = hits.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);

        if entry.len() < self.rate as usize {
            entry.push(now);
            true
        } else {
            false
        }
    }

    pub fn remaining(&self, key: &str) -> u32 {
        let mut hits = self.hits.lock().unwrap();
        let now = Instant::now();
        let entry = hits.entry(key.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);
        self.rate.saturating_sub(entry.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_rate_then_blocks() {
        let limiter = RateLimiter::new(2, 60);
        assert!(limiter.is_allowed("twitch"));
        assert!(limiter.is_allowed("twitch"));
        assert!(!limiter.is_allowed("twitch"));
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(1, 60);
        assert!(limiter.is_allowed("twitch"));
        assert!(limiter.is_allowed("youtube"));
    }

    #[test]
    fn remaining_reflects_usage() {
        let limiter = RateLimiter::new(3, 60);
        limiter.is_allowed("twitch");
        assert_eq!(limiter.remaining("twitch"), 2);
    }
}
