use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use md5::{Digest, Md5};

/// Detects near-duplicate messages within a short time window. MD5 is used
/// purely as a fast content fingerprint here, never for anything
/// security-sensitive.
pub struct DuplicateDetector {
    window: Duration,
    seen: Mutex<HashMap<[u8; 16], Instant>>,
}

impl DuplicateDetector {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window: Duration::from_secs(window_secs),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns true if `text` was already seen within the window. As a side
    /// effect, records `text` as seen now and prunes expired entries.
    pub fn is_duplicate(&self, text: &str) -> bool {
        let mut seen = self.seen.lock().unwrap();
        let now = Instant::now();
        seen.retain(|_, t| now.duration_since(*t) < self.window);

        let hash: [u8; 16] = Md5::digest(text.as_bytes()).into();
        if seen.contains_key(&hash) {
            true
        } else {
            seen.insert(hash, now);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn first_occurrence_not_duplicate() {
        let d = DuplicateDetector::new(5);
        assert!(!d.is_duplicate("hello"));
    }

    #[test]
    fn repeat_within_window_is_duplicate() {
        let d = DuplicateDetector::new(5);
        assert!(!d.is_duplicate("hello"));
        assert!(d.is_duplicate("hello"));
    }

    #[test]
    fn repeat_after_window_is_not_duplicate() {
        let d = DuplicateDetector::new(0);
        assert!(!d.is_duplicate("hello"));
        sleep(Duration::from_millis(5));
        assert!(!d.is_duplicate("hello"));
    }
}
