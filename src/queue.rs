use std::collections::BinaryHeap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::message::TtsMessage;

#[derive(Debug)]
struct QueueItem {
    priority: i32,
    created_at: DateTime<Utc>,
    message: TtsMessage,
}

impl PartialEq for QueueItem {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.created_at == other.created_at
    }
}
impl Eq for QueueItem {}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueItem {
    /// Higher priority first; among equal priorities, older first. `BinaryHeap`
    /// is a max-heap, so "wins the comparison" must mean "dequeues first".
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.created_at.cmp(&self.created_at))
    }
}

/// Bounded priority queue of pending TTS messages. On overflow the
/// lowest-priority (ties: newest) item is evicted to make room, rather than
/// unconditionally dropping whatever is about to be pushed or popped.
pub struct PriorityQueue {
    max_size: usize,
    items: Mutex<BinaryHeap<QueueItem>>,
}

pub struct QueueStatus {
    pub size: usize,
    pub max_size: usize,
}

impl PriorityQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            items: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Push a message, evicting the lowest-priority item if the queue is full.
    /// Returns `false` if the incoming message itself was the one dropped
    /// (i.e. it was at or below the lowest priority currently queued and the
    /// queue was already full).
    pub fn push(&self, message: TtsMessage) -> bool {
        let mut items = self.items.lock().unwrap();

        if items.len() >= self.max_size {
            if let Some(lowest) = lowest_priority_item(&items) {
                if message.priority <= lowest.priority {
                    tracing::warn!(
                        queue_size = items.len(),
                        "queue full, dropping incoming lower/equal-priority message"
                    );
                    return false;
                }
            }
            if let Some(evicted) = pop_lowest_priority(&mut items) {
                tracing::warn!(
                    dropped_id = %evicted.message.id,
                    "queue full, evicted lowest-priority message"
                );
            }
        }

        items.push(QueueItem {
            priority: message.priority,
            created_at: message.created_at,
            message,
        });
        true
    }

    pub fn pop(&self) -> Option<TtsMessage> {
        self.items.lock().unwrap().pop().map(|item| item.message)
    }

    pub fn clear(&self) {
        self.items.lock().unwrap().clear();
    }

    pub fn status(&self) -> QueueStatus {
        QueueStatus {
            size: self.items.lock().unwrap().len(),
            max_size: self.max_size,
        }
    }
}

/// Eviction victim order: lowest priority first, ties broken oldest-first.
/// This is the *opposite* tie-break from `QueueItem::Ord` (which orders for
/// poll order, where ties go oldest-first too, but via a reversed
/// `created_at` comparison that makes the newest item the `Ord`-minimum).
/// Reusing that `Ord` here would evict the newest of a tied pair instead of
/// the oldest, so eviction uses its own explicit comparator.
fn eviction_order(item: &QueueItem) -> (i32, DateTime<Utc>) {
    (item.priority, item.created_at)
}

fn lowest_priority_item(items: &BinaryHeap<QueueItem>) -> Option<&QueueItem> {
    items.iter().min_by_key(|item| eviction_order(item))
}

fn pop_lowest_priority(items: &mut BinaryHeap<QueueItem>) -> Option<QueueItem> {
    let mut rest: Vec<QueueItem> = std::mem::take(items).into_vec();
    let victim_idx = rest
        .iter()
        .enumerate()
        .min_by_key(|(_, item)| eviction_order(item))
        .map(|(i, _)| i);
    let evicted = victim_idx.map(|i| rest.remove(i));
    *items = rest.into_iter().collect();
    evicted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{StreamEvent, Tier};
    use serde_json::Value;

    fn msg(priority: i32) -> TtsMessage {
        let event = StreamEvent::new_twitch_bits("Bob", 1, "", false, Value::Null);
        let _ = Tier::One;
        TtsMessage::new(
            "text".to_string(),
            "text".to_string(),
            priority,
            event,
            "abc".to_string(),
        )
    }

    #[test]
    fn pops_highest_priority_first() {
        let q = PriorityQueue::new(10);
        q.push(msg(1));
        q.push(msg(5));
        q.push(msg(3));
        assert_eq!(q.pop().unwrap().priority, 5);
        assert_eq!(q.pop().unwrap().priority, 3);
        assert_eq!(q.pop().unwrap().priority, 1);
    }

    #[test]
    fn ties_broken_by_age_oldest_first() {
        let q = PriorityQueue::new(10);
        let first = msg(2);
        let first_id = first.id;
        q.push(first);
        std::thread::sleep(std::time::Duration::from_millis(2));
        q.push(msg(2));
        assert_eq!(q.pop().unwrap().id, first_id);
    }

    #[test]
    fn overflow_evicts_lowest_priority() {
        let q = PriorityQueue::new(2);
        q.push(msg(1));
        q.push(msg(2));
        assert!(q.push(msg(5)));
        assert_eq!(q.status().size, 2);
        assert_eq!(q.pop().unwrap().priority, 5);
        assert_eq!(q.pop().unwrap().priority, 2);
    }

    #[test]
    fn overflow_drops_incoming_when_not_higher_priority() {
        let q = PriorityQueue::new(1);
        q.push(msg(5));
        assert!(!q.push(msg(1)));
        assert_eq!(q.status().size, 1);
        assert_eq!(q.pop().unwrap().priority, 5);
    }

    #[test]
    fn overflow_eviction_tie_break_evicts_oldest() {
        let q = PriorityQueue::new(2);
        let older = msg(5);
        let older_id = older.id;
        q.push(older);
        std::thread::sleep(std::time::Duration::from_millis(2));
        let newer = msg(5);
        let newer_id = newer.id;
        q.push(newer);

        assert!(q.push(msg(10)));
        assert_eq!(q.status().size, 2);

        let first = q.pop().unwrap();
        assert_eq!(first.priority, 10);
        let second = q.pop().unwrap();
        assert_eq!(second.id, newer_id);
        assert_ne!(second.id, older_id);
    }
}
