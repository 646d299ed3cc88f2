//! Bounded recency cache of received messages
//!
//! Entries are evicted oldest-first once either the entry count or the entry
//! age limit is exceeded. The cache only backs replay and dedup lookups;
//! delivery of `message` events does not consult it.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::payload::MessagePayload;

pub const MESSAGE_CACHE_MAX: usize = 1000;
pub const MESSAGE_CACHE_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
pub struct MessageCache {
    max_entries: usize,
    max_age: Duration,
    entries: HashMap<String, (Arc<MessagePayload>, Instant)>,
    /// Insertion order, oldest at the front
    order: VecDeque<String>,
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(MESSAGE_CACHE_MAX, MESSAGE_CACHE_AGE)
    }
}

impl MessageCache {
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            max_entries: max_entries.max(1),
            max_age,
            entries: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn insert(&mut self, message: Arc<MessagePayload>) {
        let id = message.msg_id.clone();
        if self.entries.contains_key(&id) {
            self.order.retain(|existing| existing != &id);
        }
        self.entries.insert(id.clone(), (message, Instant::now()));
        self.order.push_back(id);

        self.evict_expired();
        while self.order.len() > self.max_entries {
            self.pop_oldest();
        }
    }

    pub fn get(&mut self, msg_id: &str) -> Option<Arc<MessagePayload>> {
        self.evict_expired();
        self.entries.get(msg_id).map(|(message, _)| message.clone())
    }

    pub fn contains(&mut self, msg_id: &str) -> bool {
        self.get(msg_id).is_some()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    fn evict_expired(&mut self) {
        while let Some(oldest) = self.order.front() {
            let expired = self
                .entries
                .get(oldest)
                .is_none_or(|(_, inserted)| inserted.elapsed() >= self.max_age);
            if !expired {
                break;
            }
            self.pop_oldest();
        }
    }

    fn pop_oldest(&mut self) {
        if let Some(id) = self.order.pop_front() {
            self.entries.remove(&id);
            debug!("Evicted message {} from recency cache", id);
        }
    }
}
