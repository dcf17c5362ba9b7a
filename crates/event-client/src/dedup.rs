//! Bounded window of recently delivered event identities.

use std::collections::{HashSet, VecDeque};

/// Remembers the last `capacity` identities, forgetting the oldest first.
#[derive(Debug, Clone)]
pub struct SeenWindow {
    order: VecDeque<String>,
    keys: HashSet<String>,
    capacity: usize,
}

impl SeenWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            order: VecDeque::with_capacity(capacity),
            keys: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `key`; returns `false` if it was already in the window.
    pub fn insert(&mut self, key: String) -> bool {
        if self.keys.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        self.keys.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
