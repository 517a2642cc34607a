//! Prefetch Queue Module
//!
//! FIFO queue of keys awaiting a background load.

use std::collections::{HashSet, VecDeque};

// == Prefetch Queue ==
/// Deduplicated FIFO of keys to prefetch.
///
/// Also records whether a drain loop is running so that enqueueing while a
/// drain is in progress only appends instead of starting a second loop.
#[derive(Debug, Default)]
pub struct PrefetchQueue {
    order: VecDeque<String>,
    members: HashSet<String>,
    draining: bool,
}

impl PrefetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // == Push ==
    /// Appends `key` unless it is already queued. Returns true if appended.
    pub fn push(&mut self, key: &str) -> bool {
        if !self.members.insert(key.to_string()) {
            return false;
        }
        self.order.push_back(key.to_string());
        true
    }

    // == Pop ==
    /// Removes and returns the oldest queued key.
    pub fn pop(&mut self) -> Option<String> {
        let key = self.order.pop_front()?;
        self.members.remove(&key);
        Some(key)
    }

    // == Drain Claim ==
    /// Claims the drain loop. Returns false if one is already running.
    pub fn try_start_drain(&mut self) -> bool {
        if self.draining || self.order.is_empty() {
            return false;
        }
        self.draining = true;
        true
    }

    /// Pops the next key, releasing the drain claim once the queue is empty.
    pub fn next_or_finish(&mut self) -> Option<String> {
        let next = self.pop();
        if next.is_none() {
            self.draining = false;
        }
        next
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    /// Drops every queued key. A running drain loop stops at its next pop.
    pub fn clear(&mut self) {
        self.order.clear();
        self.members.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.members.contains(key)
    }
}
