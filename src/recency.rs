//! Bounded memory of recently emitted fragment names.
//!
//! Live encoders rewrite the same `.f4x` index many times while a segment is
//! being appended, so every pass over it yields the fragments seen last time
//! again. The filter remembers the last `capacity` names and lets the
//! pipeline drop repeats.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};

/// Default number of fragment names remembered.
pub const DEFAULT_RECENT_FRAGMENTS: usize = 2000;

/// Insertion-ordered names plus an index for membership checks.
#[derive(Debug, Default)]
struct RecentNames {
    order: VecDeque<String>,
    members: HashSet<String>,
}

/// Thread-safe, capacity-bounded set of fragment names.
///
/// Once full, inserting a new name evicts the oldest one.
#[derive(Debug)]
pub struct RecencyFilter {
    inner: Mutex<RecentNames>,
    capacity: usize,
}

impl RecencyFilter {
    /// Create a filter remembering at most `capacity` names (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(RecentNames {
                order: VecDeque::with_capacity(capacity),
                members: HashSet::with_capacity(capacity),
            }),
            capacity,
        }
    }

    /// Insert `name` unless it is already present.
    ///
    /// Returns `true` if the name was newly inserted and `false` if it was
    /// already remembered. The check and insert happen under one lock, so two
    /// workers racing on the same name see exactly one `true`.
    pub fn contains_or_insert(&self, name: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.members.contains(name) {
            return false;
        }

        while inner.order.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(evicted) => {
                    inner.members.remove(&evicted);
                }
                None => break,
            }
        }

        inner.order.push_back(name.to_string());
        inner.members.insert(name.to_string());
        true
    }

    /// Drop `name` so a later pass emits it again.
    ///
    /// Used when a fragment was claimed but could not be queued.
    pub fn forget(&self, name: &str) -> bool {
        let mut inner = self.inner.lock();
        if !inner.members.remove(name) {
            return false;
        }
        inner.order.retain(|n| n != name);
        true
    }

    /// Whether `name` is currently remembered.
    pub fn contains(&self, name: &str) -> bool {
        self.inner.lock().members.contains(name)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RecencyFilter {
    fn default() -> Self {
        Self::new(DEFAULT_RECENT_FRAGMENTS)
    }
}
