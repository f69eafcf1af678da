/*
[INPUT]:  Decoded snapshot and update records of one subscription
[OUTPUT]: Keyed latest-record state
[POS]:    WebSocket layer - snapshot/update reconciliation
[UPDATE]: When record identity rules change
*/

use std::collections::{HashMap, VecDeque};

use crate::config::DEFAULT_STATE_CAPACITY;
use crate::ws::decoder::StreamRecord;

/// Latest known record per key for one subscription.
///
/// A snapshot replaces the whole state; updates insert or overwrite one key.
/// Once `capacity` keys are held, inserting a new key evicts the oldest one.
#[derive(Debug, Clone)]
pub struct SnapshotReconciler<R: StreamRecord> {
    entries: HashMap<R::Key, R>,
    order: VecDeque<R::Key>,
    capacity: usize,
}

impl<R: StreamRecord> Default for SnapshotReconciler<R> {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_STATE_CAPACITY)
    }
}

impl<R: StreamRecord> SnapshotReconciler<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// State that keeps at most `capacity` keys (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discard current state and load `records`; later duplicates win.
    pub fn replace_all(&mut self, records: impl IntoIterator<Item = R>) {
        self.entries.clear();
        self.order.clear();
        for record in records {
            self.upsert(record);
        }
    }

    /// Insert or overwrite one record; returns true if the key was already known.
    ///
    /// Overwriting keeps the key's age; a new key may evict the oldest one.
    pub fn upsert(&mut self, record: R) -> bool {
        let key = record.key();
        if self.entries.insert(key.clone(), record).is_some() {
            return true;
        }

        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        false
    }

    pub fn contains(&self, key: &R::Key) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &R::Key) -> Option<&R> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &R> {
        self.entries.values()
    }
}
