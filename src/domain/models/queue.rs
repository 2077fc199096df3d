//! Generic priority queue backing the task scheduler. Ordering is the
//! strict total order the scheduler requires: higher priority first, ties
//! broken by earlier `createdAt`, final tiebreak by id — so re-enqueuing a
//! demoted task (agent failure, assignment failure) lands it back in its
//! priority class instead of jumping the whole queue or starving behind it.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::VecDeque;
use uuid::Uuid;

/// The ordering key extracted from whatever `T` the queue holds. Kept
/// separate from `T` itself so the queue stays generic while still giving
/// every item a single strict total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueKey {
    pub priority: i64,
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

#[derive(Debug, Clone)]
struct QueueItem<T> {
    key: QueueKey,
    item: T,
}

impl<T> PartialEq for QueueItem<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl<T> Eq for QueueItem<T> {}

impl<T> PartialOrd for QueueItem<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueueItem<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Higher priority first; among equal priority, earlier createdAt
        // first; final tiebreak by id for a total, deterministic order.
        other
            .key
            .priority
            .cmp(&self.key.priority)
            .then_with(|| self.key.created_at.cmp(&other.key.created_at))
            .then_with(|| self.key.id.cmp(&other.key.id))
    }
}

/// Insertion-ordered priority queue: equal-key items keep FIFO order since
/// insertion always finds the first slot the new item is strictly less than.
#[derive(Debug, Clone)]
pub struct TaskQueue<T> {
    items: VecDeque<QueueItem<T>>,
}

impl<T> Default for TaskQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TaskQueue<T> {
    pub const fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub fn enqueue(&mut self, item: T, key: QueueKey) {
        let queue_item = QueueItem { key, item };
        let position = self
            .items
            .iter()
            .position(|existing| queue_item < *existing)
            .unwrap_or(self.items.len());
        self.items.insert(position, queue_item);
    }

    pub fn dequeue(&mut self) -> Option<T> {
        self.items.pop_front().map(|qi| qi.item)
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.front().map(|qi| &qi.item)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|qi| &qi.item)
    }

    /// Removes every item matching `predicate`, preserving relative order
    /// of what remains.
    pub fn remove_matching<F>(&mut self, predicate: F) -> Vec<T>
    where
        F: Fn(&T) -> bool,
    {
        let mut removed = Vec::new();
        let mut i = 0;
        while i < self.items.len() {
            if predicate(&self.items[i].item) {
                removed.push(self.items.remove(i).unwrap().item);
            } else {
                i += 1;
            }
        }
        removed
    }
}
