//! # Ready queue: priority-ordered pending work.
//!
//! ```text
//! push(item) ─────────────► ready: BinaryHeap (priority desc, seq asc)
//! push_delayed(item, at) ─► delayed: BTreeMap<(at, seq)>  ──(at <= now)──► ready
//! ```
//!
//! Entries are not removed on cancel or eviction; the store skips stale ones
//! when it pops them.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BinaryHeap};

use tokio::time::Instant;

use crate::tasks::{Priority, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct QueueItem {
    pub(crate) priority: Priority,
    pub(crate) seq: u64,
    pub(crate) id: TaskId,
}

impl From<&Task> for QueueItem {
    fn from(task: &Task) -> Self {
        Self {
            priority: task.priority,
            seq: task.seq,
            id: task.id,
        }
    }
}

impl Ord for QueueItem {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.priority, Reverse(self.seq)).cmp(&(other.priority, Reverse(other.seq)))
    }
}

impl PartialOrd for QueueItem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Default)]
pub(crate) struct ReadyQueue {
    ready: BinaryHeap<QueueItem>,
    delayed: BTreeMap<(Instant, u64), QueueItem>,
}

impl ReadyQueue {
    pub(crate) fn push(&mut self, item: QueueItem) {
        self.ready.push(item);
    }

    /// Parks `item` until `at`.
    pub(crate) fn push_delayed(&mut self, item: QueueItem, at: Instant) {
        self.delayed.insert((at, item.seq), item);
    }

    /// Pops the best eligible item, promoting delayed entries that are due.
    pub(crate) fn pop(&mut self, now: Instant) -> Option<QueueItem> {
        while let Some(entry) = self.delayed.first_entry() {
            if entry.key().0 > now {
                break;
            }
            self.ready.push(entry.remove());
        }
        self.ready.pop()
    }

    /// Earliest instant a delayed entry becomes eligible.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.delayed.keys().next().map(|(at, _)| *at)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.ready.len() + self.delayed.len()
    }
}
