//! A min-ordered priority queue over `(fee_priority, id)`, supporting insertion, `O(log n)`
//! removal by id, peek-min, and ascending iteration.
//!
//! [`std::collections::BinaryHeap`] does not support removal by key, only pop-the-max. The pool
//! needs to remove an arbitrary transaction (on `remove`, eviction, expiry, or replacement)
//! without scanning, so this is a binary heap backed by a vector plus an id→index map that is
//! kept in sync on every swap.
//!
//! Entries with equal `fee_priority` are ordered by `received_at`: the more recently admitted
//! transaction sorts first for eviction purposes, so that among ties the older transaction is
//! evicted later.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dpos_mempool_types::TransactionId;
use num_bigint::BigUint;

#[derive(Debug, Clone)]
struct Entry {
    priority: BigUint,
    received_at: DateTime<Utc>,
    id: TransactionId,
}

impl Entry {
    /// Whether `self` sorts before `other` in the eviction-ascending order: lower `fee_priority`
    /// first, and on a tie, the more recently admitted transaction first.
    fn precedes(&self, other: &Entry) -> bool {
        match self.priority.cmp(&other.priority) {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Greater => false,
            std::cmp::Ordering::Equal => self.received_at > other.received_at,
        }
    }
}

/// A min-heap over `(fee_priority, id)` with no duplicate ids.
#[derive(Debug, Default)]
pub struct FeePriorityQueue {
    heap: Vec<Entry>,
    positions: HashMap<TransactionId, usize>,
}

impl FeePriorityQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of ids in the queue.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Whether `id` is present.
    pub fn contains(&self, id: &TransactionId) -> bool {
        self.positions.contains_key(id)
    }

    /// Inserts `id` with the given `priority` and `received_at`. If `id` is already present, its
    /// priority is updated (the pool never calls this for an id already present, but it is kept
    /// total rather than panicking, matching the "no duplicate ids" contract via upsert
    /// semantics).
    pub fn insert(&mut self, priority: BigUint, received_at: DateTime<Utc>, id: TransactionId) {
        if let Some(&index) = self.positions.get(&id) {
            self.heap[index].priority = priority;
            self.heap[index].received_at = received_at;
            self.sift_to_place(index);
            return;
        }
        let index = self.heap.len();
        self.heap.push(Entry { priority, received_at, id: id.clone() });
        self.positions.insert(id, index);
        self.sift_up(index);
    }

    /// Removes `id`. Returns `true` if it was present, `false` if it was a no-op.
    pub fn remove(&mut self, id: &TransactionId) -> bool {
        let Some(index) = self.positions.remove(id) else {
            return false;
        };
        let last = self.heap.len() - 1;
        self.heap.swap(index, last);
        self.heap.pop();
        if index < self.heap.len() {
            self.positions.insert(self.heap[index].id.clone(), index);
            self.sift_to_place(index);
        }
        true
    }

    /// Returns the minimum-priority `(priority, id)` pair, if any.
    pub fn peek_min(&self) -> Option<(&BigUint, &TransactionId)> {
        self.heap.first().map(|entry| (&entry.priority, &entry.id))
    }

    /// Returns ids in ascending eviction order. Used only for eviction scans.
    pub fn iter_ascending(&self) -> impl Iterator<Item = &TransactionId> {
        let mut snapshot: Vec<&Entry> = self.heap.iter().collect();
        snapshot.sort_by(|a, b| {
            if a.precedes(b) {
                std::cmp::Ordering::Less
            } else if b.precedes(a) {
                std::cmp::Ordering::Greater
            } else {
                std::cmp::Ordering::Equal
            }
        });
        snapshot.into_iter().map(|entry| &entry.id)
    }

    fn sift_to_place(&mut self, index: usize) {
        if self.sift_up(index) == index {
            self.sift_down(index);
        }
    }

    fn sift_up(&mut self, mut index: usize) -> usize {
        while index > 0 {
            let parent = (index - 1) / 2;
            if self.heap[index].precedes(&self.heap[parent]) {
                self.swap(index, parent);
                index = parent;
            } else {
                break;
            }
        }
        index
    }

    fn sift_down(&mut self, mut index: usize) -> usize {
        loop {
            let left = 2 * index + 1;
            let right = 2 * index + 2;
            let mut smallest = index;
            if left < self.heap.len() && self.heap[left].precedes(&self.heap[smallest]) {
                smallest = left;
            }
            if right < self.heap.len() && self.heap[right].precedes(&self.heap[smallest]) {
                smallest = right;
            }
            if smallest == index {
                return index;
            }
            self.swap(index, smallest);
            index = smallest;
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.heap.swap(a, b);
        self.positions.insert(self.heap[a].id.clone(), a);
        self.positions.insert(self.heap[b].id.clone(), b);
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use num_bigint::BigUint;

    use super::FeePriorityQueue;

    fn big(n: u64) -> BigUint {
        BigUint::from(n)
    }

    fn at(offset_secs: i64) -> chrono::DateTime<Utc> {
        Utc::now() + Duration::seconds(offset_secs)
    }

    #[test]
    fn test_peek_min_returns_smallest() {
        let mut queue = FeePriorityQueue::new();
        queue.insert(big(5), at(0), "a".to_owned());
        queue.insert(big(1), at(0), "b".to_owned());
        queue.insert(big(3), at(0), "c".to_owned());
        assert_eq!(queue.peek_min(), Some((&big(1), &"b".to_owned())));
    }

    #[test]
    fn test_remove_missing_id_is_noop() {
        let mut queue = FeePriorityQueue::new();
        queue.insert(big(1), at(0), "a".to_owned());
        assert!(!queue.remove(&"missing".to_owned()));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_remove_reheapifies() {
        let mut queue = FeePriorityQueue::new();
        for (priority, id) in [(5, "a"), (1, "b"), (3, "c"), (2, "d"), (4, "e")] {
            queue.insert(big(priority), at(0), id.to_owned());
        }
        assert!(queue.remove(&"b".to_owned()));
        assert_eq!(queue.peek_min(), Some((&big(2), &"d".to_owned())));
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_iter_ascending_is_sorted() {
        let mut queue = FeePriorityQueue::new();
        for (priority, id) in [(5, "a"), (1, "b"), (3, "c")] {
            queue.insert(big(priority), at(0), id.to_owned());
        }
        let ordered: Vec<_> = queue.iter_ascending().cloned().collect();
        assert_eq!(ordered, vec!["b".to_owned(), "c".to_owned(), "a".to_owned()]);
    }

    #[test]
    fn test_equal_priority_newer_sorts_first() {
        let mut queue = FeePriorityQueue::new();
        queue.insert(big(5), at(0), "older".to_owned());
        queue.insert(big(5), at(10), "newer".to_owned());
        let ordered: Vec<_> = queue.iter_ascending().cloned().collect();
        assert_eq!(ordered, vec!["newer".to_owned(), "older".to_owned()]);
    }

    #[test]
    fn test_insert_and_remove_many_preserves_heap_property() {
        let mut queue = FeePriorityQueue::new();
        let ids: Vec<String> = (0..100).map(|i| format!("tx{i}")).collect();
        for (i, id) in ids.iter().enumerate() {
            queue.insert(big((i as u64 * 37) % 101), at(0), id.clone());
        }
        for id in ids.iter().step_by(2) {
            queue.remove(id);
        }
        let mut last = BigUint::from(0u64);
        while let Some((priority, _)) = queue.peek_min() {
            assert!(*priority >= last);
            last = priority.clone();
            let id = queue.iter_ascending().next().unwrap().clone();
            queue.remove(&id);
        }
    }
}
