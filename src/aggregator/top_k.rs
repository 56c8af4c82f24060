//! Fixed-capacity "keep the K largest" collection.
//!
//! Backed by a min-heap so the smallest retained item is always the one
//! compared against (and evicted by) a new candidate.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Retains at most `capacity` of the largest items offered
#[derive(Debug, Clone)]
pub struct BoundedTopK<T: Ord> {
    capacity: usize,
    heap: BinaryHeap<Reverse<T>>,
}

impl<T: Ord> BoundedTopK<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.min(4096)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Smallest retained item
    pub fn min(&self) -> Option<&T> {
        self.heap.peek().map(|Reverse(item)| item)
    }

    /// Offer a candidate
    ///
    /// Once full, a candidate is kept only if it is strictly greater than the
    /// current minimum, which it then evicts. Returns whether it was kept.
    pub fn offer(&mut self, item: T) -> bool {
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(item));
            return true;
        }

        match self.heap.peek() {
            Some(Reverse(smallest)) if item > *smallest => {
                self.heap.pop();
                self.heap.push(Reverse(item));
                true
            }
            _ => false,
        }
    }

    /// Consume the collection, largest item first
    pub fn into_sorted_desc(self) -> Vec<T> {
        // ascending order of Reverse<T> is descending order of T
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(item)| item)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_largest_items() {
        let mut top = BoundedTopK::new(3);
        for n in [5, 1, 9, 3, 7, 2, 8] {
            top.offer(n);
        }
        assert_eq!(top.len(), 3);
        assert_eq!(top.min(), Some(&7));
        assert_eq!(top.into_sorted_desc(), vec![9, 8, 7]);
    }

    #[test]
    fn test_equal_to_minimum_is_rejected() {
        let mut top = BoundedTopK::new(2);
        assert!(top.offer(4));
        assert!(top.offer(6));
        assert!(!top.offer(4));
        assert!(top.offer(5));
        assert_eq!(top.into_sorted_desc(), vec![6, 5]);
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut top = BoundedTopK::new(0);
        assert!(!top.offer(1));
        assert!(top.is_empty());
    }

    #[test]
    fn test_matches_full_sort() {
        // deterministic pseudo-random input
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let mut values = Vec::new();
        for _ in 0..2000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            values.push(state % 100_000);
        }

        let mut top = BoundedTopK::new(50);
        for v in &values {
            top.offer(*v);
        }

        values.sort_unstable_by(|a, b| b.cmp(a));
        values.truncate(50);
        assert_eq!(top.into_sorted_desc(), values);
    }
}
