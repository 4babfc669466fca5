//! A binary max-heap ordered by a comparator closure instead of `Ord`.
//!
//! `std::collections::BinaryHeap` needs the ordering to live in the element
//! type. Job ranking depends on shared state (the live player position), so
//! the ordering is supplied as a closure that may read that state on every
//! comparison. When the state changes, [`PriorityQueue::rebuild`] restores
//! the heap property in O(n).

use std::cmp::Ordering;

/// Max-heap: the element the comparator ranks `Greater` than all others is
/// popped first.
pub struct PriorityQueue<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    items: Vec<T>,
    compare: F,
}

impl<T, F> PriorityQueue<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates an empty queue ordered by `compare`.
    pub fn new(compare: F) -> Self {
        PriorityQueue {
            items: Vec::new(),
            compare,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The highest ranked element, as of the last heap update.
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Inserts an element. O(log n).
    pub fn push(&mut self, item: T) {
        self.items.push(item);
        self.sift_up(self.items.len() - 1);
    }

    /// Removes the highest ranked element. O(log n).
    pub fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }
        let last = self.items.len() - 1;
        self.items.swap(0, last);
        let top = self.items.pop();
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        top
    }

    /// Re-establishes the heap order after the comparator's inputs changed.
    pub fn rebuild(&mut self) {
        for index in (0..self.items.len() / 2).rev() {
            self.sift_down(index);
        }
    }

    /// Removes every element, in no particular order.
    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.items.drain(..)
    }

    fn ranks_higher(&self, a: usize, b: usize) -> bool {
        (self.compare)(&self.items[a], &self.items[b]) == Ordering::Greater
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.ranks_higher(index, parent) {
                break;
            }
            self.items.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut best = index;
            if left < len && self.ranks_higher(left, best) {
                best = left;
            }
            if right < len && self.ranks_higher(right, best) {
                best = right;
            }
            if best == index {
                break;
            }
            self.items.swap(index, best);
            index = best;
        }
    }
}
