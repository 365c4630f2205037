//! A bounded FIFO that prefers recent observations under pressure: at
//! capacity, pushing drops the oldest entry rather than growing unbounded
//! or rejecting the new one (spec §4.3, "Queue policy").

use std::collections::VecDeque;

pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    bound: usize,
    dropped: u64,
}

impl<T> BoundedQueue<T> {
    pub fn new(bound: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(bound.min(1024)),
            bound,
            dropped: 0,
        }
    }

    /// Appends `item`; if the queue is already at its bound, drops the
    /// oldest entry first and counts the drop.
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.bound {
            self.items.pop_front();
            self.dropped += 1;
        }
        self.items.push_back(item);
    }

    /// Removes up to `n` oldest items, in enqueue order.
    pub fn pop_front_batch(&mut self, n: usize) -> Vec<T> {
        let n = n.min(self.items.len());
        self.items.drain(..n).collect()
    }

    /// Prepends a batch back to the head (a failed send being requeued),
    /// truncating from the tail (newest items) if that would exceed the
    /// bound (spec §4.3, "Flush policy" step 4).
    pub fn requeue_front(&mut self, mut batch: Vec<T>) {
        batch.extend(std::mem::take(&mut self.items));
        self.items = batch.into();
        while self.items.len() > self.bound {
            self.items.pop_back();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_length_never_exceeds_bound() {
        let mut q = BoundedQueue::new(3);
        for i in 0..10 {
            q.push(i);
            assert!(q.len() <= 3);
        }
    }

    #[test]
    fn scenario_b_queue_drop_under_outage() {
        let mut q = BoundedQueue::new(10_000);
        for i in 0..10_050 {
            q.push(i);
        }
        assert_eq!(q.dropped(), 50);
        assert_eq!(q.len(), 10_000);
        let batch = q.pop_front_batch(1);
        assert_eq!(batch[0], 50, "head should be event #51 (index 50)");
    }

    #[test]
    fn retained_items_are_the_most_recently_enqueued() {
        let mut q = BoundedQueue::new(5);
        for i in 0..8 {
            q.push(i);
        }
        let remaining: Vec<_> = q.pop_front_batch(5);
        assert_eq!(remaining, vec![3, 4, 5, 6, 7]);
    }

    #[quickcheck_macros::quickcheck]
    fn property_bounded_and_drop_count_exact(bound: usize, k: usize) -> quickcheck::TestResult {
        if bound == 0 || bound > 2000 || k > 5000 {
            return quickcheck::TestResult::discard();
        }
        let mut q = BoundedQueue::new(bound);
        for i in 0..k {
            q.push(i);
            if q.len() > bound {
                return quickcheck::TestResult::failed();
            }
        }
        let expected_drops = k.saturating_sub(bound) as u64;
        quickcheck::TestResult::from_bool(q.dropped() == expected_drops && q.len() == k.min(bound))
    }

    #[test]
    fn requeue_truncates_newest_items_to_fit_bound() {
        let mut q = BoundedQueue::new(4);
        q.push(10);
        q.push(11);
        let failed_batch = vec![1, 2, 3, 4];
        q.requeue_front(failed_batch);
        assert_eq!(q.len(), 4);
        let all = q.pop_front_batch(4);
        assert_eq!(all, vec![1, 2, 3, 4]);
    }
}
