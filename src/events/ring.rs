use std::collections::VecDeque;

/// Fixed-capacity FIFO of recent scalar samples, used for the live
/// g-force trend. Oldest sample is evicted on overflow.
#[derive(Debug, Clone)]
pub struct RingHistory {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl RingHistory {
    /// Capacity must be at least 1.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "ring capacity must be at least 1");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
    }

    /// Defensive copy in push order, oldest first. O(capacity).
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_is_min_of_pushed_and_capacity() {
        let mut ring = RingHistory::new(4);
        assert_eq!(ring.len(), 0);

        for i in 0..3 {
            ring.push(i as f64);
        }
        assert_eq!(ring.len(), 3);

        for i in 3..10 {
            ring.push(i as f64);
        }
        assert_eq!(ring.len(), 4);
    }

    #[test]
    fn keeps_last_k_values_in_push_order() {
        let mut ring = RingHistory::new(3);
        for i in 0..7 {
            ring.push(i as f64);
        }
        assert_eq!(ring.snapshot(), vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn capacity_one_holds_latest_sample() {
        let mut ring = RingHistory::new(1);
        ring.push(1.0);
        ring.push(2.0);
        assert_eq!(ring.snapshot(), vec![2.0]);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let mut ring = RingHistory::new(2);
        ring.push(1.0);
        let snap = ring.snapshot();
        ring.push(2.0);
        assert_eq!(snap, vec![1.0]);
    }

    #[test]
    #[should_panic(expected = "ring capacity must be at least 1")]
    fn zero_capacity_is_rejected() {
        let _ = RingHistory::new(0);
    }
}
