use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Armed state of one (node, slot) timer. The generation counter is bumped
/// on every arm and cancel, so a queued firing from a cleared handle is
/// recognized as stale and never delivered.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotTimer {
    pub armed: bool,
    pub generation: u64,
}

#[derive(Debug)]
pub struct PendingTimer {
    pub deadline: u64,
    pub sequence: u64,
    pub node: usize,
    pub slot: u32,
    pub generation: u64,
}

impl PartialEq for PendingTimer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}

impl Eq for PendingTimer {}

impl PartialOrd for PendingTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (BinaryHeap is max-heap by default)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

/// Virtual-time timer queue shared by every node in a rack.
///
/// Entries fire in deadline order; ties break by scheduling order, which
/// keeps firings deterministic within a single rack. Ordering across racks
/// is intentionally unspecified.
pub struct TimerQueue {
    queue: BinaryHeap<PendingTimer>,
    sequence_counter: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            sequence_counter: 0,
        }
    }

    /// Schedule a firing for `(node, slot)` at an absolute deadline.
    pub fn schedule(&mut self, deadline: u64, node: usize, slot: u32, generation: u64) {
        self.queue.push(PendingTimer {
            deadline,
            sequence: self.sequence_counter,
            node,
            slot,
            generation,
        });
        self.sequence_counter += 1;
    }

    /// Earliest deadline still queued, stale entries included.
    pub fn peek_deadline(&self) -> Option<u64> {
        self.queue.peek().map(|t| t.deadline)
    }

    /// Pop the next entry due at or before `deadline`.
    pub fn pop_due(&mut self, deadline: u64) -> Option<PendingTimer> {
        if self.peek_deadline()? <= deadline {
            self.queue.pop()
        } else {
            None
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl Default for TimerQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deadline_order_with_sequence_tiebreak() {
        let mut q = TimerQueue::new();
        q.schedule(50, 0, 1, 1);
        q.schedule(10, 1, 1, 1);
        q.schedule(10, 2, 1, 1);

        let first = q.pop_due(100).unwrap();
        let second = q.pop_due(100).unwrap();
        let third = q.pop_due(100).unwrap();
        assert_eq!((first.node, first.deadline), (1, 10));
        assert_eq!((second.node, second.deadline), (2, 10));
        assert_eq!((third.node, third.deadline), (0, 50));
        assert!(q.pop_due(100).is_none());
    }

    #[test]
    fn test_pop_due_respects_horizon() {
        let mut q = TimerQueue::new();
        q.schedule(30, 0, 1, 1);
        assert!(q.pop_due(29).is_none());
        assert!(q.pop_due(30).is_some());
    }
}
