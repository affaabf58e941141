//! Ordering key for the simulation's event queue.

use crate::NodeIndex;
use diversity_core::{Event, EventPriority};
use std::time::Duration;

/// Key for ordering events in the queue.
///
/// Events are ordered by time, then priority, then node, then insertion
/// sequence, so two runs with the same seed pop events in the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventKey {
    pub time: Duration,
    pub priority: EventPriority,
    pub node_index: NodeIndex,
    pub sequence: u64,
}

impl EventKey {
    pub fn new(time: Duration, event: &Event, node_index: NodeIndex, sequence: u64) -> Self {
        Self {
            time,
            priority: event.priority(),
            node_index,
            sequence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diversity_types::test_utils::test_block;
    use std::collections::BTreeMap;

    #[test]
    fn test_orders_by_time_then_priority() {
        let block = Event::BlockReceived {
            block: test_block(1, 1),
        };
        let tick = Event::ConsensusTimer;

        let mut queue = BTreeMap::new();
        queue.insert(EventKey::new(Duration::from_millis(20), &tick, 0, 1), "late tick");
        queue.insert(EventKey::new(Duration::from_millis(10), &block, 0, 2), "block");
        queue.insert(EventKey::new(Duration::from_millis(10), &tick, 1, 3), "tick");

        let order: Vec<_> = queue.into_values().collect();
        assert_eq!(order, vec!["tick", "block", "late tick"]);
    }

    #[test]
    fn test_sequence_breaks_ties() {
        let tick = Event::ConsensusTimer;
        let first = EventKey::new(Duration::ZERO, &tick, 2, 1);
        let second = EventKey::new(Duration::ZERO, &tick, 2, 2);
        assert!(first < second);
    }
}
