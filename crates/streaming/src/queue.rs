use foundation::ids::NodeId;
use foundation::time::Time;
use runtime::budget::FrameBudget;
use scene::node_store::NodeStore;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::debug;

use crate::protocol::{DropReason, parse_update};

/// Producer half. Sending never blocks.
pub type UpdateSender = mpsc::UnboundedSender<Value>;

/// Creates the producer/consumer pair for raw ingest records.
pub fn update_channel() -> (UpdateSender, UpdateQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, UpdateQueue { rx, closed: false })
}

/// Consumer half, drained once per frame.
#[derive(Debug)]
pub struct UpdateQueue {
    rx: mpsc::UnboundedReceiver<Value>,
    closed: bool,
}

/// Outcome of one [`UpdateQueue::drain_into`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrainReport {
    pub applied: usize,
    /// Ids seen for the first time, in arrival order.
    pub created: Vec<NodeId>,
    pub origin_set: bool,
    pub dropped: Vec<DropReason>,
    /// The budget ran out; more records may be waiting.
    pub exhausted: bool,
    /// Every sender is gone and the queue is empty.
    pub closed: bool,
}

impl DrainReport {
    pub fn received(&self) -> usize {
        self.applied + self.dropped.len()
    }
}

impl UpdateQueue {
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Records waiting to be drained.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Pulls records without waiting, one budget unit each, and merges them
    /// into `store`. Malformed records are dropped and reported.
    pub fn drain_into(
        &mut self,
        store: &NodeStore,
        now: Time,
        budget: &mut FrameBudget,
    ) -> DrainReport {
        let mut report = DrainReport {
            closed: self.closed,
            ..DrainReport::default()
        };
        if self.closed {
            return report;
        }

        loop {
            if budget.is_exhausted() {
                report.exhausted = !self.rx.is_empty();
                break;
            }
            let value = match self.rx.try_recv() {
                Ok(value) => value,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    report.closed = true;
                    break;
                }
            };
            budget.try_consume(1);

            match parse_update(&value) {
                Ok(update) => {
                    let id = update.id.clone();
                    let applied = store.apply_at(update, now);
                    report.applied += 1;
                    if applied.created {
                        report.created.push(id);
                    }
                    report.origin_set |= applied.origin_initialized;
                }
                Err(reason) => {
                    debug!(reason = %reason, "dropped ingest record");
                    report.dropped.push(reason);
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::update_channel;
    use foundation::ids::NodeId;
    use foundation::time::Time;
    use runtime::budget::FrameBudget;
    use scene::node_store::NodeStore;
    use serde_json::json;

    #[test]
    fn applies_and_reports() {
        let (tx, mut queue) = update_channel();
        let store = NodeStore::new();
        tx.send(json!({"id": "a", "lat": 10.0, "lon": 20.0})).unwrap();
        tx.send(json!({"id": "a"})).unwrap();
        tx.send(json!({"id": 5})).unwrap();
        tx.send(json!({"id": "b"})).unwrap();

        let mut budget = FrameBudget::new(512);
        let report = queue.drain_into(&store, Time(100.0), &mut budget);
        assert_eq!(report.applied, 3);
        assert_eq!(report.dropped.len(), 1);
        assert_eq!(report.received(), 4);
        assert_eq!(report.created, vec![NodeId::from("a"), NodeId::from("b")]);
        assert!(report.origin_set);
        assert!(!report.exhausted);
        assert!(!report.closed);
        assert_eq!(budget.spent_units(), 4);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn budget_caps_records_per_frame() {
        let (tx, mut queue) = update_channel();
        let store = NodeStore::new();
        for i in 0..10 {
            tx.send(json!({"id": format!("n{i}")})).unwrap();
        }

        let mut budget = FrameBudget::new(4);
        let first = queue.drain_into(&store, Time(1.0), &mut budget);
        assert_eq!(first.applied, 4);
        assert!(first.exhausted);
        assert_eq!(queue.pending(), 6);

        let mut budget = FrameBudget::new(100);
        let second = queue.drain_into(&store, Time(2.0), &mut budget);
        assert_eq!(second.applied, 6);
        assert!(!second.exhausted);
        assert_eq!(store.len(), 10);
    }

    #[test]
    fn exact_budget_with_empty_queue_is_not_exhausted() {
        let (tx, mut queue) = update_channel();
        let store = NodeStore::new();
        tx.send(json!({"id": "x"})).unwrap();
        let mut budget = FrameBudget::new(1);
        let report = queue.drain_into(&store, Time(1.0), &mut budget);
        assert_eq!(report.applied, 1);
        assert!(!report.exhausted);
    }

    #[test]
    fn closed_after_senders_drop() {
        let (tx, mut queue) = update_channel();
        let store = NodeStore::new();
        tx.send(json!({"id": "last"})).unwrap();
        drop(tx);

        let report = queue.drain_into(&store, Time(1.0), &mut FrameBudget::unlimited());
        assert_eq!(report.applied, 1);
        assert!(report.closed);
        assert!(queue.is_closed());

        let again = queue.drain_into(&store, Time(2.0), &mut FrameBudget::unlimited());
        assert_eq!(again.applied, 0);
        assert!(again.closed);
    }
}
