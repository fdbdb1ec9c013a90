//! The mempool's synchronous event bus: `transaction:added` and `transaction:removed(reason)`.
//!
//! Events are delivered synchronously, in-line with the mutation that caused them. Handlers must
//! not re-enter the pool from within their callback; the pool does not guard against it.

use strum_macros::Display;

use crate::transaction::TransactionId;

/// Why a transaction was removed from the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum RemovalReason {
    /// Evicted to make room for a higher-priority admission.
    PoolFull,
    /// Aged past `transaction_expiry_time`.
    Expired,
    /// Removed by an explicit caller `remove`, typically after block inclusion.
    Explicit,
    /// Superseded by a same-nonce replacement with a sufficiently higher fee.
    Replaced,
}

/// An event emitted by the pool.
#[derive(Clone, Debug, PartialEq)]
pub enum MempoolEvent {
    /// A transaction was admitted.
    TransactionAdded {
        /// The admitted transaction's id.
        id: TransactionId,
    },
    /// A transaction left the pool.
    TransactionRemoved {
        /// The removed transaction's id.
        id: TransactionId,
        /// Why it was removed.
        reason: RemovalReason,
    },
}

/// A handler registered on the pool's event bus.
pub trait MempoolEventHandler: Send + Sync {
    /// Handles a single event. Must not call back into the pool.
    fn handle(&self, event: &MempoolEvent);
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;

    use super::{MempoolEvent, MempoolEventHandler, RemovalReason};

    #[derive(Default)]
    struct RecordingHandler {
        events: Mutex<Vec<MempoolEvent>>,
    }

    impl MempoolEventHandler for RecordingHandler {
        fn handle(&self, event: &MempoolEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn test_handler_records_events_in_order() {
        let handler = RecordingHandler::default();
        handler.handle(&MempoolEvent::TransactionAdded { id: "tx1".to_owned() });
        handler.handle(&MempoolEvent::TransactionRemoved {
            id: "tx1".to_owned(),
            reason: RemovalReason::Expired,
        });
        let events = handler.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            MempoolEvent::TransactionAdded { id: "tx1".to_owned() }
        );
    }

    #[test]
    fn test_removal_reason_display() {
        assert_eq!(RemovalReason::PoolFull.to_string(), "pool_full");
        assert_eq!(RemovalReason::Replaced.to_string(), "replaced");
    }
}
