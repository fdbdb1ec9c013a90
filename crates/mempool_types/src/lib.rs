#![warn(missing_docs)]
//! Shared data types for the transaction mempool: the transaction model, the `fee_priority`
//! ordering key, admission errors, the external `apply` callback contract, and the event bus
//! types emitted on admission and removal.

pub mod apply;
pub mod errors;
pub mod events;
pub mod fee;
pub mod transaction;

pub use apply::{ApplyError, ApplyTransactions, ApplyVerdict, VerdictError};
pub use errors::MempoolError;
pub use events::{MempoolEvent, MempoolEventHandler, RemovalReason};
pub use fee::fee_priority;
pub use transaction::{Address, PooledTransaction, Transaction, TransactionId};
