#![warn(missing_docs)]
//! A DPoS transaction mempool: per-sender nonce-ordered admission, a global
//! fee-priority-ordered bounded multiset, periodic reorganization against an external `apply`
//! probe, and periodic expiry.

mod fee_priority_queue;
mod metrics;
mod pool;
mod runner;
mod transaction_list;

#[cfg(any(feature = "testing", test))]
pub mod test_utils;

pub use metrics::register_metrics;
pub use pool::{AddressOf, BytesOf, TransactionPool};
pub use runner::PoolRunner;
