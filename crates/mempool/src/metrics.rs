//! Mempool metrics, exported through the `metrics` facade so any recorder (Prometheus, in
//! particular) can be attached by the binary that wires up the pool.

use dpos_mempool_types::RemovalReason;
use metrics::{counter, describe_counter, describe_gauge, gauge};

/// Number of transactions currently resident in the pool.
pub const MEMPOOL_POOL_SIZE: &str = "dpos_mempool_pool_size";
/// Number of ids currently tracked by the fee-priority queue. Always equal to the pool size;
/// exported separately so a drift between the two (a bug) is visible on a dashboard.
pub const MEMPOOL_PRIORITY_QUEUE_SIZE: &str = "dpos_mempool_priority_queue_size";
/// Total number of transactions accepted by `add`.
pub const MEMPOOL_TRANSACTIONS_RECEIVED: &str = "dpos_mempool_transactions_received_total";
/// Total number of transactions that left the pool, labeled by `reason`.
pub const MEMPOOL_TRANSACTIONS_DROPPED: &str = "dpos_mempool_transactions_dropped_total";
/// Total number of admissions rejected, labeled by `error`.
pub const MEMPOOL_ADMISSION_REJECTED: &str = "dpos_mempool_admission_rejected_total";
/// Total number of reorganize cycles completed.
pub const MEMPOOL_REORGANIZE_RUNS: &str = "dpos_mempool_reorganize_runs_total";

/// Registers descriptions for all metrics this crate emits. Call once at process startup, after
/// installing a recorder.
pub fn register_metrics() {
    describe_gauge!(MEMPOOL_POOL_SIZE, "Number of transactions currently resident in the pool.");
    describe_gauge!(
        MEMPOOL_PRIORITY_QUEUE_SIZE,
        "Number of ids tracked by the fee-priority queue."
    );
    describe_counter!(MEMPOOL_TRANSACTIONS_RECEIVED, "Transactions accepted by add.");
    describe_counter!(MEMPOOL_TRANSACTIONS_DROPPED, "Transactions that left the pool.");
    describe_counter!(MEMPOOL_ADMISSION_REJECTED, "Admissions rejected by add.");
    describe_counter!(MEMPOOL_REORGANIZE_RUNS, "Reorganize cycles completed.");
}

pub(crate) fn record_pool_size(size: usize) {
    gauge!(MEMPOOL_POOL_SIZE).set(size as f64);
}

pub(crate) fn record_priority_queue_size(size: usize) {
    gauge!(MEMPOOL_PRIORITY_QUEUE_SIZE).set(size as f64);
}

pub(crate) fn record_transaction_received() {
    counter!(MEMPOOL_TRANSACTIONS_RECEIVED).increment(1);
}

pub(crate) fn record_transaction_dropped(reason: RemovalReason) {
    counter!(MEMPOOL_TRANSACTIONS_DROPPED, "reason" => reason.to_string()).increment(1);
}

pub(crate) fn record_admission_rejected(error: &str) {
    counter!(MEMPOOL_ADMISSION_REJECTED, "error" => error.to_string()).increment(1);
}

pub(crate) fn record_reorganize_run() {
    counter!(MEMPOOL_REORGANIZE_RUNS).increment(1);
}
