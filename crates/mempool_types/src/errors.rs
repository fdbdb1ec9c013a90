//! Errors returned by the mempool's admission path.
//!
//! These are data-dependent rejections, not programmer errors: a caller submitting a
//! low-fee or conflicting transaction is expected behavior, not a bug. Internal invariant
//! violations are a different matter and are not represented here — they panic, since they
//! indicate a defect in the pool itself rather than a property of the submitted data.

use num_bigint::BigUint;

use crate::apply::VerdictError;
use crate::transaction::{Address, TransactionId};

/// The reason an `add` call was rejected.
#[derive(Clone, Debug, thiserror::Error, PartialEq)]
pub enum MempoolError {
    /// `fee_priority(tx) < min_entrance_fee_priority`.
    #[error(
        "Transaction fee_priority {fee_priority} is below the entrance floor \
         {min_entrance_fee_priority}."
    )]
    InsufficientEntranceFee { fee_priority: BigUint, min_entrance_fee_priority: BigUint },

    /// The global cap is reached and no eviction candidate could be found.
    #[error("Mempool is full and no eviction candidate was found.")]
    PoolFull,

    /// The sender's per-account cap is reached and the new transaction's nonce is not lower
    /// than any nonce already held for that sender.
    #[error(
        "Account {sender_address} already holds its maximum of transactions and nonce {nonce} \
         is not lower than any of them."
    )]
    PoolFullForAccount { sender_address: Address, nonce: BigUint },

    /// A same-nonce conflict whose fee delta over the incumbent is below
    /// `min_replacement_fee_difference`.
    #[error(
        "Replacing transaction {incumbent_id} at nonce {nonce} requires a fee of at least \
         {required_fee}, got {offered_fee}."
    )]
    InsufficientReplacementFee {
        incumbent_id: TransactionId,
        nonce: BigUint,
        required_fee: BigUint,
        offered_fee: BigUint,
    },

    /// A same-nonce conflict with an incumbent that is already processable.
    #[error("Transaction {incumbent_id} at nonce {nonce} is processable and cannot be replaced.")]
    ProcessableNonceLocked { incumbent_id: TransactionId, nonce: BigUint },

    /// `apply` returned `FAIL` for a reason other than a nonce gap.
    #[error("Transaction rejected by apply: {errors:?}")]
    InvalidTransaction { errors: Vec<VerdictError> },
}

impl MempoolError {
    /// A stable, metric-label-friendly name for this error's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            MempoolError::InsufficientEntranceFee { .. } => "insufficient_entrance_fee",
            MempoolError::PoolFull => "pool_full",
            MempoolError::PoolFullForAccount { .. } => "pool_full_for_account",
            MempoolError::InsufficientReplacementFee { .. } => "insufficient_replacement_fee",
            MempoolError::ProcessableNonceLocked { .. } => "processable_nonce_locked",
            MempoolError::InvalidTransaction { .. } => "invalid_transaction",
        }
    }
}
