//! The external `apply` callback: the pool's only window into the block-execution state machine.
//!
//! `apply` is modeled as a sum type rather than a boolean so that a rejection can carry enough
//! structure to distinguish a nonce gap (which keeps a transaction in the pool, unprocessable)
//! from any other failure (which evicts it outright).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::transaction::Transaction;

/// A single field-level complaint returned by `apply` for a rejected transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictError {
    /// The JSON-pointer-like path of the field that failed, e.g. `".nonce"`.
    pub data_path: String,
    /// The actual value observed.
    pub actual: Value,
    /// The value that was expected.
    pub expected: Value,
}

impl VerdictError {
    /// Whether this error reports a nonce mismatch, i.e. a gap between the submitted nonce and
    /// the account's expected next nonce. A verdict carrying this signal keeps the transaction in
    /// the pool as unprocessable rather than rejecting it outright.
    pub fn is_nonce_gap(&self) -> bool {
        self.data_path == ".nonce"
    }
}

/// The verdict `apply` returns for a single transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "UPPERCASE")]
pub enum ApplyVerdict {
    /// The transaction would succeed against current chain state.
    Ok,
    /// The transaction would fail, with field-level detail.
    Fail {
        /// The field-level complaints.
        errors: Vec<VerdictError>,
    },
}

impl ApplyVerdict {
    /// Whether this verdict is a nonce-gap failure: a `FAIL` carrying a `.nonce` complaint and no
    /// other complaint is treated as "not yet executable", not "invalid".
    pub fn is_nonce_gap(&self) -> bool {
        match self {
            ApplyVerdict::Ok => false,
            ApplyVerdict::Fail { errors } => errors.iter().any(VerdictError::is_nonce_gap),
        }
    }

    /// Whether this verdict is `OK`.
    pub fn is_ok(&self) -> bool {
        matches!(self, ApplyVerdict::Ok)
    }
}

/// Raised when the injected `apply` callback itself fails (as opposed to returning `FAIL`
/// verdicts for individual transactions).
#[derive(Clone, Debug, thiserror::Error)]
#[error("apply callback failed: {message}")]
pub struct ApplyError {
    /// A human-readable description of the failure.
    pub message: String,
}

/// The external validator: judges whether transactions would succeed against current chain
/// state. The pool calls this on every admission (with a single-transaction batch) and on every
/// reorganize cycle (with a per-sender candidate batch). Implementations must be pure with
/// respect to pool state.
#[async_trait]
pub trait ApplyTransactions: Send + Sync {
    /// Returns one verdict per transaction in `transactions`, in the same order.
    async fn apply(&self, transactions: &[Transaction]) -> Result<Vec<ApplyVerdict>, ApplyError>;
}
