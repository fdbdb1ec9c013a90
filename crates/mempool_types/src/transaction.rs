//! The transaction model consumed by the mempool.
//!
//! The mempool treats transactions as mostly opaque: signature verification, address derivation,
//! and serialization are external collaborators. A [`Transaction`] carries only the fields the
//! pool needs to make admission and ordering decisions; a [`PooledTransaction`] is the record the
//! pool actually stores, augmented with the fields it derives on admission (`sender_address`,
//! `bytes_length`, `fee_priority`, `received_at`).

use chrono::{DateTime, Utc};
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::fee::fee_priority;

/// A stable, unique transaction identifier.
pub type TransactionId = String;

/// An account address, derived from a sender's public key by the external `address_of` function.
pub type Address = String;

/// A transaction as submitted to the mempool.
///
/// `nonce`, `fee`, and `min_fee` are unsigned big integers: on-chain nonces and fees are not
/// bounded by a machine word, and `fee_priority` must be computed without floating point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Stable unique identifier.
    pub id: TransactionId,
    /// The sender's raw public key. `address_of(sender_public_key)` yields the sender address.
    pub sender_public_key: Vec<u8>,
    /// Strictly monotone per sender on-chain.
    pub nonce: BigUint,
    /// The fee the sender offers.
    pub fee: BigUint,
    /// The minimal fee the chain currently requires.
    pub min_fee: BigUint,
}

/// The record the pool stores for an admitted transaction: the original [`Transaction`] plus the
/// fields the pool derives on admission via the external `address_of` and `bytes_of` functions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PooledTransaction {
    /// The admitted transaction.
    pub tx: Transaction,
    /// `address_of(tx.sender_public_key)`, derived once on admission.
    pub sender_address: Address,
    /// `len(bytes_of(tx))`, cached on admission.
    pub bytes_length: usize,
    /// `(fee - min_fee) / bytes_length`, cached on admission; the sole cross-sender ordering key.
    pub fee_priority: BigUint,
    /// Wall-clock instant stamped on successful admission.
    pub received_at: DateTime<Utc>,
}

impl PooledTransaction {
    /// Builds a pooled record from a submitted transaction and the externally-derived
    /// `sender_address` and `bytes_length`, stamping `received_at` as `now`.
    pub fn new(
        tx: Transaction,
        sender_address: Address,
        bytes_length: usize,
        received_at: DateTime<Utc>,
    ) -> Self {
        let fee_priority = fee_priority(&tx.fee, &tx.min_fee, bytes_length);
        PooledTransaction { tx, sender_address, bytes_length, fee_priority, received_at }
    }

    /// The transaction's id.
    pub fn id(&self) -> &TransactionId {
        &self.tx.id
    }

    /// The transaction's nonce.
    pub fn nonce(&self) -> &BigUint {
        &self.tx.nonce
    }
}
