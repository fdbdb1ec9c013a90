//! Test doubles and fixture builders shared across this crate's unit and integration tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dpos_mempool_config::MempoolConfig;
use dpos_mempool_types::{ApplyError, ApplyTransactions, ApplyVerdict, Transaction};
use dpos_time::test_utils::FakeWallClock;
use num_bigint::BigUint;

use crate::pool::TransactionPool;

/// A canned `apply` double. Defaults every transaction to `OK`; individual ids can be pinned to a
/// specific verdict via [`FakeApply::set_verdict`].
#[derive(Clone, Default)]
pub struct FakeApply {
    overrides: Arc<Mutex<HashMap<String, ApplyVerdict>>>,
}

impl FakeApply {
    /// An apply double that approves everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `id`'s verdict for every future `apply` call that includes it.
    pub fn set_verdict(&self, id: impl Into<String>, verdict: ApplyVerdict) {
        self.overrides.lock().unwrap().insert(id.into(), verdict);
    }
}

#[async_trait]
impl ApplyTransactions for FakeApply {
    async fn apply(&self, transactions: &[Transaction]) -> Result<Vec<ApplyVerdict>, ApplyError> {
        let overrides = self.overrides.lock().unwrap();
        Ok(transactions
            .iter()
            .map(|tx| overrides.get(&tx.id).cloned().unwrap_or(ApplyVerdict::Ok))
            .collect())
    }
}

/// Builds a `Transaction` fixture. `sender_public_key` is set to `sender`'s UTF-8 bytes so the
/// identity [`address_of`](test_address_of) double can recover it.
pub fn test_transaction(id: &str, sender: &str, nonce: u64, fee: u64, min_fee: u64) -> Transaction {
    Transaction {
        id: id.to_owned(),
        sender_public_key: sender.as_bytes().to_vec(),
        nonce: BigUint::from(nonce),
        fee: BigUint::from(fee),
        min_fee: BigUint::from(min_fee),
    }
}

/// Recovers the sender address as the UTF-8 decoding of the raw public key, matching how
/// [`test_transaction`] encodes it.
pub fn test_address_of(public_key: &[u8]) -> String {
    String::from_utf8_lossy(public_key).into_owned()
}

/// A fixed-length encoding: every transaction occupies `len` bytes regardless of content. Keeps
/// `fee_priority` arithmetic in tests predictable.
pub fn fixed_bytes_of(len: usize) -> impl Fn(&Transaction) -> Vec<u8> + Send + Sync + Clone {
    move |_tx: &Transaction| vec![0u8; len]
}

/// Builds a pool wired with [`FakeApply`], the identity address function, a fixed transaction
/// byte length, and a [`FakeWallClock`] pinned to the current instant — returning the pool plus
/// handles to the apply double and clock so tests can steer both.
pub fn test_pool(
    config: MempoolConfig,
) -> (TransactionPool<FakeApply>, FakeApply, Arc<FakeWallClock>) {
    let apply = FakeApply::new();
    let clock = Arc::new(FakeWallClock::default());
    let pool = TransactionPool::new(
        config,
        Arc::new(apply.clone()),
        Arc::new(test_address_of),
        Arc::new(fixed_bytes_of(10)),
        clock.clone(),
    );
    (pool, apply, clock)
}
