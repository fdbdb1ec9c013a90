//! [`TransactionPool`]: the facade owning the global id map, the per-sender
//! [`TransactionList`]s, and the global [`FeePriorityQueue`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dpos_mempool_config::MempoolConfig;
use dpos_mempool_types::{
    Address,
    ApplyTransactions,
    MempoolError,
    MempoolEvent,
    MempoolEventHandler,
    PooledTransaction,
    RemovalReason,
    Transaction,
    TransactionId,
};
use dpos_time::wall_clock::WallClock;
use num_bigint::BigUint;
use tracing::{debug, info, instrument, warn};

use crate::fee_priority_queue::FeePriorityQueue;
use crate::metrics;
use crate::transaction_list::TransactionList;

/// Derives a sender address from a raw public key. Cryptography and address derivation are
/// external collaborators; the pool only consumes this pure function.
pub type AddressOf = dyn Fn(&[u8]) -> Address + Send + Sync;
/// Serializes a transaction to bytes, for the `bytes_length` term of `fee_priority`.
/// Serialization is an external collaborator; the pool only consumes this pure function.
pub type BytesOf = dyn Fn(&Transaction) -> Vec<u8> + Send + Sync;

struct PoolState {
    /// `id -> (sender_address, nonce)`, a locator into `lists`. Logically the pool's
    /// `all_transactions` map; stored as a locator rather than a duplicate copy of every
    /// transaction so that a transaction has exactly one owning location (its sender's list).
    locator: HashMap<TransactionId, (Address, BigUint)>,
    lists: HashMap<Address, TransactionList>,
    queue: FeePriorityQueue,
}

impl PoolState {
    fn new() -> Self {
        PoolState { locator: HashMap::new(), lists: HashMap::new(), queue: FeePriorityQueue::new() }
    }

    fn len(&self) -> usize {
        self.locator.len()
    }

    fn get(&self, id: &TransactionId) -> Option<&PooledTransaction> {
        let (sender, nonce) = self.locator.get(id)?;
        self.lists.get(sender)?.get(nonce)
    }

    /// Removes `id` from every index. Returns the removed record, if any.
    fn remove(&mut self, id: &TransactionId) -> Option<PooledTransaction> {
        let (sender, nonce) = self.locator.remove(id)?;
        let list = self.lists.get_mut(&sender)?;
        let removed = list.get(&nonce).cloned();
        list.remove(&nonce);
        if list.is_empty() {
            self.lists.remove(&sender);
        }
        self.queue.remove(id);
        removed
    }
}

/// The transaction mempool.
///
/// Generic over the external `apply` callback so callers can plug in their own block-execution
/// probe (or a mock, in tests) without the pool depending on it concretely.
pub struct TransactionPool<A: ApplyTransactions> {
    state: Mutex<PoolState>,
    config: MempoolConfig,
    apply: Arc<A>,
    address_of: Arc<AddressOf>,
    bytes_of: Arc<BytesOf>,
    wall_clock: Arc<dyn WallClock>,
    handlers: Mutex<Vec<Arc<dyn MempoolEventHandler>>>,
    reorganize_lock: tokio::sync::Mutex<()>,
}

impl<A: ApplyTransactions> TransactionPool<A> {
    /// Builds an empty pool.
    pub fn new(
        config: MempoolConfig,
        apply: Arc<A>,
        address_of: Arc<AddressOf>,
        bytes_of: Arc<BytesOf>,
        wall_clock: Arc<dyn WallClock>,
    ) -> Self {
        TransactionPool {
            state: Mutex::new(PoolState::new()),
            config,
            apply,
            address_of,
            bytes_of,
            wall_clock,
            handlers: Mutex::new(Vec::new()),
            reorganize_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Registers an event handler. Handlers must not call back into the pool from within
    /// [`MempoolEventHandler::handle`].
    pub fn subscribe(&self, handler: Arc<dyn MempoolEventHandler>) {
        self.handlers.lock().unwrap().push(handler);
    }

    fn emit_all(&self, events: Vec<MempoolEvent>) {
        if events.is_empty() {
            return;
        }
        let handlers = self.handlers.lock().unwrap();
        for event in &events {
            if let MempoolEvent::TransactionRemoved { reason, .. } = event {
                metrics::record_transaction_dropped(*reason);
            }
            for handler in handlers.iter() {
                handler.handle(event);
            }
        }
    }

    fn record_size_metrics(&self, state: &PoolState) {
        metrics::record_pool_size(state.len());
        metrics::record_priority_queue_size(state.queue.len());
    }

    /// Admits `tx`. Idempotent: re-admitting an already-present id returns `Ok(())` as a no-op.
    #[instrument(skip(self, tx), fields(id = %tx.id))]
    pub async fn add(&self, tx: Transaction) -> Result<(), MempoolError> {
        {
            let state = self.state.lock().unwrap();
            if state.locator.contains_key(&tx.id) {
                debug!("duplicate admission, idempotent no-op");
                return Ok(());
            }
        }

        let bytes_length = (self.bytes_of)(&tx).len();
        let sender_address = (self.address_of)(&tx.sender_public_key);
        let priority = dpos_mempool_types::fee_priority(&tx.fee, &tx.min_fee, bytes_length);
        let min_entrance = BigUint::from(self.config.min_entrance_fee_priority);
        if priority < min_entrance {
            metrics::record_admission_rejected("insufficient_entrance_fee");
            return Err(MempoolError::InsufficientEntranceFee {
                fee_priority: priority,
                min_entrance_fee_priority: min_entrance,
            });
        }

        let mut evict_events = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            if state.len() >= self.config.max_transactions {
                let Some((min_priority, _)) = state.queue.peek_min().map(|(p, id)| (p.clone(), id.clone()))
                else {
                    metrics::record_admission_rejected("pool_full");
                    return Err(MempoolError::PoolFull);
                };
                if priority <= min_priority {
                    metrics::record_admission_rejected("pool_full");
                    return Err(MempoolError::PoolFull);
                }
                match evict_for_capacity(&mut state) {
                    Some(event) => evict_events.push(event),
                    None => {
                        metrics::record_admission_rejected("pool_full");
                        return Err(MempoolError::PoolFull);
                    }
                }
            }
        }
        self.emit_all(evict_events);

        let verdicts = self
            .apply
            .apply(std::slice::from_ref(&tx))
            .await
            .unwrap_or_else(|err| {
                warn!(error = %err, "apply failed during admission probe, treating as FAIL");
                vec![dpos_mempool_types::ApplyVerdict::Fail { errors: vec![] }]
            });
        let verdict = verdicts.into_iter().next().unwrap_or(dpos_mempool_types::ApplyVerdict::Fail {
            errors: vec![],
        });
        if !verdict.is_ok() && !verdict.is_nonce_gap() {
            let errors = match verdict {
                dpos_mempool_types::ApplyVerdict::Fail { errors } => errors,
                dpos_mempool_types::ApplyVerdict::Ok => vec![],
            };
            metrics::record_admission_rejected("invalid_transaction");
            return Err(MempoolError::InvalidTransaction { errors });
        }

        let received_at = self.wall_clock.now();
        let pooled = PooledTransaction::new(tx, sender_address.clone(), bytes_length, received_at);
        let id = pooled.tx.id.clone();
        let nonce = pooled.nonce().clone();
        let fee_priority = pooled.fee_priority.clone();

        let mut events = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            let list = state
                .lists
                .entry(sender_address.clone())
                .or_insert_with(|| {
                    TransactionList::new(
                        self.config.max_transactions_per_account,
                        BigUint::from(self.config.min_replacement_fee_difference),
                    )
                });
            let outcome = list.add(pooled, false);
            if !outcome.added {
                let reason = outcome.reason.expect("rejected outcome carries a reason");
                metrics::record_admission_rejected(reason.kind());
                return Err(reason);
            }
            if let Some(removed_id) = outcome.removed_id {
                state.locator.remove(&removed_id);
                state.queue.remove(&removed_id);
                events.push(MempoolEvent::TransactionRemoved {
                    id: removed_id,
                    reason: RemovalReason::Replaced,
                });
            }
            state.locator.insert(id.clone(), (sender_address, nonce));
            state.queue.insert(fee_priority, received_at, id.clone());
            metrics::record_transaction_received();
            self.record_size_metrics(&state);
        }
        events.push(MempoolEvent::TransactionAdded { id });
        self.emit_all(events);
        Ok(())
    }

    /// Removes `id` from the pool. Returns `false` if it was absent.
    pub fn remove(&self, id: &TransactionId) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(_) = state.remove(id) else {
            return false;
        };
        self.record_size_metrics(&state);
        drop(state);
        self.emit_all(vec![MempoolEvent::TransactionRemoved {
            id: id.clone(),
            reason: RemovalReason::Explicit,
        }]);
        true
    }

    /// Looks up a transaction by id.
    pub fn get(&self, id: &TransactionId) -> Option<Transaction> {
        self.state.lock().unwrap().get(id).map(|pooled| pooled.tx.clone())
    }

    /// Whether `id` is currently resident.
    pub fn contains(&self, id: &TransactionId) -> bool {
        self.state.lock().unwrap().locator.contains_key(id)
    }

    /// A snapshot of every resident transaction.
    pub fn get_all(&self) -> Vec<Transaction> {
        let state = self.state.lock().unwrap();
        state.lists.values().flat_map(|list| list.get_processable().into_iter().chain(list.get_unprocessable())).map(|pooled| pooled.tx.clone()).collect()
    }

    /// A deep copy of every sender's processable transactions, keyed by sender address. Mutating
    /// the returned map does not affect pool state.
    pub fn get_processable_transactions(&self) -> HashMap<Address, Vec<Transaction>> {
        let state = self.state.lock().unwrap();
        state
            .lists
            .iter()
            .filter_map(|(sender, list)| {
                let processable = list.get_processable();
                if processable.is_empty() {
                    None
                } else {
                    Some((
                        sender.clone(),
                        processable.into_iter().map(|pooled| pooled.tx.clone()).collect(),
                    ))
                }
            })
            .collect()
    }

    /// The number of resident transactions.
    pub fn len(&self) -> usize {
        self.state.lock().unwrap().len()
    }

    /// Whether the pool holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs one reorganize cycle: for each sender, probes the processable set plus the
    /// promotable prefix against `apply`, and re-partitions based on the verdicts. A reorganize
    /// already in flight causes this call to return immediately without running a second one.
    #[instrument(skip(self))]
    pub async fn reorganize(&self) {
        let Ok(_guard) = self.reorganize_lock.try_lock() else {
            debug!("reorganize already in flight, skipping this tick");
            return;
        };

        let senders: Vec<Address> = {
            let state = self.state.lock().unwrap();
            state.lists.keys().cloned().collect()
        };

        for sender in senders {
            let candidates: Vec<Transaction> = {
                let state = self.state.lock().unwrap();
                let Some(list) = state.lists.get(&sender) else { continue };
                list.get_processable()
                    .into_iter()
                    .chain(list.get_promotable())
                    .map(|pooled| pooled.tx.clone())
                    .collect()
            };
            if candidates.is_empty() {
                continue;
            }

            let verdicts = match self.apply.apply(&candidates).await {
                Ok(verdicts) => verdicts,
                Err(err) => {
                    warn!(error = %err, %sender, "apply failed during reorganize, treating batch as FAIL");
                    candidates
                        .iter()
                        .map(|_| dpos_mempool_types::ApplyVerdict::Fail { errors: vec![] })
                        .collect()
                }
            };

            let mut last_ok_nonce: Option<BigUint> = None;
            let mut ok_nonces = Vec::new();
            for (tx, verdict) in candidates.iter().zip(verdicts.iter()) {
                if verdict.is_ok() {
                    last_ok_nonce = Some(tx.nonce.clone());
                    ok_nonces.push(tx.nonce.clone());
                } else {
                    break;
                }
            }

            let mut state = self.state.lock().unwrap();
            // The sender may have been removed entirely (e.g. by a concurrent `remove` or
            // `expire`) while we awaited `apply`; if so there is nothing left to reorganize.
            if let Some(list) = state.lists.get_mut(&sender) {
                list.demote_after(last_ok_nonce.as_ref());
                list.promote(ok_nonces);
            }
        }

        metrics::record_reorganize_run();
        info!("reorganize cycle complete");
    }

    /// Removes every transaction whose age exceeds `transaction_expiry_time`.
    #[instrument(skip(self))]
    pub fn expire(&self) {
        let now = self.wall_clock.now();
        let expired_ids: Vec<TransactionId> = {
            let state = self.state.lock().unwrap();
            let locator = &state.locator;
            let lists = &state.lists;
            locator
                .iter()
                .filter_map(|(id, (sender, nonce))| {
                    let tx = lists.get(sender)?.get(nonce)?;
                    let age = now.signed_duration_since(tx.received_at).to_std().ok()?;
                    if age > self.config.transaction_expiry_time {
                        Some(id.clone())
                    } else {
                        None
                    }
                })
                .collect()
        };

        let mut events = Vec::new();
        {
            let mut state = self.state.lock().unwrap();
            for id in &expired_ids {
                if state.remove(id).is_some() {
                    events.push(MempoolEvent::TransactionRemoved {
                        id: id.clone(),
                        reason: RemovalReason::Expired,
                    });
                }
            }
            self.record_size_metrics(&state);
        }
        self.emit_all(events);
    }
}

/// Attempts to evict exactly one transaction to make room for an incoming admission. Tries an
/// unprocessable entry first (§4.4a); only if none exists does it fall back to a processable
/// one (§4.4b).
fn evict_for_capacity(state: &mut PoolState) -> Option<MempoolEvent> {
    if let Some(id) = evict_unprocessable(state) {
        metrics::record_admission_rejected("evicted_unprocessable");
        return Some(MempoolEvent::TransactionRemoved { id, reason: RemovalReason::PoolFull });
    }
    evict_processable(state)
        .map(|id| MempoolEvent::TransactionRemoved { id, reason: RemovalReason::PoolFull })
}

fn evict_unprocessable(state: &mut PoolState) -> Option<TransactionId> {
    let ascending: Vec<TransactionId> = state.queue.iter_ascending().cloned().collect();
    let candidate = {
        let locator = &state.locator;
        let lists = &state.lists;
        ascending.into_iter().find(|id| {
            let Some((sender, nonce)) = locator.get(id) else { return false };
            let Some(list) = lists.get(sender) else { return false };
            list.get_unprocessable().iter().any(|tx| &tx.tx.nonce == nonce)
        })
    };
    let id = candidate?;
    state.remove(&id);
    Some(id)
}

/// Among all senders, picks the highest-nonce processable transaction whose sender achieves the
/// minimum `fee_priority` among such per-sender maxima. Ties broken by sender address for a
/// deterministic result.
fn evict_processable(state: &mut PoolState) -> Option<TransactionId> {
    let mut best: Option<(BigUint, Address, TransactionId)> = None;
    for (sender, list) in state.lists.iter() {
        let Some(frontier) = list.get_processable().into_iter().last() else { continue };
        let candidate = (frontier.fee_priority.clone(), sender.clone(), frontier.tx.id.clone());
        best = Some(match best {
            None => candidate,
            Some(current) => {
                if candidate.0 < current.0 || (candidate.0 == current.0 && candidate.1 < current.1)
                {
                    candidate
                } else {
                    current
                }
            }
        });
    }
    let (_, _, id) = best?;
    state.remove(&id);
    Some(id)
}

#[cfg(test)]
mod tests {
    use dpos_mempool_config::MempoolConfig;
    use dpos_mempool_types::{ApplyVerdict, MempoolError, VerdictError};
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use crate::test_utils::{test_pool, test_transaction};

    #[fixture]
    fn small_config() -> MempoolConfig {
        MempoolConfig {
            max_transactions: 3,
            max_transactions_per_account: 3,
            min_entrance_fee_priority: 0,
            min_replacement_fee_difference: 10,
            ..MempoolConfig::default()
        }
    }

    #[rstest]
    #[tokio::test]
    async fn test_entrance_floor_rejects_low_fee_priority(small_config: MempoolConfig) {
        let mut config = small_config;
        config.min_entrance_fee_priority = 100;
        let (pool, _apply, _clock) = test_pool(config);

        let tx = test_transaction("t1", "alice", 0, 50, 0);
        let result = pool.add(tx).await;

        assert!(matches!(result, Err(MempoolError::InsufficientEntranceFee { .. })));
        assert_eq!(pool.len(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn test_full_pool_evicts_unprocessable_before_processable(small_config: MempoolConfig) {
        let (pool, apply, _clock) = test_pool(small_config);

        // alice and bob are admitted with low fee_priority and promoted to processable.
        pool.add(test_transaction("alice-1", "alice", 0, 300, 0)).await.unwrap();
        pool.add(test_transaction("bob-1", "bob", 0, 200, 0)).await.unwrap();
        pool.reorganize().await;
        assert_eq!(pool.get_processable_transactions().len(), 2);

        // carol has a nonce gap and the highest fee_priority of the three, but stays
        // unprocessable.
        apply.set_verdict(
            "carol-1",
            ApplyVerdict::Fail {
                errors: vec![VerdictError {
                    data_path: ".nonce".to_owned(),
                    actual: serde_json::json!(5),
                    expected: serde_json::json!(0),
                }],
            },
        );
        pool.add(test_transaction("carol-1", "carol", 5, 1000, 0)).await.unwrap();
        assert_eq!(pool.len(), 3);

        // dave's admission forces an eviction; carol, the unprocessable entry, is evicted even
        // though her fee_priority is higher than alice's or bob's.
        pool.add(test_transaction("dave-1", "dave", 0, 5000, 0)).await.unwrap();

        assert_eq!(pool.len(), 3);
        assert!(pool.contains(&"alice-1".to_owned()));
        assert!(pool.contains(&"bob-1".to_owned()));
        assert!(!pool.contains(&"carol-1".to_owned()));
        assert!(pool.contains(&"dave-1".to_owned()));
    }

    #[rstest]
    #[tokio::test]
    async fn test_low_priority_admission_rejected_when_pool_full(small_config: MempoolConfig) {
        let (pool, _apply, _clock) = test_pool(small_config);
        for (sender, fee) in [("alice", 100), ("bob", 200), ("carol", 300)] {
            pool.add(test_transaction(&format!("{sender}-1"), sender, 0, fee, 0)).await.unwrap();
        }

        let result = pool.add(test_transaction("low-1", "eve", 0, 1, 0)).await;

        assert!(matches!(result, Err(MempoolError::PoolFull)));
        assert_eq!(pool.len(), 3);
    }

    #[rstest]
    #[tokio::test]
    async fn test_replacement_requires_fee_delta(small_config: MempoolConfig) {
        let (pool, _apply, _clock) = test_pool(small_config);
        pool.add(test_transaction("a", "alice", 0, 100, 0)).await.unwrap();

        let too_low = pool.add(test_transaction("b", "alice", 0, 105, 0)).await;
        assert!(matches!(too_low, Err(MempoolError::InsufficientReplacementFee { .. })));
        assert!(pool.contains(&"a".to_owned()));

        pool.add(test_transaction("c", "alice", 0, 120, 0)).await.unwrap();
        assert!(!pool.contains(&"a".to_owned()));
        assert!(pool.contains(&"c".to_owned()));
    }

    #[rstest]
    #[tokio::test]
    async fn test_reorganize_promotes_contiguous_prefix(small_config: MempoolConfig) {
        let mut config = small_config;
        config.max_transactions = 10;
        config.max_transactions_per_account = 10;
        let (pool, apply, _clock) = test_pool(config);

        for (id, nonce) in [("n1", 1), ("n2", 2), ("n9", 9)] {
            pool.add(test_transaction(id, "alice", nonce, 100, 0)).await.unwrap();
        }
        apply.set_verdict(
            "n9",
            ApplyVerdict::Fail {
                errors: vec![VerdictError {
                    data_path: ".nonce".to_owned(),
                    actual: serde_json::json!(9),
                    expected: serde_json::json!(3),
                }],
            },
        );

        pool.reorganize().await;

        let processable = pool.get_processable_transactions();
        let alice = processable.get("alice").expect("alice has processable transactions");
        let mut ids: Vec<_> = alice.iter().map(|tx| tx.id.clone()).collect();
        ids.sort();
        assert_eq!(ids, vec!["n1".to_owned(), "n2".to_owned()]);
    }

    #[rstest]
    #[tokio::test]
    async fn test_reorganize_demotes_on_failure(small_config: MempoolConfig) {
        let mut config = small_config;
        config.max_transactions = 10;
        config.max_transactions_per_account = 10;
        let (pool, apply, _clock) = test_pool(config);

        pool.add(test_transaction("n1", "alice", 1, 100, 0)).await.unwrap();
        pool.reorganize().await;
        assert_eq!(pool.get_processable_transactions().get("alice").map(Vec::len), Some(1));

        apply.set_verdict("n1", ApplyVerdict::Fail { errors: vec![] });
        pool.reorganize().await;

        assert!(pool.get_processable_transactions().get("alice").is_none());
    }

    #[rstest]
    #[tokio::test]
    async fn test_expire_removes_aged_transactions(small_config: MempoolConfig) {
        let (pool, _apply, clock) = test_pool(small_config);
        pool.add(test_transaction("a", "alice", 0, 100, 0)).await.unwrap();

        clock.advance(std::time::Duration::from_secs(3 * 3600 + 1));
        pool.expire();

        assert_eq!(pool.len(), 0);
        assert!(!pool.contains(&"a".to_owned()));
    }

    #[rstest]
    #[tokio::test]
    async fn test_duplicate_add_is_idempotent(small_config: MempoolConfig) {
        let (pool, _apply, _clock) = test_pool(small_config);
        let tx = test_transaction("a", "alice", 0, 100, 0);
        pool.add(tx.clone()).await.unwrap();
        pool.add(tx).await.unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[rstest]
    #[tokio::test]
    async fn test_remove_then_readd_restores_pool(small_config: MempoolConfig) {
        let (pool, _apply, _clock) = test_pool(small_config);
        let tx = test_transaction("a", "alice", 0, 100, 0);
        pool.add(tx.clone()).await.unwrap();
        assert!(pool.remove(&"a".to_owned()));
        assert_eq!(pool.len(), 0);
        pool.add(tx).await.unwrap();
        assert_eq!(pool.len(), 1);
    }
}
