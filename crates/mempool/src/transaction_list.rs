//! Per-sender transaction storage: nonce-keyed, partitioned into a processable prefix and an
//! unprocessable tail.
//!
//! The partition is always a contiguous prefix of the sorted nonces (invariant I4): once a
//! nonce is unprocessable, every larger nonce held for the same sender is unprocessable too. This
//! means the unprocessable tail and the "promotable" block described in the reorganize contract
//! are the same set of entries — the distinct names exist because they're used for different
//! purposes, not because they can diverge.

use std::collections::BTreeSet;

use dpos_mempool_types::{MempoolError, PooledTransaction, TransactionId};
use indexmap::IndexMap;
use num_bigint::BigUint;

/// The result of attempting to add a transaction to a sender's list.
#[derive(Debug)]
pub struct AddOutcome {
    /// Whether the transaction was admitted into this list.
    pub added: bool,
    /// An id that was evicted or replaced as a side effect of this admission, if any.
    pub removed_id: Option<TransactionId>,
    /// Why admission was refused, if `added` is `false`.
    pub reason: Option<MempoolError>,
}

impl AddOutcome {
    fn accepted(removed_id: Option<TransactionId>) -> Self {
        AddOutcome { added: true, removed_id, reason: None }
    }

    fn rejected(reason: MempoolError) -> Self {
        AddOutcome { added: false, removed_id: None, reason: Some(reason) }
    }
}

/// One sender's pending transactions.
#[derive(Debug)]
pub struct TransactionList {
    by_nonce: IndexMap<BigUint, PooledTransaction>,
    processable_nonces: BTreeSet<BigUint>,
    max_per_account: usize,
    min_replacement_fee_difference: BigUint,
}

impl TransactionList {
    /// Creates an empty list for one sender.
    pub fn new(max_per_account: usize, min_replacement_fee_difference: BigUint) -> Self {
        TransactionList {
            by_nonce: IndexMap::new(),
            processable_nonces: BTreeSet::new(),
            max_per_account,
            min_replacement_fee_difference,
        }
    }

    /// Whether this sender currently holds any transactions.
    pub fn is_empty(&self) -> bool {
        self.by_nonce.is_empty()
    }

    /// The number of transactions held for this sender.
    pub fn len(&self) -> usize {
        self.by_nonce.len()
    }

    /// Looks up the transaction at `nonce`.
    pub fn get(&self, nonce: &BigUint) -> Option<&PooledTransaction> {
        self.by_nonce.get(nonce)
    }

    /// Adds `tx`, placed in the unprocessable partition unless `processable` is set. See the
    /// per-sender admission rules for the full contract.
    pub fn add(&mut self, tx: PooledTransaction, processable: bool) -> AddOutcome {
        let nonce = tx.nonce().clone();

        if !self.by_nonce.contains_key(&nonce) {
            return self.add_new(nonce, tx, processable);
        }
        self.add_replacement(nonce, tx)
    }

    fn add_new(&mut self, nonce: BigUint, tx: PooledTransaction, processable: bool) -> AddOutcome {
        if self.by_nonce.len() < self.max_per_account {
            self.insert(nonce.clone(), tx, processable);
            return AddOutcome::accepted(None);
        }

        let max_existing =
            self.max_nonce().expect("max_per_account == 0 would have hit the branch above");
        if nonce > *max_existing {
            return AddOutcome::rejected(MempoolError::PoolFullForAccount {
                sender_address: tx.sender_address.clone(),
                nonce,
            });
        }

        let Some(evict_nonce) = self.highest_unprocessable_nonce() else {
            return AddOutcome::rejected(MempoolError::PoolFullForAccount {
                sender_address: tx.sender_address.clone(),
                nonce,
            });
        };
        let evicted = self.remove_entry(&evict_nonce).expect("just located this nonce");
        self.insert(nonce.clone(), tx, processable);
        AddOutcome::accepted(Some(evicted.tx.id))
    }

    fn add_replacement(&mut self, nonce: BigUint, tx: PooledTransaction) -> AddOutcome {
        let incumbent = self.by_nonce.get(&nonce).expect("checked contains_key above");

        if self.processable_nonces.contains(&nonce) {
            return AddOutcome::rejected(MempoolError::ProcessableNonceLocked {
                incumbent_id: incumbent.tx.id.clone(),
                nonce,
            });
        }

        let required_fee = &incumbent.tx.fee + &self.min_replacement_fee_difference;
        if tx.tx.fee < required_fee {
            return AddOutcome::rejected(MempoolError::InsufficientReplacementFee {
                incumbent_id: incumbent.tx.id.clone(),
                nonce,
                required_fee,
                offered_fee: tx.tx.fee.clone(),
            });
        }

        let incumbent = self.remove_entry(&nonce).expect("checked contains_key above");
        self.insert(nonce, tx, false);
        AddOutcome::accepted(Some(incumbent.tx.id))
    }

    fn insert(&mut self, nonce: BigUint, tx: PooledTransaction, processable: bool) {
        self.by_nonce.insert(nonce.clone(), tx);
        if processable {
            self.processable_nonces.insert(nonce);
        }
    }

    /// Removes the entry at `nonce`. Returns `true` if one was present.
    pub fn remove(&mut self, nonce: &BigUint) -> bool {
        self.remove_entry(nonce).is_some()
    }

    fn remove_entry(&mut self, nonce: &BigUint) -> Option<PooledTransaction> {
        let removed = self.by_nonce.shift_remove(nonce);
        if removed.is_some() {
            self.processable_nonces.remove(nonce);
        }
        removed
    }

    /// Marks the transactions at the given nonces as processable. The caller is responsible for
    /// only promoting nonces that keep `processable_nonces` a contiguous prefix (invariant I4).
    pub fn promote(&mut self, nonces: impl IntoIterator<Item = BigUint>) {
        for nonce in nonces {
            if self.by_nonce.contains_key(&nonce) {
                self.processable_nonces.insert(nonce);
            }
        }
    }

    /// Moves every processable entry with nonce strictly greater than `bound` back to
    /// unprocessable. `None` demotes every processable entry (used when `apply` rejects even the
    /// smallest candidate nonce, leaving no OK prefix at all).
    pub fn demote_after(&mut self, bound: Option<&BigUint>) {
        match bound {
            Some(bound) => self.processable_nonces.retain(|nonce| nonce <= bound),
            None => self.processable_nonces.clear(),
        }
    }

    /// The processable transactions, in ascending nonce order.
    pub fn get_processable(&self) -> Vec<&PooledTransaction> {
        self.processable_nonces
            .iter()
            .filter_map(|nonce| self.by_nonce.get(nonce))
            .collect()
    }

    /// The unprocessable transactions, in ascending nonce order.
    pub fn get_unprocessable(&self) -> Vec<&PooledTransaction> {
        let mut sorted: Vec<&BigUint> = self.by_nonce.keys().collect();
        sorted.sort();
        sorted
            .into_iter()
            .filter(|nonce| !self.processable_nonces.contains(*nonce))
            .filter_map(|nonce| self.by_nonce.get(nonce))
            .collect()
    }

    /// The contiguous unprocessable prefix immediately following the largest processable nonce
    /// (or starting at the smallest nonce if none is processable). Equal to
    /// [`Self::get_unprocessable`] given invariant I4.
    pub fn get_promotable(&self) -> Vec<&PooledTransaction> {
        self.get_unprocessable()
    }

    fn max_nonce(&self) -> Option<&BigUint> {
        self.by_nonce.keys().max()
    }

    fn highest_unprocessable_nonce(&self) -> Option<BigUint> {
        let max = self.max_nonce()?;
        if self.processable_nonces.contains(max) {
            None
        } else {
            Some(max.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use dpos_mempool_types::{PooledTransaction, Transaction};
    use num_bigint::BigUint;

    use super::TransactionList;

    fn tx(id: &str, nonce: u64, fee: u64) -> PooledTransaction {
        PooledTransaction::new(
            Transaction {
                id: id.to_owned(),
                sender_public_key: vec![],
                nonce: BigUint::from(nonce),
                fee: BigUint::from(fee),
                min_fee: BigUint::from(0u64),
            },
            "sender".to_owned(),
            10,
            chrono::Utc::now(),
        )
    }

    fn list() -> TransactionList {
        TransactionList::new(3, BigUint::from(10u64))
    }

    #[test]
    fn test_add_fills_gap_as_unprocessable() {
        let mut list = list();
        let outcome = list.add(tx("a", 1, 100), false);
        assert!(outcome.added);
        assert!(list.get_processable().is_empty());
        assert_eq!(list.get_unprocessable().len(), 1);
    }

    #[test]
    fn test_per_account_cap_rejects_new_max_nonce() {
        let mut list = list();
        for (id, nonce) in [("a", 1), ("b", 2), ("c", 3)] {
            assert!(list.add(tx(id, nonce, 100), false).added);
        }
        let outcome = list.add(tx("d", 4, 100), false);
        assert!(!outcome.added);
    }

    #[test]
    fn test_per_account_cap_evicts_highest_unprocessable() {
        let mut list = list();
        for (id, nonce) in [("a", 1), ("b", 2), ("c", 3)] {
            assert!(list.add(tx(id, nonce, 100), false).added);
        }
        // nonce 0 is lower than the current max (3), so it displaces the highest-nonce
        // unprocessable entry (c, nonce 3) rather than being rejected outright.
        let outcome = list.add(tx("z", 0, 100), false);
        assert!(outcome.added);
        assert_eq!(outcome.removed_id, Some("c".to_owned()));
        assert!(list.get(&BigUint::from(3u64)).is_none());
    }

    #[test]
    fn test_replacement_requires_fee_delta() {
        let mut list = list();
        list.add(tx("a", 5, 100), false);
        let too_low = list.add(tx("b", 5, 109), false);
        assert!(!too_low.added);
        let enough = list.add(tx("c", 5, 110), false);
        assert!(enough.added);
        assert_eq!(enough.removed_id, Some("a".to_owned()));
        assert_eq!(list.get(&BigUint::from(5u64)).unwrap().tx.id, "c");
    }

    #[test]
    fn test_processable_incumbent_is_locked() {
        let mut list = list();
        list.add(tx("a", 5, 100), true);
        let outcome = list.add(tx("b", 5, 1000), false);
        assert!(!outcome.added);
    }

    #[test]
    fn test_promote_and_demote_after() {
        let mut list = list();
        list.add(tx("a", 1, 100), false);
        list.add(tx("b", 2, 100), false);
        list.promote([BigUint::from(1u64), BigUint::from(2u64)]);
        assert_eq!(list.get_processable().len(), 2);
        list.demote_after(Some(&BigUint::from(1u64)));
        assert_eq!(list.get_processable().len(), 1);
        assert_eq!(list.get_unprocessable().len(), 1);
    }

    #[test]
    fn test_demote_after_none_clears_all_processable() {
        let mut list = list();
        list.add(tx("a", 1, 100), true);
        list.promote([BigUint::from(1u64)]);
        list.demote_after(None);
        assert!(list.get_processable().is_empty());
    }

    #[test]
    fn test_get_promotable_matches_unprocessable_tail() {
        let mut list = list();
        list.add(tx("a", 1, 100), true);
        list.promote([BigUint::from(1u64)]);
        list.add(tx("b", 2, 100), false);
        let promotable: Vec<_> = list.get_promotable().iter().map(|tx| tx.tx.id.clone()).collect();
        assert_eq!(promotable, vec!["b".to_owned()]);
    }
}
