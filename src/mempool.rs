//! Pending-transaction pool with FIFO block inclusion

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    transaction::{Transaction, TxId},
    wallet::WalletId,
};

/// Insertion-ordered pool of unconfirmed transactions.
///
/// Enqueue and front-dequeue are O(1). Blocks drain from the head, so
/// inclusion order is exactly emission order; there is no fee market.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mempool {
    pending: VecDeque<Transaction>,
    next_id: TxId,
    accepted: u64,
    included: u64,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions currently pending.
    #[inline]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total transactions ever accepted into the pool.
    #[inline]
    pub fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Total transactions removed by block inclusion.
    #[inline]
    pub fn included(&self) -> u64 {
        self.included
    }

    /// Accepts a new transaction from `wallet`, assigning it the next
    /// monotonic ID.
    pub fn accept(&mut self, wallet: WalletId, timestamp: f64) -> TxId {
        let id = self.next_id;
        self.next_id += 1;
        self.accepted += 1;

        self.pending.push_back(Transaction {
            id,
            wallet,
            timestamp,
        });

        id
    }

    /// Removes up to `max` transactions from the head of the pool and
    /// returns them in emission order. An empty pool yields an empty
    /// vector, never an error.
    pub fn drain(&mut self, max: usize) -> Vec<Transaction> {
        let take = max.min(self.pending.len());
        self.included += take as u64;

        self.pending.drain(..take).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Mempool;

    #[test]
    fn drain_is_fifo() {
        let mut pool = Mempool::new();
        for w in 0..5 {
            pool.accept(w, w as f64);
        }

        let drained = pool.drain(3);
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].wallet, 0);
        assert_eq!(drained[2].wallet, 2);
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.included(), 3);
    }

    #[test]
    fn drain_past_end_takes_what_is_there() {
        let mut pool = Mempool::new();
        pool.accept(0, 0.0);

        assert_eq!(pool.drain(10).len(), 1);
        assert!(pool.is_empty());
    }

    #[test]
    fn ids_are_monotonic() {
        let mut pool = Mempool::new();
        let a = pool.accept(0, 0.0);
        let b = pool.accept(1, 1.0);

        assert!(b > a);
        assert_eq!(pool.accepted(), 2);
    }
}
