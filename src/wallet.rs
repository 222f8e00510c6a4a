//! Wallet transaction-emission state

use serde::{Deserialize, Serialize};

/// Unique identifier of a [`Wallet`].
pub type WalletId = usize;

/// A wallet that emits transactions at a fixed interval until its budget
/// is exhausted.
///
/// Emission is driven by the event scheduler: each wallet has one pending
/// emit event at a time, at `next_emit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    /// Transactions this wallet may still emit.
    pub remaining: u64,
    /// Simulated time of the next emission.
    pub next_emit: f64,
}

impl Wallet {
    pub fn new(id: WalletId, budget: u64, interval: f64) -> Self {
        Wallet {
            id,
            remaining: budget,
            next_emit: interval,
        }
    }

    /// Consumes one unit of budget and advances the emission clock.
    /// Returns false if the budget was already exhausted.
    pub fn emit(&mut self, interval: f64) -> bool {
        if self.remaining == 0 {
            return false;
        }

        self.remaining -= 1;
        self.next_emit += interval;
        true
    }
}
