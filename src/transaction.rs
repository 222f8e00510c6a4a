//! Definitions for transactions

use serde::{Deserialize, Serialize};

use crate::wallet::WalletId;

/// Unique identifier of a [`Transaction`], assigned monotonically.
pub type TxId = u64;

/// A pending transaction awaiting inclusion in a block.
///
/// Contents are opaque: each transaction occupies one unit of block
/// capacity and carries only the bookkeeping the simulation needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    /// Wallet that emitted this transaction.
    pub wallet: WalletId,
    /// Emission time in simulated seconds.
    pub timestamp: f64,
}
