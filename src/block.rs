//! Definitions for blocks

use serde::{Deserialize, Serialize};

use crate::producer::ProducerId;

/// Fixed symbolic size of a block header in bytes.
pub const HEADER_SIZE: u64 = 1024;

/// Symbolic size of a single transaction in bytes.
pub const TX_SIZE: u64 = 256;

/// A produced block on (or withheld from) the chain.
///
/// Blocks are symbolic records: there is no hashing or signature material,
/// only the data the simulation reasons about. A block is immutable once
/// created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position on the canonical chain, starting at 0.
    pub height: u64,
    /// ID of the producer that created this block.
    pub producer: ProducerId,
    /// Height of the parent block. `None` for the first block.
    pub parent: Option<u64>,
    /// Creation time in simulated seconds.
    pub timestamp: f64,
    /// Number of transactions included from the mempool.
    pub tx_count: u64,
    /// Coinbase reward minted with this block.
    pub reward: f64,
    /// Network difficulty at production time.
    pub difficulty: f64,
    /// Consensus-specific proof witness. Purely informational.
    pub witness: ProofWitness,
}

impl Block {
    /// Symbolic wire size used for bandwidth accounting: a fixed header
    /// plus a fixed cost per included transaction.
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        HEADER_SIZE + self.tx_count * TX_SIZE
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "B{} by P{} tx:{} reward:{}",
            self.height, self.producer, self.tx_count, self.reward
        )
    }
}

/// The share of total capacity held by a block's producer, tagged with the
/// consensus discipline that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ProofWitness {
    /// Fraction of total network hashrate.
    Hashrate(f64),
    /// Fraction of total staked value.
    Stake(f64),
    /// Fraction of total allocated space.
    Space(f64),
}

impl ProofWitness {
    /// The producer's capacity share, regardless of discipline.
    #[inline]
    pub fn share(&self) -> f64 {
        match *self {
            Self::Hashrate(s) | Self::Stake(s) | Self::Space(s) => s,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_counts_header_and_transactions() {
        let block = Block {
            height: 0,
            producer: 1,
            parent: None,
            timestamp: 0.0,
            tx_count: 4,
            reward: 50.0,
            difficulty: 1.0,
            witness: ProofWitness::Hashrate(0.25),
        };

        assert_eq!(block.size_bytes(), HEADER_SIZE + 4 * TX_SIZE);
    }
}
