//! Checkpointing and deterministic resume

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    attack::Attack, chain::ChainState, config::SimulationConfig,
    mempool::Mempool, metrics::Metrics, wallet::Wallet,
};

/// Bumped whenever the checkpoint layout changes. Loading refuses a
/// mismatched version rather than silently drifting.
pub const SCHEMA_VERSION: u32 = 1;

/// A complete snapshot of a running simulation, written between block
/// events.
///
/// Resume restores the RNG stream position along with the state below;
/// pending wallet emissions and the next block candidate are re-derived,
/// so a resumed run continues the original byte-for-byte.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub schema_version: u32,
    pub seed: u64,
    /// 32-bit-word position of the event-loop RNG stream.
    pub rng_word_pos: u64,
    /// Simulated time at the snapshot.
    pub now: f64,
    pub chain: ChainState,
    pub mempool: Mempool,
    pub wallets: Vec<Wallet>,
    pub node_heights: Vec<Option<u64>>,
    pub metrics: Metrics,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attack: Option<Attack>,
    pub config: SimulationConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("checkpoint I/O failed")]
    Io(#[from] std::io::Error),
    #[error("checkpoint encoding failed")]
    Serialization(#[from] serde_json::Error),
    #[error("checkpoint schema version {found} does not match {expected}")]
    SchemaMismatch { found: u32, expected: u32 },
}

impl Checkpoint {
    /// Writes the checkpoint atomically: the record lands in a sibling
    /// temp file first and is renamed into place, so a crash never
    /// leaves a torn checkpoint behind.
    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let json = serde_json::to_vec_pretty(self)?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, CheckpointError> {
        let bytes = fs::read(path)?;
        let checkpoint: Checkpoint = serde_json::from_slice(&bytes)?;

        if checkpoint.schema_version != SCHEMA_VERSION {
            return Err(CheckpointError::SchemaMismatch {
                found: checkpoint.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        Ok(checkpoint)
    }
}
