//! Adversary strategies layered onto the simulation

use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    block::ProofWitness,
    config::{AttackConfig, ConfigError},
    network::{Arrival, NodeId},
    producer::ProducerId,
};

pub mod double_spend;
pub mod eclipse;
pub mod selfish;

pub use double_spend::DoubleSpend;
pub use eclipse::Eclipse;
pub use selfish::Selfish;

/// Which attack scenario to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttackKind {
    Selfish,
    DoubleSpend,
    Eclipse,
}

impl FromStr for AttackKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "selfish" => Ok(Self::Selfish),
            "double-spend" => Ok(Self::DoubleSpend),
            "eclipse" => Ok(Self::Eclipse),
            other => Err(ConfigError::UnknownAttack(other.to_owned())),
        }
    }
}

/// A block mined onto an adversary's private branch. Heights and rewards
/// are assigned when (and if) the branch is promoted onto the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadowBlock {
    /// The adversary producer that mined this block.
    pub producer: ProducerId,
    pub timestamp: f64,
    pub witness: ProofWitness,
}

/// What the coordinator does with the block candidate just produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    /// Append the candidate to the canonical chain as usual.
    Publish,
    /// The candidate stays on the adversary's private branch.
    Withhold,
    /// Truncate the chain to `fork_base` and promote the private branch.
    /// The candidate itself (if honest) is orphaned before publication.
    Override {
        fork_base: u64,
        blocks: Vec<ShadowBlock>,
    },
}

/// Everything an attack sees about a block-candidate event.
#[derive(Debug, Clone, Copy)]
pub struct BlockContext {
    pub producer: ProducerId,
    pub adversary: bool,
    pub timestamp: f64,
    /// Chain height the candidate would be appended at.
    pub chain_height: u64,
    /// Reward the next canonical block would mint.
    pub reward: f64,
    pub witness: ProofWitness,
}

/// An installed attack strategy. The coordinator composes with it through
/// the [`Attack::on_block`] hook; everything else is bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Attack {
    Selfish(Selfish),
    DoubleSpend(DoubleSpend),
    Eclipse(Eclipse),
}

impl Attack {
    pub fn from_config(config: &AttackConfig) -> Self {
        match config.kind {
            AttackKind::Selfish => Self::Selfish(Selfish::new(config.gamma)),
            AttackKind::DoubleSpend => {
                Self::DoubleSpend(DoubleSpend::new(config.confirmations))
            }
            AttackKind::Eclipse => {
                Self::Eclipse(Eclipse::new(config.victim_nodes))
            }
        }
    }

    /// Called once per block-candidate event, before the candidate is
    /// published. Returns the disposition of the candidate.
    pub fn on_block<R: Rng>(
        &mut self,
        rng: &mut R,
        ctx: &BlockContext,
    ) -> Response {
        match self {
            Self::Selfish(selfish) => selfish.on_block(rng, ctx),
            Self::DoubleSpend(ds) => ds.on_block(ctx),
            Self::Eclipse(eclipse) => eclipse.on_block(ctx),
        }
    }

    /// Arms time-triggered attacks. Only the double-spend uses the tick.
    pub fn on_tick(&mut self, chain_height: u64) {
        if let Self::DoubleSpend(ds) = self {
            ds.arm(chain_height);
        }
    }

    /// Time of the attack's arming tick, if it still needs one. An
    /// already-armed attack (restored from a checkpoint) does not.
    pub fn tick_at(&self, config: &AttackConfig) -> Option<f64> {
        match self {
            Self::DoubleSpend(ds) if !ds.started() => Some(config.arm_time),
            _ => None,
        }
    }

    /// Observes which nodes a published honest block reached.
    pub fn on_propagation(&mut self, arrivals: &[Arrival]) {
        if let Self::Eclipse(eclipse) = self {
            eclipse.on_propagation(arrivals);
        }
    }

    /// Records how many honest blocks a chain override orphaned.
    pub fn note_orphans(&mut self, count: u64) {
        match self {
            Self::Selfish(selfish) => selfish.note_orphans(count),
            Self::DoubleSpend(ds) => ds.note_orphans(count),
            Self::Eclipse(_) => {}
        }
    }

    /// Node IDs whose connections the attack controls.
    pub fn victims(&self) -> &[NodeId] {
        match self {
            Self::Eclipse(eclipse) => eclipse.victims(),
            _ => &[],
        }
    }

    pub fn metrics(&self) -> AttackMetrics {
        match self {
            Self::Selfish(selfish) => selfish.metrics(),
            Self::DoubleSpend(ds) => ds.metrics(),
            Self::Eclipse(eclipse) => eclipse.metrics(),
        }
    }
}

/// Attack-specific block of the metrics report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "attack")]
pub enum AttackMetrics {
    Selfish {
        withheld: u64,
        races_won: u64,
        races_lost: u64,
        full_releases: u64,
        orphaned_honest: u64,
    },
    DoubleSpend {
        attempts: u64,
        successes: u64,
        failures: u64,
        success_rate: f64,
        mean_depth_at_success: f64,
        mean_depth_at_failure: f64,
        double_spent_value: f64,
        confirmations: u64,
        orphaned_honest: u64,
    },
    Eclipse {
        honest_blocks: u64,
        /// Fraction of honest blocks each victim saw directly.
        victim_seen_fraction: Vec<f64>,
        blocks_withheld: u64,
    },
}
