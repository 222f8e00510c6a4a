//! Simulation configuration, chain presets, and startup validation

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    attack::AttackKind,
    chain::RewardSchedule,
    consensus::Consensus,
    utils::YEAR,
};

/// Complete parameter set for one simulation run.
///
/// Built from a [`ChainPreset`] and then adjusted field-by-field (the CLI
/// overlays its flags the same way the original YAML hierarchy did).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Preset label, carried through to the metrics report.
    pub chain: String,
    pub network: NetworkConfig,
    pub consensus: Consensus,
    pub mining: MiningConfig,
    pub economics: EconomicsConfig,
    pub transactions: TransactionConfig,
    pub simulation: RunConfig,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub attack: Option<AttackConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub nodes: usize,
    /// Approximate peer count per node.
    pub neighbors: usize,
    /// Per-hop propagation delay in seconds. Zero delivers instantly.
    #[serde(default)]
    pub propagation_delay: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningConfig {
    /// Number of producers (miners, validators, or farmers).
    pub miners: usize,
    /// Capacity per producer: hashrate, stake, or allocated space,
    /// depending on the consensus discipline.
    #[serde(alias = "hashrate", alias = "stake", alias = "space")]
    pub capacity: f64,
    /// Target seconds between blocks.
    pub blocktime: f64,
    /// Maximum transactions per block.
    pub blocksize: usize,
    /// Initial difficulty. Derived from blocktime and total capacity
    /// when unset.
    pub difficulty: Option<f64>,
    /// Blocks between difficulty retargets. `None` fixes difficulty.
    pub retarget_interval: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomicsConfig {
    pub initial_reward: f64,
    pub halving_interval: Option<u64>,
    pub max_halvings: Option<u32>,
}

impl EconomicsConfig {
    pub fn schedule(&self) -> RewardSchedule {
        RewardSchedule {
            initial_reward: self.initial_reward,
            halving_interval: self.halving_interval,
            max_halvings: self.max_halvings,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionConfig {
    pub wallets: usize,
    pub transactions_per_wallet: u64,
    /// Seconds between emissions per wallet.
    pub interval: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Stop after this many blocks. `None` defers to `years` or
    /// transaction exhaustion.
    pub blocks: Option<u64>,
    /// Stop after this many simulated years.
    pub years: Option<f64>,
    /// Blocks between interval summaries (and checkpoints).
    pub print_interval: u64,
    pub debug: bool,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackConfig {
    pub kind: AttackKind,
    /// Adversary's fraction of total capacity.
    pub attacker_share: f64,
    /// Confirmation depth the double-spend victim waits for.
    pub confirmations: u64,
    /// Number of eclipsed nodes, taken from the low node IDs.
    pub victim_nodes: usize,
    /// Attacker's network share in selfish-mining races.
    pub gamma: f64,
    /// Simulated time at which the double-spend arms.
    pub arm_time: f64,
}

impl AttackConfig {
    pub fn new(kind: AttackKind) -> Self {
        AttackConfig {
            kind,
            attacker_share: match kind {
                AttackKind::DoubleSpend => 0.51,
                _ => 0.3,
            },
            confirmations: 6,
            victim_nodes: 1,
            gamma: 0.5,
            arm_time: 0.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("mining.miners must be greater than 0")]
    NoMiners,
    #[error("mining.capacity must be positive, got {0}")]
    NonPositiveCapacity(f64),
    #[error("mining.blocktime must be positive, got {0}")]
    NonPositiveBlocktime(f64),
    #[error("mining.blocksize must be greater than 0")]
    ZeroBlocksize,
    #[error("network.nodes must be greater than 0")]
    NoNodes,
    #[error("network.neighbors ({neighbors}) must be less than network.nodes ({nodes})")]
    TooManyNeighbors { neighbors: usize, nodes: usize },
    #[error("network.propagation_delay must not be negative, got {0}")]
    NegativePropagationDelay(f64),
    #[error("attack.attacker_share must be within 0..=1, got {0}")]
    BadAttackerShare(f64),
    #[error("attack.confirmations must be at least 1")]
    ZeroConfirmations,
    #[error("attack.victim_nodes ({victims}) must be less than network.nodes ({nodes})")]
    TooManyVictims { victims: usize, nodes: usize },
    #[error("attack.gamma must be within 0..=1, got {0}")]
    BadGamma(f64),
    #[error("unknown chain preset: {0}")]
    UnknownChain(String),
    #[error("unknown attack scenario: {0}")]
    UnknownAttack(String),
}

impl SimulationConfig {
    /// Checks every startup validation rule. Errors identify the
    /// offending field; the first violation wins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        use ConfigError::*;

        if self.mining.miners == 0 {
            return Err(NoMiners);
        }
        if !(self.mining.capacity > 0.0) {
            return Err(NonPositiveCapacity(self.mining.capacity));
        }
        if !(self.mining.blocktime > 0.0) {
            return Err(NonPositiveBlocktime(self.mining.blocktime));
        }
        if self.mining.blocksize == 0 {
            return Err(ZeroBlocksize);
        }
        if self.network.nodes == 0 {
            return Err(NoNodes);
        }
        if self.network.neighbors >= self.network.nodes {
            return Err(TooManyNeighbors {
                neighbors: self.network.neighbors,
                nodes: self.network.nodes,
            });
        }
        if self.network.propagation_delay < 0.0 {
            return Err(NegativePropagationDelay(
                self.network.propagation_delay,
            ));
        }

        if let Some(attack) = &self.attack {
            if attack.attacker_share.is_nan()
                || !(0.0..=1.0).contains(&attack.attacker_share)
            {
                return Err(BadAttackerShare(attack.attacker_share));
            }
            if attack.confirmations == 0 {
                return Err(ZeroConfirmations);
            }
            if attack.victim_nodes >= self.network.nodes {
                return Err(TooManyVictims {
                    victims: attack.victim_nodes,
                    nodes: self.network.nodes,
                });
            }
            if attack.gamma.is_nan() || !(0.0..=1.0).contains(&attack.gamma) {
                return Err(BadGamma(attack.gamma));
            }
        }

        Ok(())
    }

    /// Block limit for termination, derived from `years` when `blocks`
    /// is unset.
    pub fn block_limit(&self) -> Option<u64> {
        self.simulation.blocks.or_else(|| {
            self.simulation
                .years
                .map(|years| (years * YEAR / self.mining.blocktime) as u64)
        })
    }

    /// Simulated-time bound for termination, if any.
    pub fn time_limit(&self) -> Option<f64> {
        self.simulation.years.map(|years| years * YEAR)
    }

    /// Total capacity across all producers.
    #[inline]
    pub fn total_capacity(&self) -> f64 {
        self.mining.capacity * self.mining.miners as f64
    }
}

/// Built-in chain presets, standing in for the original's per-chain
/// configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainPreset {
    Btc,
    Bch,
    Ltc,
    Doge,
    Eth2,
    Chia,
    Custom,
}

impl FromStr for ChainPreset {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "btc" => Ok(Self::Btc),
            "bch" => Ok(Self::Bch),
            "ltc" => Ok(Self::Ltc),
            "eth2" => Ok(Self::Eth2),
            "doge" => Ok(Self::Doge),
            "chia" => Ok(Self::Chia),
            "custom" => Ok(Self::Custom),
            other => Err(ConfigError::UnknownChain(other.to_owned())),
        }
    }
}

impl ChainPreset {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Btc => "btc",
            Self::Bch => "bch",
            Self::Ltc => "ltc",
            Self::Doge => "doge",
            Self::Eth2 => "eth2",
            Self::Chia => "chia",
            Self::Custom => "custom",
        }
    }

    /// The full configuration this preset expands to.
    pub fn config(&self) -> SimulationConfig {
        let base = SimulationConfig {
            chain: self.name().to_owned(),
            network: NetworkConfig {
                nodes: 20,
                neighbors: 4,
                propagation_delay: 0.0,
            },
            consensus: Consensus::ProofOfWork,
            mining: MiningConfig {
                miners: 10,
                capacity: 1e6,
                blocktime: 600.0,
                blocksize: 4096,
                difficulty: None,
                retarget_interval: Some(2016),
            },
            economics: EconomicsConfig {
                initial_reward: 50.0,
                halving_interval: Some(210_000),
                max_halvings: None,
            },
            transactions: TransactionConfig {
                wallets: 10,
                transactions_per_wallet: 100,
                interval: 60.0,
            },
            simulation: RunConfig {
                blocks: None,
                years: None,
                print_interval: 144,
                debug: false,
                seed: 0,
            },
            attack: None,
        };

        match self {
            Self::Btc | Self::Custom => base,
            Self::Bch => SimulationConfig {
                mining: MiningConfig {
                    blocksize: 32_768,
                    ..base.mining
                },
                ..base
            },
            Self::Ltc => SimulationConfig {
                mining: MiningConfig {
                    blocktime: 150.0,
                    ..base.mining
                },
                economics: EconomicsConfig {
                    halving_interval: Some(840_000),
                    ..base.economics
                },
                ..base
            },
            Self::Doge => SimulationConfig {
                mining: MiningConfig {
                    blocktime: 60.0,
                    retarget_interval: Some(240),
                    ..base.mining
                },
                economics: EconomicsConfig {
                    initial_reward: 10_000.0,
                    halving_interval: None,
                    max_halvings: None,
                },
                ..base
            },
            Self::Eth2 => SimulationConfig {
                consensus: Consensus::ProofOfStake { jitter: 0.0 },
                mining: MiningConfig {
                    miners: 16,
                    capacity: 32.0,
                    blocktime: 12.0,
                    blocksize: 1500,
                    difficulty: None,
                    retarget_interval: None,
                },
                economics: EconomicsConfig {
                    initial_reward: 2.0,
                    halving_interval: None,
                    max_halvings: None,
                },
                ..base
            },
            Self::Chia => SimulationConfig {
                consensus: Consensus::ProofOfSpace,
                mining: MiningConfig {
                    miners: 12,
                    capacity: 100.0,
                    blocktime: 18.75,
                    blocksize: 1000,
                    difficulty: None,
                    retarget_interval: Some(4608),
                },
                economics: EconomicsConfig {
                    initial_reward: 2.0,
                    halving_interval: Some(5_045_760),
                    max_halvings: None,
                },
                ..base
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ChainPreset, ConfigError};
    use crate::attack::AttackKind;
    use crate::config::AttackConfig;

    #[test]
    fn presets_validate() {
        for preset in [
            ChainPreset::Btc,
            ChainPreset::Bch,
            ChainPreset::Ltc,
            ChainPreset::Doge,
            ChainPreset::Eth2,
            ChainPreset::Chia,
        ] {
            preset.config().validate().unwrap();
        }
    }

    #[test]
    fn neighbor_bound_is_enforced() {
        let mut config = ChainPreset::Btc.config();
        config.network.neighbors = config.network.nodes;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooManyNeighbors { .. })
        ));
    }

    #[test]
    fn attacker_share_must_be_a_fraction() {
        let mut config = ChainPreset::Btc.config();
        config.attack = Some(AttackConfig {
            attacker_share: 1.5,
            ..AttackConfig::new(AttackKind::Selfish)
        });

        assert!(matches!(
            config.validate(),
            Err(ConfigError::BadAttackerShare(_))
        ));
    }

    #[test]
    fn years_derive_a_block_limit() {
        let mut config = ChainPreset::Btc.config();
        config.simulation.years = Some(1.0);

        // One year of 600-second blocks.
        assert_eq!(config.block_limit(), Some(52_560));
    }

    #[test]
    fn unknown_preset_is_rejected() {
        assert!("bsv".parse::<ChainPreset>().is_err());
    }
}
