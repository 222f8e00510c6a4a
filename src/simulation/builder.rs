use std::path::PathBuf;

use crate::{
    checkpoint::{Checkpoint, CheckpointError},
    config::{AttackConfig, ChainPreset, ConfigError, SimulationConfig},
};

use super::Simulation;

/// Builds a [`Simulation`] from a chain preset plus field overrides.
#[derive(Debug, Clone)]
pub struct SimulationBuilder {
    config: SimulationConfig,
    checkpoint_path: Option<PathBuf>,
    resume_path: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationBuildError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("could not resume from checkpoint")]
    Checkpoint(#[from] CheckpointError),
}

impl SimulationBuilder {
    /// Creates a builder over the `custom` preset defaults.
    pub fn new() -> Self {
        Self::preset(ChainPreset::Custom)
    }

    /// Creates a builder over the given chain preset.
    pub fn preset(preset: ChainPreset) -> Self {
        SimulationBuilder {
            config: preset.config(),
            checkpoint_path: None,
            resume_path: None,
        }
    }

    /// Replaces the whole configuration. Used by sweep drivers that
    /// prepare configs programmatically.
    pub fn config(mut self, config: SimulationConfig) -> Self {
        self.config = config;

        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.simulation.seed = seed;

        self
    }

    /// Stops the run after `blocks` accepted blocks.
    pub fn blocks(mut self, blocks: u64) -> Self {
        self.config.simulation.blocks = Some(blocks);

        self
    }

    /// Stops the run after `years` of simulated time.
    pub fn years(mut self, years: f64) -> Self {
        self.config.simulation.years = Some(years);
        self.config.simulation.blocks = None;

        self
    }

    pub fn miners(mut self, miners: usize) -> Self {
        self.config.mining.miners = miners;

        self
    }

    /// Per-producer capacity (hashrate, stake, or space).
    pub fn capacity(mut self, capacity: f64) -> Self {
        self.config.mining.capacity = capacity;

        self
    }

    pub fn blocktime(mut self, blocktime: f64) -> Self {
        self.config.mining.blocktime = blocktime;

        self
    }

    pub fn blocksize(mut self, blocksize: usize) -> Self {
        self.config.mining.blocksize = blocksize;

        self
    }

    pub fn difficulty(mut self, difficulty: f64) -> Self {
        self.config.mining.difficulty = Some(difficulty);

        self
    }

    pub fn retarget_interval(mut self, interval: Option<u64>) -> Self {
        self.config.mining.retarget_interval = interval;

        self
    }

    pub fn nodes(mut self, nodes: usize) -> Self {
        self.config.network.nodes = nodes;

        self
    }

    pub fn neighbors(mut self, neighbors: usize) -> Self {
        self.config.network.neighbors = neighbors;

        self
    }

    pub fn propagation_delay(mut self, delay: f64) -> Self {
        self.config.network.propagation_delay = delay;

        self
    }

    pub fn wallets(mut self, wallets: usize) -> Self {
        self.config.transactions.wallets = wallets;

        self
    }

    pub fn transactions_per_wallet(mut self, count: u64) -> Self {
        self.config.transactions.transactions_per_wallet = count;

        self
    }

    pub fn tx_interval(mut self, interval: f64) -> Self {
        self.config.transactions.interval = interval;

        self
    }

    pub fn initial_reward(mut self, reward: f64) -> Self {
        self.config.economics.initial_reward = reward;

        self
    }

    pub fn halving_interval(mut self, interval: Option<u64>) -> Self {
        self.config.economics.halving_interval = interval;

        self
    }

    pub fn max_halvings(mut self, max: Option<u32>) -> Self {
        self.config.economics.max_halvings = max;

        self
    }

    pub fn print_interval(mut self, interval: u64) -> Self {
        self.config.simulation.print_interval = interval;

        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.config.simulation.debug = debug;

        self
    }

    /// Installs an attack strategy.
    pub fn attack(mut self, attack: AttackConfig) -> Self {
        self.config.attack = Some(attack);

        self
    }

    /// Writes a checkpoint every print interval.
    pub fn checkpoint_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());

        self
    }

    /// Resumes from a previously written checkpoint. The checkpoint's
    /// configuration snapshot replaces any fields set on this builder.
    pub fn resume_from(mut self, path: impl Into<PathBuf>) -> Self {
        self.resume_path = Some(path.into());

        self
    }

    /// Validates the configuration and creates the [`Simulation`].
    pub fn build(self) -> Result<Simulation, SimulationBuildError> {
        let SimulationBuilder {
            mut config,
            checkpoint_path,
            resume_path,
        } = self;

        let resume = match resume_path {
            Some(path) => {
                let checkpoint = Checkpoint::load(&path)?;
                config = checkpoint.config.clone();
                Some(checkpoint)
            }
            None => None,
        };

        config.validate()?;

        Ok(Simulation {
            config,
            checkpoint_path,
            resume,
        })
    }
}

impl Default for SimulationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::SimulationBuilder;
    use crate::config::ChainPreset;

    #[test]
    fn example_build() {
        SimulationBuilder::preset(ChainPreset::Btc)
            .blocks(10)
            .seed(1)
            .build()
            .expect("valid simulation build");
    }

    #[test]
    fn invalid_override_fails_the_build() {
        let result = SimulationBuilder::new().miners(0).build();
        assert!(result.is_err());
    }
}
