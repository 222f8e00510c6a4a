/*!
Re-export of common values and datatypes used for configuring and running
simulations. Must be imported manually.

```
use blocksim::prelude::*;
```
*/

use crate::{
    attack, block, chain, checkpoint, config, consensus, mempool, metrics,
    network, producer, scheduler, simulation, transaction, wallet,
};

pub use attack::{Attack, AttackKind, AttackMetrics};

pub use block::{Block, ProofWitness};

pub use chain::{ChainState, DifficultyUpdate, RewardSchedule};

pub use checkpoint::{Checkpoint, CheckpointError};

pub use config::{
    AttackConfig, ChainPreset, ConfigError, SimulationConfig,
};

pub use consensus::{Consensus, SelectionError};

pub use mempool::Mempool;

pub use metrics::{Metrics, MetricsReport, ProducerShare};

pub use network::{NodeId, Topology};

pub use producer::{CapacityProfile, Producer, ProducerId};

pub use scheduler::{Event, EventQueue};

pub use simulation::{
    Simulation, SimulationBuildError, SimulationBuilder, SimulationError,
    SimulationGroup, SimulationOutput,
};

pub use transaction::{Transaction, TxId};

pub use wallet::{Wallet, WalletId};
