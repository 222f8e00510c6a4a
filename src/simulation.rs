//! Building and running simulations

use std::{collections::BTreeSet, path::PathBuf};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    attack::{Attack, AttackKind, BlockContext, Response},
    block::Block,
    chain::ChainState,
    checkpoint::{Checkpoint, CheckpointError, SCHEMA_VERSION},
    config::{ConfigError, SimulationConfig},
    consensus::SelectionError,
    mempool::Mempool,
    metrics::{Metrics, MetricsReport},
    network::Topology,
    producer::{CapacityProfile, CapacityProfileError, Producer, ProducerId},
    scheduler::{Event, EventQueue},
    utils::human,
    wallet::Wallet,
};

pub mod builder;

pub use builder::{SimulationBuildError, SimulationBuilder};

/// RNG stream reserved for topology construction, so resuming can
/// rebuild the same graph without touching the event-loop stream.
const TOPOLOGY_STREAM: u64 = 1;

/// Container for a set of independently-seeded simulations which run in
/// parallel. Used for attack trials and parameter sweeps.
#[derive(Debug, Clone, Default)]
pub struct SimulationGroup {
    configs: Vec<SimulationConfig>,
}

impl SimulationGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, config: SimulationConfig) {
        self.configs.push(config);
    }

    /// Runs every configured simulation, in parallel, and returns their
    /// outputs in insertion order.
    pub fn run_all(self) -> Result<Vec<SimulationOutput>, SimulationError> {
        self.configs
            .into_par_iter()
            .map(|config| {
                Simulation {
                    config,
                    checkpoint_path: None,
                    resume: None,
                }
                .run()
            })
            .collect()
    }
}

/// A configured simulation, ready to run. Create via [`SimulationBuilder`].
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    checkpoint_path: Option<PathBuf>,
    resume: Option<Checkpoint>,
}

/// Output data from a completed simulation.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub config: SimulationConfig,
    /// The final canonical chain.
    pub chain: Vec<Block>,
    pub report: MetricsReport,
    pub simulated_time: f64,
    /// Transactions still pending at the end of the run.
    pub mempool_len: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid configuration")]
    Config(#[from] ConfigError),
    #[error("invalid capacity distribution")]
    Capacity(#[from] CapacityProfileError),
    #[error("producer selection failed")]
    Selection(#[from] SelectionError),
    #[error("checkpoint failure")]
    Checkpoint(#[from] CheckpointError),
}

impl Simulation {
    pub fn builder() -> SimulationBuilder {
        SimulationBuilder::new()
    }

    /// Executes the simulation to completion.
    pub fn run(self) -> Result<SimulationOutput, SimulationError> {
        let Simulation {
            config,
            checkpoint_path,
            resume,
        } = self;
        config.validate()?;

        let seed = config.simulation.seed;
        let blocktime = config.mining.blocktime;
        let blocksize = config.mining.blocksize;
        let tx_interval = config.transactions.interval;
        let hop_delay = config.network.propagation_delay;
        let print_interval = config.simulation.print_interval.max(1);
        let block_limit = config.block_limit();
        let tx_target = config.transactions.wallets as u64
            * config.transactions.transactions_per_wallet;
        let consensus = config.consensus;

        // Producers. Selfish and double-spend runs concentrate the
        // configured share of capacity in producer 0, the adversary.
        let profile = match &config.attack {
            Some(attack) if attack.kind != AttackKind::Eclipse => {
                CapacityProfile::Adversary(attack.attacker_share)
            }
            _ => CapacityProfile::Equal,
        };
        let producers: Vec<Producer> = profile
            .build_producers(config.mining.miners, config.total_capacity())?;
        let total_capacity: f64 = producers.iter().map(|p| p.capacity).sum();

        // The topology comes from its own RNG stream so the event-loop
        // stream position is the only RNG state a checkpoint must carry.
        let mut topology = {
            let mut topo_rng = ChaCha8Rng::seed_from_u64(seed);
            topo_rng.set_stream(TOPOLOGY_STREAM);
            Topology::build(
                &mut topo_rng,
                config.network.nodes,
                config.network.neighbors,
            )
        };

        let mut attack = config.attack.as_ref().map(Attack::from_config);
        if let Some(attack) = &attack {
            let victims = attack.victims();
            if !victims.is_empty() {
                topology.eclipse(victims, BTreeSet::new());
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut chain;
        let mut mempool;
        let mut wallets;
        let mut metrics;
        let mut queue;

        match resume {
            Some(checkpoint) => {
                info!(
                    block = checkpoint.chain.next_height(),
                    time = checkpoint.now,
                    "resuming from checkpoint"
                );
                rng.set_word_pos(u128::from(checkpoint.rng_word_pos));
                chain = checkpoint.chain;
                mempool = checkpoint.mempool;
                wallets = checkpoint.wallets;
                metrics = checkpoint.metrics;
                topology.restore_heights(&checkpoint.node_heights);
                if checkpoint.attack.is_some() {
                    attack = checkpoint.attack;
                }
                queue = EventQueue::starting_at(checkpoint.now);
            }
            None => {
                let difficulty = config.mining.difficulty.unwrap_or_else(|| {
                    consensus.auto_difficulty(total_capacity, blocktime)
                });
                chain = ChainState::new(
                    difficulty,
                    config.mining.retarget_interval,
                    blocktime,
                    config.economics.schedule(),
                );
                mempool = Mempool::new();
                wallets = (0..config.transactions.wallets)
                    .map(|id| {
                        Wallet::new(
                            id,
                            config.transactions.transactions_per_wallet,
                            tx_interval,
                        )
                    })
                    .collect::<Vec<_>>();
                metrics = Metrics::new(producers.len());
                queue = EventQueue::new();
            }
        }

        // Seed pending events: wallet emissions, the time bound, the
        // attack arming tick, and the first block candidate. On resume
        // these are re-derived from the restored state.
        let now = queue.now();
        for wallet in &wallets {
            if wallet.remaining > 0 {
                queue.schedule(
                    Event::TxEmit { wallet: wallet.id },
                    wallet.next_emit.max(now),
                );
            }
        }
        if let Some(limit) = config.time_limit() {
            queue.schedule(Event::Terminate, limit.max(now));
        }
        if let (Some(attack), Some(attack_config)) = (&attack, &config.attack)
        {
            if let Some(tick) = attack.tick_at(attack_config) {
                queue.schedule(Event::AttackTick, tick.max(now));
            }
        }
        {
            let (producer, delay) = consensus.next_block(
                &mut rng,
                &producers,
                chain.difficulty(),
                blocktime,
            )?;
            queue.schedule(Event::BlockCandidate { producer }, now + delay);
        }

        let mut last_block_time =
            chain.tip().map(|block| block.timestamp).unwrap_or(0.0);

        while let Some((time, event)) = queue.pop() {
            match event {
                Event::Terminate => break,
                Event::TxEmit { wallet } => {
                    if wallets[wallet].emit(tx_interval) {
                        mempool.accept(wallet, time);
                        if wallets[wallet].remaining > 0 {
                            queue.schedule(
                                Event::TxEmit { wallet },
                                wallets[wallet].next_emit,
                            );
                        }
                    }
                }
                Event::AttackTick => {
                    if let Some(attack) = &mut attack {
                        attack.on_tick(chain.next_height());
                    }
                }
                Event::PropagationArrival { height, node } => {
                    topology.deliver(node, height);
                }
                Event::BlockCandidate { producer } => {
                    let ctx = BlockContext {
                        producer,
                        adversary: producers[producer].adversary,
                        timestamp: time,
                        chain_height: chain.next_height(),
                        reward: chain.current_reward(),
                        witness: consensus
                            .witness(&producers[producer], total_capacity),
                    };

                    let response = match &mut attack {
                        Some(attack) => attack.on_block(&mut rng, &ctx),
                        None => Response::Publish,
                    };

                    let accepted = match response {
                        Response::Publish => {
                            let txs = mempool.drain(blocksize).len() as u64;
                            let block =
                                chain.append(producer, time, txs, ctx.witness);
                            let (height, bytes) =
                                (block.height, block.size_bytes());

                            metrics.record_block(producer, txs);
                            gossip(
                                &mut topology,
                                &mut queue,
                                &mut metrics,
                                &mut attack,
                                producer,
                                height,
                                bytes,
                                hop_delay,
                                time,
                            );

                            debug!(
                                "[{:.2}] B{} by P{} dt:{:.2}s Diff:{} Tx:{} C:{} Pool:{}",
                                time,
                                height,
                                producer,
                                time - last_block_time,
                                human(chain.difficulty()),
                                metrics.transactions,
                                human(chain.total_coins()),
                                mempool.len(),
                            );
                            last_block_time = time;
                            true
                        }
                        Response::Withhold => {
                            debug!(
                                "[{:.2}] P{} withholds a private block",
                                time, producer
                            );
                            false
                        }
                        Response::Override { fork_base, blocks } => {
                            let orphans = chain.truncate_to(fork_base);
                            metrics.record_orphans(
                                orphans
                                    .iter()
                                    .map(|b| (b.producer, b.tx_count)),
                            );
                            if let Some(attack) = &mut attack {
                                attack.note_orphans(orphans.len() as u64);
                            }

                            let released = blocks.len();
                            let adversary = blocks
                                .first()
                                .map(|shadow| shadow.producer)
                                .unwrap_or(producer);
                            for shadow in blocks {
                                let block = chain.append(
                                    shadow.producer,
                                    shadow.timestamp,
                                    0,
                                    shadow.witness,
                                );
                                let (height, bytes) =
                                    (block.height, block.size_bytes());
                                metrics.record_block(shadow.producer, 0);
                                gossip(
                                    &mut topology,
                                    &mut queue,
                                    &mut metrics,
                                    &mut attack,
                                    shadow.producer,
                                    height,
                                    bytes,
                                    hop_delay,
                                    time,
                                );
                            }

                            debug!(
                                "[{:.2}] P{} releases {} private blocks, \
                                 orphaning {}",
                                time,
                                adversary,
                                released,
                                orphans.len(),
                            );
                            last_block_time = time;
                            true
                        }
                    };

                    if accepted {
                        chain.maybe_retarget(time);

                        if metrics.blocks % print_interval == 0 {
                            let summary = metrics.progress(
                                time,
                                chain.total_coins(),
                                block_limit,
                            );
                            info!(
                                "[{:.2}] B:{}{} abt:{:.2}s tps:{:.2} infl:{:.2}% \
                                 ETA:{:.0}s Diff:{} C:{} Pool:{} NMB:{:.2} IO:{}",
                                time,
                                metrics.blocks,
                                block_limit
                                    .map(|l| format!("/{}", l))
                                    .unwrap_or_default(),
                                summary.avg_block_time,
                                summary.tps,
                                summary.inflation,
                                summary.eta,
                                human(chain.difficulty()),
                                human(chain.total_coins()),
                                mempool.len(),
                                metrics.network_data as f64 / 1e6,
                                metrics.io_requests,
                            );
                        }
                    }

                    let done = block_limit
                        .map_or(false, |limit| metrics.blocks >= limit)
                        || (block_limit.is_none()
                            && tx_target > 0
                            && mempool.included() >= tx_target);
                    if done {
                        break;
                    }

                    // Checkpoint before sampling the next candidate, so a
                    // resumed run draws the same candidate next.
                    if accepted && metrics.blocks % print_interval == 0 {
                        if let Some(path) = &checkpoint_path {
                            Checkpoint {
                                schema_version: SCHEMA_VERSION,
                                seed,
                                rng_word_pos: rng.get_word_pos() as u64,
                                now: time,
                                chain: chain.clone(),
                                mempool: mempool.clone(),
                                wallets: wallets.clone(),
                                node_heights: topology.last_heights(),
                                metrics: metrics.clone(),
                                attack: attack.clone(),
                                config: config.clone(),
                            }
                            .save(path)?;
                        }
                    }

                    let (producer, delay) = consensus.next_block(
                        &mut rng,
                        &producers,
                        chain.difficulty(),
                        blocktime,
                    )?;
                    queue
                        .schedule(Event::BlockCandidate { producer }, time + delay);
                }
            }
        }

        let simulated_time = queue.now();
        let report = metrics.finalize(
            seed,
            &config.chain,
            simulated_time,
            chain.total_coins(),
            chain.difficulty_history(),
            attack.as_ref().map(|a| a.metrics()),
        );

        info!(
            "[{:.2}] End B:{} abt:{:.2}s tps:{:.2} Diff:{} Tx:{} C:{} Pool:{}",
            simulated_time,
            report.total_blocks,
            report.mean_block_time,
            report.tps,
            human(chain.difficulty()),
            report.total_transactions,
            human(report.coins_issued),
            mempool.len(),
        );

        Ok(SimulationOutput {
            config,
            chain: chain.blocks().to_vec(),
            report,
            simulated_time,
            mempool_len: mempool.len(),
        })
    }
}

/// Publishes one block into the gossip layer: BFS from the producer's
/// node, immediate delivery at zero hop delay, scheduled arrivals
/// otherwise.
fn gossip(
    topology: &mut Topology,
    queue: &mut EventQueue,
    metrics: &mut Metrics,
    attack: &mut Option<Attack>,
    producer: ProducerId,
    height: u64,
    bytes: u64,
    hop_delay: f64,
    time: f64,
) {
    let Some(origin) = topology.origin_for(producer) else {
        return;
    };

    let propagation = topology.propagate(origin, bytes, hop_delay);
    metrics.record_propagation(&propagation);
    if let Some(attack) = attack {
        attack.on_propagation(&propagation.arrivals);
    }

    for arrival in &propagation.arrivals {
        if arrival.offset > 0.0 {
            queue.schedule(
                Event::PropagationArrival {
                    height,
                    node: arrival.node,
                },
                time + arrival.offset,
            );
        } else {
            topology.deliver(arrival.node, height);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ChainPreset;

    use super::{SimulationBuilder, SimulationGroup};

    #[test]
    fn short_run_produces_the_requested_blocks() {
        let output = SimulationBuilder::preset(ChainPreset::Btc)
            .blocks(20)
            .seed(1)
            .build()
            .unwrap()
            .run()
            .unwrap();

        assert_eq!(output.chain.len(), 20);
        assert_eq!(output.report.total_blocks, 20);
        for (i, block) in output.chain.iter().enumerate() {
            assert_eq!(block.height, i as u64);
        }
    }

    #[test]
    fn timestamps_never_regress() {
        let output = SimulationBuilder::preset(ChainPreset::Btc)
            .blocks(50)
            .seed(9)
            .build()
            .unwrap()
            .run()
            .unwrap();

        for pair in output.chain.windows(2) {
            assert!(pair[1].timestamp >= pair[0].timestamp);
        }
    }

    #[test]
    fn issuance_matches_summed_rewards() {
        let output = SimulationBuilder::preset(ChainPreset::Btc)
            .blocks(30)
            .seed(3)
            .build()
            .unwrap()
            .run()
            .unwrap();

        let summed: f64 = output.chain.iter().map(|b| b.reward).sum();
        assert!((summed - output.report.coins_issued).abs() < 1e-9);
    }

    #[test]
    fn transactions_flow_into_blocks() {
        let output = SimulationBuilder::new()
            .blocktime(10.0)
            .wallets(4)
            .transactions_per_wallet(25)
            .tx_interval(1.0)
            .blocks(100)
            .seed(5)
            .build()
            .unwrap()
            .run()
            .unwrap();

        let included: u64 = output.chain.iter().map(|b| b.tx_count).sum();
        assert_eq!(included, output.report.total_transactions);
        assert!(included > 0);
    }

    #[test]
    fn run_ends_when_all_transactions_confirm() {
        // No block limit: the run stops once every wallet's budget has
        // been mined into blocks.
        let output = SimulationBuilder::new()
            .blocktime(10.0)
            .wallets(2)
            .transactions_per_wallet(10)
            .tx_interval(1.0)
            .build()
            .unwrap()
            .run()
            .unwrap();

        let included: u64 = output.chain.iter().map(|b| b.tx_count).sum();
        assert_eq!(included, 20);
        assert_eq!(output.mempool_len, 0);
    }

    #[test]
    fn group_runs_preserve_order() {
        let mut group = SimulationGroup::new();
        for seed in 0..4 {
            let mut config = ChainPreset::Btc.config();
            config.simulation.blocks = Some(5);
            config.simulation.seed = seed;
            group.add(config);
        }

        let outputs = group.run_all().unwrap();
        assert_eq!(outputs.len(), 4);
        for (seed, output) in outputs.iter().enumerate() {
            assert_eq!(output.report.seed, seed as u64);
            assert_eq!(output.report.total_blocks, 5);
        }
    }
}
