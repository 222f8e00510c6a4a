//! Blockchain discrete-event simulator CLI
//!
//! # Example
//!
//! ```bash
//! # Bitcoin-like network for 100 blocks
//! blocksim --chain btc --blocks 100 --seed 42
//!
//! # Selfish mining with a third of the hashrate
//! blocksim --blocks 2000 --attack selfish --attacker-hashrate 0.33
//! ```

use std::{path::PathBuf, process::ExitCode};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use blocksim::prelude::*;
use blocksim::utils::YEAR;

/// Blockchain discrete-event simulator.
///
/// Deterministic: the same seed and configuration reproduce the same
/// chain, block for block.
#[derive(Parser, Debug)]
#[command(name = "blocksim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Chain preset (btc, bch, ltc, doge, eth2, chia, custom)
    #[arg(long, default_value = "custom")]
    chain: String,

    /// Stop after this many blocks
    #[arg(long)]
    blocks: Option<u64>,

    /// Stop after this many simulated years
    #[arg(long)]
    years: Option<f64>,

    /// Target seconds between blocks
    #[arg(long)]
    blocktime: Option<f64>,

    /// Number of producers (miners, validators, or farmers)
    #[arg(long)]
    miners: Option<usize>,

    /// Capacity per producer (hashrate, stake, or space)
    #[arg(long)]
    hashrate: Option<f64>,

    /// Number of peer nodes
    #[arg(long)]
    nodes: Option<usize>,

    /// Peer connections per node
    #[arg(long)]
    neighbors: Option<usize>,

    /// Maximum transactions per block
    #[arg(long)]
    blocksize: Option<usize>,

    /// Number of transaction-emitting wallets
    #[arg(long)]
    wallets: Option<usize>,

    /// Transactions each wallet emits
    #[arg(long)]
    transactions_per_wallet: Option<u64>,

    /// Seconds between emissions per wallet
    #[arg(long)]
    interval: Option<f64>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Blocks between interval summaries (and checkpoints)
    #[arg(long)]
    print_interval: Option<u64>,

    /// Per-block debug logging
    #[arg(long)]
    debug: bool,

    /// Attack scenario (selfish, double-spend, eclipse)
    #[arg(long)]
    attack: Option<String>,

    /// Adversary's fraction of total capacity (0..1)
    #[arg(long)]
    attacker_hashrate: Option<f64>,

    /// Confirmations the double-spend victim waits for
    #[arg(long)]
    confirmations: Option<u64>,

    /// Number of eclipsed victim nodes
    #[arg(long)]
    victim_nodes: Option<usize>,

    /// Attacker's network share in selfish-mining races (0..1)
    #[arg(long)]
    gamma: Option<f64>,

    /// Write the metrics report to this JSON file
    #[arg(long)]
    export_metrics: Option<PathBuf>,

    /// Write a checkpoint here every print interval
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Resume from this checkpoint
    #[arg(long)]
    resume: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(
            |_| {
                EnvFilter::new(if args.debug {
                    "blocksim=debug"
                } else {
                    "blocksim=info"
                })
            },
        ))
        .init();

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("configuration error: {error}");
            return ExitCode::from(1);
        }
    };

    match execute(&args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("runtime error: {error:#}");
            ExitCode::from(2)
        }
    }
}

/// Loads the chain preset and overlays the explicitly-passed CLI flags.
fn build_config(args: &Args) -> Result<SimulationConfig, ConfigError> {
    let preset: ChainPreset = args.chain.parse()?;
    let mut config = preset.config();

    if let Some(blocks) = args.blocks {
        config.simulation.blocks = Some(blocks);
    }
    if let Some(years) = args.years {
        config.simulation.years = Some(years);
        // A time bound replaces any preset block limit.
        if args.blocks.is_none() {
            config.simulation.blocks = None;
        }
    }
    if let Some(blocktime) = args.blocktime {
        config.mining.blocktime = blocktime;
    }
    if let Some(miners) = args.miners {
        config.mining.miners = miners;
    }
    if let Some(hashrate) = args.hashrate {
        config.mining.capacity = hashrate;
    }
    if let Some(nodes) = args.nodes {
        config.network.nodes = nodes;
    }
    if let Some(neighbors) = args.neighbors {
        config.network.neighbors = neighbors;
    }
    if let Some(blocksize) = args.blocksize {
        config.mining.blocksize = blocksize;
    }
    if let Some(wallets) = args.wallets {
        config.transactions.wallets = wallets;
    }
    if let Some(count) = args.transactions_per_wallet {
        config.transactions.transactions_per_wallet = count;
    }
    if let Some(interval) = args.interval {
        config.transactions.interval = interval;
    }
    if let Some(seed) = args.seed {
        config.simulation.seed = seed;
    }
    if let Some(print_interval) = args.print_interval {
        config.simulation.print_interval = print_interval;
    }
    if args.debug {
        config.simulation.debug = true;
    }

    if let Some(kind) = &args.attack {
        let kind: AttackKind = kind.parse()?;
        let mut attack = AttackConfig::new(kind);
        if let Some(share) = args.attacker_hashrate {
            attack.attacker_share = share;
        }
        if let Some(confirmations) = args.confirmations {
            attack.confirmations = confirmations;
        }
        if let Some(victims) = args.victim_nodes {
            attack.victim_nodes = victims;
        }
        if let Some(gamma) = args.gamma {
            attack.gamma = gamma;
        }
        config.attack = Some(attack);
    }

    config.validate()?;
    Ok(config)
}

fn execute(args: &Args, config: SimulationConfig) -> anyhow::Result<()> {
    let mut builder = SimulationBuilder::new().config(config);
    if let Some(path) = &args.checkpoint {
        builder = builder.checkpoint_to(path);
    }
    if let Some(path) = &args.resume {
        builder = builder.resume_from(path);
    }

    let simulation = builder.build().context("could not set up simulation")?;
    let started = std::time::Instant::now();
    let output = simulation.run().context("simulation failed")?;
    let elapsed = started.elapsed().as_secs_f64();

    print_summary(&output, elapsed);

    if let Some(path) = &args.export_metrics {
        output
            .report
            .export_json(path)
            .with_context(|| format!("could not export metrics to {}", path.display()))?;
        println!("Metrics exported to: {}", path.display());
    }

    Ok(())
}

fn print_summary(output: &SimulationOutput, elapsed: f64) {
    let config = &output.config;
    let report = &output.report;

    println!();
    println!("{}", "=".repeat(60));
    println!("SIMULATION RESULTS");
    println!("{}", "=".repeat(60));

    println!("Configuration:");
    println!("  Chain: {}", config.chain);
    println!(
        "  Network: {} nodes, {} neighbors each",
        config.network.nodes, config.network.neighbors
    );
    println!(
        "  Producers: {} @ {:.0} capacity each",
        config.mining.miners, config.mining.capacity
    );
    println!(
        "  Wallets: {} wallets, {} tx each",
        config.transactions.wallets,
        config.transactions.transactions_per_wallet
    );
    println!("  Block time: {} sec", config.mining.blocktime);
    println!("  Block size: {} transactions", config.mining.blocksize);

    println!();
    println!("Results:");
    println!("  Blocks mined: {}", report.total_blocks);
    println!("  Transactions: {}", report.total_transactions);
    println!("  Coins issued: {:.2}", report.coins_issued);
    println!(
        "  Network data: {:.2} MB",
        report.network_data_bytes as f64 / 1e6
    );
    println!("  I/O requests: {}", report.io_requests);
    println!("  Mean propagation hops: {:.2}", report.mean_propagation_hops);

    println!();
    println!("Performance:");
    println!(
        "  Simulated time: {:.2} seconds ({:.2} days / {:.4} years)",
        output.simulated_time,
        output.simulated_time / 86_400.0,
        output.simulated_time / YEAR,
    );
    println!("  Actual time: {:.6} seconds", elapsed);
    println!("  Average block time: {:.2} seconds", report.mean_block_time);

    println!();
    println!("Producer shares:");
    for producer in &report.producers {
        println!(
            "  P{}: {} blocks ({:.1}%)",
            producer.id,
            producer.blocks,
            producer.share * 100.0
        );
    }

    if let Some(attack) = &report.attack {
        println!();
        match attack {
            AttackMetrics::Selfish {
                withheld,
                races_won,
                races_lost,
                full_releases,
                orphaned_honest,
            } => {
                println!("ATTACK RESULTS (Selfish Mining)");
                println!("{}", "-".repeat(40));
                println!("  Blocks withheld: {}", withheld);
                println!("  Races won: {}", races_won);
                println!("  Races lost: {}", races_lost);
                println!("  Full releases: {}", full_releases);
                println!("  Orphaned honest blocks: {}", orphaned_honest);
                println!(
                    "  Attacker share: {:.1}%",
                    report.producers[0].share * 100.0
                );
            }
            AttackMetrics::DoubleSpend {
                attempts,
                successes,
                failures,
                success_rate,
                double_spent_value,
                confirmations,
                ..
            } => {
                println!("ATTACK RESULTS (51% Double Spend)");
                println!("{}", "-".repeat(40));
                println!("  Attack attempts: {}", attempts);
                println!("  Successful: {}", successes);
                println!("  Failed: {}", failures);
                println!("  Success rate: {:.1}%", success_rate * 100.0);
                println!("  Double-spent value: {:.2}", double_spent_value);
                println!("  Confirmations: {}", confirmations);
            }
            AttackMetrics::Eclipse {
                honest_blocks,
                victim_seen_fraction,
                blocks_withheld,
            } => {
                println!("ATTACK RESULTS (Eclipse)");
                println!("{}", "-".repeat(40));
                println!("  Honest blocks: {}", honest_blocks);
                println!("  Blocks withheld: {}", blocks_withheld);
                for (victim, fraction) in
                    victim_seen_fraction.iter().enumerate()
                {
                    println!(
                        "  Victim node {}: saw {:.1}% of honest blocks",
                        victim,
                        fraction * 100.0
                    );
                }
            }
        }
    }

    println!("{}", "=".repeat(60));
}
