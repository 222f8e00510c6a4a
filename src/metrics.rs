//! Metrics accumulation and the export record

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    attack::AttackMetrics,
    chain::DifficultyUpdate,
    network::Propagation,
    producer::ProducerId,
    utils::YEAR,
};

/// Running counters updated as the simulation executes.
///
/// Everything here is checkpointable; derived values (means, shares,
/// rates) are computed once at finalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Blocks currently on the canonical chain.
    pub blocks: u64,
    /// Transactions confirmed in canonical blocks.
    pub transactions: u64,
    /// Accepted blocks per producer, indexed by producer ID.
    pub blocks_by_producer: Vec<u64>,
    /// Honest blocks orphaned by attack reorgs.
    pub orphaned_blocks: u64,

    // Network accounting.
    pub network_data: u64,
    pub io_requests: u64,
    pub propagation_losses: u64,
    pub propagation_hops: u64,
    pub nodes_reached: u64,

    // Progress-window state for interval summaries.
    last_time: f64,
    last_blocks: u64,
    last_transactions: u64,
    last_coins: f64,
}

/// Interval summary over the window since the previous one.
#[derive(Debug, Clone, Copy)]
pub struct ProgressSummary {
    pub avg_block_time: f64,
    pub tps: f64,
    /// Annualized issuance growth over the window, in percent.
    pub inflation: f64,
    /// Estimated simulated seconds to the block limit.
    pub eta: f64,
}

impl Metrics {
    pub fn new(producers: usize) -> Self {
        Metrics {
            blocks_by_producer: vec![0; producers],
            ..Default::default()
        }
    }

    /// Records a block accepted onto the canonical chain.
    pub fn record_block(&mut self, producer: ProducerId, tx_count: u64) {
        self.blocks += 1;
        self.transactions += tx_count;
        if let Some(count) = self.blocks_by_producer.get_mut(producer) {
            *count += 1;
        }
    }

    /// Reverses accounting for blocks orphaned by a reorg.
    pub fn record_orphans(
        &mut self,
        orphans: impl Iterator<Item = (ProducerId, u64)>,
    ) {
        for (producer, tx_count) in orphans {
            self.blocks -= 1;
            self.transactions -= tx_count;
            self.orphaned_blocks += 1;
            if let Some(count) = self.blocks_by_producer.get_mut(producer) {
                *count -= 1;
            }
        }
    }

    pub fn record_propagation(&mut self, propagation: &Propagation) {
        self.network_data += propagation.bytes_sent;
        self.io_requests += propagation.io_requests;
        self.propagation_losses += propagation.unreachable;
        self.propagation_hops += propagation.total_hops;
        self.nodes_reached += propagation.arrivals.len() as u64;
    }

    /// Computes the interval summary and rolls the window forward.
    pub fn progress(
        &mut self,
        now: f64,
        total_coins: f64,
        block_limit: Option<u64>,
    ) -> ProgressSummary {
        let window = now - self.last_time;
        let window_blocks = self.blocks - self.last_blocks;
        let window_tx = self.transactions - self.last_transactions;
        let window_coins = total_coins - self.last_coins;

        let avg_block_time = if window_blocks > 0 {
            window / window_blocks as f64
        } else {
            0.0
        };
        let tps = if window > 0.0 { window_tx as f64 / window } else { 0.0 };
        let inflation = if self.last_coins > 0.0 && window > 0.0 {
            (window_coins / self.last_coins) * (YEAR / window) * 100.0
        } else {
            0.0
        };
        let eta = block_limit
            .map(|limit| limit.saturating_sub(self.blocks) as f64 * avg_block_time)
            .unwrap_or(0.0);

        self.last_time = now;
        self.last_blocks = self.blocks;
        self.last_transactions = self.transactions;
        self.last_coins = total_coins;

        ProgressSummary {
            avg_block_time,
            tps,
            inflation,
            eta,
        }
    }

    /// Produces the final export record.
    pub fn finalize(
        &self,
        seed: u64,
        chain: &str,
        simulated_time: f64,
        total_coins: f64,
        difficulty_history: &[DifficultyUpdate],
        attack: Option<AttackMetrics>,
    ) -> MetricsReport {
        let mean_block_time = if self.blocks > 0 {
            simulated_time / self.blocks as f64
        } else {
            0.0
        };
        let mean_propagation_hops = if self.nodes_reached > 0 {
            self.propagation_hops as f64 / self.nodes_reached as f64
        } else {
            0.0
        };
        let tps = if simulated_time > 0.0 {
            self.transactions as f64 / simulated_time
        } else {
            0.0
        };

        let producers = self
            .blocks_by_producer
            .iter()
            .enumerate()
            .map(|(id, &blocks)| ProducerShare {
                id,
                blocks,
                share: if self.blocks > 0 {
                    blocks as f64 / self.blocks as f64
                } else {
                    0.0
                },
            })
            .collect();

        MetricsReport {
            seed,
            chain: chain.to_owned(),
            simulated_time,
            total_blocks: self.blocks,
            total_transactions: self.transactions,
            coins_issued: total_coins,
            mean_block_time,
            mean_propagation_hops,
            tps,
            network_data_bytes: self.network_data,
            io_requests: self.io_requests,
            propagation_losses: self.propagation_losses,
            orphaned_blocks: self.orphaned_blocks,
            producers,
            difficulty_history: difficulty_history.to_vec(),
            attack,
        }
    }
}

/// A producer's slice of the accepted chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducerShare {
    pub id: ProducerId,
    pub blocks: u64,
    pub share: f64,
}

/// Finalized metrics, as exported to JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub seed: u64,
    pub chain: String,
    pub simulated_time: f64,
    pub total_blocks: u64,
    pub total_transactions: u64,
    pub coins_issued: f64,
    pub mean_block_time: f64,
    pub mean_propagation_hops: f64,
    pub tps: f64,
    pub network_data_bytes: u64,
    pub io_requests: u64,
    pub propagation_losses: u64,
    pub orphaned_blocks: u64,
    pub producers: Vec<ProducerShare>,
    pub difficulty_history: Vec<DifficultyUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack: Option<AttackMetrics>,
}

impl MetricsReport {
    /// Writes the report as pretty-printed JSON.
    pub fn export_json(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self)
            .map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }
}
