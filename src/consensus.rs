//! Consensus disciplines and block-production sampling

use rand::{distributions::WeightedIndex, prelude::Distribution, Rng};
use rand_distr::Exp;
use serde::{Deserialize, Serialize};

use crate::{
    block::ProofWitness,
    producer::{Producer, ProducerId},
};

/// A consensus discipline, expressed as the single operation the
/// coordinator needs: sample the next block's producer and the delay
/// until it appears.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum Consensus {
    /// Competing Poisson mining processes. Delay is exponential with rate
    /// `total_hashrate / difficulty`; the winner is hashrate-weighted.
    ProofOfWork,
    /// Slot-based validation. Delay is the configured blocktime (plus an
    /// optional jitter fraction); the proposer is stake-weighted.
    ProofOfStake {
        #[serde(default)]
        jitter: f64,
    },
    /// Chia-style space farming behind a VDF abstraction. Delay is
    /// exponential with rate `total_space / difficulty`; the winner is
    /// space-weighted.
    ProofOfSpace,
}

#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("all producer capacities are zero")]
    NoCapacity,
    #[error("no producers configured")]
    NoProducers,
}

impl Consensus {
    /// Samples the next block event: which producer publishes, and how
    /// many simulated seconds from now.
    ///
    /// This is the only sampling site of the consensus layer; it draws
    /// from `rng` in a fixed order (delay, then producer) so runs are
    /// reproducible from the seed alone.
    pub fn next_block<R: Rng>(
        &self,
        rng: &mut R,
        producers: &[Producer],
        difficulty: f64,
        blocktime: f64,
    ) -> Result<(ProducerId, f64), SelectionError> {
        if producers.is_empty() {
            return Err(SelectionError::NoProducers);
        }

        let total: f64 = producers.iter().map(|p| p.capacity).sum();
        if total <= 0.0 {
            return Err(SelectionError::NoCapacity);
        }

        let delay = match *self {
            Self::ProofOfWork | Self::ProofOfSpace => {
                // Exp::new only fails on a non-positive rate, which the
                // capacity and difficulty checks above rule out.
                let rate = total / difficulty;
                Exp::new(rate)
                    .map_err(|_| SelectionError::NoCapacity)?
                    .sample(rng)
            }
            Self::ProofOfStake { jitter } => {
                if jitter > 0.0 {
                    blocktime * (1.0 + jitter * (rng.gen::<f64>() - 0.5))
                } else {
                    blocktime
                }
            }
        };

        let producer = Self::pick_producer(rng, producers)?;
        Ok((producer, delay))
    }

    /// Capacity-weighted producer selection. Producers with equal weight
    /// are equally likely; zero-capacity producers are never chosen. See
    /// DESIGN.md for why identical weights are not broken toward the
    /// lowest ID.
    fn pick_producer<R: Rng>(
        rng: &mut R,
        producers: &[Producer],
    ) -> Result<ProducerId, SelectionError> {
        let weights = producers.iter().map(|p| p.capacity);
        let index = WeightedIndex::new(weights)
            .map_err(|_| SelectionError::NoCapacity)?;

        Ok(producers[index.sample(rng)].id)
    }

    /// The proof witness recorded on a block produced by `producer`.
    pub fn witness(&self, producer: &Producer, total_capacity: f64) -> ProofWitness {
        let share = producer.capacity / total_capacity;

        match self {
            Self::ProofOfWork => ProofWitness::Hashrate(share),
            Self::ProofOfStake { .. } => ProofWitness::Stake(share),
            Self::ProofOfSpace => ProofWitness::Space(share),
        }
    }

    /// Difficulty used when the configuration leaves it unset: the value
    /// that makes the expected delay equal to the target blocktime.
    pub fn auto_difficulty(&self, total_capacity: f64, blocktime: f64) -> f64 {
        blocktime * total_capacity
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::{Consensus, SelectionError};
    use crate::producer::Producer;

    fn producers(capacities: &[f64]) -> Vec<Producer> {
        capacities
            .iter()
            .enumerate()
            .map(|(id, &capacity)| Producer {
                id,
                capacity,
                adversary: false,
            })
            .collect()
    }

    #[test]
    fn zero_capacity_is_fatal() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let result = Consensus::ProofOfWork.next_block(
            &mut rng,
            &producers(&[0.0, 0.0]),
            1.0,
            600.0,
        );

        assert!(matches!(result, Err(SelectionError::NoCapacity)));
    }

    #[test]
    fn pos_delay_is_the_blocktime() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let consensus = Consensus::ProofOfStake { jitter: 0.0 };
        let (_, delay) = consensus
            .next_block(&mut rng, &producers(&[1.0, 1.0]), 1.0, 12.0)
            .unwrap();

        assert_eq!(delay, 12.0);
    }

    #[test]
    fn pow_mean_delay_tracks_difficulty() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let set = producers(&[50.0, 50.0]);
        let consensus = Consensus::ProofOfWork;
        let difficulty = consensus.auto_difficulty(100.0, 10.0);

        let rounds = 20_000;
        let mut sum = 0.0;
        for _ in 0..rounds {
            let (_, delay) = consensus
                .next_block(&mut rng, &set, difficulty, 10.0)
                .unwrap();
            sum += delay;
        }

        let mean = sum / rounds as f64;
        assert!((mean - 10.0).abs() < 0.5, "mean delay was {mean}");
    }

    #[test]
    fn heavier_producer_wins_more_blocks() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let set = producers(&[90.0, 10.0]);

        let mut wins = [0u32; 2];
        for _ in 0..5_000 {
            let (winner, _) = Consensus::ProofOfWork
                .next_block(&mut rng, &set, 100.0, 1.0)
                .unwrap();
            wins[winner] += 1;
        }

        assert!(wins[0] > wins[1] * 5);
    }
}
