//! Canonical chain state, difficulty retargeting, and the reward schedule

use serde::{Deserialize, Serialize};

use crate::{
    block::{Block, ProofWitness},
    producer::ProducerId,
};

/// Halving-based issuance schedule.
///
/// The reward of a block is a pure function of its height, so reorgs and
/// resumed runs always mint the same coins for the same chain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardSchedule {
    pub initial_reward: f64,
    /// Blocks between halvings. `None` disables halving entirely.
    pub halving_interval: Option<u64>,
    /// Maximum number of halvings before issuance stops. `None` means
    /// unlimited halvings; `Some(0)` disables halving and keeps the
    /// reward constant.
    pub max_halvings: Option<u32>,
}

impl RewardSchedule {
    pub fn reward_at(&self, height: u64) -> f64 {
        let interval = match self.halving_interval {
            None | Some(0) => return self.initial_reward,
            Some(interval) => interval,
        };
        if self.max_halvings == Some(0) {
            return self.initial_reward;
        }

        let halvings = height / interval;
        if let Some(max) = self.max_halvings {
            if halvings >= u64::from(max) {
                return 0.0;
            }
        }

        self.initial_reward / 2f64.powi(halvings.min(1023) as i32)
    }
}

/// One difficulty retarget, recorded for the metrics export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyUpdate {
    pub height: u64,
    pub time: f64,
    pub difficulty: f64,
}

/// The canonical chain and the consensus parameters that evolve with it.
///
/// Heights are dense: `blocks()[i].height == i`. Attack reorgs go through
/// [`ChainState::truncate_to`], which keeps issuance accounting in step
/// with the surviving blocks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainState {
    blocks: Vec<Block>,
    difficulty: f64,
    /// Blocks between difficulty recalculations. `None` fixes difficulty.
    retarget_interval: Option<u64>,
    /// Target seconds per block, used to size the retarget window.
    blocktime: f64,
    blocks_since_retarget: u64,
    last_retarget_time: f64,
    schedule: RewardSchedule,
    total_coins: f64,
    difficulty_history: Vec<DifficultyUpdate>,
}

impl ChainState {
    /// Retarget factor clamp, per side.
    const MAX_RETARGET_FACTOR: f64 = 4.0;

    pub fn new(
        difficulty: f64,
        retarget_interval: Option<u64>,
        blocktime: f64,
        schedule: RewardSchedule,
    ) -> Self {
        ChainState {
            blocks: Vec::new(),
            difficulty,
            retarget_interval,
            blocktime,
            blocks_since_retarget: 0,
            last_retarget_time: 0.0,
            schedule,
            total_coins: 0.0,
            difficulty_history: Vec::new(),
        }
    }

    /// Height the next appended block will get.
    #[inline]
    pub fn next_height(&self) -> u64 {
        self.blocks.len() as u64
    }

    #[inline]
    pub fn tip(&self) -> Option<&Block> {
        self.blocks.last()
    }

    #[inline]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[inline]
    pub fn difficulty(&self) -> f64 {
        self.difficulty
    }

    #[inline]
    pub fn total_coins(&self) -> f64 {
        self.total_coins
    }

    #[inline]
    pub fn schedule(&self) -> &RewardSchedule {
        &self.schedule
    }

    #[inline]
    pub fn difficulty_history(&self) -> &[DifficultyUpdate] {
        &self.difficulty_history
    }

    /// Current reward, as the next appended block would mint it.
    #[inline]
    pub fn current_reward(&self) -> f64 {
        self.schedule.reward_at(self.next_height())
    }

    /// Appends a block at the tip. The reward is derived from the
    /// schedule and the difficulty is stamped from the current value.
    pub fn append(
        &mut self,
        producer: ProducerId,
        timestamp: f64,
        tx_count: u64,
        witness: ProofWitness,
    ) -> &Block {
        let height = self.next_height();

        debug_assert!(
            self.tip().map_or(true, |tip| timestamp >= tip.timestamp),
            "block timestamp {} precedes tip timestamp",
            timestamp,
        );

        let reward = self.schedule.reward_at(height);
        self.total_coins += reward;
        self.blocks_since_retarget += 1;

        self.blocks.push(Block {
            height,
            producer,
            parent: height.checked_sub(1),
            timestamp,
            tx_count,
            reward,
            difficulty: self.difficulty,
            witness,
        });

        self.blocks.last().unwrap()
    }

    /// Recomputes difficulty if a full retarget window has elapsed.
    /// Returns the new difficulty when a retarget fired.
    ///
    /// The adjustment scales by target-window over actual-window seconds,
    /// clamped to `[x0.25, x4]` per retarget.
    pub fn maybe_retarget(&mut self, now: f64) -> Option<f64> {
        let interval = self.retarget_interval?;
        if self.blocks_since_retarget < interval {
            return None;
        }

        let target_window = self.blocktime * self.blocks_since_retarget as f64;
        let actual_window = now - self.last_retarget_time;

        let factor = if actual_window > 0.0 {
            (target_window / actual_window)
                .clamp(1.0 / Self::MAX_RETARGET_FACTOR, Self::MAX_RETARGET_FACTOR)
        } else {
            Self::MAX_RETARGET_FACTOR
        };

        self.difficulty *= factor;
        self.blocks_since_retarget = 0;
        self.last_retarget_time = now;
        self.difficulty_history.push(DifficultyUpdate {
            height: self.next_height(),
            time: now,
            difficulty: self.difficulty,
        });

        Some(self.difficulty)
    }

    /// Removes every block at `height` and above, returning the orphans
    /// in ascending height order. Their rewards are un-minted.
    pub fn truncate_to(&mut self, height: u64) -> Vec<Block> {
        let keep = height.min(self.next_height()) as usize;
        let orphans: Vec<Block> = self.blocks.split_off(keep);

        for orphan in &orphans {
            self.total_coins -= orphan.reward;
        }
        self.blocks_since_retarget = self
            .blocks_since_retarget
            .saturating_sub(orphans.len() as u64);

        orphans
    }
}

#[cfg(test)]
mod tests {
    use super::{ChainState, RewardSchedule};
    use crate::block::ProofWitness;

    fn btc_schedule() -> RewardSchedule {
        RewardSchedule {
            initial_reward: 50.0,
            halving_interval: Some(210_000),
            max_halvings: None,
        }
    }

    fn test_chain() -> ChainState {
        ChainState::new(600.0, Some(4), 10.0, btc_schedule())
    }

    #[test]
    fn rewards_halve_on_schedule() {
        let schedule = RewardSchedule {
            initial_reward: 50.0,
            halving_interval: Some(10),
            max_halvings: None,
        };

        assert_eq!(schedule.reward_at(0), 50.0);
        assert_eq!(schedule.reward_at(9), 50.0);
        assert_eq!(schedule.reward_at(10), 25.0);
        assert_eq!(schedule.reward_at(25), 12.5);
        assert_eq!(schedule.reward_at(30), 6.25);
    }

    #[test]
    fn max_halvings_stops_issuance() {
        let schedule = RewardSchedule {
            initial_reward: 50.0,
            halving_interval: Some(10),
            max_halvings: Some(2),
        };

        assert_eq!(schedule.reward_at(19), 25.0);
        assert_eq!(schedule.reward_at(20), 0.0);
    }

    #[test]
    fn zero_max_halvings_keeps_reward_constant() {
        let schedule = RewardSchedule {
            initial_reward: 10_000.0,
            halving_interval: Some(100_000),
            max_halvings: Some(0),
        };

        assert_eq!(schedule.reward_at(1_000_000), 10_000.0);
    }

    #[test]
    fn no_halving_interval_keeps_reward_constant() {
        let schedule = RewardSchedule {
            initial_reward: 10_000.0,
            halving_interval: None,
            max_halvings: None,
        };

        assert_eq!(schedule.reward_at(5_000_000), 10_000.0);
    }

    #[test]
    fn heights_are_dense_and_coins_accounted() {
        let mut chain = test_chain();
        for i in 0..3 {
            chain.append(0, i as f64, 0, ProofWitness::Hashrate(1.0));
        }

        for (i, block) in chain.blocks().iter().enumerate() {
            assert_eq!(block.height, i as u64);
        }
        assert_eq!(chain.total_coins(), 150.0);
        assert_eq!(chain.blocks()[0].parent, None);
        assert_eq!(chain.blocks()[2].parent, Some(1));
    }

    #[test]
    fn retarget_waits_for_the_interval() {
        let mut chain = test_chain();
        for i in 0..3 {
            chain.append(0, i as f64, 0, ProofWitness::Hashrate(1.0));
            assert_eq!(chain.maybe_retarget(i as f64), None);
        }
    }

    #[test]
    fn retarget_scales_and_clamps() {
        // 4 blocks in 20s against a 10s target: difficulty should double.
        let mut chain = test_chain();
        for i in 1..=4 {
            chain.append(0, (i * 5) as f64, 0, ProofWitness::Hashrate(1.0));
        }
        assert_eq!(chain.maybe_retarget(20.0), Some(1200.0));

        // Another 4 blocks instantly: clamp kicks in at x4.
        for i in 0..4 {
            chain.append(0, 20.0 + i as f64 * 1e-9, 0, ProofWitness::Hashrate(1.0));
        }
        let retargeted = chain.maybe_retarget(20.0).unwrap();
        assert!((retargeted - 4800.0).abs() < 1e-6);
    }

    #[test]
    fn truncation_unmints_orphan_rewards() {
        let mut chain = test_chain();
        for i in 0..5 {
            chain.append(0, i as f64, 0, ProofWitness::Hashrate(1.0));
        }

        let orphans = chain.truncate_to(2);
        assert_eq!(orphans.len(), 3);
        assert_eq!(chain.next_height(), 2);
        assert_eq!(chain.total_coins(), 100.0);
    }
}
