//! Selfish mining: withhold blocks to waste honest work

use std::collections::VecDeque;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{AttackMetrics, BlockContext, Response, ShadowBlock};

/// The Eyal–Sirer withholding strategy.
///
/// The attacker mines on a private branch and reacts to honest blocks
/// based on its lead over the public chain:
///
/// - lead 0: adopt the public block, keep mining on it.
/// - lead 1: publish the private block and race; the attacker's network
///   share `gamma` decides the race.
/// - lead 2: publish the whole private branch; publication wins outright.
/// - lead 3+: publish the oldest withheld block to answer the honest
///   block, keeping the rest of the lead private.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selfish {
    gamma: f64,
    /// Public chain height the private branch currently forks from.
    /// Advances as withheld blocks are published one at a time.
    fork_base: u64,
    /// Mined but unpublished blocks, oldest first.
    private: VecDeque<ShadowBlock>,

    withheld: u64,
    races_won: u64,
    races_lost: u64,
    full_releases: u64,
    orphaned_honest: u64,
}

impl Selfish {
    pub fn new(gamma: f64) -> Self {
        Selfish {
            gamma,
            fork_base: 0,
            private: VecDeque::new(),
            withheld: 0,
            races_won: 0,
            races_lost: 0,
            full_releases: 0,
            orphaned_honest: 0,
        }
    }

    pub fn on_block<R: Rng>(
        &mut self,
        rng: &mut R,
        ctx: &BlockContext,
    ) -> Response {
        if ctx.adversary {
            if self.private.is_empty() {
                self.fork_base = ctx.chain_height;
            }
            self.private.push_back(ShadowBlock {
                producer: ctx.producer,
                timestamp: ctx.timestamp,
                witness: ctx.witness,
            });
            self.withheld += 1;

            return Response::Withhold;
        }

        if self.private.is_empty() {
            return Response::Publish;
        }

        // The public tip moved past the fork point; the branch is stale.
        if ctx.chain_height != self.fork_base {
            self.private.clear();
            return Response::Publish;
        }

        match self.private.len() {
            1 => {
                if rng.gen_bool(self.gamma) {
                    self.races_won += 1;
                    self.orphaned_honest += 1;
                    self.release_all()
                } else {
                    self.races_lost += 1;
                    self.private.clear();
                    Response::Publish
                }
            }
            2 => {
                self.full_releases += 1;
                self.orphaned_honest += 1;
                self.release_all()
            }
            // Answer the honest block with the oldest withheld block,
            // keeping the remaining lead private.
            _ => {
                self.orphaned_honest += 1;
                let block = self.private.pop_front().unwrap();
                let response = Response::Override {
                    fork_base: self.fork_base,
                    blocks: vec![block],
                };
                self.fork_base += 1;

                response
            }
        }
    }

    fn release_all(&mut self) -> Response {
        Response::Override {
            fork_base: self.fork_base,
            blocks: self.private.drain(..).collect(),
        }
    }

    pub fn note_orphans(&mut self, count: u64) {
        self.orphaned_honest += count;
    }

    pub fn metrics(&self) -> AttackMetrics {
        AttackMetrics::Selfish {
            withheld: self.withheld,
            races_won: self.races_won,
            races_lost: self.races_lost,
            full_releases: self.full_releases,
            orphaned_honest: self.orphaned_honest,
        }
    }
}
