//! Eclipse isolation of victim nodes

use serde::{Deserialize, Serialize};

use super::{AttackMetrics, BlockContext, Response};
use crate::network::{Arrival, NodeId};

/// An eclipse attack on the low-numbered nodes.
///
/// The attack does not mine; it controls the victims' peer sets (applied
/// to the topology at startup) and records how much of the honest chain
/// each victim actually observes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Eclipse {
    victims: Vec<NodeId>,
    honest_blocks: u64,
    seen_by_victim: Vec<u64>,
}

impl Eclipse {
    pub fn new(victim_count: usize) -> Self {
        Eclipse {
            victims: (0..victim_count).collect(),
            honest_blocks: 0,
            seen_by_victim: vec![0; victim_count],
        }
    }

    #[inline]
    pub fn victims(&self) -> &[NodeId] {
        &self.victims
    }

    pub fn on_block(&mut self, _ctx: &BlockContext) -> Response {
        self.honest_blocks += 1;
        Response::Publish
    }

    /// Checks whether any victim was reached by this block's gossip.
    pub fn on_propagation(&mut self, arrivals: &[Arrival]) {
        for arrival in arrivals {
            if let Some(index) =
                self.victims.iter().position(|&v| v == arrival.node)
            {
                self.seen_by_victim[index] += 1;
            }
        }
    }

    pub fn metrics(&self) -> AttackMetrics {
        let fractions = self
            .seen_by_victim
            .iter()
            .map(|&seen| {
                if self.honest_blocks > 0 {
                    seen as f64 / self.honest_blocks as f64
                } else {
                    0.0
                }
            })
            .collect();
        let seen_total: u64 = self.seen_by_victim.iter().sum();

        AttackMetrics::Eclipse {
            honest_blocks: self.honest_blocks,
            victim_seen_fraction: fractions,
            blocks_withheld: self.honest_blocks
                * self.victims.len() as u64
                - seen_total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Eclipse;
    use crate::attack::AttackMetrics;
    use crate::network::Arrival;

    #[test]
    fn unreached_victims_see_nothing() {
        let mut eclipse = Eclipse::new(2);
        eclipse.honest_blocks = 10;
        eclipse.on_propagation(&[Arrival {
            node: 7,
            hops: 1,
            offset: 0.0,
        }]);

        match eclipse.metrics() {
            AttackMetrics::Eclipse {
                victim_seen_fraction,
                blocks_withheld,
                ..
            } => {
                assert_eq!(victim_seen_fraction, vec![0.0, 0.0]);
                assert_eq!(blocks_withheld, 20);
            }
            _ => unreachable!(),
        }
    }
}
