//! Majority-hashrate double-spend in the Nakamoto race model

use serde::{Deserialize, Serialize};

use super::{AttackMetrics, BlockContext, Response, ShadowBlock};

/// A repeated double-spend attempt against a victim waiting for `k`
/// confirmations.
///
/// Once armed, the attacker mines a private fork from the pre-payment
/// parent while the honest chain confirms the payment. The attempt
/// succeeds when the private fork outgrows the honest extension after the
/// victim's `k` confirmations exist, and is abandoned once the fork falls
/// more than `2k` blocks behind the honest extension. Each resolved
/// attempt re-arms from the new tip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoubleSpend {
    confirmations: u64,
    /// Set by the arming tick; attempts re-arm themselves afterwards.
    started: bool,
    armed: bool,
    fork_base: u64,
    private: Vec<ShadowBlock>,
    /// Honest blocks accepted since the fork.
    honest_len: u64,

    attempts: u64,
    successes: u64,
    failures: u64,
    depth_at_success: u64,
    depth_at_failure: u64,
    double_spent_value: f64,
    orphaned_honest: u64,
}

impl DoubleSpend {
    pub fn new(confirmations: u64) -> Self {
        DoubleSpend {
            confirmations,
            started: false,
            armed: false,
            fork_base: 0,
            private: Vec::new(),
            honest_len: 0,
            attempts: 0,
            successes: 0,
            failures: 0,
            depth_at_success: 0,
            depth_at_failure: 0,
            double_spent_value: 0.0,
            orphaned_honest: 0,
        }
    }

    /// Whether the arming tick has fired.
    #[inline]
    pub fn started(&self) -> bool {
        self.started
    }

    /// Starts the first attempt: the payment transaction is considered
    /// sent at the current tip, and the private fork begins beneath it.
    pub fn arm(&mut self, chain_height: u64) {
        self.started = true;
        self.armed = true;
        self.fork_base = chain_height;
        self.private.clear();
        self.honest_len = 0;
        self.attempts += 1;
    }

    pub fn on_block(&mut self, ctx: &BlockContext) -> Response {
        if !self.started {
            return Response::Publish;
        }
        if !self.armed {
            self.arm(ctx.chain_height);
        }

        if ctx.adversary {
            self.private.push(ShadowBlock {
                producer: ctx.producer,
                timestamp: ctx.timestamp,
                witness: ctx.witness,
            });

            if self.fork_wins() {
                return self.succeed(ctx.reward);
            }
            Response::Withhold
        } else {
            self.honest_len += 1;

            if self.fork_wins() {
                // The honest candidate is orphaned along with the rest of
                // the confirmation chain.
                return self.succeed(ctx.reward);
            }
            let deficit =
                self.honest_len.saturating_sub(self.private.len() as u64);
            if deficit > 2 * self.confirmations {
                self.failures += 1;
                self.depth_at_failure += self.private.len() as u64;
                self.armed = false;
                self.private.clear();
            }
            Response::Publish
        }
    }

    /// The victim has accepted the payment and the private fork is now
    /// the longest.
    fn fork_wins(&self) -> bool {
        self.honest_len >= self.confirmations
            && self.private.len() as u64 > self.honest_len
    }

    fn succeed(&mut self, reward: f64) -> Response {
        self.successes += 1;
        self.depth_at_success += self.private.len() as u64;
        self.double_spent_value += reward * self.confirmations as f64;
        self.armed = false;

        Response::Override {
            fork_base: self.fork_base,
            blocks: std::mem::take(&mut self.private),
        }
    }

    pub fn note_orphans(&mut self, count: u64) {
        self.orphaned_honest += count;
    }

    pub fn metrics(&self) -> AttackMetrics {
        let mean = |total: u64, n: u64| {
            if n > 0 {
                total as f64 / n as f64
            } else {
                0.0
            }
        };

        AttackMetrics::DoubleSpend {
            attempts: self.attempts,
            successes: self.successes,
            failures: self.failures,
            success_rate: mean(self.successes, self.attempts),
            mean_depth_at_success: mean(self.depth_at_success, self.successes),
            mean_depth_at_failure: mean(self.depth_at_failure, self.failures),
            double_spent_value: self.double_spent_value,
            confirmations: self.confirmations,
            orphaned_honest: self.orphaned_honest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DoubleSpend, Response};
    use crate::attack::{AttackMetrics, BlockContext};
    use crate::block::ProofWitness;

    fn ctx(adversary: bool, chain_height: u64) -> BlockContext {
        BlockContext {
            producer: if adversary { 0 } else { 1 },
            adversary,
            timestamp: chain_height as f64,
            chain_height,
            reward: 50.0,
            witness: ProofWitness::Hashrate(0.6),
        }
    }

    #[test]
    fn inert_until_armed() {
        let mut attack = DoubleSpend::new(3);
        assert_eq!(attack.on_block(&ctx(true, 0)), Response::Publish);
    }

    #[test]
    fn succeeds_after_confirmations_when_fork_is_longer() {
        let mut attack = DoubleSpend::new(2);
        attack.arm(10);

        // Victim confirms the payment twice.
        assert_eq!(attack.on_block(&ctx(false, 10)), Response::Publish);
        assert_eq!(attack.on_block(&ctx(false, 11)), Response::Publish);

        // Private fork catches up and overtakes.
        assert_eq!(attack.on_block(&ctx(true, 12)), Response::Withhold);
        assert_eq!(attack.on_block(&ctx(true, 12)), Response::Withhold);
        match attack.on_block(&ctx(true, 12)) {
            Response::Override { fork_base, blocks } => {
                assert_eq!(fork_base, 10);
                assert_eq!(blocks.len(), 3);
            }
            other => panic!("expected override, got {:?}", other),
        }

        match attack.metrics() {
            AttackMetrics::DoubleSpend {
                successes,
                double_spent_value,
                ..
            } => {
                assert_eq!(successes, 1);
                assert_eq!(double_spent_value, 100.0);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn abandons_when_honest_chain_runs_away() {
        let mut attack = DoubleSpend::new(2);
        attack.arm(0);

        for height in 0..5 {
            assert_eq!(
                attack.on_block(&ctx(false, height)),
                Response::Publish
            );
        }

        match attack.metrics() {
            AttackMetrics::DoubleSpend {
                failures, attempts, ..
            } => {
                assert_eq!(failures, 1);
                assert_eq!(attempts, 1);
            }
            _ => unreachable!(),
        }

        // The next block event re-arms a fresh attempt.
        attack.on_block(&ctx(false, 5));
        match attack.metrics() {
            AttackMetrics::DoubleSpend { attempts, .. } => {
                assert_eq!(attempts, 2)
            }
            _ => unreachable!(),
        }
    }
}
