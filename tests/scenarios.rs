//! Whole-run scenario properties: issuance, fairness, timing, retarget
//! bounds, and attack outcomes.

use blocksim::prelude::*;

#[test]
fn btc_issuance_before_the_first_halving() {
    let output = SimulationBuilder::preset(ChainPreset::Btc)
        .blocks(100)
        .seed(42)
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(output.chain.len(), 100);
    for block in &output.chain {
        assert_eq!(block.reward, 50.0);
    }
    assert_eq!(output.report.coins_issued, 5000.0);
}

#[test]
fn doge_issuance_never_halves() {
    let output = SimulationBuilder::preset(ChainPreset::Doge)
        .blocks(50)
        .seed(1)
        .build()
        .unwrap()
        .run()
        .unwrap();

    for block in &output.chain {
        assert_eq!(block.reward, 10_000.0);
    }
    assert_eq!(output.report.coins_issued, 500_000.0);
}

#[test]
fn equal_miners_earn_equal_shares() {
    let output = SimulationBuilder::new()
        .blocktime(10.0)
        .miners(4)
        .blocks(10_000)
        .seed(7)
        .wallets(0)
        .transactions_per_wallet(0)
        .build()
        .unwrap()
        .run()
        .unwrap();

    for producer in &output.report.producers {
        assert!(
            (0.225..=0.275).contains(&producer.share),
            "producer {} share {} outside tolerance",
            producer.id,
            producer.share,
        );
    }
}

#[test]
fn mean_block_time_tracks_the_target() {
    let output = SimulationBuilder::new()
        .blocktime(10.0)
        .retarget_interval(None)
        .blocks(1000)
        .seed(5)
        .wallets(0)
        .transactions_per_wallet(0)
        .build()
        .unwrap()
        .run()
        .unwrap();

    let mean = output.report.mean_block_time;
    assert!(
        (mean - 10.0).abs() < 1.0,
        "mean block time {} outside 10% of target",
        mean,
    );
}

#[test]
fn retargets_stay_within_the_clamp() {
    let output = SimulationBuilder::new()
        .blocktime(10.0)
        .retarget_interval(Some(50))
        .blocks(1000)
        .seed(13)
        .wallets(0)
        .transactions_per_wallet(0)
        .build()
        .unwrap()
        .run()
        .unwrap();

    let history = &output.report.difficulty_history;
    assert!(!history.is_empty());

    let initial = output.chain[0].difficulty;
    let mut previous = initial;
    for update in history {
        let factor = update.difficulty / previous;
        assert!(
            (0.25..=4.0).contains(&factor),
            "retarget factor {} out of bounds",
            factor,
        );
        previous = update.difficulty;
    }
}

#[test]
fn selfish_mining_beats_its_hashrate_share() {
    let output = SimulationBuilder::new()
        .blocktime(10.0)
        .blocks(8000)
        .seed(3)
        .wallets(0)
        .transactions_per_wallet(0)
        .attack(AttackConfig {
            attacker_share: 0.33,
            gamma: 0.5,
            ..AttackConfig::new(AttackKind::Selfish)
        })
        .build()
        .unwrap()
        .run()
        .unwrap();

    let attacker = &output.report.producers[0];
    assert!(
        attacker.share > 0.33,
        "attacker share {} did not exceed its hashrate share",
        attacker.share,
    );
}

#[test]
fn selfish_mining_without_network_advantage_loses() {
    let output = SimulationBuilder::new()
        .blocktime(10.0)
        .blocks(2000)
        .seed(3)
        .wallets(0)
        .transactions_per_wallet(0)
        .attack(AttackConfig {
            attacker_share: 0.33,
            gamma: 0.0,
            ..AttackConfig::new(AttackKind::Selfish)
        })
        .build()
        .unwrap()
        .run()
        .unwrap();

    // Losing every race wastes the attacker's own withheld blocks.
    assert!(output.report.producers[0].share < 0.33);
}

#[test]
fn majority_double_spend_mostly_succeeds() {
    let mut group = SimulationGroup::new();
    for seed in 1..=20 {
        let mut config = ChainPreset::Custom.config();
        config.mining.blocktime = 10.0;
        config.simulation.blocks = Some(150);
        config.simulation.seed = seed;
        config.transactions.wallets = 0;
        config.transactions.transactions_per_wallet = 0;
        config.attack = Some(AttackConfig {
            attacker_share: 0.6,
            confirmations: 3,
            ..AttackConfig::new(AttackKind::DoubleSpend)
        });
        group.add(config);
    }

    let mut successes = 0;
    let mut failures = 0;
    for output in group.run_all().unwrap() {
        match output.report.attack.expect("attack metrics present") {
            AttackMetrics::DoubleSpend {
                successes: s,
                failures: f,
                ..
            } => {
                successes += s;
                failures += f;
            }
            other => panic!("unexpected metrics {:?}", other),
        }
    }

    let resolved = successes + failures;
    assert!(resolved > 0);
    let rate = successes as f64 / resolved as f64;
    assert!(rate > 0.9, "success rate {} at 60% hashrate", rate);
}

#[test]
fn eclipsed_victims_see_no_honest_blocks() {
    let output = SimulationBuilder::new()
        .blocktime(10.0)
        .blocks(100)
        .seed(21)
        .wallets(0)
        .transactions_per_wallet(0)
        .attack(AttackConfig {
            victim_nodes: 2,
            ..AttackConfig::new(AttackKind::Eclipse)
        })
        .build()
        .unwrap()
        .run()
        .unwrap();

    match output.report.attack.expect("attack metrics present") {
        AttackMetrics::Eclipse {
            honest_blocks,
            victim_seen_fraction,
            blocks_withheld,
        } => {
            assert_eq!(honest_blocks, 100);
            assert_eq!(victim_seen_fraction, vec![0.0, 0.0]);
            assert_eq!(blocks_withheld, 200);
        }
        other => panic!("unexpected metrics {:?}", other),
    }
}

#[test]
fn propagation_reaches_every_honest_node() {
    let output = SimulationBuilder::new()
        .blocktime(10.0)
        .nodes(30)
        .neighbors(4)
        .blocks(50)
        .seed(2)
        .wallets(0)
        .transactions_per_wallet(0)
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(output.report.propagation_losses, 0);
    assert!(output.report.mean_propagation_hops > 0.0);
}

#[test]
fn per_hop_delay_still_converges() {
    let output = SimulationBuilder::new()
        .blocktime(60.0)
        .propagation_delay(0.5)
        .blocks(50)
        .seed(4)
        .wallets(0)
        .transactions_per_wallet(0)
        .build()
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(output.report.total_blocks, 50);
    assert_eq!(output.report.propagation_losses, 0);
}
