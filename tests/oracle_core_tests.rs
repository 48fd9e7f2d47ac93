//! End-to-end tests for the oracle core

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use oracore::config::{MintConfig, PriceEpochConfig, RewardEpochConfig, SchedulerConfig};
    use oracore::epoch::commit::commit_hash;
    use oracore::epoch::PriceEngine;
    use oracore::event::FinalizationKind;
    use oracore::reward::RewardLifecycle;
    use oracore::scheduler::{Driven, DrivenHandle, Scheduler};
    use oracore::types::{TickContext, VoterId};
    use oracore::whitelist::Whitelist;

    fn price_cfg() -> PriceEpochConfig {
        PriceEpochConfig {
            first_epoch_start_ts: 0,
            submit_period_secs: 120,
            reveal_period_secs: 30,
            min_random: 100,
            asset_weight_fraction: 1,
            assets: vec!["BTC".into(), "ETH".into()],
        }
    }

    fn reward_cfg() -> RewardEpochConfig {
        RewardEpochConfig {
            reward_epoch_secs: 600,
            snapshot_boundary_fraction: 7,
            entitlement_total: 90,
            entitlement_days: 3,
            day_secs: 300,
            max_finalizations_per_tick: 4,
        }
    }

    fn scheduler(governance: VoterId, trigger: VoterId) -> Scheduler {
        Scheduler::new(
            SchedulerConfig::default(),
            &MintConfig::default(),
            governance,
            trigger,
            VoterId::test_id(3),
        )
    }

    fn submit_and_reveal(
        engine: &Arc<Mutex<PriceEngine>>,
        voter: VoterId,
        epoch: u64,
        prices: &[u128],
        nonce: u128,
    ) {
        let indices: Vec<u32> = (0..prices.len() as u32).collect();
        let submit_at = 120 * epoch as i64 + 10;
        let reveal_at = 120 * (epoch as i64 + 1) + 5;
        let hash = commit_hash(&voter, &indices, prices, nonce);
        let mut engine = engine.lock().unwrap();
        engine
            .submit(voter, epoch, &indices, hash, submit_at)
            .unwrap();
        engine
            .reveal(voter, epoch, &indices, prices, nonce, reveal_at)
            .unwrap();
    }

    // ============================================================================
    // Commit-reveal through the full scheduler loop
    // ============================================================================

    #[test]
    fn test_end_to_end_commit_reveal_finalize() {
        let governance = VoterId::test_id(1);
        let trigger = VoterId::test_id(2);
        let alice = VoterId::test_id(10);
        let bob = VoterId::test_id(11);

        let mut whitelist = Whitelist::new(10, vec![]);
        for asset in 0..2 {
            whitelist.try_add(asset, alice, 50).unwrap();
            whitelist.try_add(asset, bob, 50).unwrap();
        }
        let engine = Arc::new(Mutex::new(PriceEngine::new(price_cfg(), whitelist)));
        let lifecycle = Arc::new(Mutex::new(RewardLifecycle::new(
            reward_cfg(),
            Arc::clone(&engine),
        )));

        let mut sched = scheduler(governance, trigger);
        sched
            .register(
                governance,
                "reward-lifecycle",
                0,
                Arc::clone(&lifecycle) as DrivenHandle,
            )
            .unwrap();

        submit_and_reveal(&engine, alice, 0, &[50_000, 3_000], 777);
        submit_and_reveal(&engine, bob, 0, &[50_400, 3_100], 888);

        // Reveal window of epoch 0 is still open at t = 140
        sched.tick(trigger, 1, 140, 100).unwrap();
        assert!(engine.lock().unwrap().get_final_price(0, 0).is_err());

        // Closed at t = 150; the driven lifecycle finalizes it
        sched.tick(trigger, 2, 151, 110).unwrap();
        let final_btc = engine.lock().unwrap().get_final_price(0, 0).unwrap();
        assert_eq!(final_btc.kind, FinalizationKind::WeightedMedian);
        // Equal weights, two votes: the median picks the smaller price
        assert_eq!(final_btc.price, 50_000);
        assert_eq!(final_btc.num_votes, 2);

        let final_eth = engine.lock().unwrap().get_final_price(1, 0).unwrap();
        assert_eq!(final_eth.price, 3_000);
        assert!(engine.lock().unwrap().get_random_for(0).unwrap() > 0);
    }

    #[test]
    fn test_epoch_without_reveals_carries_price_forward() {
        let governance = VoterId::test_id(1);
        let trigger = VoterId::test_id(2);
        let alice = VoterId::test_id(10);

        let mut whitelist = Whitelist::new(10, vec![]);
        whitelist.try_add(0, alice, 50).unwrap();
        whitelist.try_add(1, alice, 50).unwrap();
        let engine = Arc::new(Mutex::new(PriceEngine::new(price_cfg(), whitelist)));
        let lifecycle = Arc::new(Mutex::new(RewardLifecycle::new(
            reward_cfg(),
            Arc::clone(&engine),
        )));

        let mut sched = scheduler(governance, trigger);
        sched
            .register(
                governance,
                "reward-lifecycle",
                0,
                Arc::clone(&lifecycle) as DrivenHandle,
            )
            .unwrap();

        submit_and_reveal(&engine, alice, 0, &[50_000, 3_000], 777);
        sched.tick(trigger, 1, 151, 100).unwrap();

        // Nobody votes in epoch 1
        sched.tick(trigger, 2, 271, 110).unwrap();
        let carried = engine.lock().unwrap().get_final_price(0, 1).unwrap();
        assert_eq!(carried.kind, FinalizationKind::PriceCarriedForward);
        assert_eq!(carried.price, 50_000);
        assert_eq!(carried.num_votes, 0);
    }

    // ============================================================================
    // Fault isolation
    // ============================================================================

    struct Panicker;
    impl Driven for Panicker {
        fn drive(&mut self, _ctx: &mut TickContext) -> anyhow::Result<()> {
            panic!("boom");
        }
    }

    #[test]
    fn test_panicking_neighbor_does_not_stall_the_lifecycle() {
        let governance = VoterId::test_id(1);
        let trigger = VoterId::test_id(2);

        let engine = Arc::new(Mutex::new(PriceEngine::new(
            price_cfg(),
            Whitelist::new(10, vec![]),
        )));
        let lifecycle = Arc::new(Mutex::new(RewardLifecycle::new(
            reward_cfg(),
            Arc::clone(&engine),
        )));

        let mut sched = scheduler(governance, trigger);
        sched
            .register(governance, "panicker", 0, Arc::new(Mutex::new(Panicker)))
            .unwrap();
        sched
            .register(
                governance,
                "reward-lifecycle",
                0,
                Arc::clone(&lifecycle) as DrivenHandle,
            )
            .unwrap();

        sched.tick(trigger, 1, 10, 100).unwrap();

        // The panic was contained and recorded
        let record = sched.last_error().unwrap();
        assert_eq!(record.identity, "panicker");
        assert_eq!(record.message, "boom");
        assert_eq!(sched.total_errors(), 1);

        // The lifecycle still ran and bootstrapped its first epoch
        assert_eq!(lifecycle.lock().unwrap().current_epoch().unwrap().id, 0);
    }

    struct Spender {
        cost: u64,
        runs: u64,
    }
    impl Driven for Spender {
        fn drive(&mut self, ctx: &mut TickContext) -> anyhow::Result<()> {
            ctx.meter.charge(self.cost)?;
            self.runs += 1;
            Ok(())
        }
    }

    #[test]
    fn test_ceiling_exceeded_holds_off_then_retries() {
        let governance = VoterId::test_id(1);
        let trigger = VoterId::test_id(2);

        let cfg = SchedulerConfig {
            holdoff_ticks: 2,
            ..SchedulerConfig::default()
        };
        let mut sched = Scheduler::new(
            cfg,
            &MintConfig::default(),
            governance,
            trigger,
            VoterId::test_id(3),
        );

        let spender = Arc::new(Mutex::new(Spender { cost: 50, runs: 0 }));
        sched
            .register(
                governance,
                "spender",
                10,
                Arc::clone(&spender) as DrivenHandle,
            )
            .unwrap();

        // Tick 1 faults on the ceiling; ticks 2 and 3 are held off
        for tick in 1..=3 {
            sched.tick(trigger, tick, tick as i64, tick).unwrap();
        }
        assert_eq!(spender.lock().unwrap().runs, 0);
        let record = sched.last_error().unwrap();
        assert_eq!(record.message, "resource ceiling exceeded");

        // Retried on tick 4, faults again, same record bumps its count
        sched.tick(trigger, 4, 4, 4).unwrap();
        assert_eq!(sched.last_error().unwrap().count, 2);
        assert_eq!(sched.total_errors(), 2);
    }

    // ============================================================================
    // Reward epochs driven end to end
    // ============================================================================

    #[test]
    fn test_reward_rollover_and_entitlement_through_ticks() {
        let governance = VoterId::test_id(1);
        let trigger = VoterId::test_id(2);

        let engine = Arc::new(Mutex::new(PriceEngine::new(
            price_cfg(),
            Whitelist::new(10, vec![]),
        )));
        let lifecycle = Arc::new(Mutex::new(RewardLifecycle::new(
            reward_cfg(),
            Arc::clone(&engine),
        )));

        let mut sched = scheduler(governance, trigger);
        sched
            .register(
                governance,
                "reward-lifecycle",
                0,
                Arc::clone(&lifecycle) as DrivenHandle,
            )
            .unwrap();

        // Bootstrap, then cross the 600s reward boundary and two 300s days
        sched.tick(trigger, 1, 0, 100).unwrap();
        sched.tick(trigger, 2, 300, 400).unwrap();
        sched.tick(trigger, 3, 600, 700).unwrap();

        let lc = lifecycle.lock().unwrap();
        let current = *lc.current_epoch().unwrap();
        assert_eq!(current.id, 1);
        assert!(current.vote_stake_snapshot_block < 700);

        // Snapshot fixed at rollover stays fixed
        let snapshot = lc.snapshot_block_for(1).unwrap();
        drop(lc);
        sched.tick(trigger, 4, 900, 1_000).unwrap();
        let lc = lifecycle.lock().unwrap();
        assert_eq!(lc.snapshot_block_for(1).unwrap(), snapshot);

        // 90 over 3 days: 30 per day, three days elapsed
        assert_eq!(lc.entitlement().allocated_total(), 90);
        assert_eq!(lc.entitlement().remaining_total(), 0);
    }

    #[test]
    fn test_tick_is_trigger_only_and_monotonic() {
        let governance = VoterId::test_id(1);
        let trigger = VoterId::test_id(2);
        let stranger = VoterId::test_id(9);

        let mut sched = scheduler(governance, trigger);
        assert!(sched.tick(stranger, 1, 0, 1).is_err());
        sched.tick(trigger, 1, 0, 1).unwrap();
        assert!(sched.tick(trigger, 1, 1, 2).is_err());
        sched.tick(trigger, 2, 1, 2).unwrap();
    }
}
