//! Reward epoch lifecycle
//!
//! Driven by the scheduler once per tick: finalizes price epochs whose
//! reveal windows closed, rolls reward epochs forward at their boundary,
//! and apportions the daily entitlement. The new epoch's stake snapshot
//! block is fixed strictly in the past at rollover and never mutated —
//! the central invariant protecting against boundary stake manipulation.

pub mod entitlement;

use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

use crate::config::RewardEpochConfig;
use crate::epoch::PriceEngine;
use crate::error::LifecycleError;
use crate::event::Event;
use crate::scheduler::Driven;
use crate::types::{Amount, RewardEpochId, TickContext};

use entitlement::Entitlement;

const BASE_COST: u64 = 1;
const FINALIZE_COST: u64 = 25;
const ROLLOVER_COST: u64 = 10;
const ALLOCATE_COST: u64 = 5;

/// One reward epoch; append-only, indexed by id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardEpoch {
    pub id: RewardEpochId,
    /// Stake-determining block, fixed forever at rollover
    pub vote_stake_snapshot_block: u64,
    pub start_tick: u64,
    pub start_timestamp: i64,
    pub start_block: u64,
}

pub struct RewardLifecycle {
    cfg: RewardEpochConfig,
    engine: Arc<Mutex<PriceEngine>>,
    epochs: Vec<RewardEpoch>,
    entitlement: Entitlement,
    events: Vec<Event>,
}

impl RewardLifecycle {
    pub fn new(cfg: RewardEpochConfig, engine: Arc<Mutex<PriceEngine>>) -> Self {
        let entitlement = Entitlement::new(cfg.entitlement_total, cfg.entitlement_days);
        Self {
            cfg,
            engine,
            epochs: Vec::new(),
            entitlement,
            events: Vec::new(),
        }
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // --- reads --------------------------------------------------------------

    pub fn current_epoch(&self) -> Option<&RewardEpoch> {
        self.epochs.last()
    }

    pub fn epochs(&self) -> &[RewardEpoch] {
        &self.epochs
    }

    /// Reward epoch active at `timestamp`
    pub fn epoch_id_for(&self, timestamp: i64) -> Result<RewardEpochId, LifecycleError> {
        self.epochs
            .iter()
            .rev()
            .find(|e| e.start_timestamp <= timestamp)
            .map(|e| e.id)
            .ok_or(LifecycleError::EpochDataUnavailable)
    }

    pub fn snapshot_block_for(&self, epoch_id: RewardEpochId) -> Result<u64, LifecycleError> {
        self.epochs
            .get(epoch_id as usize)
            .map(|e| e.vote_stake_snapshot_block)
            .ok_or(LifecycleError::EpochDataUnavailable)
    }

    pub fn daily_authorized_amount(&self) -> Amount {
        self.entitlement.daily_authorized()
    }

    pub fn entitlement(&self) -> &Entitlement {
        &self.entitlement
    }

    // --- rollover -----------------------------------------------------------

    fn bootstrap(&mut self, ctx: &TickContext) {
        let snapshot = ctx.block.saturating_sub(1);
        self.push_epoch(0, snapshot, ctx);
    }

    fn rollover_due(&self, timestamp: i64) -> bool {
        match self.epochs.last() {
            Some(current) => timestamp >= current.start_timestamp + self.cfg.reward_epoch_secs,
            None => false,
        }
    }

    /// Pick the snapshot strictly before the rollover block: a randomness-
    /// seeded offset into the trailing 1/fraction window of the closing epoch
    fn rollover(&mut self, ctx: &TickContext, seed: u128) {
        let current = self.epochs.last().copied().expect("rollover without epoch");
        let span = ctx.block.saturating_sub(current.start_block);
        let window = (span / self.cfg.snapshot_boundary_fraction.max(1)).max(1);
        let offset = (seed % window as u128) as u64;
        let snapshot = ctx.block.saturating_sub(1 + offset);
        self.push_epoch(current.id + 1, snapshot, ctx);
    }

    fn push_epoch(&mut self, id: RewardEpochId, snapshot_block: u64, ctx: &TickContext) {
        self.epochs.push(RewardEpoch {
            id,
            vote_stake_snapshot_block: snapshot_block,
            start_tick: ctx.tick,
            start_timestamp: ctx.timestamp,
            start_block: ctx.block,
        });
        info!(epoch_id = id, snapshot_block, "reward epoch rolled over");
        self.events.push(Event::RewardEpochRolledOver {
            epoch_id: id,
            snapshot_block,
            start_tick: ctx.tick,
        });
    }
}

impl Driven for RewardLifecycle {
    fn drive(&mut self, ctx: &mut TickContext) -> anyhow::Result<()> {
        ctx.meter.charge(BASE_COST)?;

        // A snapshot must be strictly in the past; block 0 has no past, so
        // epoch creation waits for the first nonzero block
        if self.epochs.is_empty() && ctx.block >= 1 {
            self.bootstrap(ctx);
        }

        // Finalize due price epochs, bounded per tick and metered
        let mut engine = self
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for _ in 0..self.cfg.max_finalizations_per_tick {
            ctx.meter.charge(FINALIZE_COST)?;
            if engine.finalize_next_due(ctx.timestamp).is_none() {
                break;
            }
        }
        let seed = engine.get_current_random();
        drop(engine);

        if ctx.block >= 1 && self.rollover_due(ctx.timestamp) {
            ctx.meter.charge(ROLLOVER_COST)?;
            self.rollover(ctx, seed);
        }

        ctx.meter.charge(ALLOCATE_COST)?;
        let day = ctx.timestamp.div_euclid(self.cfg.day_secs);
        if let Some(amount) = self.entitlement.advance(day) {
            info!(day, amount, "daily entitlement authorized");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PriceEpochConfig;
    use crate::types::Meter;
    use crate::whitelist::Whitelist;

    fn engine() -> Arc<Mutex<PriceEngine>> {
        let cfg = PriceEpochConfig {
            first_epoch_start_ts: 0,
            submit_period_secs: 120,
            reveal_period_secs: 30,
            min_random: 0,
            asset_weight_fraction: 1,
            assets: vec!["X".into()],
        };
        Arc::new(Mutex::new(PriceEngine::new(cfg, Whitelist::new(4, vec![]))))
    }

    fn lifecycle() -> RewardLifecycle {
        let cfg = RewardEpochConfig {
            reward_epoch_secs: 1_000,
            snapshot_boundary_fraction: 7,
            entitlement_total: 100,
            entitlement_days: 3,
            day_secs: 500,
            max_finalizations_per_tick: 4,
        };
        RewardLifecycle::new(cfg, engine())
    }

    fn ctx(tick: u64, timestamp: i64, block: u64) -> TickContext {
        TickContext {
            tick,
            timestamp,
            block,
            meter: Meter::new(1_000_000),
        }
    }

    #[test]
    fn test_bootstrap_creates_epoch_zero() {
        let mut lc = lifecycle();
        assert_eq!(lc.epoch_id_for(0), Err(LifecycleError::EpochDataUnavailable));

        lc.drive(&mut ctx(1, 0, 10)).unwrap();
        let epoch = *lc.current_epoch().unwrap();
        assert_eq!(epoch.id, 0);
        assert!(epoch.vote_stake_snapshot_block < 10);
    }

    #[test]
    fn test_rollover_at_boundary_with_past_snapshot() {
        let mut lc = lifecycle();
        lc.drive(&mut ctx(1, 0, 10)).unwrap();
        lc.drive(&mut ctx(2, 999, 500)).unwrap();
        assert_eq!(lc.current_epoch().unwrap().id, 0);

        lc.drive(&mut ctx(3, 1_000, 510)).unwrap();
        let epoch = *lc.current_epoch().unwrap();
        assert_eq!(epoch.id, 1);
        assert!(epoch.vote_stake_snapshot_block < 510);
        assert_eq!(lc.epoch_id_for(1_200).unwrap(), 1);
        assert_eq!(lc.epoch_id_for(500).unwrap(), 0);
    }

    #[test]
    fn test_bootstrap_waits_for_first_nonzero_block() {
        let mut lc = lifecycle();
        lc.drive(&mut ctx(1, 0, 0)).unwrap();
        assert!(lc.current_epoch().is_none());

        lc.drive(&mut ctx(2, 1, 1)).unwrap();
        let epoch = *lc.current_epoch().unwrap();
        assert_eq!(epoch.id, 0);
        assert!(epoch.vote_stake_snapshot_block < 1);
    }

    #[test]
    fn test_rollover_event_carries_start_tick() {
        let mut lc = lifecycle();
        lc.drive(&mut ctx(1, 0, 10)).unwrap();
        lc.drive(&mut ctx(2, 1_000, 500)).unwrap();

        let events = lc.take_events();
        assert!(events.iter().any(|e| matches!(
            e,
            Event::RewardEpochRolledOver {
                epoch_id: 1,
                start_tick: 2,
                ..
            }
        )));
    }

    #[test]
    fn test_snapshot_block_immutable_across_rollovers() {
        let mut lc = lifecycle();
        lc.drive(&mut ctx(1, 0, 10)).unwrap();
        lc.drive(&mut ctx(2, 1_000, 500)).unwrap();
        let snapshot1 = lc.snapshot_block_for(1).unwrap();

        lc.drive(&mut ctx(3, 2_000, 900)).unwrap();
        lc.drive(&mut ctx(4, 3_000, 1_300)).unwrap();
        assert_eq!(lc.current_epoch().unwrap().id, 3);
        assert_eq!(lc.snapshot_block_for(1).unwrap(), snapshot1);
        assert_eq!(
            lc.snapshot_block_for(9),
            Err(LifecycleError::EpochDataUnavailable)
        );
    }

    #[test]
    fn test_drive_finalizes_due_price_epochs() {
        let lc_engine = engine();
        let cfg = RewardEpochConfig {
            reward_epoch_secs: 1_000,
            snapshot_boundary_fraction: 7,
            entitlement_total: 0,
            entitlement_days: 1,
            day_secs: 500,
            max_finalizations_per_tick: 2,
        };
        let mut lc = RewardLifecycle::new(cfg, Arc::clone(&lc_engine));

        // Reveal windows of epochs 0..2 are closed at t = 500
        lc.drive(&mut ctx(1, 500, 10)).unwrap();
        assert_eq!(lc_engine.lock().unwrap().last_finalized_epoch(), Some(1));
        // Next tick picks up the rest, bounded per tick
        lc.drive(&mut ctx(2, 501, 11)).unwrap();
        assert_eq!(lc_engine.lock().unwrap().last_finalized_epoch(), Some(2));
    }

    #[test]
    fn test_daily_entitlement_once_per_day() {
        let mut lc = lifecycle();
        lc.drive(&mut ctx(1, 0, 10)).unwrap();
        assert_eq!(lc.daily_authorized_amount(), 33);

        // Same day: no new allocation
        lc.drive(&mut ctx(2, 100, 20)).unwrap();
        assert_eq!(lc.entitlement().allocated_total(), 33);

        lc.drive(&mut ctx(3, 500, 30)).unwrap();
        lc.drive(&mut ctx(4, 1_000, 40)).unwrap();
        assert_eq!(lc.entitlement().allocated_total(), 100);
        assert_eq!(lc.entitlement().remaining_total(), 0);
        assert_eq!(lc.daily_authorized_amount(), 34);
    }

    #[test]
    fn test_meter_exhaustion_propagates_as_fault() {
        let mut lc = lifecycle();
        let mut tight = TickContext {
            tick: 1,
            timestamp: 0,
            block: 10,
            meter: Meter::new(2),
        };
        assert!(lc.drive(&mut tight).is_err());
    }
}
