//! Oracore daemon
//!
//! Simulation driver: wires the whitelist, price engine, reward lifecycle
//! and scheduler together, then drives one tick per second with a handful
//! of simulated voters submitting and revealing randomized prices.

use anyhow::Result;
use rand::Rng;
use std::sync::{Arc, Mutex};
use tokio::time::{interval, Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use oracore::config::AppConfig;
use oracore::epoch::commit::commit_hash;
use oracore::epoch::PriceEngine;
use oracore::event::{Event, FinalizationKind};
use oracore::persistence::{FinalizedPriceRecord, PersistenceManager, RewardEpochRecord};
use oracore::reward::RewardLifecycle;
use oracore::scheduler::{DrivenHandle, Scheduler};
use oracore::types::{AssetIndex, Price, PriceEpochId, VoterId};
use oracore::whitelist::Whitelist;

/// One simulated price provider
struct SimVoter {
    id: VoterId,
    /// Pending reveal for a submitted epoch
    pending: Option<(PriceEpochId, Vec<AssetIndex>, Vec<Price>, u128)>,
    submitted_epoch: Option<PriceEpochId>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut cfg = AppConfig::load(None)?;
    let start = chrono::Utc::now().timestamp();
    if cfg.price.first_epoch_start_ts == 0 {
        cfg.price.first_epoch_start_ts = start;
    }

    let governance = VoterId::from_hex(&cfg.scheduler.governance_owner)?;
    let trigger = VoterId::from_hex(&cfg.scheduler.trigger_identity)?;
    let requester = VoterId::from_hex(&cfg.mint.requester)?;
    let trusted = cfg
        .whitelist
        .trusted
        .iter()
        .map(|s| VoterId::from_hex(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut rng = rand::thread_rng();
    let mut voters: Vec<SimVoter> = (10..13)
        .map(|n| SimVoter {
            id: VoterId::test_id(n),
            pending: None,
            submitted_epoch: None,
        })
        .collect();

    let mut whitelist = Whitelist::new(cfg.whitelist.max_voters_per_asset, trusted);
    for voter in &voters {
        for asset in 0..cfg.price.assets.len() as AssetIndex {
            whitelist
                .try_add(asset, voter.id, rng.gen_range(1..100))
                .ok();
        }
    }

    let num_assets = cfg.price.assets.len();
    let engine = Arc::new(Mutex::new(PriceEngine::new(cfg.price.clone(), whitelist)));
    engine.lock().unwrap().align_to(start);

    let lifecycle = Arc::new(Mutex::new(RewardLifecycle::new(
        cfg.reward.clone(),
        Arc::clone(&engine),
    )));

    let mut scheduler = Scheduler::new(
        cfg.scheduler.clone(),
        &cfg.mint,
        governance,
        trigger,
        requester,
    );
    let handle: DrivenHandle = Arc::clone(&lifecycle) as DrivenHandle;
    scheduler.register(governance, "reward-lifecycle", 0, handle)?;

    let mut persistence = if cfg.persistence.enabled {
        Some(PersistenceManager::new(&cfg.persistence.data_dir)?)
    } else {
        None
    };

    info!(assets = num_assets, voters = voters.len(), "oracore daemon started");

    let mut ticker = interval(Duration::from_secs(1));
    let mut tick: u64 = 0;
    let mut block: u64 = 1;
    let mut base_prices: Vec<Price> = (0..num_assets)
        .map(|_| rng.gen_range(10_000..100_000))
        .collect();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }

        let now = chrono::Utc::now().timestamp();
        tick += 1;
        block += 1;

        drive_voters(&engine, &mut voters, &mut base_prices, cfg.price.min_random, now);

        if let Err(err) = scheduler.tick(trigger, tick, now, block) {
            warn!(%err, "tick rejected");
            continue;
        }

        let mut events = engine.lock().unwrap().take_events();
        events.extend(lifecycle.lock().unwrap().take_events());
        events.extend(scheduler.take_events());
        for event in events {
            if let Some(pm) = persistence.as_mut() {
                persist_event(pm, &engine, now, &event)?;
            }
        }
    }

    Ok(())
}

/// Submit in the current window, reveal once the next window opens
fn drive_voters(
    engine: &Arc<Mutex<PriceEngine>>,
    voters: &mut [SimVoter],
    base_prices: &mut [Price],
    min_random: u128,
    now: i64,
) {
    let mut rng = rand::thread_rng();
    let mut engine = engine.lock().unwrap();
    let Some(current) = engine.current_epoch_id(now) else {
        return;
    };

    // Random walk so the median moves tick to tick
    for price in base_prices.iter_mut() {
        let step = rng.gen_range(0..100) as Price;
        *price = if rng.gen_bool(0.5) {
            price.saturating_add(step)
        } else {
            price.saturating_sub(step).max(1)
        };
    }

    let indices: Vec<AssetIndex> = (0..base_prices.len() as AssetIndex).collect();
    for voter in voters.iter_mut() {
        // Reveal for the previous epoch while its reveal window is open
        if let Some((epoch, idx, prices, nonce)) = voter.pending.clone() {
            if engine.reveal(voter.id, epoch, &idx, &prices, nonce, now).is_ok() {
                voter.pending = None;
            }
        }

        if voter.submitted_epoch == Some(current) {
            continue;
        }
        let prices: Vec<Price> = base_prices
            .iter()
            .map(|p| p + rng.gen_range(0..50) as Price)
            .collect();
        let nonce = min_random + rng.gen::<u64>() as u128;
        let hash = commit_hash(&voter.id, &indices, &prices, nonce);
        match engine.submit(voter.id, current, &indices, hash, now) {
            Ok(()) => {
                voter.submitted_epoch = Some(current);
                voter.pending = Some((current, indices.clone(), prices, nonce));
            }
            Err(err) => warn!(voter = %voter.id, %err, "submit rejected"),
        }
    }
}

fn persist_event(
    pm: &mut PersistenceManager,
    engine: &Arc<Mutex<PriceEngine>>,
    now: i64,
    event: &Event,
) -> Result<()> {
    match event {
        Event::PriceEpochFinalized {
            asset,
            epoch_id,
            price,
            kind,
        } => {
            let asset_name = engine
                .lock()
                .unwrap()
                .asset_name(*asset)
                .unwrap_or("?")
                .to_string();
            let detail = engine.lock().unwrap().get_final_price(*asset, *epoch_id);
            let (total_weight, num_votes) = detail
                .map(|d| (d.total_weight, d.num_votes))
                .unwrap_or((0, 0));
            pm.save_price(&FinalizedPriceRecord {
                timestamp: now,
                asset: asset_name,
                epoch_id: *epoch_id,
                price: *price,
                kind: match kind {
                    FinalizationKind::WeightedMedian => "median".into(),
                    FinalizationKind::PriceCarriedForward => "carried_forward".into(),
                },
                total_weight,
                num_votes,
            })?;
        }
        Event::RewardEpochRolledOver {
            epoch_id,
            snapshot_block,
            start_tick,
        } => {
            pm.save_reward_epoch(&RewardEpochRecord {
                epoch_id: *epoch_id,
                start_timestamp: now,
                start_tick: *start_tick,
                snapshot_block: *snapshot_block,
            })?;
        }
        _ => {}
    }
    Ok(())
}
