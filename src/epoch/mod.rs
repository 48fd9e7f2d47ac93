//! Price epoch engine
//!
//! Runs the two-phase commit-reveal price protocol per asset. Each epoch
//! moves through Submitting -> Revealing -> Finalized; epoch ids are derived
//! from the clock, never stored. Only commits and reveals keyed by
//! (epoch, voter) persist while the windows are open; votes are consumed
//! exactly once at finalization.

pub mod commit;
pub mod median;

use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::config::PriceEpochConfig;
use crate::error::VoteError;
use crate::event::{Event, FinalizationKind};
use crate::types::{Amount, AssetIndex, Price, PriceEpochId, VoterId};
use crate::whitelist::Whitelist;

use commit::{commit_hash, indices_strictly_increasing, random_contribution};
use median::{weighted_median, WeightedVote};

/// Finalized price data for one asset in one epoch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizedPrice {
    pub price: Price,
    pub kind: FinalizationKind,
    pub total_weight: u128,
    pub num_votes: usize,
}

#[derive(Debug, Clone)]
struct Commit {
    hash: [u8; 32],
}

/// Ephemeral per-epoch vote state, dropped at finalization
#[derive(Debug, Default)]
struct EpochVotes {
    commits: HashMap<VoterId, Commit>,
    revealed: HashSet<VoterId>,
    /// Votes per asset in reveal order (stable tie-break for the median)
    votes: HashMap<AssetIndex, Vec<WeightedVote>>,
    random: u128,
}

#[derive(Debug, Clone)]
struct AssetState {
    name: String,
    /// Externally tracked asset weight blended into vote weights
    asset_weight: Amount,
    last_price: Price,
}

#[derive(Debug)]
struct FinalizedEpoch {
    prices: HashMap<AssetIndex, FinalizedPrice>,
    random: u128,
}

pub struct PriceEngine {
    cfg: PriceEpochConfig,
    whitelist: Whitelist,
    assets: Vec<AssetState>,
    open: HashMap<PriceEpochId, EpochVotes>,
    finalized: HashMap<PriceEpochId, FinalizedEpoch>,
    /// Next epoch awaiting finalization; epochs finalize strictly in order
    first_unfinalized: PriceEpochId,
    last_finalized: Option<PriceEpochId>,
    events: Vec<Event>,
}

impl PriceEngine {
    pub fn new(cfg: PriceEpochConfig, whitelist: Whitelist) -> Self {
        let assets = cfg
            .assets
            .iter()
            .map(|name| AssetState {
                name: name.clone(),
                asset_weight: 0,
                last_price: 0,
            })
            .collect();
        Self {
            cfg,
            whitelist,
            assets,
            open: HashMap::new(),
            finalized: HashMap::new(),
            first_unfinalized: 0,
            last_finalized: None,
            events: Vec::new(),
        }
    }

    pub fn whitelist(&self) -> &Whitelist {
        &self.whitelist
    }

    pub fn whitelist_mut(&mut self) -> &mut Whitelist {
        &mut self.whitelist
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn asset_name(&self, asset: AssetIndex) -> Option<&str> {
        self.assets.get(asset as usize).map(|a| a.name.as_str())
    }

    pub fn set_asset_weight(&mut self, asset: AssetIndex, weight: Amount) -> Result<(), VoteError> {
        let state = self
            .assets
            .get_mut(asset as usize)
            .ok_or(VoteError::UnknownAsset(asset))?;
        state.asset_weight = weight;
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // --- epoch timing -------------------------------------------------------

    /// Epoch whose submit window contains `now`, if any has started
    pub fn current_epoch_id(&self, now: i64) -> Option<PriceEpochId> {
        if now < self.cfg.first_epoch_start_ts {
            return None;
        }
        Some(((now - self.cfg.first_epoch_start_ts) / self.cfg.submit_period_secs) as PriceEpochId)
    }

    pub fn submit_start(&self, epoch_id: PriceEpochId) -> i64 {
        self.cfg.first_epoch_start_ts + epoch_id as i64 * self.cfg.submit_period_secs
    }

    pub fn submit_end(&self, epoch_id: PriceEpochId) -> i64 {
        self.submit_start(epoch_id) + self.cfg.submit_period_secs
    }

    pub fn reveal_end(&self, epoch_id: PriceEpochId) -> i64 {
        self.submit_end(epoch_id) + self.cfg.reveal_period_secs
    }

    /// Skip finalization of epochs that elapsed before the engine started
    pub fn align_to(&mut self, now: i64) {
        if let Some(current) = self.current_epoch_id(now) {
            self.first_unfinalized = self.first_unfinalized.max(current);
        }
    }

    // --- commit-reveal ------------------------------------------------------

    /// Record a commit hash for the current epoch
    pub fn submit(
        &mut self,
        voter: VoterId,
        epoch_id: PriceEpochId,
        indices: &[AssetIndex],
        hash: [u8; 32],
        now: i64,
    ) -> Result<(), VoteError> {
        let current = self.current_epoch_id(now).ok_or(VoteError::WrongEpoch)?;
        if epoch_id != current {
            return Err(VoteError::WrongEpoch);
        }
        if !indices_strictly_increasing(indices) {
            return Err(VoteError::IndicesNotIncreasing);
        }
        for &idx in indices {
            if idx as usize >= self.assets.len() {
                return Err(VoteError::UnknownAsset(idx));
            }
            if !self.whitelist.is_eligible(idx, &voter) {
                return Err(VoteError::NotWhitelisted(idx));
            }
        }

        let epoch = self.open.entry(epoch_id).or_default();
        if epoch.commits.contains_key(&voter) {
            return Err(VoteError::DuplicateSubmit);
        }
        epoch.commits.insert(voter, Commit { hash });
        debug!(voter = %voter, epoch_id, "price hash submitted");
        Ok(())
    }

    /// Reveal prices for a commit made in `epoch_id`
    pub fn reveal(
        &mut self,
        voter: VoterId,
        epoch_id: PriceEpochId,
        indices: &[AssetIndex],
        prices: &[Price],
        nonce: u128,
        now: i64,
    ) -> Result<(), VoteError> {
        if indices.len() != prices.len() {
            return Err(VoteError::ArrayLengthMismatch);
        }
        if !indices_strictly_increasing(indices) {
            return Err(VoteError::IndicesNotIncreasing);
        }
        if now < self.submit_end(epoch_id) || now >= self.reveal_end(epoch_id) {
            return Err(VoteError::WrongEpoch);
        }
        if nonce < self.cfg.min_random {
            return Err(VoteError::RandomTooSmall);
        }

        // Blend weights before mutably borrowing the epoch state
        let weights: Vec<u128> = indices
            .iter()
            .map(|&idx| self.vote_weight(idx, &voter))
            .collect();

        let epoch = self.open.get_mut(&epoch_id).ok_or(VoteError::CommitNotFound)?;
        let stored = epoch
            .commits
            .get(&voter)
            .ok_or(VoteError::CommitNotFound)?;
        if epoch.revealed.contains(&voter) {
            return Err(VoteError::AlreadyRevealed);
        }
        if commit_hash(&voter, indices, prices, nonce) != stored.hash {
            return Err(VoteError::HashMismatch);
        }

        for ((&idx, &price), weight) in indices.iter().zip(prices.iter()).zip(weights) {
            epoch
                .votes
                .entry(idx)
                .or_default()
                .push(WeightedVote { price, weight });
        }
        epoch.random = epoch.random.wrapping_add(random_contribution(nonce, prices));
        epoch.revealed.insert(voter);
        debug!(voter = %voter, epoch_id, assets = indices.len(), "prices revealed");
        Ok(())
    }

    /// Blended vote weight: stake weight mixed with the asset weight through
    /// the configured boundary fraction f:
    /// weight = ((f - 1) * asset_weight + stake) / f, floored, minimum 1.
    /// f = 1 (the default) uses pure stake weight. The minimum keeps trusted
    /// voters with no listed stake countable.
    fn vote_weight(&self, asset: AssetIndex, voter: &VoterId) -> u128 {
        let stake = self.whitelist.stake_of(asset, voter);
        let asset_weight = self
            .assets
            .get(asset as usize)
            .map(|a| a.asset_weight)
            .unwrap_or(0);
        let f = self.cfg.asset_weight_fraction.max(1);
        // Saturating: a huge configured asset weight caps the blend instead
        // of aborting the reveal
        let blended = (f - 1)
            .saturating_mul(asset_weight)
            .saturating_add(stake)
            / f;
        blended.max(1)
    }

    // --- finalization -------------------------------------------------------

    /// Finalize the next epoch whose reveal window has closed, if any
    ///
    /// Called by the reward epoch lifecycle once per due epoch. Never fails:
    /// an epoch without reveals carries the previous price forward.
    pub fn finalize_next_due(&mut self, now: i64) -> Option<PriceEpochId> {
        let epoch_id = self.first_unfinalized;
        if now < self.reveal_end(epoch_id) {
            return None;
        }
        self.finalize_epoch(epoch_id);
        self.first_unfinalized += 1;
        Some(epoch_id)
    }

    fn finalize_epoch(&mut self, epoch_id: PriceEpochId) {
        let mut epoch = self.open.remove(&epoch_id).unwrap_or_default();
        let mut prices = HashMap::new();

        for (idx, state) in self.assets.iter_mut().enumerate() {
            let idx = idx as AssetIndex;
            let votes = epoch.votes.remove(&idx).unwrap_or_default();
            let finalized = match weighted_median(&votes) {
                Some(result) => {
                    state.last_price = result.price;
                    FinalizedPrice {
                        price: result.price,
                        kind: FinalizationKind::WeightedMedian,
                        total_weight: result.total_weight,
                        num_votes: result.num_votes,
                    }
                }
                None => FinalizedPrice {
                    price: state.last_price,
                    kind: FinalizationKind::PriceCarriedForward,
                    total_weight: 0,
                    num_votes: 0,
                },
            };
            info!(
                asset = %state.name,
                epoch_id,
                price = finalized.price,
                kind = ?finalized.kind,
                "price epoch finalized"
            );
            self.events.push(Event::PriceEpochFinalized {
                asset: idx,
                epoch_id,
                price: finalized.price,
                kind: finalized.kind,
            });
            prices.insert(idx, finalized);
        }

        self.events.push(Event::RandomnessUpdated {
            epoch_id,
            random: epoch.random,
        });
        self.finalized.insert(
            epoch_id,
            FinalizedEpoch {
                prices,
                random: epoch.random,
            },
        );
        self.last_finalized = Some(epoch_id);
    }

    // --- reads --------------------------------------------------------------

    pub fn get_final_price(
        &self,
        asset: AssetIndex,
        epoch_id: PriceEpochId,
    ) -> Result<FinalizedPrice, VoteError> {
        self.finalized
            .get(&epoch_id)
            .and_then(|e| e.prices.get(&asset))
            .copied()
            .ok_or(VoteError::EpochDataUnavailable)
    }

    pub fn get_random_for(&self, epoch_id: PriceEpochId) -> Result<u128, VoteError> {
        self.finalized
            .get(&epoch_id)
            .map(|e| e.random)
            .ok_or(VoteError::EpochDataUnavailable)
    }

    /// Randomness of the most recent epoch whose reveal window has closed,
    /// 0 before any epoch finalized
    pub fn get_current_random(&self) -> u128 {
        self.last_finalized
            .and_then(|id| self.finalized.get(&id))
            .map(|e| e.random)
            .unwrap_or(0)
    }

    pub fn last_finalized_epoch(&self) -> Option<PriceEpochId> {
        self.last_finalized
    }
}
