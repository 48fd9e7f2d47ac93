//! Whitelist gate
//!
//! Per asset, a bounded ranked set of eligible voters ordered by externally
//! supplied stake. A full list only admits a newcomer whose stake strictly
//! exceeds the current minimum, evicting that minimum member. A separate
//! trusted set bypasses per-asset listing entirely.

use std::collections::HashMap;
use tracing::debug;

use crate::error::WhitelistError;
use crate::types::{Amount, AssetIndex, VoterId};

#[derive(Debug, Clone)]
struct Entry {
    voter: VoterId,
    stake: Amount,
}

#[derive(Debug, Clone)]
pub struct Whitelist {
    max_voters_per_asset: usize,
    listed: HashMap<AssetIndex, Vec<Entry>>,
    trusted: Vec<VoterId>,
}

impl Whitelist {
    pub fn new(max_voters_per_asset: usize, trusted: Vec<VoterId>) -> Self {
        Self {
            max_voters_per_asset,
            listed: HashMap::new(),
            trusted,
        }
    }

    /// Add or re-rank a voter for an asset
    ///
    /// Returns the evicted minimum-stake voter when the list was full and the
    /// newcomer displaced it. Re-adding an existing member updates its stake
    /// in place.
    pub fn try_add(
        &mut self,
        asset: AssetIndex,
        voter: VoterId,
        stake: Amount,
    ) -> Result<Option<VoterId>, WhitelistError> {
        let entries = self.listed.entry(asset).or_default();

        if let Some(existing) = entries.iter_mut().find(|e| e.voter == voter) {
            existing.stake = stake;
            return Ok(None);
        }

        if entries.len() < self.max_voters_per_asset {
            entries.push(Entry { voter, stake });
            debug!(asset, voter = %voter, stake, "voter whitelisted");
            return Ok(None);
        }

        // Full: displace the minimum-stake member only for strictly greater stake
        let (min_idx, min_stake) = entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.stake)
            .map(|(i, e)| (i, e.stake))
            .ok_or(WhitelistError::WhitelistFull(asset))?;

        if stake <= min_stake {
            return Err(WhitelistError::WhitelistFull(asset));
        }

        let evicted = entries[min_idx].voter;
        entries[min_idx] = Entry { voter, stake };
        debug!(asset, voter = %voter, evicted = %evicted, "voter displaced from whitelist");
        Ok(Some(evicted))
    }

    pub fn remove(&mut self, asset: AssetIndex, voter: VoterId) -> Result<(), WhitelistError> {
        let entries = self
            .listed
            .get_mut(&asset)
            .ok_or(WhitelistError::NotListed(asset))?;
        let before = entries.len();
        entries.retain(|e| e.voter != voter);
        if entries.len() == before {
            return Err(WhitelistError::NotListed(asset));
        }
        Ok(())
    }

    /// Membership check consumed by the price epoch engine
    ///
    /// Trusted voters are always eligible regardless of per-asset listing.
    pub fn is_eligible(&self, asset: AssetIndex, voter: &VoterId) -> bool {
        if self.trusted.contains(voter) {
            return true;
        }
        self.listed
            .get(&asset)
            .map(|entries| entries.iter().any(|e| e.voter == *voter))
            .unwrap_or(false)
    }

    /// Stake of a listed voter, 0 if absent (trusted voters carry their
    /// listed stake when present, else 0)
    pub fn stake_of(&self, asset: AssetIndex, voter: &VoterId) -> Amount {
        self.listed
            .get(&asset)
            .and_then(|entries| entries.iter().find(|e| e.voter == *voter))
            .map(|e| e.stake)
            .unwrap_or(0)
    }

    pub fn listed(&self, asset: AssetIndex) -> Vec<VoterId> {
        self.listed
            .get(&asset)
            .map(|entries| entries.iter().map(|e| e.voter).collect())
            .unwrap_or_default()
    }

    pub fn is_trusted(&self, voter: &VoterId) -> bool {
        self.trusted.contains(voter)
    }
}
