//! Core types used throughout the oracle core
//!
//! Defines identities, epoch ids, amounts and the per-tick execution context.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MeterExceeded;

/// Index of an asset in the oracle's asset registry
pub type AssetIndex = u32;

/// Identifier of a price epoch (derived from time, never stored)
pub type PriceEpochId = u64;

/// Identifier of a reward epoch (monotonic counter)
pub type RewardEpochId = u64;

/// An asset price in the oracle's integer base units
pub type Price = u128;

/// A native-fund amount in base units
pub type Amount = u128;

/// Opaque 20-byte participant identity
///
/// Used for voters, governance and the privileged trigger caller.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct VoterId([u8; 20]);

impl VoterId {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parse from a hex string, with or without a leading "0x"
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let raw = hex::decode(s)?;
        if raw.len() != 20 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Deterministic identity for tests and simulation (last byte = n)
    pub fn test_id(n: u8) -> Self {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Self(bytes)
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// Explicit per-component resource budget for one tick
///
/// Driven logic charges the meter as it works; crossing the limit aborts the
/// component for this tick and sends it into holdoff. A limit of 0 is
/// replaced by the scheduler's default global ceiling before the call.
#[derive(Debug, Clone)]
pub struct Meter {
    limit: u64,
    used: u64,
}

impl Meter {
    pub fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Charge `cost` units against the budget
    pub fn charge(&mut self, cost: u64) -> Result<(), MeterExceeded> {
        self.used = self.used.saturating_add(cost);
        if self.used > self.limit {
            return Err(MeterExceeded);
        }
        Ok(())
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }
}

/// Execution context handed to every driven component on each tick
#[derive(Debug)]
pub struct TickContext {
    /// Monotonic tick number assigned by the external driver
    pub tick: u64,
    /// Unix timestamp (seconds) of this tick
    pub timestamp: i64,
    /// Externally supplied block height for stake snapshots
    pub block: u64,
    /// Resource budget for this component's work in this tick
    pub meter: Meter,
}
