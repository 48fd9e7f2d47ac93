//! Observable side effects of the oracle core
//!
//! Each stateful component buffers the events it produced; callers and tests
//! drain them with `take_events()`. Logging goes through `tracing` at the
//! point of emission.

use crate::types::{Amount, AssetIndex, Price, PriceEpochId, RewardEpochId};

/// How a price epoch was finalized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizationKind {
    /// Weighted median over the epoch's valid reveals
    WeightedMedian,
    /// No reveals; the previous price carries forward unchanged
    PriceCarriedForward,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    RegistrationChanged {
        identity: String,
        added: bool,
    },
    ComponentFaulted {
        identity: String,
        message: String,
        tick: u64,
    },
    ComponentHeldOff {
        identity: String,
        remaining: u64,
    },
    PriceEpochFinalized {
        asset: AssetIndex,
        epoch_id: PriceEpochId,
        price: Price,
        kind: FinalizationKind,
    },
    RandomnessUpdated {
        epoch_id: PriceEpochId,
        random: u128,
    },
    RewardEpochRolledOver {
        epoch_id: RewardEpochId,
        snapshot_block: u64,
        start_tick: u64,
    },
    MintRequested {
        amount: Amount,
    },
    MintForwarded {
        amount: Amount,
    },
    UnexplainedReceipt {
        amount: Amount,
        total: Amount,
    },
}
