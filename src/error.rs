//! Error taxonomy for the oracle core
//!
//! Configuration errors are rejected synchronously at the offending call.
//! Execution faults inside `tick()` are never propagated to the trigger
//! caller; the scheduler converts them into error records and holdoff.
//! Protocol violations affect only the submission that caused them.

use thiserror::Error;

use crate::types::AssetIndex;

/// Errors raised by the scheduler's public contract
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("duplicate component: {0}")]
    DuplicateComponent(String),
    #[error("component registry full")]
    RegistryFull,
    #[error("component not found: {0}")]
    ComponentNotFound(String),
    #[error("already triggered for tick {0}")]
    AlreadyTriggered(u64),
    #[error("caller is not the trigger identity")]
    Unauthorized,
    #[error("zero value not allowed")]
    ZeroValue,
    #[error("error index out of range")]
    ErrorIndexOutOfRange,
    #[error("mint request too soon")]
    MintTooSoon,
    #[error("mint request exceeds cap")]
    MintTooLarge,
    #[error("mint cap update too soon")]
    MintCapUpdateTooSoon,
    #[error("mint cap increase too large")]
    MintCapIncreaseTooLarge,
}

/// Protocol violations in the commit-reveal price protocol
///
/// All of these reject a single submission; they never affect other voters
/// or the epoch's eventual finalization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VoteError {
    #[error("wrong epoch id")]
    WrongEpoch,
    #[error("not whitelisted for asset {0}")]
    NotWhitelisted(AssetIndex),
    #[error("duplicate submit in epoch")]
    DuplicateSubmit,
    #[error("array lengths differ")]
    ArrayLengthMismatch,
    #[error("indices not strictly increasing")]
    IndicesNotIncreasing,
    #[error("unknown asset index {0}")]
    UnknownAsset(AssetIndex),
    #[error("commit not found")]
    CommitNotFound,
    #[error("reveal does not match commit hash")]
    HashMismatch,
    #[error("already revealed")]
    AlreadyRevealed,
    #[error("random too small")]
    RandomTooSmall,
    #[error("epoch data not available")]
    EpochDataUnavailable,
}

/// Errors from reward-epoch read interfaces
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("reward epoch data not available")]
    EpochDataUnavailable,
}

/// Errors from the two-phase ownership handshake
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GovernanceError {
    #[error("caller is not the owner")]
    NotOwner,
    #[error("caller is not the pending owner")]
    NotPendingOwner,
    #[error("no pending ownership transfer")]
    NoPendingTransfer,
}

/// Errors from the whitelist gate
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WhitelistError {
    #[error("whitelist full for asset {0}")]
    WhitelistFull(AssetIndex),
    #[error("voter not listed for asset {0}")]
    NotListed(AssetIndex),
}

/// A driven component exhausted its per-tick resource budget
///
/// Treated identically to an error raised by the component: aborted,
/// recorded, held off.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("resource ceiling exceeded")]
pub struct MeterExceeded;
