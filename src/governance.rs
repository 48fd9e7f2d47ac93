//! Two-phase ownership handshake
//!
//! Ownership moves with an explicit propose-then-claim state machine:
//! the current owner proposes a successor, and only that pending owner can
//! complete the transfer by claiming it.

use tracing::info;

use crate::error::GovernanceError;
use crate::types::VoterId;

#[derive(Debug, Clone)]
pub struct Governed {
    owner: VoterId,
    pending: Option<VoterId>,
}

impl Governed {
    pub fn new(owner: VoterId) -> Self {
        Self {
            owner,
            pending: None,
        }
    }

    pub fn owner(&self) -> VoterId {
        self.owner
    }

    pub fn pending(&self) -> Option<VoterId> {
        self.pending
    }

    /// Fail unless `caller` is the current owner
    pub fn require_owner(&self, caller: VoterId) -> Result<(), GovernanceError> {
        if caller != self.owner {
            return Err(GovernanceError::NotOwner);
        }
        Ok(())
    }

    /// Propose a new owner; only the current owner may call this
    pub fn propose(&mut self, caller: VoterId, new_owner: VoterId) -> Result<(), GovernanceError> {
        self.require_owner(caller)?;
        self.pending = Some(new_owner);
        info!(owner = %self.owner, pending = %new_owner, "governance transfer proposed");
        Ok(())
    }

    /// Complete the transfer; only the pending owner may claim
    pub fn claim(&mut self, caller: VoterId) -> Result<(), GovernanceError> {
        let pending = self.pending.ok_or(GovernanceError::NoPendingTransfer)?;
        if caller != pending {
            return Err(GovernanceError::NotPendingOwner);
        }
        self.owner = pending;
        self.pending = None;
        info!(owner = %self.owner, "governance transfer claimed");
        Ok(())
    }
}
