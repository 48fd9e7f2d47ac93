//! Mint reconciliation
//!
//! Tracks a single outstanding requested amount. Requests are rate-limited
//! in time and capped; the cap itself can only grow by a bounded percentage
//! per change, and cap changes are themselves rate-limited. Inbound funds
//! are forwarded up to the outstanding amount; anything beyond what was ever
//! requested lands in a separate "unexplained receipts" total instead of
//! being credited to the receiver.

use tracing::warn;

use crate::config::MintConfig;
use crate::error::SchedulerError;
use crate::types::Amount;

/// Destination for reconciled mint funds
pub trait MintReceiver: Send {
    fn receive(&mut self, amount: Amount);
}

#[derive(Debug)]
pub struct MintReconciler {
    min_interval_secs: i64,
    max_increase_bips: u64,
    cap_update_interval_secs: i64,
    max_request: Amount,
    outstanding: Amount,
    last_request_ts: Option<i64>,
    last_cap_update_ts: Option<i64>,
    total_requested: Amount,
    total_forwarded: Amount,
    unexplained: Amount,
}

/// Result of reconciling one inbound transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub forwarded: Amount,
    pub surplus: Amount,
}

impl MintReconciler {
    pub fn new(cfg: &MintConfig) -> Self {
        Self {
            min_interval_secs: cfg.min_interval_secs,
            max_increase_bips: cfg.max_increase_bips,
            cap_update_interval_secs: cfg.cap_update_interval_secs,
            max_request: cfg.max_request,
            outstanding: 0,
            last_request_ts: None,
            last_cap_update_ts: None,
            total_requested: 0,
            total_forwarded: 0,
            unexplained: 0,
        }
    }

    /// Register a new mint request
    pub fn request(&mut self, amount: Amount, now: i64) -> Result<(), SchedulerError> {
        if amount == 0 {
            return Err(SchedulerError::ZeroValue);
        }
        if let Some(last) = self.last_request_ts {
            if now < last + self.min_interval_secs {
                return Err(SchedulerError::MintTooSoon);
            }
        }
        if amount > self.max_request {
            return Err(SchedulerError::MintTooLarge);
        }
        self.last_request_ts = Some(now);
        self.outstanding = self.outstanding.saturating_add(amount);
        self.total_requested = self.total_requested.saturating_add(amount);
        Ok(())
    }

    /// Change the request cap; growth is bounded and time rate-limited
    pub fn set_max_request(&mut self, new_cap: Amount, now: i64) -> Result<(), SchedulerError> {
        if new_cap == 0 {
            return Err(SchedulerError::ZeroValue);
        }
        if let Some(last) = self.last_cap_update_ts {
            if now < last + self.cap_update_interval_secs {
                return Err(SchedulerError::MintCapUpdateTooSoon);
            }
        }
        if new_cap > self.max_request {
            let limit = self.max_request / 10_000 * self.max_increase_bips as Amount
                + self.max_request % 10_000 * self.max_increase_bips as Amount / 10_000;
            if new_cap > limit {
                return Err(SchedulerError::MintCapIncreaseTooLarge);
            }
        }
        self.last_cap_update_ts = Some(now);
        self.max_request = new_cap;
        Ok(())
    }

    /// Reconcile inbound funds against the outstanding request
    pub fn receive(&mut self, amount: Amount, receiver: &mut dyn MintReceiver) -> Reconciliation {
        let forwarded = amount.min(self.outstanding);
        self.outstanding -= forwarded;
        self.total_forwarded = self.total_forwarded.saturating_add(forwarded);
        if forwarded > 0 {
            receiver.receive(forwarded);
        }
        let surplus = amount - forwarded;
        if surplus > 0 {
            self.unexplained = self.unexplained.saturating_add(surplus);
            warn!(surplus, total = self.unexplained, "unexplained receipt");
        }
        Reconciliation { forwarded, surplus }
    }

    pub fn outstanding(&self) -> Amount {
        self.outstanding
    }

    pub fn max_request(&self) -> Amount {
        self.max_request
    }

    pub fn unexplained_receipts(&self) -> Amount {
        self.unexplained
    }

    pub fn total_forwarded(&self) -> Amount {
        self.total_forwarded
    }
}
