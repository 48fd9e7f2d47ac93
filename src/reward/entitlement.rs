//! Double-declining-balance entitlement apportionment
//!
//! Each period allocates floor(remaining_total / remaining_periods); both
//! shrink as periods elapse, so the final period absorbs all rounding loss
//! and the per-period allocations sum to the original total exactly.

use crate::types::Amount;

#[derive(Debug, Clone)]
pub struct Entitlement {
    remaining_total: Amount,
    days_remaining: u64,
    allocated_total: Amount,
    daily_authorized: Amount,
    last_day: Option<i64>,
}

impl Entitlement {
    pub fn new(total: Amount, days: u64) -> Self {
        Self {
            remaining_total: total,
            days_remaining: days,
            allocated_total: 0,
            daily_authorized: 0,
            last_day: None,
        }
    }

    /// Allocate for `day` if it is a new day and periods remain
    ///
    /// Returns the freshly authorized amount, or `None` when nothing was
    /// allocated (same day, past day, or exhausted period).
    pub fn advance(&mut self, day: i64) -> Option<Amount> {
        if self.days_remaining == 0 {
            return None;
        }
        if let Some(last) = self.last_day {
            if day <= last {
                return None;
            }
        }
        let allocation = self.remaining_total / self.days_remaining as Amount;
        self.remaining_total -= allocation;
        self.days_remaining -= 1;
        self.allocated_total += allocation;
        self.daily_authorized = allocation;
        self.last_day = Some(day);
        Some(allocation)
    }

    pub fn daily_authorized(&self) -> Amount {
        self.daily_authorized
    }

    pub fn allocated_total(&self) -> Amount {
        self.allocated_total
    }

    pub fn remaining_total(&self) -> Amount {
        self.remaining_total
    }

    pub fn days_remaining(&self) -> u64 {
        self.days_remaining
    }
}
