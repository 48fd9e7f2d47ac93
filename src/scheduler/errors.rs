//! Bounded rotating error table for faulted components
//!
//! Records are keyed by (identity, message): a repeat of the same failure
//! bumps its count instead of adding a row. The table holds a fixed number
//! of records, evicting oldest-first, while a monotonic total counter is
//! never reset. Messages are truncated to keep records small and uniform.

use crate::error::SchedulerError;

/// Stored failure messages are cut to this length
pub const MAX_ERROR_MESSAGE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorRecord {
    pub identity: String,
    pub message: String,
    pub count: u64,
    pub last_tick: u64,
}

#[derive(Debug)]
pub struct ErrorLog {
    records: Vec<ErrorRecord>,
    capacity: usize,
    next_slot: usize,
    last: Option<usize>,
    total: u64,
}

impl ErrorLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            capacity: capacity.max(1),
            next_slot: 0,
            last: None,
            total: 0,
        }
    }

    pub fn record(&mut self, identity: &str, message: &str, tick: u64) {
        let message: String = message.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        self.total += 1;

        if let Some(idx) = self
            .records
            .iter()
            .position(|r| r.identity == identity && r.message == message)
        {
            self.records[idx].count += 1;
            self.records[idx].last_tick = tick;
            self.last = Some(idx);
            return;
        }

        let record = ErrorRecord {
            identity: identity.to_string(),
            message,
            count: 1,
            last_tick: tick,
        };
        if self.records.len() < self.capacity {
            self.records.push(record);
            self.last = Some(self.records.len() - 1);
        } else {
            self.records[self.next_slot] = record;
            self.last = Some(self.next_slot);
            self.next_slot = (self.next_slot + 1) % self.capacity;
        }
    }

    pub fn last_error(&self) -> Option<&ErrorRecord> {
        self.last.and_then(|i| self.records.get(i))
    }

    /// Total failures ever recorded, unaffected by eviction
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Page of records in insertion order
    pub fn page(&self, start: usize, count: usize) -> Result<Vec<ErrorRecord>, SchedulerError> {
        if start >= self.records.len() {
            return Err(SchedulerError::ErrorIndexOutOfRange);
        }
        let end = (start + count).min(self.records.len());
        Ok(self.records[start..end].to_vec())
    }
}
