//! Oracore Library
//!
//! Decentralized price-oracle core: a heartbeat scheduler with fault
//! isolation, a commit-reveal price epoch engine with weighted-median
//! aggregation, and a reward epoch lifecycle with stake snapshots and
//! declining-balance entitlement apportionment.

pub mod config;
pub mod epoch;
pub mod error;
pub mod event;
pub mod governance;
pub mod persistence;
pub mod reward;
pub mod scheduler;
pub mod types;
pub mod whitelist;
