//! CSV persistence module
//!
//! Appends finalized prices and reward epoch rollovers to CSV files for
//! audit and offline analysis.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

/// Finalized price row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizedPriceRecord {
    pub timestamp: i64,
    pub asset: String,
    pub epoch_id: u64,
    pub price: u128,
    /// "median" or "carried_forward"
    pub kind: String,
    pub total_weight: u128,
    pub num_votes: usize,
}

/// Reward epoch rollover row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RewardEpochRecord {
    pub epoch_id: u64,
    pub start_timestamp: i64,
    pub start_tick: u64,
    pub snapshot_block: u64,
}

pub struct PersistenceManager {
    data_dir: PathBuf,
    price_writer: csv::Writer<std::fs::File>,
    reward_writer: csv::Writer<std::fs::File>,
}

impl PersistenceManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir).context("Failed to create data directory")?;

        let price_writer = Self::create_writer(&data_dir, "finalized_prices.csv")?;
        let reward_writer = Self::create_writer(&data_dir, "reward_epochs.csv")?;

        Ok(Self {
            data_dir,
            price_writer,
            reward_writer,
        })
    }

    fn create_writer(dir: &Path, filename: &str) -> Result<csv::Writer<std::fs::File>> {
        let path = dir.join(filename);
        let file_has_data =
            path.exists() && fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false);

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open CSV file")?;

        Ok(WriterBuilder::new()
            .has_headers(!file_has_data)
            .from_writer(file))
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Append a finalized price
    pub fn save_price(&mut self, record: &FinalizedPriceRecord) -> Result<()> {
        self.price_writer
            .serialize(record)
            .context("Failed to write price record")?;
        self.price_writer
            .flush()
            .context("Failed to flush price writer")?;
        Ok(())
    }

    /// Append a reward epoch rollover
    pub fn save_reward_epoch(&mut self, record: &RewardEpochRecord) -> Result<()> {
        self.reward_writer
            .serialize(record)
            .context("Failed to write reward epoch record")?;
        self.reward_writer
            .flush()
            .context("Failed to flush reward epoch writer")?;
        Ok(())
    }
}
