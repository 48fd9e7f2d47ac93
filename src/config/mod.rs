//! Configuration management for the oracle core
//!
//! Loads from YAML files + environment variables via .env. Every knob has a
//! default so tests and the simulation driver can run without any file.

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub scheduler: SchedulerConfig,
    pub mint: MintConfig,
    pub price: PriceEpochConfig,
    pub whitelist: WhitelistConfig,
    pub reward: RewardEpochConfig,
    pub persistence: PersistenceConfig,
}

/// Heartbeat scheduler settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum number of registered driven components
    pub max_components: usize,
    /// Default per-component resource ceiling when registered with 0
    pub default_ceiling: u64,
    /// Ticks a faulted component is skipped before being retried
    pub holdoff_ticks: u64,
    /// Capacity of the rotating error table
    pub error_history: usize,
    /// Hex identity of the privileged tick caller
    pub trigger_identity: String,
    /// Hex identity of the governance owner
    pub governance_owner: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_components: 10,
            default_ceiling: 1_000_000,
            holdoff_ticks: 5,
            error_history: 32,
            trigger_identity: "0x0000000000000000000000000000000000000001".into(),
            governance_owner: "0x0000000000000000000000000000000000000002".into(),
        }
    }
}

/// Mint reconciliation settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MintConfig {
    /// Minimum seconds between mint requests
    pub min_interval_secs: i64,
    /// Cap on a single outstanding request
    pub max_request: u128,
    /// Cap growth limit per update, in basis points of the current cap
    pub max_increase_bips: u64,
    /// Minimum seconds between cap updates
    pub cap_update_interval_secs: i64,
    /// Hex identity allowed to request minting
    pub requester: String,
}

impl Default for MintConfig {
    fn default() -> Self {
        Self {
            min_interval_secs: 23 * 60 * 60,
            max_request: 50_000_000,
            max_increase_bips: 11_000,
            cap_update_interval_secs: 23 * 60 * 60,
            requester: "0x0000000000000000000000000000000000000003".into(),
        }
    }
}

/// Price epoch timing and protocol settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PriceEpochConfig {
    /// Unix timestamp at which epoch 0's submit window opens
    pub first_epoch_start_ts: i64,
    /// Length of the submit window; also the epoch duration
    pub submit_period_secs: i64,
    /// Length of the reveal window following each submit window
    pub reveal_period_secs: i64,
    /// Entropy floor for reveal nonces
    pub min_random: u128,
    /// Boundary fraction blending stake weight with asset weight (>= 1)
    pub asset_weight_fraction: u128,
    /// Asset symbols, index position = asset index
    pub assets: Vec<String>,
}

impl Default for PriceEpochConfig {
    fn default() -> Self {
        Self {
            first_epoch_start_ts: 0,
            submit_period_secs: 120,
            reveal_period_secs: 30,
            min_random: 1 << 32,
            asset_weight_fraction: 1,
            assets: vec!["BTC".into(), "ETH".into(), "SOL".into(), "XRP".into()],
        }
    }
}

/// Whitelist gate settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WhitelistConfig {
    /// Bound on the ranked voter set per asset
    pub max_voters_per_asset: usize,
    /// Hex identities that may always submit
    pub trusted: Vec<String>,
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            max_voters_per_asset: 100,
            trusted: vec![],
        }
    }
}

/// Reward epoch lifecycle settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RewardEpochConfig {
    /// Duration of one reward epoch
    pub reward_epoch_secs: i64,
    /// Snapshot block window = trailing 1/fraction of the closing epoch
    pub snapshot_boundary_fraction: u64,
    /// Total entitlement apportioned over the period
    pub entitlement_total: u128,
    /// Number of daily periods in the entitlement
    pub entitlement_days: u64,
    /// Length of one apportionment period (86400; shorter in tests)
    pub day_secs: i64,
    /// Bound on price epoch finalizations per tick
    pub max_finalizations_per_tick: u64,
}

impl Default for RewardEpochConfig {
    fn default() -> Self {
        Self {
            reward_epoch_secs: 7 * 24 * 60 * 60,
            snapshot_boundary_fraction: 7,
            entitlement_total: 0,
            entitlement_days: 30,
            day_secs: 24 * 60 * 60,
            max_finalizations_per_tick: 4,
        }
    }
}

/// CSV persistence settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub enabled: bool,
    pub data_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: "data".into(),
        }
    }
}

impl AppConfig {
    /// Load layered configuration: default.yaml, then an optional override
    /// file, then ORACORE_* environment variables
    pub fn load(override_file: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false));

        if let Some(path) = override_file {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder
            .add_source(Environment::with_prefix("ORACORE").separator("__"))
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}
