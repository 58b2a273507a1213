// crates/tessera-core/src/epoch.rs

use serde::{Deserialize, Serialize};

use crate::params::ValidationParams;

/// Identifies an epoch by its proof-of-compute start height.
///
/// Immutable once created; one record per index, indices increase monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub index: u64,
    pub poc_start_height: i64,
}

impl EpochRecord {
    pub fn new(index: u64, poc_start_height: i64) -> Self {
        Self {
            index,
            poc_start_height,
        }
    }

    /// The genesis epoch (index 0, anchored at height 0).
    pub fn genesis() -> Self {
        Self::new(0, 0)
    }
}

/// Per-participant, per-epoch inference performance. The only input to
/// reputation scoring. Append-only, one per (participant, epoch start height).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochPerformanceSummary {
    pub epoch_start_height: i64,
    pub participant: String,
    pub inference_count: u64,
    pub missed_requests: u64,
    /// Work coins paid out for this epoch.
    #[serde(default)]
    pub earned_coins: u64,
    /// Reward coins paid out for this epoch.
    #[serde(default)]
    pub rewarded_coins: u64,
}

/// Pricing and validation parameters fixed for one epoch at its transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochPricing {
    pub poc_start_height: i64,
    pub unit_of_compute_price: u64,
    pub validation: ValidationParams,
}
