// crates/tessera-core/src/participant.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Participant standing. Invalid participants forfeit their work balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ParticipantStatus {
    #[default]
    Active,
    Invalid,
}

/// A hardware node declared by a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareNode {
    /// Node id, unique per participant.
    pub local_id: String,
    /// Workload type ids this node can serve, in the participant's order.
    pub workload_types: Vec<String>,
}

impl HardwareNode {
    pub fn new(local_id: impl Into<String>, workload_types: &[&str]) -> Self {
        Self {
            local_id: local_id.into(),
            workload_types: workload_types.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Inference counters for the epoch in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EpochStats {
    pub inference_count: u64,
    pub missed_requests: u64,
}

/// A registered network participant. Persists across epochs and is mutated in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantRecord {
    pub address: String,
    pub inference_url: String,
    #[serde(default)]
    pub hardware_nodes: Vec<HardwareNode>,
    /// Consensus public key (base64). Empty until registered.
    #[serde(default)]
    pub validator_key: String,
    #[serde(default)]
    pub worker_key: String,
    /// Coins earned for work this epoch. May go negative on data corruption.
    #[serde(default)]
    pub work_balance: i64,
    /// Coins owed back to the participant this epoch.
    #[serde(default)]
    pub refund_balance: i64,
    #[serde(default)]
    pub status: ParticipantStatus,
    /// Settlement reputation in [0, 1].
    #[serde(default)]
    pub reputation: Decimal,
    #[serde(default)]
    pub epochs_completed: u64,
    #[serde(default)]
    pub current_epoch_stats: EpochStats,
}

impl ParticipantRecord {
    /// New active participant with empty balances.
    pub fn new(address: impl Into<String>, inference_url: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            inference_url: inference_url.into(),
            hardware_nodes: Vec::new(),
            validator_key: String::new(),
            worker_key: String::new(),
            work_balance: 0,
            refund_balance: 0,
            status: ParticipantStatus::Active,
            reputation: Decimal::ZERO,
            epochs_completed: 0,
            current_epoch_stats: EpochStats::default(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.status == ParticipantStatus::Invalid
    }
}
