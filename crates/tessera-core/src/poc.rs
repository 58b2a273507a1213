// crates/tessera-core/src/poc.rs
//
// Proof-of-compute submissions. Epoch-scoped: written during the PoC window,
// read once by the weight aggregator, pruned after a few epochs.

use serde::{Deserialize, Serialize};

/// A batch of claimed work units from one participant for one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBatch {
    pub participant: String,
    pub poc_start_height: i64,
    /// Hardware node that produced the batch. Empty for legacy submissions.
    #[serde(default)]
    pub node_id: String,
    pub nonces: Vec<i64>,
}

/// A peer's verdict on another participant's claimed proof-of-compute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerValidation {
    pub validator: String,
    pub participant: String,
    pub poc_start_height: i64,
    pub fraud_detected: bool,
}

/// Per-epoch random seed committed by a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomSeed {
    pub participant: String,
    pub poc_start_height: i64,
    pub seed: i64,
    /// Participant's signature over the seed (opaque to this engine).
    #[serde(default)]
    pub signature: String,
}
