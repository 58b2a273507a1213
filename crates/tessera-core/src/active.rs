// crates/tessera-core/src/active.rs
//
// Output of an epoch transition: the accepted participants that form the
// validator and workload set of the next epoch. Produced once per transition
// and never mutated afterwards, only superseded.

use serde::{Deserialize, Serialize};

use crate::poc::RandomSeed;

/// A governance-registered compute task type (a model) that hardware nodes may serve.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadType {
    /// Stable identifier, e.g. `"Qwen/Qwen2.5-7B-Instruct"`.
    pub id: String,
}

impl WorkloadType {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Per-node role for the upcoming epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeslotAllocation {
    /// Node keeps producing proof-of-compute.
    pub reserved_for_proof: bool,
    /// Node may serve paid inference while the next PoC runs.
    pub available_for_inference: bool,
}

impl Default for TimeslotAllocation {
    fn default() -> Self {
        Self {
            reserved_for_proof: true,
            available_for_inference: false,
        }
    }
}

/// One hardware node of a participant, as seen by the epoch transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAllocation {
    /// Local node id declared by the participant. Empty for legacy submissions
    /// that predate per-node proof batches.
    pub node_id: String,
    /// Proof-of-compute weight attributed to this node.
    pub poc_weight: i64,
    pub timeslot: TimeslotAllocation,
}

impl NodeAllocation {
    pub fn new(node_id: impl Into<String>, poc_weight: i64) -> Self {
        Self {
            node_id: node_id.into(),
            poc_weight,
            timeslot: TimeslotAllocation::default(),
        }
    }
}

/// Nodes of one participant assigned to a workload type.
///
/// `workload_type == None` marks the trailing overflow group: nodes that
/// support no governance workload type. They stay recorded but are not
/// advertised as serving anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeGroup {
    pub workload_type: Option<String>,
    pub nodes: Vec<NodeAllocation>,
}

/// A participant accepted into the next epoch's validator/workload set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveParticipant {
    /// Participant account address.
    pub address: String,
    /// Consensus public key (base64), as registered by the participant.
    pub validator_key: String,
    /// Voting power after bias adjustment and capping.
    pub weight: i64,
    /// Declared inference endpoint.
    pub inference_url: String,
    /// Workload types this participant serves, in governance order.
    pub workload_types: Vec<String>,
    /// Node assignment, one group per entry of `workload_types` plus an
    /// optional overflow group at the end.
    pub node_groups: Vec<NodeGroup>,
    /// Per-epoch random seed submitted by the participant.
    pub seed: RandomSeed,
    /// Reputation in [0, 100].
    pub reputation: i64,
}

impl ActiveParticipant {
    /// All node allocations across every group, in group order.
    pub fn all_nodes(&self) -> impl Iterator<Item = &NodeAllocation> {
        self.node_groups.iter().flat_map(|g| g.nodes.iter())
    }
}
