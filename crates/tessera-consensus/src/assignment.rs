// crates/tessera-consensus/src/assignment.rs
//
// Workload assignment for the Tessera epoch engine.
//
// Partitions each accepted participant's hardware nodes across the
// governance workload types, then lets at most half of each type's nodes
// serve inference while the next proof-of-compute runs. The half is chosen by
// a shuffle seeded from (epoch index, participant, workload type), so every
// node derives the same split.

use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};
use tessera_core::{
    ActiveParticipant, HardwareNode, Ledger, NodeAllocation, NodeGroup, TesseraError,
    TimeslotAllocation, WorkloadType,
};

/// Assigns nodes to workload types for one upcoming epoch.
#[derive(Debug, Clone)]
pub struct WorkloadAssigner {
    epoch_index: u64,
    workload_types: Vec<WorkloadType>,
}

impl WorkloadAssigner {
    /// # Arguments
    /// * `epoch_index` - Index of the upcoming epoch; part of every shuffle seed.
    /// * `workload_types` - Governance workload types in governance order.
    pub fn new(epoch_index: u64, workload_types: Vec<WorkloadType>) -> Self {
        Self {
            epoch_index,
            workload_types,
        }
    }

    /// Assign `participant`'s nodes given its declared hardware.
    ///
    /// A participant without declared hardware ends up with no workload types
    /// and no node groups.
    pub fn assign(&self, participant: &mut ActiveParticipant, hardware_nodes: &[HardwareNode]) {
        if hardware_nodes.is_empty() {
            tracing::debug!(
                "Participant {} declared no hardware nodes, clearing assignment",
                participant.address
            );
            participant.workload_types.clear();
            participant.node_groups.clear();
            return;
        }

        let nodes: Vec<NodeAllocation> = participant.all_nodes().cloned().collect();
        let mut nodes = redistribute_legacy_weight(nodes, hardware_nodes);
        for node in nodes.iter_mut() {
            node.timeslot = TimeslotAllocation::default();
        }

        let governance: BTreeSet<&str> = self.workload_types.iter().map(|w| w.id.as_str()).collect();
        let mut assigned = vec![false; nodes.len()];
        let mut workload_types = Vec::new();
        let mut node_groups = Vec::new();

        for workload in &self.workload_types {
            let mut group = Vec::new();
            for (i, node) in nodes.iter().enumerate() {
                if assigned[i] {
                    continue;
                }
                if node_supports(hardware_nodes, &node.node_id, &workload.id, &governance) {
                    group.push(node.clone());
                    assigned[i] = true;
                }
            }
            if !group.is_empty() {
                tracing::debug!(
                    "Participant {}: {} nodes assigned to {}",
                    participant.address,
                    group.len(),
                    workload.id
                );
                workload_types.push(workload.id.clone());
                node_groups.push(NodeGroup {
                    workload_type: Some(workload.id.clone()),
                    nodes: group,
                });
            }
        }

        let overflow: Vec<NodeAllocation> = nodes
            .iter()
            .zip(&assigned)
            .filter(|(_, done)| !**done)
            .map(|(node, _)| node.clone())
            .collect();
        if !overflow.is_empty() {
            tracing::debug!(
                "Participant {}: {} nodes support no governance workload",
                participant.address,
                overflow.len()
            );
            node_groups.push(NodeGroup {
                workload_type: None,
                nodes: overflow,
            });
        }

        for group in node_groups.iter_mut() {
            if let Some(workload_id) = group.workload_type.clone() {
                self.split_for_inference(&participant.address, &workload_id, &mut group.nodes);
            }
        }

        participant.workload_types = workload_types;
        participant.node_groups = node_groups;
    }

    /// Mark `floor(n / 2)` nodes of one workload group as available for
    /// inference, chosen by a deterministic shuffle.
    pub fn split_for_inference(
        &self,
        participant: &str,
        workload_id: &str,
        nodes: &mut [NodeAllocation],
    ) {
        let seed = shuffle_seed(self.epoch_index, participant, workload_id);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut indices: Vec<usize> = (0..nodes.len()).collect();
        indices.shuffle(&mut rng);

        let to_inference = nodes.len() / 2;
        for &i in indices.iter().take(to_inference) {
            nodes[i].timeslot.available_for_inference = true;
        }
        tracing::debug!(
            "Participant {} workload {}: {} of {} nodes serve inference (seed {})",
            participant,
            workload_id,
            to_inference,
            nodes.len(),
            seed
        );
    }
}

/// Seed for the inference split: first eight bytes (big-endian) of
/// `sha256("{epoch_index}_{participant}_{workload_id}")`.
pub fn shuffle_seed(epoch_index: u64, participant: &str, workload_id: &str) -> u64 {
    let digest = Sha256::digest(format!("{}_{}_{}", epoch_index, participant, workload_id));
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

fn node_supports(
    hardware_nodes: &[HardwareNode],
    node_id: &str,
    workload_id: &str,
    governance: &BTreeSet<&str>,
) -> bool {
    hardware_nodes
        .iter()
        .find(|h| h.local_id == node_id)
        .map(|h| {
            h.workload_types
                .iter()
                .any(|w| w == workload_id && governance.contains(w.as_str()))
        })
        .unwrap_or(false)
}

/// Spread the weight of a legacy allocation (empty node id) over the
/// declared hardware nodes.
///
/// Each hardware node gets `weight / n`, and the first `weight % n` in
/// declaration order get one more. Shares merge into existing allocations or
/// create new ones; zero shares are dropped.
pub fn redistribute_legacy_weight(
    mut nodes: Vec<NodeAllocation>,
    hardware_nodes: &[HardwareNode],
) -> Vec<NodeAllocation> {
    if nodes.is_empty() || hardware_nodes.is_empty() {
        return nodes;
    }
    let Some(legacy_index) = nodes.iter().position(|n| n.node_id.is_empty()) else {
        return nodes;
    };
    let legacy = nodes.remove(legacy_index);

    let count = hardware_nodes.len() as i64;
    let per_node = legacy.poc_weight / count;
    let remainder = legacy.poc_weight % count;
    tracing::debug!(
        "Redistributing legacy weight {} over {} hardware nodes",
        legacy.poc_weight,
        count
    );

    for (i, hardware) in hardware_nodes.iter().enumerate() {
        let share = if (i as i64) < remainder {
            per_node + 1
        } else {
            per_node
        };
        if share <= 0 {
            continue;
        }
        match nodes.iter_mut().find(|n| n.node_id == hardware.local_id) {
            Some(existing) => existing.poc_weight += share,
            None => nodes.push(NodeAllocation::new(hardware.local_id.clone(), share)),
        }
    }
    nodes
}

/// Run workload assignment for every participant of the upcoming epoch,
/// reading governance workload types and declared hardware from the ledger.
///
/// # Errors
///
/// Returns any ledger read error unchanged.
pub fn assign_workloads(
    ledger: &dyn Ledger,
    epoch_index: u64,
    participants: &mut [ActiveParticipant],
) -> Result<(), TesseraError> {
    let workload_types = ledger.get_governance_workload_types_sorted()?;
    tracing::info!(
        "Assigning workloads for epoch {}: {} participants, {} workload types",
        epoch_index,
        participants.len(),
        workload_types.len()
    );
    let assigner = WorkloadAssigner::new(epoch_index, workload_types);
    for participant in participants.iter_mut() {
        let hardware = ledger
            .get_participant(&participant.address)?
            .map(|r| r.hardware_nodes)
            .unwrap_or_default();
        assigner.assign(participant, &hardware);
    }
    Ok(())
}
