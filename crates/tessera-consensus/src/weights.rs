// crates/tessera-consensus/src/weights.rs
//
// Proof-of-compute weight aggregation for the Tessera epoch engine.
//
// Turns the proof batches and peer validations stored for an epoch into
// candidate validator weights. Participants are processed in address order;
// a participant that fails any check is skipped and reported, never emitted
// with zero weight.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tessera_core::{
    ActiveParticipant, Ledger, NodeAllocation, NodeGroup, ParticipantRecord, PeerValidation,
    ProofBatch, RandomSeed, TesseraError,
};

/// Why a participant with proof batches was left out of the next validator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    /// No distinct nonces were claimed.
    NoWeight,
    /// Batches exist for an address with no participant record.
    ParticipantNotFound,
    /// Participant never registered a validator key.
    MissingValidatorKey,
    /// Peers with enough voting power did not confirm the claim.
    RejectedByPeers,
    /// No random seed was submitted for this epoch.
    MissingSeed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedParticipant {
    pub address: String,
    pub reason: SkipReason,
}

/// Outcome of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationReport {
    /// Accepted participants in address order, weight = claimed weight.
    pub accepted: Vec<ActiveParticipant>,
    pub skipped: Vec<SkippedParticipant>,
}

impl AggregationReport {
    pub fn total_weight(&self) -> i64 {
        self.accepted
            .iter()
            .fold(0i64, |acc, p| acc.saturating_add(p.weight))
    }
}

/// Aggregates proof-of-compute claims against the previous validator set.
///
/// With no previous set (or an empty one) the peer-vote check is skipped and
/// every participant with a positive claim, a validator key and a seed is
/// accepted.
#[derive(Debug, Clone, Default)]
pub struct WeightAggregator {
    /// Voting power of the previous validator set, keyed by address.
    previous_power: BTreeMap<String, i64>,
}

impl WeightAggregator {
    /// Create an aggregator voting with `previous` validators.
    pub fn new(previous: &[ActiveParticipant]) -> Self {
        let mut previous_power = BTreeMap::new();
        for p in previous {
            let power = previous_power.entry(p.address.clone()).or_insert(0i64);
            *power = power.saturating_add(p.weight);
        }
        Self { previous_power }
    }

    /// Total voting power of the previous validator set, saturating.
    pub fn total_previous_power(&self) -> i64 {
        self.previous_power
            .values()
            .fold(0i64, |acc, w| acc.saturating_add(*w))
    }

    /// Voting power a participant needs confirmed: `ceil(2/3 * total)`.
    pub fn required_valid_weight(&self) -> i64 {
        let total = i128::from(self.total_previous_power());
        i64::try_from((2 * total + 2) / 3).unwrap_or(i64::MAX)
    }

    /// Aggregate everything the ledger holds for the epoch anchored at
    /// `poc_start_height`.
    ///
    /// # Errors
    ///
    /// Returns any ledger read error unchanged.
    pub fn aggregate(
        &self,
        ledger: &dyn Ledger,
        poc_start_height: i64,
    ) -> Result<AggregationReport, TesseraError> {
        let batches = ledger.get_proof_batches(poc_start_height)?;
        let validations = ledger.get_peer_validations(poc_start_height)?;

        tracing::debug!(
            "Aggregating weights at {}: {} participants with batches, {} with validations",
            poc_start_height,
            batches.len(),
            validations.len()
        );

        let mut report = AggregationReport::default();
        for (address, participant_batches) in &batches {
            let participant = ledger.get_participant(address)?;
            let seed = ledger.get_random_seed(poc_start_height, address)?;
            let votes = validations.get(address).map(Vec::as_slice).unwrap_or(&[]);

            match self.evaluate(address, participant_batches, votes, participant.as_ref(), seed) {
                Ok(active) => {
                    tracing::debug!(
                        "Accepted participant {} with weight {}",
                        address,
                        active.weight
                    );
                    report.accepted.push(active);
                }
                Err(reason) => {
                    tracing::warn!("Skipping participant {}: {:?}", address, reason);
                    report.skipped.push(SkippedParticipant {
                        address: address.clone(),
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            "Weight aggregation at {}: {} accepted, {} skipped, total weight {}",
            poc_start_height,
            report.accepted.len(),
            report.skipped.len(),
            report.total_weight()
        );
        Ok(report)
    }

    /// Decide one participant.
    ///
    /// Checks run in a fixed order: claimed weight, participant record,
    /// validator key, peer votes, seed. The first failing check is the
    /// reported reason.
    pub fn evaluate(
        &self,
        address: &str,
        batches: &[ProofBatch],
        validations: &[PeerValidation],
        participant: Option<&ParticipantRecord>,
        seed: Option<RandomSeed>,
    ) -> Result<ActiveParticipant, SkipReason> {
        let claimed_weight = claimed_weight(batches);
        if claimed_weight < 1 {
            return Err(SkipReason::NoWeight);
        }
        let participant = participant.ok_or(SkipReason::ParticipantNotFound)?;
        if participant.validator_key.is_empty() {
            return Err(SkipReason::MissingValidatorKey);
        }
        if !self.previous_power.is_empty() && !self.confirmed_by_peers(address, validations) {
            return Err(SkipReason::RejectedByPeers);
        }
        let seed = seed.ok_or(SkipReason::MissingSeed)?;

        Ok(ActiveParticipant {
            address: address.to_string(),
            validator_key: participant.validator_key.clone(),
            weight: claimed_weight,
            inference_url: participant.inference_url.clone(),
            workload_types: Vec::new(),
            node_groups: vec![NodeGroup {
                workload_type: None,
                nodes: node_allocations(batches),
            }],
            seed,
            reputation: 0,
        })
    }

    /// Peer-vote check against the previous validator set.
    ///
    /// Turnout below the required weight accepts the claim. Otherwise the
    /// weight of non-fraud votes must reach the required weight. Each
    /// validator counts once, with its first vote.
    fn confirmed_by_peers(&self, address: &str, validations: &[PeerValidation]) -> bool {
        let required = self.required_valid_weight();
        let mut seen = BTreeSet::new();
        let mut valid_weight = 0i64;
        let mut invalid_weight = 0i64;
        for v in validations {
            if !seen.insert(v.validator.as_str()) {
                continue;
            }
            let power = self.previous_power.get(&v.validator).copied().unwrap_or(0);
            if v.fraud_detected {
                invalid_weight = invalid_weight.saturating_add(power);
            } else {
                valid_weight = valid_weight.saturating_add(power);
            }
        }

        let voted = valid_weight.saturating_add(invalid_weight);
        if voted < required {
            tracing::debug!(
                "Participant {}: turnout {} below required {}, accepting",
                address,
                voted,
                required
            );
            return true;
        }
        if valid_weight < required {
            tracing::warn!(
                "Participant {}: valid weight {} below required {} (invalid {})",
                address,
                valid_weight,
                required,
                invalid_weight
            );
            return false;
        }
        true
    }
}

/// Number of distinct nonces across all batches.
pub fn claimed_weight(batches: &[ProofBatch]) -> i64 {
    let distinct: BTreeSet<i64> = batches.iter().flat_map(|b| b.nonces.iter().copied()).collect();
    distinct.len() as i64
}

/// Distinct nonce count per node id, in node id order. Batches with an
/// empty node id collapse into a single legacy allocation.
pub fn node_allocations(batches: &[ProofBatch]) -> Vec<NodeAllocation> {
    let mut per_node: BTreeMap<&str, BTreeSet<i64>> = BTreeMap::new();
    for batch in batches {
        per_node
            .entry(batch.node_id.as_str())
            .or_default()
            .extend(batch.nonces.iter().copied());
    }
    per_node
        .into_iter()
        .map(|(node_id, nonces)| NodeAllocation::new(node_id, nonces.len() as i64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(participant: &str, node_id: &str, nonces: &[i64]) -> ProofBatch {
        ProofBatch {
            participant: participant.to_string(),
            poc_start_height: 40,
            node_id: node_id.to_string(),
            nonces: nonces.to_vec(),
        }
    }

    fn record(address: &str) -> ParticipantRecord {
        let mut r = ParticipantRecord::new(address, format!("http://{}", address));
        r.validator_key = format!("key-{}", address);
        r
    }

    fn seed(address: &str) -> Option<RandomSeed> {
        Some(RandomSeed {
            participant: address.to_string(),
            poc_start_height: 40,
            seed: 7,
            signature: String::new(),
        })
    }

    fn vote(validator: &str, participant: &str, fraud: bool) -> PeerValidation {
        PeerValidation {
            validator: validator.to_string(),
            participant: participant.to_string(),
            poc_start_height: 40,
            fraud_detected: fraud,
        }
    }

    fn validator(address: &str, weight: i64) -> ActiveParticipant {
        ActiveParticipant {
            address: address.to_string(),
            validator_key: String::new(),
            weight,
            inference_url: String::new(),
            workload_types: Vec::new(),
            node_groups: Vec::new(),
            seed: RandomSeed {
                participant: address.to_string(),
                poc_start_height: 0,
                seed: 0,
                signature: String::new(),
            },
            reputation: 0,
        }
    }

    #[test]
    fn test_claimed_weight_counts_distinct_nonces() {
        let batches = vec![batch("a", "n1", &[1, 2, 3]), batch("a", "n2", &[3, 4, 4])];
        assert_eq!(claimed_weight(&batches), 4);
    }

    #[test]
    fn test_node_allocations_per_node() {
        let batches = vec![
            batch("a", "n2", &[1, 2]),
            batch("a", "n1", &[5]),
            batch("a", "n2", &[2, 3]),
        ];
        let nodes = node_allocations(&batches);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node_id, "n1");
        assert_eq!(nodes[0].poc_weight, 1);
        assert_eq!(nodes[1].node_id, "n2");
        assert_eq!(nodes[1].poc_weight, 3);
    }

    #[test]
    fn test_no_previous_set_accepts_regardless_of_votes() {
        let agg = WeightAggregator::new(&[]);
        let votes = vec![vote("x", "a", true), vote("y", "a", true)];
        let r = record("a");
        let active = agg
            .evaluate("a", &[batch("a", "n1", &[1, 2])], &votes, Some(&r), seed("a"))
            .unwrap();
        assert_eq!(active.weight, 2);
        assert_eq!(active.validator_key, "key-a");
        assert_eq!(active.node_groups.len(), 1);
        assert!(active.node_groups[0].workload_type.is_none());
    }

    #[test]
    fn test_skip_reasons_in_order() {
        let agg = WeightAggregator::new(&[]);
        let r = record("a");
        assert_eq!(
            agg.evaluate("a", &[batch("a", "", &[])], &[], Some(&r), seed("a")),
            Err(SkipReason::NoWeight)
        );
        assert_eq!(
            agg.evaluate("a", &[batch("a", "", &[1])], &[], None, seed("a")),
            Err(SkipReason::ParticipantNotFound)
        );
        let mut keyless = record("a");
        keyless.validator_key.clear();
        assert_eq!(
            agg.evaluate("a", &[batch("a", "", &[1])], &[], Some(&keyless), seed("a")),
            Err(SkipReason::MissingValidatorKey)
        );
        assert_eq!(
            agg.evaluate("a", &[batch("a", "", &[1])], &[], Some(&r), None),
            Err(SkipReason::MissingSeed)
        );
    }

    #[test]
    fn test_required_weight_is_two_thirds_rounded_up() {
        let agg = WeightAggregator::new(&[validator("v1", 50), validator("v2", 50)]);
        assert_eq!(agg.total_previous_power(), 100);
        assert_eq!(agg.required_valid_weight(), 67);
        let agg = WeightAggregator::new(&[validator("v1", 30)]);
        assert_eq!(agg.required_valid_weight(), 20);
    }

    #[test]
    fn test_low_turnout_accepts() {
        let agg = WeightAggregator::new(&[
            validator("v1", 40),
            validator("v2", 30),
            validator("v3", 30),
        ]);
        // Only 40 of the required 67 voted, and they flagged fraud.
        let votes = vec![vote("v1", "a", true)];
        let r = record("a");
        assert!(agg
            .evaluate("a", &[batch("a", "", &[1])], &votes, Some(&r), seed("a"))
            .is_ok());
    }

    #[test]
    fn test_fraud_majority_rejects() {
        let agg = WeightAggregator::new(&[
            validator("v1", 40),
            validator("v2", 30),
            validator("v3", 30),
        ]);
        let votes = vec![vote("v1", "a", true), vote("v2", "a", false), vote("v3", "a", false)];
        let r = record("a");
        assert_eq!(
            agg.evaluate("a", &[batch("a", "", &[1])], &votes, Some(&r), seed("a")),
            Err(SkipReason::RejectedByPeers)
        );
    }

    #[test]
    fn test_valid_supermajority_accepts() {
        let agg = WeightAggregator::new(&[
            validator("v1", 40),
            validator("v2", 30),
            validator("v3", 30),
        ]);
        let votes = vec![vote("v1", "a", false), vote("v2", "a", false), vote("v3", "a", true)];
        let r = record("a");
        assert!(agg
            .evaluate("a", &[batch("a", "", &[1])], &votes, Some(&r), seed("a"))
            .is_ok());
    }

    #[test]
    fn test_duplicate_votes_count_once() {
        let agg = WeightAggregator::new(&[validator("v1", 70), validator("v2", 30)]);
        // v2 voting three times must not reach the 67 required.
        let votes = vec![
            vote("v2", "a", false),
            vote("v2", "a", false),
            vote("v2", "a", false),
            vote("v1", "a", true),
        ];
        let r = record("a");
        assert_eq!(
            agg.evaluate("a", &[batch("a", "", &[1])], &votes, Some(&r), seed("a")),
            Err(SkipReason::RejectedByPeers)
        );
    }

    #[test]
    fn test_unknown_voters_have_no_power() {
        let agg = WeightAggregator::new(&[validator("v1", 100)]);
        let votes = vec![vote("stranger", "a", true)];
        let r = record("a");
        assert!(agg
            .evaluate("a", &[batch("a", "", &[1])], &votes, Some(&r), seed("a"))
            .is_ok());
    }

    #[test]
    fn test_huge_previous_power_saturates() {
        let previous = vec![validator("v1", i64::MAX), validator("v2", i64::MAX)];
        let aggregator = WeightAggregator::new(&previous);
        assert_eq!(aggregator.total_previous_power(), i64::MAX);
        assert_eq!(aggregator.required_valid_weight(), (i64::MAX / 3) * 2 + 1);

        let votes = [vote("v1", "a", false), vote("v2", "a", false)];
        let result = aggregator.evaluate(
            "a",
            &[batch("a", "n1", &[1])],
            &votes,
            Some(&record("a")),
            seed("a"),
        );
        assert!(result.is_ok());
    }
}
