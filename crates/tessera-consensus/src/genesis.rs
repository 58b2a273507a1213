// crates/tessera-consensus/src/genesis.rs
//
// Genesis validator bias for young networks.
//
// While total network power is below the maturity threshold, the designated
// first genesis validator's power is replaced by a fixed multiple of everyone
// else's combined power. Other weights are untouched. Runs before capping.

use std::collections::BTreeSet;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_core::{ActiveParticipant, GenesisBiasParams, TesseraError};

/// Outcome of a genesis bias pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasResult {
    pub participants: Vec<ActiveParticipant>,
    pub total_power: i64,
    pub was_applied: bool,
}

/// Whether the bias applies to a network with `total_power` made of `participants`.
pub fn should_apply_bias(
    params: &GenesisBiasParams,
    total_power: i64,
    participants: &[ActiveParticipant],
) -> bool {
    if !params.enabled {
        return false;
    }
    if total_power >= params.threshold_power {
        return false;
    }
    if participants.len() < 2 {
        return false;
    }
    match params.first_validator_address.as_deref() {
        Some(genesis) if !genesis.is_empty() => participants.iter().any(|p| p.address == genesis),
        _ => false,
    }
}

/// Apply the genesis bias.
///
/// The genesis validator's weight becomes
/// `trunc((total_power - genesis_power) * multiplier)`.
pub fn apply_genesis_bias(
    participants: Vec<ActiveParticipant>,
    params: &GenesisBiasParams,
) -> BiasResult {
    // Saturates: an overflowing network is far past any maturity threshold.
    let total_power = participants
        .iter()
        .fold(0i64, |acc, p| acc.saturating_add(p.weight));
    if !should_apply_bias(params, total_power, &participants) {
        return BiasResult {
            participants,
            total_power,
            was_applied: false,
        };
    }

    let Some(genesis) = params.first_validator_address.as_deref() else {
        return BiasResult {
            participants,
            total_power,
            was_applied: false,
        };
    };

    let mut adjusted = participants;
    let mut was_applied = false;
    for p in adjusted.iter_mut().filter(|p| p.address == genesis) {
        let others = total_power - p.weight;
        let enhanced = Decimal::from(others)
            .checked_mul(params.multiplier)
            .and_then(|d| d.trunc().to_i64());
        match enhanced {
            Some(power) => {
                tracing::info!(
                    "Genesis bias: {} power {} -> {} (others {}, multiplier {})",
                    p.address,
                    p.weight,
                    power,
                    others,
                    params.multiplier
                );
                p.weight = power;
                was_applied = true;
            }
            None => {
                tracing::warn!("Genesis bias overflow for {}, leaving power unchanged", p.address);
            }
        }
    }

    let total_power = adjusted
        .iter()
        .fold(0i64, |acc, p| acc.saturating_add(p.weight));
    BiasResult {
        participants: adjusted,
        total_power,
        was_applied,
    }
}

/// Check that the bias kept the participant set, produced no negative
/// weight, and reported a matching total.
///
/// # Errors
///
/// Returns `TesseraError::InvalidState` describing the first violation.
pub fn validate_bias(
    original: &[ActiveParticipant],
    adjusted: &[ActiveParticipant],
    total_power: i64,
) -> Result<(), TesseraError> {
    if original.len() != adjusted.len() {
        return Err(TesseraError::InvalidState(format!(
            "participant count mismatch: original={}, adjusted={}",
            original.len(),
            adjusted.len()
        )));
    }
    let mut calculated = 0i64;
    for p in adjusted {
        if p.weight < 0 {
            return Err(TesseraError::InvalidState(format!(
                "negative power for {}: {}",
                p.address, p.weight
            )));
        }
        calculated = calculated.checked_add(p.weight).ok_or_else(|| {
            TesseraError::InvalidState("adjusted total power overflows".to_string())
        })?;
    }
    if calculated != total_power {
        return Err(TesseraError::InvalidState(format!(
            "total power mismatch: calculated={}, provided={}",
            calculated, total_power
        )));
    }
    let before: BTreeSet<&str> = original.iter().map(|p| p.address.as_str()).collect();
    let after: BTreeSet<&str> = adjusted.iter().map(|p| p.address.as_str()).collect();
    if before != after {
        return Err(TesseraError::InvalidState(
            "validator set changed during genesis bias".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::RandomSeed;

    fn participant(address: &str, weight: i64) -> ActiveParticipant {
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

    fn network() -> Vec<ActiveParticipant> {
        vec![
            participant("genesis", 1000),
            participant("alice", 2000),
            participant("bob", 1500),
        ]
    }

    fn params(multiplier: Decimal) -> GenesisBiasParams {
        GenesisBiasParams {
            enabled: true,
            threshold_power: 10_000_000,
            multiplier,
            first_validator_address: Some("genesis".to_string()),
        }
    }

    fn weight_of(result: &BiasResult, address: &str) -> i64 {
        result
            .participants
            .iter()
            .find(|p| p.address == address)
            .map(|p| p.weight)
            .unwrap()
    }

    #[test]
    fn test_bias_applies_multiplier_to_others_total() {
        let r = apply_genesis_bias(network(), &params(Decimal::new(52, 2)));
        assert!(r.was_applied);
        assert_eq!(weight_of(&r, "genesis"), 1820);
        assert_eq!(weight_of(&r, "alice"), 2000);
        assert_eq!(weight_of(&r, "bob"), 1500);
        assert_eq!(r.total_power, 5320);
    }

    #[test]
    fn test_bias_other_multipliers() {
        let r = apply_genesis_bias(network(), &params(Decimal::new(60, 2)));
        assert_eq!(weight_of(&r, "genesis"), 2100);
        assert_eq!(r.total_power, 5600);
        let r = apply_genesis_bias(network(), &params(Decimal::new(43, 2)));
        assert_eq!(weight_of(&r, "genesis"), 1505);
        assert_eq!(r.total_power, 5005);
    }

    #[test]
    fn test_bias_truncates() {
        let ps = vec![participant("genesis", 1), participant("alice", 3)];
        let r = apply_genesis_bias(ps, &params(Decimal::new(52, 2)));
        // 3 * 0.52 = 1.56
        assert_eq!(weight_of(&r, "genesis"), 1);
    }

    #[test]
    fn test_bias_disabled_when_mature() {
        let mut p = params(Decimal::new(52, 2));
        p.threshold_power = 4500;
        let r = apply_genesis_bias(network(), &p);
        assert!(!r.was_applied);
        assert_eq!(r.total_power, 4500);
    }

    #[test]
    fn test_bias_requires_flag_pair_and_presence() {
        let mut p = params(Decimal::new(52, 2));
        p.enabled = false;
        assert!(!apply_genesis_bias(network(), &p).was_applied);

        let p = params(Decimal::new(52, 2));
        assert!(!apply_genesis_bias(vec![participant("genesis", 10)], &p).was_applied);

        let mut p = params(Decimal::new(52, 2));
        p.first_validator_address = Some("nobody".to_string());
        assert!(!apply_genesis_bias(network(), &p).was_applied);

        p.first_validator_address = None;
        assert!(!apply_genesis_bias(network(), &p).was_applied);
    }

    #[test]
    fn test_bias_is_idempotent() {
        let p = params(Decimal::new(52, 2));
        let once = apply_genesis_bias(network(), &p);
        let twice = apply_genesis_bias(once.participants.clone(), &p);
        assert_eq!(once.participants, twice.participants);
    }

    #[test]
    fn test_validate_bias() {
        let original = network();
        let r = apply_genesis_bias(original.clone(), &params(Decimal::new(52, 2)));
        assert!(validate_bias(&original, &r.participants, r.total_power).is_ok());
        assert!(validate_bias(&original, &r.participants, r.total_power + 1).is_err());
        assert!(validate_bias(&original, &r.participants[..2], 3820).is_err());
    }

    #[test]
    fn test_overflowing_network_is_not_biased() {
        let ps = vec![
            participant("genesis", 10),
            participant("alice", i64::MAX / 2 + 1),
            participant("bob", i64::MAX / 2 + 1),
        ];
        let r = apply_genesis_bias(ps.clone(), &params(Decimal::new(52, 2)));
        assert!(!r.was_applied);
        assert_eq!(r.total_power, i64::MAX);
        assert!(validate_bias(&ps, &r.participants, r.total_power).is_err());
    }
}
