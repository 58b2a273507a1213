// crates/tessera-consensus/src/capping.rs
//
// Universal power capping for the Tessera epoch engine.
//
// Clamps any participant whose weight would exceed the maximum individual
// power fraction of the resulting total. The cap is found by walking the
// sorted weights once; all arithmetic is exact rational math on i128 so every
// node computes the same cap.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tessera_core::{ActiveParticipant, TesseraError};

/// Outcome of a capping pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CappingResult {
    /// Participants in input order, weights clamped.
    pub participants: Vec<ActiveParticipant>,
    /// Sum of the clamped weights.
    pub total_power: i64,
    /// Whether a cap threshold was found.
    pub was_capped: bool,
}

/// Minimum fraction used for networks of fewer than four participants.
pub fn small_network_limit(participant_count: usize) -> Decimal {
    match participant_count {
        0 | 1 => Decimal::ONE,
        2 => Decimal::new(50, 2),
        3 => Decimal::new(40, 2),
        _ => Decimal::new(30, 2),
    }
}

/// Fraction actually applied to a network of `participant_count`.
pub fn effective_fraction(configured: Decimal, participant_count: usize) -> Decimal {
    if participant_count < 4 {
        configured.max(small_network_limit(participant_count))
    } else {
        configured
    }
}

/// Sum of all weights, or `None` on overflow.
pub fn checked_total_power(participants: &[ActiveParticipant]) -> Option<i64> {
    participants
        .iter()
        .try_fold(0i64, |acc, p| acc.checked_add(p.weight))
}

/// Apply the power cap to `participants`.
///
/// No-op for fewer than two participants or when `max_fraction` is unset or
/// zero. If the arithmetic would overflow, the input is returned unchanged;
/// an overflowing total is reported saturated at `i64::MAX`.
pub fn apply_power_capping(
    participants: Vec<ActiveParticipant>,
    max_fraction: Option<Decimal>,
) -> CappingResult {
    let Some(total_power) = checked_total_power(&participants) else {
        tracing::warn!(
            "Power capping skipped: total power of {} participants overflows",
            participants.len()
        );
        return CappingResult {
            participants,
            total_power: i64::MAX,
            was_capped: false,
        };
    };
    let unchanged = |participants| CappingResult {
        participants,
        total_power,
        was_capped: false,
    };

    let configured = match max_fraction {
        Some(f) if f > Decimal::ZERO => f,
        _ => return unchanged(participants),
    };
    if participants.len() < 2 {
        return unchanged(participants);
    }

    let fraction = effective_fraction(configured, participants.len());
    let weights: Vec<i64> = participants.iter().map(|p| p.weight).collect();
    let cap = match find_cap(&weights, fraction) {
        Ok(Some(cap)) => cap,
        Ok(None) => return unchanged(participants),
        Err(e) => {
            tracing::warn!("Power capping skipped: {}", e);
            return unchanged(participants);
        }
    };

    let mut capped = participants;
    for p in capped.iter_mut() {
        if p.weight > cap {
            tracing::debug!("Capping {} from {} to {}", p.address, p.weight, cap);
            p.weight = cap;
        }
    }
    // Weights only shrink, so the clamped total cannot overflow.
    let total_power = capped
        .iter()
        .fold(0i64, |acc, p| acc.saturating_add(p.weight));
    tracing::info!(
        "Power capping applied: cap {}, fraction {}, total power {}",
        cap,
        fraction,
        total_power
    );
    CappingResult {
        participants: capped,
        total_power,
        was_capped: true,
    }
}

/// Exact `numerator / denominator` form of a non-negative decimal.
fn to_ratio(d: Decimal) -> Result<(i128, i128), TesseraError> {
    let d = d.normalize();
    let denominator = 10i128
        .checked_pow(d.scale())
        .ok_or_else(|| TesseraError::InvalidParams(format!("fraction {} too precise", d)))?;
    Ok((d.mantissa(), denominator))
}

/// Walk weights smallest to largest. At index `k` of `n`, with `s` the sum of
/// the smaller weights, the threshold is the first `w_k > f * (s + w_k * (n - k))`,
/// and the cap is `f * s / (1 - f * (n - k))`, floored. A non-positive
/// denominator caps at `w_k` itself.
///
/// Returns `Ok(None)` when no threshold exists.
fn find_cap(weights: &[i64], fraction: Decimal) -> Result<Option<i64>, TesseraError> {
    let (p, q) = to_ratio(fraction)?;
    let overflow = || TesseraError::InvalidState("power capping arithmetic overflow".to_string());

    let mut sorted = weights.to_vec();
    sorted.sort_unstable();
    let n = sorted.len() as i128;

    let mut sum_prev: i128 = 0;
    for (k, &w) in sorted.iter().enumerate() {
        let w = w as i128;
        let remaining = n - k as i128;
        let weighted_total = w
            .checked_mul(remaining)
            .and_then(|x| x.checked_add(sum_prev))
            .ok_or_else(overflow)?;
        let lhs = w.checked_mul(q).ok_or_else(overflow)?;
        let rhs = weighted_total.checked_mul(p).ok_or_else(overflow)?;
        if lhs > rhs {
            let denominator = p
                .checked_mul(remaining)
                .and_then(|x| q.checked_sub(x))
                .ok_or_else(overflow)?;
            if denominator <= 0 {
                return Ok(Some(w as i64));
            }
            let numerator = sum_prev.checked_mul(p).ok_or_else(overflow)?;
            let cap = numerator / denominator;
            return i64::try_from(cap).map(Some).map_err(|_| overflow());
        }
        sum_prev = sum_prev.checked_add(w).ok_or_else(overflow)?;
    }
    Ok(None)
}

/// Check the capping invariants: same participants in the same order, no
/// negative or increased weight, matching and non-increased total.
///
/// # Errors
///
/// Returns `TesseraError::InvalidState` describing the first violation.
pub fn validate_capping(
    original: &[ActiveParticipant],
    capped: &[ActiveParticipant],
    total_power: i64,
) -> Result<(), TesseraError> {
    if original.len() != capped.len() {
        return Err(TesseraError::InvalidState(format!(
            "participant count mismatch: original={}, capped={}",
            original.len(),
            capped.len()
        )));
    }
    for (before, after) in original.iter().zip(capped) {
        if after.address != before.address {
            return Err(TesseraError::InvalidState(format!(
                "participant order changed: original={}, capped={}",
                before.address, after.address
            )));
        }
        if after.weight < 0 {
            return Err(TesseraError::InvalidState(format!(
                "negative power for {}: {}",
                after.address, after.weight
            )));
        }
        if after.weight > before.weight {
            return Err(TesseraError::InvalidState(format!(
                "power increased for {}: original={}, capped={}",
                after.address, before.weight, after.weight
            )));
        }
    }
    let overflow = |which: &str| {
        TesseraError::InvalidState(format!("{} total power overflows", which))
    };
    let calculated = checked_total_power(capped).ok_or_else(|| overflow("capped"))?;
    if calculated != total_power {
        return Err(TesseraError::InvalidState(format!(
            "total power mismatch: calculated={}, provided={}",
            calculated, total_power
        )));
    }
    let original_total = checked_total_power(original).ok_or_else(|| overflow("original"))?;
    if total_power > original_total {
        return Err(TesseraError::InvalidState(format!(
            "total power increased: original={}, capped={}",
            original_total, total_power
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::RandomSeed;

    fn participants(weights: &[i64]) -> Vec<ActiveParticipant> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| ActiveParticipant {
                address: format!("p{}", i),
                validator_key: String::new(),
                weight: *w,
                inference_url: String::new(),
                workload_types: Vec::new(),
                node_groups: Vec::new(),
                seed: RandomSeed {
                    participant: format!("p{}", i),
                    poc_start_height: 0,
                    seed: 0,
                    signature: String::new(),
                },
                reputation: 0,
            })
            .collect()
    }

    fn weights(result: &CappingResult) -> Vec<i64> {
        result.participants.iter().map(|p| p.weight).collect()
    }

    fn pct(n: i64) -> Option<Decimal> {
        Some(Decimal::new(n, 2))
    }

    #[test]
    fn test_single_participant_not_capped() {
        let r = apply_power_capping(participants(&[1000]), pct(30));
        assert!(!r.was_capped);
        assert_eq!(r.total_power, 1000);
    }

    #[test]
    fn test_unset_or_zero_fraction_disables_capping() {
        let r = apply_power_capping(participants(&[1, 1, 1, 100]), None);
        assert!(!r.was_capped);
        assert_eq!(weights(&r), vec![1, 1, 1, 100]);
        let r = apply_power_capping(participants(&[1, 1, 1, 100]), Some(Decimal::ZERO));
        assert!(!r.was_capped);
        assert_eq!(r.total_power, 103);
    }

    #[test]
    fn test_two_participants_use_half_floor() {
        // Configured 10% is raised to 50% for two participants.
        let r = apply_power_capping(participants(&[1000, 3000]), pct(10));
        assert!(r.was_capped);
        assert_eq!(weights(&r), vec![1000, 1000]);
        assert_eq!(r.total_power, 2000);
    }

    #[test]
    fn test_three_participants_use_forty_percent_floor() {
        let r = apply_power_capping(participants(&[1000, 1000, 8000]), pct(10));
        // cap = 0.4 * 2000 / (1 - 0.4) = 1333
        assert_eq!(weights(&r), vec![1000, 1000, 1333]);
    }

    #[test]
    fn test_large_participant_capped_to_thirty_percent() {
        let r = apply_power_capping(participants(&[1000, 7000, 1000, 1000]), pct(30));
        assert!(r.was_capped);
        // cap = 0.3 * 3000 / 0.7 = 1285, applied in original order.
        assert_eq!(weights(&r), vec![1000, 1285, 1000, 1000]);
        assert_eq!(r.total_power, 4285);
    }

    #[test]
    fn test_balanced_network_untouched() {
        let r = apply_power_capping(participants(&[100, 100, 100, 100, 100]), pct(30));
        assert!(!r.was_capped);
        assert_eq!(r.total_power, 500);
    }

    #[test]
    fn test_capping_is_idempotent() {
        let once = apply_power_capping(participants(&[5, 900, 20, 3000, 40]), pct(30));
        let twice = apply_power_capping(once.participants.clone(), pct(30));
        assert_eq!(weights(&once), weights(&twice));
    }

    #[test]
    fn test_validate_capping_accepts_result() {
        let original = participants(&[1000, 7000, 1000, 1000]);
        let r = apply_power_capping(original.clone(), pct(30));
        assert!(validate_capping(&original, &r.participants, r.total_power).is_ok());
    }

    #[test]
    fn test_validate_capping_rejects_increase() {
        let original = participants(&[10, 20]);
        let tampered = participants(&[10, 25]);
        assert!(validate_capping(&original, &tampered, 35).is_err());
        assert!(validate_capping(&original, &original, 31).is_err());
    }

    #[test]
    fn test_overflowing_total_left_unchanged() {
        let weights = [i64::MAX / 2 + 1, i64::MAX / 2 + 1, 10];
        let result = apply_power_capping(participants(&weights), Some(Decimal::new(30, 2)));
        assert!(!result.was_capped);
        assert_eq!(result.total_power, i64::MAX);
        let after: Vec<i64> = result.participants.iter().map(|p| p.weight).collect();
        assert_eq!(after, weights);
        assert!(validate_capping(&participants(&weights), &result.participants, i64::MAX).is_err());
    }
}
