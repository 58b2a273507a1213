// crates/tessera-reputation/src/score.rs
//
// Reputation score calculation.
//
// effective = epochs - epochs_to_max * sum(m_i / epochs_to_max for m_i > cutoff) * penalty
// score     = 100 if effective > epochs_to_max, 0 if effective <= 0,
//             otherwise trunc2(effective / epochs_to_max) * 100.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use tessera_core::{ActiveParticipant, EpochPerformanceSummary, Ledger, TesseraError, ValidationParams};

/// Inputs of one reputation calculation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationContext {
    /// Number of epochs of history.
    pub epoch_count: i64,
    /// Miss fraction of each epoch in the history.
    pub epoch_miss_percentages: Vec<Decimal>,
    pub validation: ValidationParams,
}

impl ReputationContext {
    /// Build a context from a participant's performance summaries.
    pub fn from_summaries(summaries: &[EpochPerformanceSummary], validation: &ValidationParams) -> Self {
        Self {
            epoch_count: summaries.len() as i64,
            epoch_miss_percentages: summaries.iter().map(miss_percentage).collect(),
            validation: validation.clone(),
        }
    }
}

/// Fraction of requests missed in one epoch; zero when nothing was requested.
pub fn miss_percentage(summary: &EpochPerformanceSummary) -> Decimal {
    let total = summary.inference_count + summary.missed_requests;
    if total == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(summary.missed_requests) / Decimal::from(total)
}

/// Reputation in [0, 100].
pub fn calculate_reputation(ctx: &ReputationContext) -> i64 {
    let epochs_to_max = ctx.validation.epochs_to_max;
    if epochs_to_max <= 0 {
        return 0;
    }
    let max = Decimal::from(epochs_to_max);

    let missed: Decimal = ctx
        .epoch_miss_percentages
        .iter()
        .filter(|m| **m > ctx.validation.miss_percentage_cutoff)
        .map(|m| *m / max)
        .sum();
    let miss_cost = max * missed * ctx.validation.miss_requests_penalty;
    let effective = Decimal::from(ctx.epoch_count) - miss_cost;

    if effective > max {
        return 100;
    }
    if effective <= Decimal::ZERO {
        return 0;
    }
    let ratio = (effective / max).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    (ratio * Decimal::ONE_HUNDRED).trunc().to_i64().unwrap_or(0)
}

/// Score every participant of the upcoming epoch from its stored history.
///
/// # Errors
///
/// Returns any ledger read error unchanged.
pub fn score_participants(
    ledger: &dyn Ledger,
    participants: &mut [ActiveParticipant],
    validation: &ValidationParams,
) -> Result<(), TesseraError> {
    for participant in participants.iter_mut() {
        let summaries = ledger.get_performance_summaries(&participant.address)?;
        let ctx = ReputationContext::from_summaries(&summaries, validation);
        participant.reputation = calculate_reputation(&ctx);
        tracing::debug!(
            "Reputation for {}: {} ({} epochs)",
            participant.address,
            participant.reputation,
            ctx.epoch_count
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(epoch_count: i64, epochs_to_max: i64, misses: &[Decimal]) -> ReputationContext {
        ReputationContext {
            epoch_count,
            epoch_miss_percentages: misses.to_vec(),
            validation: ValidationParams {
                epochs_to_max,
                miss_percentage_cutoff: Decimal::new(1, 1),
                miss_requests_penalty: Decimal::ONE,
            },
        }
    }

    fn d(n: i64, scale: u32) -> Decimal {
        Decimal::new(n, scale)
    }

    #[test]
    fn test_no_epochs() {
        assert_eq!(calculate_reputation(&ctx(0, 30, &[])), 0);
    }

    #[test]
    fn test_halfway_and_max() {
        assert_eq!(calculate_reputation(&ctx(15, 30, &[])), 50);
        assert_eq!(calculate_reputation(&ctx(30, 30, &[])), 100);
        assert_eq!(calculate_reputation(&ctx(45, 30, &[])), 100);
    }

    #[test]
    fn test_thirds_truncate_to_two_places() {
        assert_eq!(calculate_reputation(&ctx(10, 30, &[])), 33);
        assert_eq!(calculate_reputation(&ctx(20, 30, &[])), 66);
    }

    #[test]
    fn test_one_half_missed() {
        assert_eq!(calculate_reputation(&ctx(10, 10, &[d(5, 1)])), 95);
    }

    #[test]
    fn test_many_missed() {
        let misses = [d(25, 2), d(5, 1), d(5, 1), d(5, 1), d(75, 2), d(5, 1)];
        assert_eq!(calculate_reputation(&ctx(10, 10, &misses)), 70);
    }

    #[test]
    fn test_miss_at_cutoff_is_free() {
        assert_eq!(calculate_reputation(&ctx(10, 10, &[d(1, 1)])), 100);
    }

    #[test]
    fn test_misses_can_zero_reputation() {
        let misses = [Decimal::ONE, Decimal::ONE, Decimal::ONE];
        assert_eq!(calculate_reputation(&ctx(2, 10, &misses)), 0);
    }

    #[test]
    fn test_penalty_scales_cost() {
        let mut c = ctx(10, 10, &[d(5, 1)]);
        c.validation.miss_requests_penalty = Decimal::TWO;
        assert_eq!(calculate_reputation(&c), 90);
    }

    #[test]
    fn test_miss_percentage() {
        let summary = EpochPerformanceSummary {
            epoch_start_height: 40,
            participant: "a".to_string(),
            inference_count: 3,
            missed_requests: 1,
            earned_coins: 0,
            rewarded_coins: 0,
        };
        assert_eq!(miss_percentage(&summary), d(25, 2));

        let idle = EpochPerformanceSummary {
            inference_count: 0,
            missed_requests: 0,
            ..summary
        };
        assert_eq!(miss_percentage(&idle), Decimal::ZERO);
    }

    #[test]
    fn test_context_from_summaries() {
        let summaries: Vec<EpochPerformanceSummary> = (0..4)
            .map(|i| EpochPerformanceSummary {
                epoch_start_height: 40 * i,
                participant: "a".to_string(),
                inference_count: 10,
                missed_requests: 0,
                earned_coins: 0,
                rewarded_coins: 0,
            })
            .collect();
        let c = ReputationContext::from_summaries(&summaries, &ValidationParams::default());
        assert_eq!(c.epoch_count, 4);
        assert_eq!(c.epoch_miss_percentages, vec![Decimal::ZERO; 4]);
        // 4 / 30 = 0.1333 -> 0.13
        assert_eq!(calculate_reputation(&c), 13);
    }
}
