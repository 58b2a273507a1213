// crates/tessera-economics/src/settlement.rs
//
// Epoch account settlement for the Tessera epoch engine.
//
// Each participant's accumulated work balance earns a pro-rata share of two
// pools: the freshly minted epoch reward, and the forfeited work of invalid
// participants. Work, refund and reward are then paid from escrow in one
// transfer and both balances reset for the next epoch.
//
// Negative balances are data-integrity errors. They are reported on the
// participant's settle amount and that participant is not paid; everyone else
// settles normally.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tessera_core::{
    EpochPerformanceSummary, EpochStats, Ledger, ParticipantRecord, RewardParams, TesseraError,
};

use crate::emission::reward_pool_at;

/// Per-participant settlement failure. Never aborts the epoch.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettleError {
    #[error("negative work balance")]
    NegativeWorkBalance,
    #[error("negative refund balance")]
    NegativeRefundBalance,
    #[error("epoch work total overflows")]
    WorkTotalOverflow,
}

/// Coins owed to one participant for the settled epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleAmount {
    pub participant: String,
    pub work_coins: u64,
    pub reward_coins: u64,
    pub refund_coins: u64,
    pub error: Option<SettleError>,
}

impl SettleAmount {
    fn empty(participant: &str) -> Self {
        Self {
            participant: participant.to_string(),
            work_coins: 0,
            reward_coins: 0,
            refund_coins: 0,
            error: None,
        }
    }

    /// Work + refund + reward, saturating.
    pub fn total_payment(&self) -> u64 {
        self.work_coins
            .saturating_add(self.refund_coins)
            .saturating_add(self.reward_coins)
    }
}

/// Epoch-wide settlement figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementTotals {
    /// Sum of positive work balances of valid participants with no negative balance.
    pub total_work: i64,
    /// Sum of positive work balances forfeited by invalid participants.
    pub invalidated_balance: i64,
    /// Reward pool for the epoch before any distribution.
    pub reward_pool: u64,
    /// Coins to mint: the full pool, or zero when nobody worked.
    pub new_coins: u64,
}

/// Outcome of settling one epoch against the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementReport {
    pub amounts: Vec<SettleAmount>,
    pub totals: SettlementTotals,
    /// Coins actually transferred out of escrow.
    pub total_paid: u64,
    /// Participants that were paid a non-zero amount.
    pub paid_participants: usize,
}

impl SettlementReport {
    pub fn errors(&self) -> impl Iterator<Item = &SettleAmount> {
        self.amounts.iter().filter(|a| a.error.is_some())
    }
}

/// `trunc(work / total_work * pool)` in decimal arithmetic.
fn pro_rata(work: i64, total_work: i64, pool: u64) -> u64 {
    if work <= 0 || total_work <= 0 || pool == 0 {
        return 0;
    }
    let share = Decimal::from(work)
        .checked_div(Decimal::from(total_work))
        .and_then(|ratio| ratio.checked_mul(Decimal::from(pool)));
    match share.and_then(|s| s.trunc().to_u64()) {
        Some(coins) => coins,
        None => {
            tracing::warn!(
                "Reward share overflow: work {}, total {}, pool {}",
                work,
                total_work,
                pool
            );
            0
        }
    }
}

/// Negative balances are reported for every participant, invalid or not.
fn balance_error(p: &ParticipantRecord) -> Option<SettleError> {
    if p.work_balance < 0 {
        Some(SettleError::NegativeWorkBalance)
    } else if p.refund_balance < 0 {
        Some(SettleError::NegativeRefundBalance)
    } else {
        None
    }
}

fn counts_toward_work(p: &ParticipantRecord) -> bool {
    !p.is_invalid() && p.work_balance > 0 && p.refund_balance >= 0
}

/// Compute settle amounts for `participants` without touching any state.
///
/// Amounts are returned in input order. Invalid participants receive
/// nothing. A negative work or refund balance yields an amount carrying the
/// error and no coins, whether or not the participant is invalid. If the
/// work totals do not fit in an `i64`, nothing is minted and every amount
/// carries `SettleError::WorkTotalOverflow` (or its own balance error).
pub fn compute_settle_amounts(
    participants: &[ParticipantRecord],
    reward_pool: u64,
) -> (Vec<SettleAmount>, SettlementTotals) {
    let total_work: i128 = participants
        .iter()
        .filter(|p| counts_toward_work(p))
        .map(|p| i128::from(p.work_balance))
        .sum();
    let invalidated_balance: i128 = participants
        .iter()
        .filter(|p| p.is_invalid() && p.work_balance > 0)
        .map(|p| i128::from(p.work_balance))
        .sum();

    let totals = match (i64::try_from(total_work), i64::try_from(invalidated_balance)) {
        (Ok(total_work), Ok(invalidated_balance)) => SettlementTotals {
            total_work,
            invalidated_balance,
            reward_pool,
            new_coins: if total_work > 0 { reward_pool } else { 0 },
        },
        _ => {
            tracing::error!(
                "Work totals overflow (total {}, invalidated {}), nobody is paid",
                total_work,
                invalidated_balance
            );
            let amounts = participants
                .iter()
                .map(|p| {
                    let mut amount = SettleAmount::empty(&p.address);
                    amount.error = Some(balance_error(p).unwrap_or(SettleError::WorkTotalOverflow));
                    amount
                })
                .collect();
            return (
                amounts,
                SettlementTotals {
                    reward_pool,
                    ..SettlementTotals::default()
                },
            );
        }
    };
    let pools = [totals.new_coins, totals.invalidated_balance.max(0) as u64];

    let amounts = participants
        .iter()
        .map(|p| {
            let mut amount = SettleAmount::empty(&p.address);
            if let Some(err) = balance_error(p) {
                amount.error = Some(err);
                return amount;
            }
            if p.is_invalid() {
                return amount;
            }
            amount.work_coins = p.work_balance as u64;
            amount.refund_coins = p.refund_balance as u64;
            amount.reward_coins = pools
                .iter()
                .map(|pool| pro_rata(p.work_balance, totals.total_work, *pool))
                .fold(0u64, u64::saturating_add);
            amount
        })
        .collect();

    (amounts, totals)
}

/// Settle every participant for the epoch anchored at `epoch_start_height`,
/// at block `height`.
///
/// Mints the reward pool (when anyone worked), pays each participant from
/// escrow, raises reputation of rewarded participants, records each valid
/// participant's performance summary, and resets balances and stats.
///
/// # Errors
///
/// Any ledger failure (mint, transfer, read or write) aborts settlement and
/// is returned unchanged.
pub fn settle_accounts(
    ledger: &mut dyn Ledger,
    params: &RewardParams,
    height: i64,
    epoch_start_height: i64,
) -> Result<SettlementReport, TesseraError> {
    let participants = ledger.all_participants()?;
    let reward_pool = reward_pool_at(params, height);
    let (amounts, totals) = compute_settle_amounts(&participants, reward_pool);

    tracing::info!(
        "Settling epoch {} at height {}: {} participants, total work {}, invalidated {}, pool {}",
        epoch_start_height,
        height,
        participants.len(),
        totals.total_work,
        totals.invalidated_balance,
        totals.reward_pool
    );

    if totals.new_coins > 0 {
        ledger.mint(totals.new_coins)?;
        tracing::info!("Minted {} coins for epoch {}", totals.new_coins, epoch_start_height);
    }

    let mut report = SettlementReport {
        amounts: Vec::with_capacity(amounts.len()),
        totals,
        total_paid: 0,
        paid_participants: 0,
    };

    for (mut participant, amount) in participants.into_iter().zip(amounts) {
        if let Some(err) = amount.error {
            tracing::error!(
                "Settlement error for {}: {} (work {}, refund {})",
                participant.address,
                err,
                participant.work_balance,
                participant.refund_balance
            );
        } else {
            let payment = amount.total_payment();
            if payment > 0 {
                ledger.transfer_from_escrow(&participant.address, payment)?;
                report.total_paid = report.total_paid.saturating_add(payment);
                report.paid_participants += 1;
                tracing::debug!(
                    "Paid {} to {} (work {}, refund {}, reward {})",
                    payment,
                    participant.address,
                    amount.work_coins,
                    amount.refund_coins,
                    amount.reward_coins
                );
                if !participant.is_invalid() && amount.reward_coins > 0 {
                    participant.reputation =
                        (participant.reputation + params.reputation_increment).min(Decimal::ONE);
                }
            }
        }

        if !participant.is_invalid() {
            ledger.append_performance_summary(EpochPerformanceSummary {
                epoch_start_height,
                participant: participant.address.clone(),
                inference_count: participant.current_epoch_stats.inference_count,
                missed_requests: participant.current_epoch_stats.missed_requests,
                earned_coins: amount.work_coins,
                rewarded_coins: amount.reward_coins,
            })?;
            participant.epochs_completed += 1;
        }
        participant.current_epoch_stats = EpochStats::default();
        participant.work_balance = 0;
        participant.refund_balance = 0;
        ledger.set_participant(participant)?;

        report.amounts.push(amount);
    }

    tracing::info!(
        "Settled epoch {}: paid {} coins to {} participants, {} errors",
        epoch_start_height,
        report.total_paid,
        report.paid_participants,
        report.errors().count()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_core::ParticipantStatus;
    use tessera_store::MemoryLedger;

    const POOL: u64 = 1_048_576;

    fn participant(address: &str, work: i64, refund: i64) -> ParticipantRecord {
        let mut p = ParticipantRecord::new(address, format!("http://{}", address));
        p.work_balance = work;
        p.refund_balance = refund;
        p
    }

    fn invalid(address: &str, work: i64) -> ParticipantRecord {
        let mut p = participant(address, work, 0);
        p.status = ParticipantStatus::Invalid;
        p
    }

    #[test]
    fn test_single_participant_takes_pool() {
        let (amounts, totals) = compute_settle_amounts(&[participant("p1", 1000, 0)], POOL);
        assert_eq!(totals.new_coins, POOL);
        assert_eq!(amounts[0].work_coins, 1000);
        assert_eq!(amounts[0].reward_coins, POOL);
        assert_eq!(amounts[0].refund_coins, 0);
    }

    #[test]
    fn test_even_split_with_refund() {
        let ps = [participant("p1", 1000, 0), participant("p2", 1000, 500)];
        let (amounts, totals) = compute_settle_amounts(&ps, POOL);
        assert_eq!(totals.total_work, 2000);
        assert_eq!(amounts[0].reward_coins, 524_288);
        assert_eq!(amounts[1].reward_coins, 524_288);
        assert_eq!(amounts[1].refund_coins, 500);
        assert_eq!(amounts[1].total_payment(), 1000 + 500 + 524_288);
    }

    #[test]
    fn test_no_work_mints_nothing() {
        let (amounts, totals) = compute_settle_amounts(&[participant("p1", 0, 0)], POOL);
        assert_eq!(totals.new_coins, 0);
        assert_eq!(amounts[0].total_payment(), 0);
        assert!(amounts[0].error.is_none());
    }

    #[test]
    fn test_negative_work_is_reported() {
        let (amounts, totals) = compute_settle_amounts(&[participant("p1", -1, 0)], POOL);
        assert_eq!(totals.new_coins, 0);
        assert_eq!(amounts[0].error, Some(SettleError::NegativeWorkBalance));
        assert_eq!(amounts[0].total_payment(), 0);
    }

    #[test]
    fn test_negative_refund_is_reported() {
        let (amounts, totals) = compute_settle_amounts(&[participant("p1", 1, -1)], POOL);
        assert_eq!(totals.total_work, 0);
        assert_eq!(totals.new_coins, 0);
        assert_eq!(amounts[0].error, Some(SettleError::NegativeRefundBalance));
    }

    #[test]
    fn test_error_isolated_to_one_participant() {
        let ps = [participant("bad", -50, 0), participant("good", 400, 0)];
        let (amounts, _) = compute_settle_amounts(&ps, POOL);
        assert_eq!(amounts[0].error, Some(SettleError::NegativeWorkBalance));
        assert!(amounts[1].error.is_none());
        assert_eq!(amounts[1].reward_coins, POOL);
    }

    #[test]
    fn test_invalid_participant_negative_balance_reported() {
        let (amounts, totals) = compute_settle_amounts(&[invalid("gone", -5)], 1000);
        assert_eq!(amounts[0].error, Some(SettleError::NegativeWorkBalance));
        assert_eq!(amounts[0].total_payment(), 0);
        assert_eq!(totals.invalidated_balance, 0);

        let mut p = invalid("gone", 10);
        p.refund_balance = -1;
        let (amounts, _) = compute_settle_amounts(&[p], 1000);
        assert_eq!(amounts[0].error, Some(SettleError::NegativeRefundBalance));
    }

    #[test]
    fn test_work_total_overflow_reported() {
        let huge = i64::MAX / 2 + 1;
        let ps = [
            participant("p1", huge, 0),
            participant("p2", huge, 0),
            participant("bad", -1, 0),
        ];
        let (amounts, totals) = compute_settle_amounts(&ps, POOL);
        assert_eq!(totals.new_coins, 0);
        assert_eq!(totals.total_work, 0);
        assert_eq!(totals.reward_pool, POOL);
        assert_eq!(amounts[0].error, Some(SettleError::WorkTotalOverflow));
        assert_eq!(amounts[1].error, Some(SettleError::WorkTotalOverflow));
        assert_eq!(amounts[2].error, Some(SettleError::NegativeWorkBalance));
        assert!(amounts.iter().all(|a| a.total_payment() == 0));
    }

    #[test]
    fn test_invalid_work_redistributed() {
        let ps = [
            invalid("cheater", 2000),
            participant("p1", 1000, 0),
            participant("p2", 1000, 0),
        ];
        let (amounts, totals) = compute_settle_amounts(&ps, POOL);
        assert_eq!(totals.total_work, 2000);
        assert_eq!(totals.invalidated_balance, 2000);
        assert_eq!(amounts[0].total_payment(), 0);
        assert_eq!(amounts[1].reward_coins, POOL / 2 + 1000);
        assert_eq!(amounts[2].reward_coins, POOL / 2 + 1000);
    }

    #[test]
    fn test_settle_accounts_pays_and_resets() {
        let mut ledger = MemoryLedger::new();
        let mut p1 = participant("p1", 1000, 0);
        p1.current_epoch_stats = EpochStats {
            inference_count: 9,
            missed_requests: 1,
        };
        ledger.set_participant(p1).unwrap();
        ledger.set_participant(participant("p2", 1000, 500)).unwrap();

        let report = settle_accounts(&mut ledger, &RewardParams::default(), 50, 40).unwrap();
        assert_eq!(report.totals.new_coins, POOL);
        assert_eq!(ledger.minted(), POOL);
        assert_eq!(ledger.balance("p1"), 1000 + 524_288);
        assert_eq!(ledger.balance("p2"), 1500 + 524_288);
        assert_eq!(report.paid_participants, 2);

        let p1 = ledger.get_participant("p1").unwrap().unwrap();
        assert_eq!(p1.work_balance, 0);
        assert_eq!(p1.refund_balance, 0);
        assert_eq!(p1.epochs_completed, 1);
        assert_eq!(p1.reputation, Decimal::new(1, 2));
        assert_eq!(p1.current_epoch_stats, EpochStats::default());

        let summaries = ledger.get_performance_summaries("p1").unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].epoch_start_height, 40);
        assert_eq!(summaries[0].inference_count, 9);
        assert_eq!(summaries[0].missed_requests, 1);
        assert_eq!(summaries[0].rewarded_coins, 524_288);
    }

    #[test]
    fn test_settle_accounts_reputation_capped() {
        let mut ledger = MemoryLedger::new();
        let mut p = participant("p1", 10, 0);
        p.reputation = Decimal::new(995, 3);
        ledger.set_participant(p).unwrap();
        settle_accounts(&mut ledger, &RewardParams::default(), 50, 40).unwrap();
        let p = ledger.get_participant("p1").unwrap().unwrap();
        assert_eq!(p.reputation, Decimal::ONE);
    }

    #[test]
    fn test_settle_accounts_error_still_resets() {
        let mut ledger = MemoryLedger::new();
        ledger.set_participant(participant("bad", -5, 0)).unwrap();
        ledger.set_participant(invalid("gone", 300)).unwrap();
        let report = settle_accounts(&mut ledger, &RewardParams::default(), 50, 40).unwrap();
        assert_eq!(report.errors().count(), 1);
        assert_eq!(ledger.minted(), 0);
        assert_eq!(ledger.balance("bad"), 0);
        assert_eq!(ledger.balance("gone"), 0);
        assert_eq!(ledger.get_participant("bad").unwrap().unwrap().work_balance, 0);
        assert_eq!(ledger.get_participant("gone").unwrap().unwrap().work_balance, 0);
        assert!(ledger.get_performance_summaries("gone").unwrap().is_empty());
        assert_eq!(ledger.get_performance_summaries("bad").unwrap().len(), 1);
    }

    #[test]
    fn test_transfer_failure_aborts() {
        let mut ledger = MemoryLedger::new();
        ledger.set_participant(participant("p1", 1000, 0)).unwrap();
        ledger.fail_transfers_to("p1");
        let err = settle_accounts(&mut ledger, &RewardParams::default(), 50, 40).unwrap_err();
        assert!(matches!(err, TesseraError::Transfer(_)));
    }
}
