// crates/tessera-pipeline/src/pipeline.rs
//
// Epoch transition orchestration.
//
// Per block `h`, with E the effective epoch and U the upcoming one:
//   1. E's next PoC start            -> create U anchored at h
//   2. U's end of validation         -> aggregate, bias, cap, assign, score,
//                                       store U's active participants
//   3. U's set-new-validators stage  -> settle E, price U, carry over an
//                                       empty set, make U effective, prune
//
// Every boundary is an exact height match, so calling `on_block` once per
// block runs each step exactly once. Ledger errors abort the step and are
// returned to the host.

use tessera_consensus::{
    apply_genesis_bias, apply_power_capping, assign_workloads, validate_bias, validate_capping,
    WeightAggregator,
};
use tessera_core::{EpochRecord, Ledger, ProtocolParams, TesseraError};
use tessera_economics::{resolve_epoch_price, settle_accounts};
use tessera_reputation::score_participants;

use crate::context::PipelineContext;
use crate::events::EpochEvent;

/// Runs epoch transitions against a host ledger.
pub struct EpochPipeline<'a> {
    ctx: PipelineContext<'a>,
}

impl<'a> EpochPipeline<'a> {
    pub fn new(ledger: &'a mut dyn Ledger, params: &'a ProtocolParams) -> Self {
        Self {
            ctx: PipelineContext::new(ledger, params),
        }
    }

    /// Read access to the underlying ledger.
    pub fn ledger(&self) -> &dyn Ledger {
        &*self.ctx.ledger
    }

    /// Write epoch 0 as the effective epoch if no epoch exists yet.
    ///
    /// Returns `true` if genesis was written.
    pub fn init_genesis(&mut self) -> Result<bool, TesseraError> {
        if self.ctx.ledger.get_effective_epoch_index()?.is_some() {
            return Ok(false);
        }
        let genesis = EpochRecord::genesis();
        self.ctx.ledger.set_epoch_record(genesis)?;
        self.ctx.ledger.set_effective_epoch_index(genesis.index)?;
        tracing::info!("Initialized genesis epoch at height {}", genesis.poc_start_height);
        Ok(true)
    }

    /// Run every boundary step that falls on `height`.
    ///
    /// # Errors
    ///
    /// Returns the first ledger error; steps already executed in this block
    /// are not rolled back, so the host must discard the block.
    pub fn on_block(&mut self, height: i64) -> Result<Vec<EpochEvent>, TesseraError> {
        let effective = self.ctx.effective_epoch()?;
        let mut events = Vec::new();

        if self.ctx.epoch_context(&effective).is_start_of_next_poc(height) {
            let upcoming = EpochRecord::new(effective.index + 1, height);
            self.ctx.ledger.set_epoch_record(upcoming)?;
            tracing::info!(
                "Epoch {}: proof-of-compute started at height {}",
                upcoming.index,
                height
            );
            events.push(EpochEvent::PocStarted {
                epoch_index: upcoming.index,
                poc_start_height: height,
            });
        }

        let Some(upcoming) = self.ctx.upcoming_epoch(&effective)? else {
            return Ok(events);
        };
        let upcoming_ctx = self.ctx.epoch_context(&upcoming);

        if upcoming_ctx.is_end_of_validation_stage(height) {
            events.push(self.compute_new_weights(&effective, &upcoming)?);
        }
        if upcoming_ctx.is_set_new_validators_stage(height) {
            events.extend(self.set_new_validators(height, &effective, &upcoming)?);
        }
        Ok(events)
    }

    /// End of validation: build and store the upcoming validator set.
    fn compute_new_weights(
        &mut self,
        effective: &EpochRecord,
        upcoming: &EpochRecord,
    ) -> Result<EpochEvent, TesseraError> {
        let ledger = &mut *self.ctx.ledger;
        let params = self.ctx.params;

        let previous = ledger
            .get_active_participants(effective.index)?
            .unwrap_or_default();
        let report =
            WeightAggregator::new(&previous).aggregate(&*ledger, upcoming.poc_start_height)?;
        let skipped = report.skipped.len();

        if report.accepted.is_empty() {
            tracing::warn!(
                "Epoch {}: no participants accepted, keeping the current validator set",
                upcoming.index
            );
            return Ok(EpochEvent::WeightsComputed {
                epoch_index: upcoming.index,
                accepted: 0,
                skipped,
                total_power: 0,
                bias_applied: false,
                was_capped: false,
            });
        }

        // Bias first; capping must see the boosted genesis weight.
        let bias_params = ledger.get_genesis_bias_params()?;
        let aggregated = report.accepted;
        let biased = apply_genesis_bias(aggregated.clone(), &bias_params);
        if let Err(e) = validate_bias(&aggregated, &biased.participants, biased.total_power) {
            tracing::error!("Epoch {}: genesis bias check failed: {}", upcoming.index, e);
        }

        let fraction = ledger.get_max_individual_power_fraction()?;
        let capped = apply_power_capping(biased.participants.clone(), fraction);
        if let Err(e) = validate_capping(&biased.participants, &capped.participants, capped.total_power)
        {
            tracing::error!("Epoch {}: power capping check failed: {}", upcoming.index, e);
        }

        let mut participants = capped.participants;
        assign_workloads(&*ledger, upcoming.index, &mut participants)?;
        score_participants(&*ledger, &mut participants, &params.validation)?;

        let accepted = participants.len();
        ledger.set_active_participants(upcoming.index, participants)?;
        tracing::info!(
            "Epoch {}: {} active participants, total power {}",
            upcoming.index,
            accepted,
            capped.total_power
        );

        Ok(EpochEvent::WeightsComputed {
            epoch_index: upcoming.index,
            accepted,
            skipped,
            total_power: capped.total_power,
            bias_applied: biased.was_applied,
            was_capped: capped.was_capped,
        })
    }

    /// Set-new-validators: settle the effective epoch and switch to the upcoming one.
    fn set_new_validators(
        &mut self,
        height: i64,
        effective: &EpochRecord,
        upcoming: &EpochRecord,
    ) -> Result<Vec<EpochEvent>, TesseraError> {
        let ledger = &mut *self.ctx.ledger;
        let params = self.ctx.params;
        let mut events = Vec::new();

        let settlement =
            settle_accounts(ledger, &params.rewards, height, effective.poc_start_height)?;
        events.push(EpochEvent::AccountsSettled {
            epoch_index: effective.index,
            minted: settlement.totals.new_coins,
            total_paid: settlement.total_paid,
            errors: settlement.errors().count(),
        });

        let default_price = ledger
            .get_epoch_pricing(effective.poc_start_height)?
            .map(|p| p.unit_of_compute_price)
            .unwrap_or(params.pricing.default_unit_of_compute_price);
        let price = resolve_epoch_price(&*ledger, default_price)?;
        ledger.set_epoch_group_pricing_and_params(
            upcoming.poc_start_height,
            price,
            params.validation.clone(),
        )?;
        events.push(EpochEvent::PriceResolved {
            epoch_index: upcoming.index,
            price,
        });

        let mut carried_over = false;
        let validators = match ledger.get_active_participants(upcoming.index)? {
            Some(set) if !set.is_empty() => set.len(),
            _ => {
                let previous = ledger
                    .get_active_participants(effective.index)?
                    .unwrap_or_default();
                tracing::warn!(
                    "Epoch {}: carrying over {} validators from epoch {}",
                    upcoming.index,
                    previous.len(),
                    effective.index
                );
                let count = previous.len();
                ledger.set_active_participants(upcoming.index, previous)?;
                carried_over = true;
                count
            }
        };
        ledger.set_effective_epoch_index(upcoming.index)?;
        tracing::info!(
            "Epoch {} is now effective with {} validators",
            upcoming.index,
            validators
        );
        events.push(EpochEvent::ValidatorsSet {
            epoch_index: upcoming.index,
            validators,
            carried_over,
        });

        let retention = params.pruning.poc_data_retention_epochs;
        if upcoming.index > retention {
            let target = upcoming.index - retention;
            if let Some(record) = ledger.get_epoch_record(target)? {
                ledger.prune_poc_data(record.poc_start_height)?;
                tracing::info!(
                    "Pruned PoC data of epoch {} at height {}",
                    target,
                    record.poc_start_height
                );
                events.push(EpochEvent::DataPruned {
                    epoch_index: target,
                    poc_start_height: record.poc_start_height,
                });
            }
        }

        Ok(events)
    }
}
