// crates/tessera-consensus/src/epoch.rs
//
// Epoch phase clock for the Tessera epoch engine.
//
// An epoch is anchored at its proof-of-compute start height. Every phase and
// boundary is a pure function of (anchor, params, height):
// PocGenerate -> PocGenerateWindDown -> PocValidate -> PocValidateWindDown -> Inference.
// Boundary predicates are exact equality tests, so each fires at exactly one
// height per epoch.

use serde::{Deserialize, Serialize};
use tessera_core::{EpochParams, EpochRecord};

/// The phase a block height falls into, relative to an epoch anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochPhase {
    /// Participants generate proof-of-compute nonces.
    PocGenerate,
    /// Last blocks of generation; batches still accepted.
    PocGenerateWindDown,
    /// Participants validate each other's proofs.
    PocValidate,
    /// Last blocks of validation; votes still accepted.
    PocValidateWindDown,
    /// Nodes serve paid inference.
    Inference,
}

/// Inclusive window of block heights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeWindow {
    pub start: i64,
    pub end: i64,
}

impl ExchangeWindow {
    pub fn contains(&self, height: i64) -> bool {
        height >= self.start && height <= self.end
    }
}

/// Absolute heights of every boundary of one epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochStages {
    pub epoch_index: u64,
    pub poc_start: i64,
    pub poc_generation_winddown: i64,
    pub poc_generation_end: i64,
    pub poc_validation_start: i64,
    pub poc_validation_winddown: i64,
    pub poc_validation_end: i64,
    pub set_new_validators: i64,
    pub claim_money: i64,
    pub next_poc_start: i64,
    pub poc_exchange_window: ExchangeWindow,
    pub poc_validation_exchange_window: ExchangeWindow,
}

/// Phase clock anchored at one epoch record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpochContext {
    epoch_index: u64,
    poc_start_height: i64,
    params: EpochParams,
}

impl EpochContext {
    /// Build a context for `record` under `params`.
    pub fn new(record: &EpochRecord, params: &EpochParams) -> Self {
        Self {
            epoch_index: record.index,
            poc_start_height: record.poc_start_height,
            params: params.clone(),
        }
    }

    pub fn epoch_index(&self) -> u64 {
        self.epoch_index
    }

    pub fn poc_start_height(&self) -> i64 {
        self.poc_start_height
    }

    /// Epoch 0 never runs proof-of-compute.
    pub fn is_genesis(&self) -> bool {
        self.epoch_index == 0
    }

    /// Height relative to the anchor. Epoch 0 applies `epoch_shift` instead.
    pub fn relative_height(&self, height: i64) -> i64 {
        if self.is_genesis() {
            height + self.params.epoch_shift
        } else {
            height - self.poc_start_height
        }
    }

    /// Height at which the next epoch's proof-of-compute starts.
    pub fn next_poc_start(&self) -> i64 {
        if self.is_genesis() {
            self.params.epoch_length - self.params.epoch_shift
        } else {
            self.poc_start_height + self.params.epoch_length
        }
    }

    /// Phase of `height` within this epoch.
    ///
    /// Heights before the anchor and every height of epoch 0 report
    /// `EpochPhase::Inference`.
    pub fn current_phase(&self, height: i64) -> EpochPhase {
        if self.is_genesis() {
            return EpochPhase::Inference;
        }
        let r = self.relative_height(height);
        let p = &self.params;
        if r < 0 {
            EpochPhase::Inference
        } else if r < p.generation_winddown_offset() {
            EpochPhase::PocGenerate
        } else if r < p.validation_start_offset() {
            EpochPhase::PocGenerateWindDown
        } else if r < p.validation_winddown_offset() {
            EpochPhase::PocValidate
        } else if r < p.validation_end_offset() {
            EpochPhase::PocValidateWindDown
        } else {
            EpochPhase::Inference
        }
    }

    fn is_at_offset(&self, height: i64, offset: i64) -> bool {
        !self.is_genesis() && self.relative_height(height) == offset
    }

    pub fn is_start_of_poc(&self, height: i64) -> bool {
        self.is_at_offset(height, 0)
    }

    pub fn is_start_of_validation_stage(&self, height: i64) -> bool {
        self.is_at_offset(height, self.params.validation_start_offset())
    }

    pub fn is_end_of_validation_stage(&self, height: i64) -> bool {
        self.is_at_offset(height, self.params.validation_end_offset())
    }

    pub fn is_set_new_validators_stage(&self, height: i64) -> bool {
        self.is_at_offset(height, self.params.set_new_validators_offset())
    }

    pub fn is_claim_money_stage(&self, height: i64) -> bool {
        self.is_at_offset(height, self.params.claim_money_offset())
    }

    /// True at exactly the height where the following epoch begins.
    /// Unlike the other predicates this also fires for epoch 0.
    pub fn is_start_of_next_poc(&self, height: i64) -> bool {
        height == self.next_poc_start()
    }

    /// Proof batches are exchanged in `(poc_start, validation_start]`.
    pub fn is_poc_exchange_window(&self, height: i64) -> bool {
        if self.is_genesis() {
            return false;
        }
        let r = self.relative_height(height);
        r > 0 && r <= self.params.validation_start_offset()
    }

    /// Peer validations are exchanged in `(validation_start, set_new_validators]`.
    pub fn is_validation_exchange_window(&self, height: i64) -> bool {
        if self.is_genesis() {
            return false;
        }
        let r = self.relative_height(height);
        r > self.params.validation_start_offset() && r <= self.params.set_new_validators_offset()
    }

    /// Absolute heights of every boundary of this epoch.
    pub fn stages(&self) -> EpochStages {
        let base = self.poc_start_height;
        let p = &self.params;
        EpochStages {
            epoch_index: self.epoch_index,
            poc_start: base,
            poc_generation_winddown: base + p.generation_winddown_offset(),
            poc_generation_end: base + p.validation_start_offset(),
            poc_validation_start: base + p.validation_start_offset(),
            poc_validation_winddown: base + p.validation_winddown_offset(),
            poc_validation_end: base + p.validation_end_offset(),
            set_new_validators: base + p.set_new_validators_offset(),
            claim_money: base + p.claim_money_offset(),
            next_poc_start: self.next_poc_start(),
            poc_exchange_window: ExchangeWindow {
                start: base + 1,
                end: base + p.validation_start_offset(),
            },
            poc_validation_exchange_window: ExchangeWindow {
                start: base + p.validation_start_offset() + 1,
                end: base + p.set_new_validators_offset(),
            },
        }
    }
}
