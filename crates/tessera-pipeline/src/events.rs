// crates/tessera-pipeline/src/events.rs
//
// Boundary steps executed by `EpochPipeline::on_block`, returned to the host
// in execution order.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochEvent {
    /// A new epoch record was created at its PoC start height.
    PocStarted {
        epoch_index: u64,
        poc_start_height: i64,
    },
    /// End of validation: the next validator set was computed.
    WeightsComputed {
        epoch_index: u64,
        accepted: usize,
        skipped: usize,
        total_power: i64,
        bias_applied: bool,
        was_capped: bool,
    },
    /// The previous epoch's balances were settled.
    AccountsSettled {
        epoch_index: u64,
        minted: u64,
        total_paid: u64,
        errors: usize,
    },
    /// The unit-of-compute price for the new epoch was fixed.
    PriceResolved { epoch_index: u64, price: u64 },
    /// The new epoch became effective with this validator set.
    ValidatorsSet {
        epoch_index: u64,
        validators: usize,
        carried_over: bool,
    },
    /// PoC data of an old epoch was removed.
    DataPruned {
        epoch_index: u64,
        poc_start_height: i64,
    },
}
