// crates/tessera-pipeline/src/context.rs
//
// Explicit state threaded through every pipeline step: the host ledger and
// the static protocol parameters. There is no ambient or global state.

use tessera_consensus::EpochContext;
use tessera_core::{EpochRecord, Ledger, ProtocolParams, TesseraError};

/// Ledger accessor and parameters for one pipeline invocation.
pub struct PipelineContext<'a> {
    pub ledger: &'a mut dyn Ledger,
    pub params: &'a ProtocolParams,
}

impl<'a> PipelineContext<'a> {
    pub fn new(ledger: &'a mut dyn Ledger, params: &'a ProtocolParams) -> Self {
        Self { ledger, params }
    }

    /// Phase clock anchored at `record`.
    pub fn epoch_context(&self, record: &EpochRecord) -> EpochContext {
        EpochContext::new(record, &self.params.epoch)
    }

    /// The epoch currently in effect.
    ///
    /// # Errors
    ///
    /// `TesseraError::InvalidState` before genesis, `TesseraError::NotFound`
    /// if the effective index points at a missing record.
    pub fn effective_epoch(&self) -> Result<EpochRecord, TesseraError> {
        let index = self.ledger.get_effective_epoch_index()?.ok_or_else(|| {
            TesseraError::InvalidState("no effective epoch, genesis not initialized".to_string())
        })?;
        self.ledger
            .get_epoch_record(index)?
            .ok_or_else(|| TesseraError::NotFound(format!("epoch record {}", index)))
    }

    /// The epoch following the effective one, if its PoC has started.
    pub fn upcoming_epoch(&self, effective: &EpochRecord) -> Result<Option<EpochRecord>, TesseraError> {
        self.ledger.get_epoch_record(effective.index + 1)
    }
}
