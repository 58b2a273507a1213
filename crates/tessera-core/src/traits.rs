// crates/tessera-core/src/traits.rs

use std::collections::BTreeMap;

use rust_decimal::Decimal;

use crate::active::{ActiveParticipant, WorkloadType};
use crate::epoch::{EpochPerformanceSummary, EpochPricing, EpochRecord};
use crate::error::TesseraError;
use crate::params::{GenesisBiasParams, ValidationParams};
use crate::participant::ParticipantRecord;
use crate::poc::{PeerValidation, ProofBatch, RandomSeed};

/// Synchronous accessor for host ledger state.
///
/// The epoch pipeline reads every input from, and writes every output to, an
/// implementation of this trait. All keyed collections are returned as
/// `BTreeMap`s or sorted vectors so iteration order never depends on hashing.
///
/// Implemented by tessera-store (`MemoryLedger`) and by the host chain.
pub trait Ledger: Send {
    // ---- Participants ----

    /// Retrieve a participant by address.
    fn get_participant(&self, address: &str) -> Result<Option<ParticipantRecord>, TesseraError>;

    /// Insert or overwrite a participant record.
    fn set_participant(&mut self, record: ParticipantRecord) -> Result<(), TesseraError>;

    /// All participants, sorted by address.
    fn all_participants(&self) -> Result<Vec<ParticipantRecord>, TesseraError>;

    // ---- Epochs ----

    fn get_epoch_record(&self, index: u64) -> Result<Option<EpochRecord>, TesseraError>;

    fn set_epoch_record(&mut self, record: EpochRecord) -> Result<(), TesseraError>;

    /// Index of the epoch currently in effect, if any epoch has been recorded.
    fn get_effective_epoch_index(&self) -> Result<Option<u64>, TesseraError>;

    fn set_effective_epoch_index(&mut self, index: u64) -> Result<(), TesseraError>;

    // ---- Proof-of-compute ----

    /// Proof batches for an epoch, keyed by participant address.
    fn get_proof_batches(
        &self,
        poc_start_height: i64,
    ) -> Result<BTreeMap<String, Vec<ProofBatch>>, TesseraError>;

    /// Peer validations for an epoch, keyed by the validated participant's address.
    fn get_peer_validations(
        &self,
        poc_start_height: i64,
    ) -> Result<BTreeMap<String, Vec<PeerValidation>>, TesseraError>;

    fn get_random_seed(
        &self,
        poc_start_height: i64,
        address: &str,
    ) -> Result<Option<RandomSeed>, TesseraError>;

    /// Drop proof batches and peer validations stored for an epoch.
    fn prune_poc_data(&mut self, poc_start_height: i64) -> Result<(), TesseraError>;

    // ---- Governance ----

    /// Governance-approved workload types in governance order.
    fn get_governance_workload_types_sorted(&self) -> Result<Vec<WorkloadType>, TesseraError>;

    /// Maximum share of total power any participant may hold. `None` disables capping.
    fn get_max_individual_power_fraction(&self) -> Result<Option<Decimal>, TesseraError>;

    fn get_genesis_bias_params(&self) -> Result<GenesisBiasParams, TesseraError>;

    // ---- Performance history ----

    /// Performance summaries of a participant, ordered by epoch start height.
    fn get_performance_summaries(
        &self,
        address: &str,
    ) -> Result<Vec<EpochPerformanceSummary>, TesseraError>;

    fn append_performance_summary(
        &mut self,
        summary: EpochPerformanceSummary,
    ) -> Result<(), TesseraError>;

    // ---- Funds ----

    /// Move `amount` coins from the settlement escrow to `address`.
    fn transfer_from_escrow(&mut self, address: &str, amount: u64) -> Result<(), TesseraError>;

    /// Mint `amount` new coins into the settlement escrow.
    fn mint(&mut self, amount: u64) -> Result<(), TesseraError>;

    // ---- Epoch outputs ----

    fn set_active_participants(
        &mut self,
        epoch_index: u64,
        participants: Vec<ActiveParticipant>,
    ) -> Result<(), TesseraError>;

    fn get_active_participants(
        &self,
        epoch_index: u64,
    ) -> Result<Option<Vec<ActiveParticipant>>, TesseraError>;

    /// Current unit-of-compute price proposals, keyed by participant address.
    fn get_price_proposals(&self) -> Result<BTreeMap<String, u64>, TesseraError>;

    fn set_epoch_group_pricing_and_params(
        &mut self,
        poc_start_height: i64,
        unit_of_compute_price: u64,
        validation: ValidationParams,
    ) -> Result<(), TesseraError>;

    fn get_epoch_pricing(&self, poc_start_height: i64)
        -> Result<Option<EpochPricing>, TesseraError>;
}
