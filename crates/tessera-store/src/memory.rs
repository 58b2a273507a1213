// crates/tessera-store/src/memory.rs
//
// In-memory ledger backed by an ordered key-value map.
//
// Key format:
//   - `participant:{address}`              -> ParticipantRecord
//   - `epoch:{index:020}`                  -> EpochRecord
//   - `effective_epoch`                    -> u64
//   - `batches:{height}:{address}`         -> [ProofBatch]
//   - `validations:{height}:{participant}` -> [PeerValidation]
//   - `seed:{height}:{address}`            -> RandomSeed
//   - `summary:{address}:{height:020}`     -> EpochPerformanceSummary
//   - `active:{epoch:020}`                 -> [ActiveParticipant]
//   - `price_proposal:{address}`           -> u64
//   - `pricing:{height}`                   -> EpochPricing
//   - `governance:*`                       -> governance parameters
//   - `balance:{address}`, `escrow:minted` -> u64
//
// Values are stored as JSON values, so iteration order is the key order and
// a snapshot is a plain JSON object.

use std::collections::{BTreeMap, BTreeSet};

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tessera_core::{
    ActiveParticipant, EpochPerformanceSummary, EpochPricing, EpochRecord, GenesisBiasParams,
    Ledger, ParticipantRecord, PeerValidation, ProofBatch, RandomSeed, TesseraError,
    ValidationParams, WorkloadType,
};

const EFFECTIVE_EPOCH_KEY: &str = "effective_epoch";
const MINTED_KEY: &str = "escrow:minted";
const WORKLOAD_TYPES_KEY: &str = "governance:workload_types";
const MAX_POWER_FRACTION_KEY: &str = "governance:max_power_fraction";
const GENESIS_BIAS_KEY: &str = "governance:genesis_bias";

/// Ordered in-memory implementation of `Ledger`.
///
/// Fault injection (`fail_writes`, `fail_transfers_to`) is not part of a
/// snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: BTreeMap<String, Value>,
    fail_writes: bool,
    failing_transfers: BTreeSet<String>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    // ---- Key builders ----

    fn participant_key(address: &str) -> String {
        format!("participant:{}", address)
    }

    fn epoch_key(index: u64) -> String {
        format!("epoch:{:020}", index)
    }

    fn batches_prefix(height: i64) -> String {
        format!("batches:{}:", height)
    }

    fn validations_prefix(height: i64) -> String {
        format!("validations:{}:", height)
    }

    fn seed_key(height: i64, address: &str) -> String {
        format!("seed:{}:{}", height, address)
    }

    fn summary_prefix(address: &str) -> String {
        format!("summary:{}:", address)
    }

    fn active_key(epoch_index: u64) -> String {
        format!("active:{:020}", epoch_index)
    }

    fn price_proposal_key(address: &str) -> String {
        format!("price_proposal:{}", address)
    }

    fn pricing_key(height: i64) -> String {
        format!("pricing:{}", height)
    }

    fn balance_key(address: &str) -> String {
        format!("balance:{}", address)
    }

    // ---- Raw access ----

    fn put<T: Serialize>(&mut self, key: String, value: &T) -> Result<(), TesseraError> {
        if self.fail_writes {
            return Err(TesseraError::Storage(format!("write to {} rejected", key)));
        }
        let value = serde_json::to_value(value)?;
        self.entries.insert(key, value);
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TesseraError> {
        match self.entries.get(key) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    fn delete_prefix(&mut self, prefix: &str) -> Result<usize, TesseraError> {
        if self.fail_writes {
            return Err(TesseraError::Storage(format!("delete of {} rejected", prefix)));
        }
        let keys: Vec<String> = self.scan_keys(prefix).cloned().collect();
        for key in &keys {
            self.entries.remove(key);
        }
        Ok(keys.len())
    }

    fn scan_keys<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = &'a String> + 'a {
        self.entries
            .range(prefix.to_string()..)
            .map(|(k, _)| k)
            .take_while(move |k| k.starts_with(prefix))
    }

    /// Deserialize every value under `prefix`, keyed by the key suffix.
    fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<BTreeMap<String, T>, TesseraError> {
        let mut out = BTreeMap::new();
        for key in self.scan_keys(prefix) {
            if let Some(value) = self.get::<T>(key)? {
                out.insert(key[prefix.len()..].to_string(), value);
            }
        }
        Ok(out)
    }

    // ---- Host-side writers ----

    /// Record a proof batch under its participant and epoch.
    pub fn add_proof_batch(&mut self, batch: ProofBatch) -> Result<(), TesseraError> {
        let key = format!(
            "{}{}",
            Self::batches_prefix(batch.poc_start_height),
            batch.participant
        );
        let mut batches: Vec<ProofBatch> = self.get(&key)?.unwrap_or_default();
        batches.push(batch);
        self.put(key, &batches)
    }

    /// Record a peer validation under the validated participant and epoch.
    pub fn add_peer_validation(&mut self, validation: PeerValidation) -> Result<(), TesseraError> {
        let key = format!(
            "{}{}",
            Self::validations_prefix(validation.poc_start_height),
            validation.participant
        );
        let mut validations: Vec<PeerValidation> = self.get(&key)?.unwrap_or_default();
        validations.push(validation);
        self.put(key, &validations)
    }

    pub fn set_random_seed(&mut self, seed: RandomSeed) -> Result<(), TesseraError> {
        let key = Self::seed_key(seed.poc_start_height, &seed.participant);
        self.put(key, &seed)
    }

    pub fn set_governance_workload_types(
        &mut self,
        workload_types: Vec<WorkloadType>,
    ) -> Result<(), TesseraError> {
        self.put(WORKLOAD_TYPES_KEY.to_string(), &workload_types)
    }

    pub fn set_max_individual_power_fraction(
        &mut self,
        fraction: Option<Decimal>,
    ) -> Result<(), TesseraError> {
        self.put(MAX_POWER_FRACTION_KEY.to_string(), &fraction)
    }

    pub fn set_genesis_bias_params(&mut self, params: GenesisBiasParams) -> Result<(), TesseraError> {
        self.put(GENESIS_BIAS_KEY.to_string(), &params)
    }

    pub fn set_price_proposal(&mut self, address: &str, price: u64) -> Result<(), TesseraError> {
        self.put(Self::price_proposal_key(address), &price)
    }

    // ---- Inspection ----

    /// Coins transferred to `address` so far.
    pub fn balance(&self, address: &str) -> u64 {
        self.get(&Self::balance_key(address))
            .ok()
            .flatten()
            .unwrap_or(0)
    }

    /// Total coins minted so far.
    pub fn minted(&self) -> u64 {
        self.get(MINTED_KEY).ok().flatten().unwrap_or(0)
    }

    /// Number of stored entries whose key starts with `prefix`.
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.scan_keys(prefix).count()
    }

    // ---- Fault injection ----

    /// Make every subsequent write fail with `TesseraError::Storage`.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    /// Make transfers to `address` fail with `TesseraError::Transfer`.
    pub fn fail_transfers_to(&mut self, address: &str) {
        self.failing_transfers.insert(address.to_string());
    }

    // ---- Snapshots ----

    /// Serialize the whole ledger state. Equal states give identical strings.
    pub fn to_json(&self) -> Result<String, TesseraError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }

    /// Restore a ledger from a `to_json` snapshot.
    pub fn from_json(json: &str) -> Result<Self, TesseraError> {
        let entries: BTreeMap<String, Value> = serde_json::from_str(json)?;
        tracing::debug!("Restored ledger snapshot with {} entries", entries.len());
        Ok(Self {
            entries,
            ..Self::default()
        })
    }
}

impl Ledger for MemoryLedger {
    fn get_participant(&self, address: &str) -> Result<Option<ParticipantRecord>, TesseraError> {
        self.get(&Self::participant_key(address))
    }

    fn set_participant(&mut self, record: ParticipantRecord) -> Result<(), TesseraError> {
        let key = Self::participant_key(&record.address);
        self.put(key, &record)
    }

    fn all_participants(&self) -> Result<Vec<ParticipantRecord>, TesseraError> {
        Ok(self
            .scan::<ParticipantRecord>("participant:")?
            .into_values()
            .collect())
    }

    fn get_epoch_record(&self, index: u64) -> Result<Option<EpochRecord>, TesseraError> {
        self.get(&Self::epoch_key(index))
    }

    fn set_epoch_record(&mut self, record: EpochRecord) -> Result<(), TesseraError> {
        self.put(Self::epoch_key(record.index), &record)
    }

    fn get_effective_epoch_index(&self) -> Result<Option<u64>, TesseraError> {
        self.get(EFFECTIVE_EPOCH_KEY)
    }

    fn set_effective_epoch_index(&mut self, index: u64) -> Result<(), TesseraError> {
        self.put(EFFECTIVE_EPOCH_KEY.to_string(), &index)
    }

    fn get_proof_batches(
        &self,
        poc_start_height: i64,
    ) -> Result<BTreeMap<String, Vec<ProofBatch>>, TesseraError> {
        self.scan(&Self::batches_prefix(poc_start_height))
    }

    fn get_peer_validations(
        &self,
        poc_start_height: i64,
    ) -> Result<BTreeMap<String, Vec<PeerValidation>>, TesseraError> {
        self.scan(&Self::validations_prefix(poc_start_height))
    }

    fn get_random_seed(
        &self,
        poc_start_height: i64,
        address: &str,
    ) -> Result<Option<RandomSeed>, TesseraError> {
        self.get(&Self::seed_key(poc_start_height, address))
    }

    fn prune_poc_data(&mut self, poc_start_height: i64) -> Result<(), TesseraError> {
        let batches = self.delete_prefix(&Self::batches_prefix(poc_start_height))?;
        let validations = self.delete_prefix(&Self::validations_prefix(poc_start_height))?;
        tracing::debug!(
            "Pruned PoC data at {}: {} batch entries, {} validation entries",
            poc_start_height,
            batches,
            validations
        );
        Ok(())
    }

    fn get_governance_workload_types_sorted(&self) -> Result<Vec<WorkloadType>, TesseraError> {
        Ok(self.get(WORKLOAD_TYPES_KEY)?.unwrap_or_default())
    }

    fn get_max_individual_power_fraction(&self) -> Result<Option<Decimal>, TesseraError> {
        Ok(self.get::<Option<Decimal>>(MAX_POWER_FRACTION_KEY)?.flatten())
    }

    fn get_genesis_bias_params(&self) -> Result<GenesisBiasParams, TesseraError> {
        Ok(self.get(GENESIS_BIAS_KEY)?.unwrap_or_default())
    }

    fn get_performance_summaries(
        &self,
        address: &str,
    ) -> Result<Vec<EpochPerformanceSummary>, TesseraError> {
        Ok(self
            .scan::<EpochPerformanceSummary>(&Self::summary_prefix(address))?
            .into_values()
            .collect())
    }

    fn append_performance_summary(
        &mut self,
        summary: EpochPerformanceSummary,
    ) -> Result<(), TesseraError> {
        let key = format!(
            "{}{:020}",
            Self::summary_prefix(&summary.participant),
            summary.epoch_start_height
        );
        if self.entries.contains_key(&key) {
            return Err(TesseraError::InvalidState(format!(
                "performance summary for {} at {} already recorded",
                summary.participant, summary.epoch_start_height
            )));
        }
        self.put(key, &summary)
    }

    fn transfer_from_escrow(&mut self, address: &str, amount: u64) -> Result<(), TesseraError> {
        if self.failing_transfers.contains(address) {
            return Err(TesseraError::Transfer(format!(
                "transfer of {} to {} rejected",
                amount, address
            )));
        }
        let balance = self.balance(address).checked_add(amount).ok_or_else(|| {
            TesseraError::Transfer(format!("balance overflow for {}", address))
        })?;
        self.put(Self::balance_key(address), &balance)
    }

    fn mint(&mut self, amount: u64) -> Result<(), TesseraError> {
        let minted = self
            .minted()
            .checked_add(amount)
            .ok_or_else(|| TesseraError::Transfer("mint overflow".to_string()))?;
        self.put(MINTED_KEY.to_string(), &minted)
    }

    fn set_active_participants(
        &mut self,
        epoch_index: u64,
        participants: Vec<ActiveParticipant>,
    ) -> Result<(), TesseraError> {
        self.put(Self::active_key(epoch_index), &participants)
    }

    fn get_active_participants(
        &self,
        epoch_index: u64,
    ) -> Result<Option<Vec<ActiveParticipant>>, TesseraError> {
        self.get(&Self::active_key(epoch_index))
    }

    fn get_price_proposals(&self) -> Result<BTreeMap<String, u64>, TesseraError> {
        self.scan("price_proposal:")
    }

    fn set_epoch_group_pricing_and_params(
        &mut self,
        poc_start_height: i64,
        unit_of_compute_price: u64,
        validation: ValidationParams,
    ) -> Result<(), TesseraError> {
        let pricing = EpochPricing {
            poc_start_height,
            unit_of_compute_price,
            validation,
        };
        self.put(Self::pricing_key(poc_start_height), &pricing)
    }

    fn get_epoch_pricing(
        &self,
        poc_start_height: i64,
    ) -> Result<Option<EpochPricing>, TesseraError> {
        self.get(&Self::pricing_key(poc_start_height))
    }
}
