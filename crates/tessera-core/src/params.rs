// crates/tessera-core/src/params.rs
//
// Protocol parameters for the Tessera epoch engine.
//
// Static parameters (epoch timing, validation, rewards, pricing, pruning)
// are loaded once from configuration. Governance-mutable values (power cap
// fraction, genesis bias) are read from the ledger at each boundary and are
// only typed here.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::TesseraError;

// ---------------------------------------------------------------------------
// Epoch timing
// ---------------------------------------------------------------------------

/// Durations of the proof-of-compute stages, in blocks before scaling.
///
/// Every duration is multiplied by `epoch_multiplier` to obtain the stage
/// offset relative to the epoch anchor height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochParams {
    /// Blocks between two consecutive PoC start heights.
    #[serde(default = "default_epoch_length")]
    pub epoch_length: i64,
    #[serde(default = "default_epoch_multiplier")]
    pub epoch_multiplier: i64,
    /// Offset applied to relative heights of epoch 0 only.
    #[serde(default)]
    pub epoch_shift: i64,
    #[serde(default = "default_poc_generation_duration")]
    pub poc_generation_duration: i64,
    #[serde(default = "default_poc_generation_winddown")]
    pub poc_generation_winddown: i64,
    #[serde(default = "default_poc_validation_duration")]
    pub poc_validation_duration: i64,
    #[serde(default = "default_poc_validation_winddown")]
    pub poc_validation_winddown: i64,
    #[serde(default = "default_set_new_validators_delay")]
    pub set_new_validators_delay: i64,
    #[serde(default = "default_claim_delay")]
    pub claim_delay: i64,
}

fn default_epoch_length() -> i64 {
    40
}

fn default_epoch_multiplier() -> i64 {
    1
}

fn default_poc_generation_duration() -> i64 {
    8
}

fn default_poc_generation_winddown() -> i64 {
    2
}

fn default_poc_validation_duration() -> i64 {
    4
}

fn default_poc_validation_winddown() -> i64 {
    2
}

fn default_set_new_validators_delay() -> i64 {
    1
}

fn default_claim_delay() -> i64 {
    1
}

impl Default for EpochParams {
    fn default() -> Self {
        Self {
            epoch_length: default_epoch_length(),
            epoch_multiplier: default_epoch_multiplier(),
            epoch_shift: 0,
            poc_generation_duration: default_poc_generation_duration(),
            poc_generation_winddown: default_poc_generation_winddown(),
            poc_validation_duration: default_poc_validation_duration(),
            poc_validation_winddown: default_poc_validation_winddown(),
            set_new_validators_delay: default_set_new_validators_delay(),
            claim_delay: default_claim_delay(),
        }
    }
}

impl EpochParams {
    /// Offset at which PoC generation enters wind-down.
    pub fn generation_winddown_offset(&self) -> i64 {
        self.poc_generation_duration * self.epoch_multiplier
    }

    /// Offset at which generation ends and validation starts.
    pub fn validation_start_offset(&self) -> i64 {
        self.generation_winddown_offset() + self.poc_generation_winddown * self.epoch_multiplier
    }

    pub fn validation_winddown_offset(&self) -> i64 {
        self.validation_start_offset() + self.poc_validation_duration * self.epoch_multiplier
    }

    pub fn validation_end_offset(&self) -> i64 {
        self.validation_winddown_offset() + self.poc_validation_winddown * self.epoch_multiplier
    }

    pub fn set_new_validators_offset(&self) -> i64 {
        self.validation_end_offset() + self.set_new_validators_delay * self.epoch_multiplier
    }

    pub fn claim_money_offset(&self) -> i64 {
        self.set_new_validators_offset() + self.claim_delay * self.epoch_multiplier
    }

    /// Check that every stage has a positive duration, that the derived
    /// offsets are strictly increasing, and that the epoch is long enough to
    /// contain all of them.
    ///
    /// # Errors
    ///
    /// Returns `TesseraError::InvalidParams` naming the first violated rule.
    pub fn validate(&self) -> Result<(), TesseraError> {
        let durations = [
            ("epoch_multiplier", self.epoch_multiplier),
            ("poc_generation_duration", self.poc_generation_duration),
            ("poc_generation_winddown", self.poc_generation_winddown),
            ("poc_validation_duration", self.poc_validation_duration),
            ("poc_validation_winddown", self.poc_validation_winddown),
            ("set_new_validators_delay", self.set_new_validators_delay),
            ("claim_delay", self.claim_delay),
        ];
        for (name, value) in durations {
            if value <= 0 {
                return Err(TesseraError::InvalidParams(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.epoch_shift < 0 {
            return Err(TesseraError::InvalidParams(format!(
                "epoch_shift must not be negative, got {}",
                self.epoch_shift
            )));
        }
        // Epoch 0 hands over at `epoch_length - epoch_shift`, which must be a
        // block after genesis.
        if self.epoch_shift >= self.epoch_length {
            return Err(TesseraError::InvalidParams(format!(
                "epoch_shift {} must be less than epoch_length {}",
                self.epoch_shift, self.epoch_length
            )));
        }

        let offsets = [
            0,
            self.generation_winddown_offset(),
            self.validation_start_offset(),
            self.validation_winddown_offset(),
            self.validation_end_offset(),
            self.set_new_validators_offset(),
        ];
        if offsets.windows(2).any(|w| w[0] >= w[1]) {
            return Err(TesseraError::InvalidParams(format!(
                "stage offsets must be strictly increasing: {:?}",
                offsets
            )));
        }

        let claim = self.claim_money_offset();
        if self.epoch_length <= claim {
            return Err(TesseraError::InvalidParams(format!(
                "epoch_length {} must exceed the claim offset {}",
                self.epoch_length, claim
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation (reputation) parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationParams {
    /// Epochs of clean history needed to reach maximum reputation.
    #[serde(default = "default_epochs_to_max")]
    pub epochs_to_max: i64,
    /// Miss fraction at or below which an epoch costs nothing.
    #[serde(default = "default_miss_percentage_cutoff")]
    pub miss_percentage_cutoff: Decimal,
    #[serde(default = "default_miss_requests_penalty")]
    pub miss_requests_penalty: Decimal,
}

fn default_epochs_to_max() -> i64 {
    30
}

fn default_miss_percentage_cutoff() -> Decimal {
    Decimal::new(1, 2)
}

fn default_miss_requests_penalty() -> Decimal {
    Decimal::ONE
}

impl Default for ValidationParams {
    fn default() -> Self {
        Self {
            epochs_to_max: default_epochs_to_max(),
            miss_percentage_cutoff: default_miss_percentage_cutoff(),
            miss_requests_penalty: default_miss_requests_penalty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Reward parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardParams {
    /// Coins minted per epoch before any halving.
    #[serde(default = "default_base_epoch_reward")]
    pub base_epoch_reward: u64,
    /// Block-height interval between halvings.
    #[serde(default = "default_halving_interval")]
    pub halving_interval: i64,
    /// Reputation gained per successfully rewarded epoch (capped at 1.0).
    #[serde(default = "default_reputation_increment")]
    pub reputation_increment: Decimal,
}

fn default_base_epoch_reward() -> u64 {
    1_048_576
}

fn default_halving_interval() -> i64 {
    100
}

fn default_reputation_increment() -> Decimal {
    Decimal::new(1, 2)
}

impl Default for RewardParams {
    fn default() -> Self {
        Self {
            base_epoch_reward: default_base_epoch_reward(),
            halving_interval: default_halving_interval(),
            reputation_increment: default_reputation_increment(),
        }
    }
}

// ---------------------------------------------------------------------------
// Pricing and pruning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingParams {
    /// Unit-of-compute price used when no previous epoch price exists.
    #[serde(default = "default_unit_of_compute_price")]
    pub default_unit_of_compute_price: u64,
}

fn default_unit_of_compute_price() -> u64 {
    100
}

impl Default for PricingParams {
    fn default() -> Self {
        Self {
            default_unit_of_compute_price: default_unit_of_compute_price(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PruningParams {
    /// Number of epochs PoC batches and peer validations are retained.
    #[serde(default = "default_poc_data_retention_epochs")]
    pub poc_data_retention_epochs: u64,
}

fn default_poc_data_retention_epochs() -> u64 {
    3
}

impl Default for PruningParams {
    fn default() -> Self {
        Self {
            poc_data_retention_epochs: default_poc_data_retention_epochs(),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

/// All static protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProtocolParams {
    #[serde(default)]
    pub epoch: EpochParams,
    #[serde(default)]
    pub validation: ValidationParams,
    #[serde(default)]
    pub rewards: RewardParams,
    #[serde(default)]
    pub pricing: PricingParams,
    #[serde(default)]
    pub pruning: PruningParams,
}

impl ProtocolParams {
    /// Validate every parameter group.
    ///
    /// # Errors
    ///
    /// Returns `TesseraError::InvalidParams` for the first invalid value.
    pub fn validate(&self) -> Result<(), TesseraError> {
        self.epoch.validate()?;
        if self.validation.epochs_to_max <= 0 {
            return Err(TesseraError::InvalidParams(
                "epochs_to_max must be positive".to_string(),
            ));
        }
        if self.validation.miss_percentage_cutoff < Decimal::ZERO
            || self.validation.miss_percentage_cutoff > Decimal::ONE
        {
            return Err(TesseraError::InvalidParams(
                "miss_percentage_cutoff must be within [0, 1]".to_string(),
            ));
        }
        if self.validation.miss_requests_penalty < Decimal::ZERO {
            return Err(TesseraError::InvalidParams(
                "miss_requests_penalty must not be negative".to_string(),
            ));
        }
        if self.rewards.halving_interval <= 0 {
            return Err(TesseraError::InvalidParams(
                "halving_interval must be positive".to_string(),
            ));
        }
        if self.rewards.reputation_increment < Decimal::ZERO {
            return Err(TesseraError::InvalidParams(
                "reputation_increment must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Governance-mutable parameters
// ---------------------------------------------------------------------------

/// Temporary power boost for the bootstrap validator of a young network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GenesisBiasParams {
    pub enabled: bool,
    /// Total network power at or above which the network counts as mature.
    pub threshold_power: i64,
    /// Fraction of the other participants' total given to the genesis validator.
    pub multiplier: Decimal,
    pub first_validator_address: Option<String>,
}
