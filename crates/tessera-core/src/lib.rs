// crates/tessera-core/src/lib.rs
//
// tessera-core: Core types, protocol parameters, and the host ledger interface
// for the Tessera epoch-settlement engine.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the canonical data structures, the error type, and the `Ledger`
// trait through which every epoch transition reads and writes host state.

pub mod active;
pub mod epoch;
pub mod error;
pub mod params;
pub mod participant;
pub mod poc;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use tessera_core::ActiveParticipant;`

// Active participant (validator set) types
pub use active::{ActiveParticipant, NodeAllocation, NodeGroup, TimeslotAllocation, WorkloadType};

// Epoch types
pub use epoch::{EpochPerformanceSummary, EpochPricing, EpochRecord};

// Participant types
pub use participant::{EpochStats, HardwareNode, ParticipantRecord, ParticipantStatus};

// Proof-of-compute submissions
pub use poc::{PeerValidation, ProofBatch, RandomSeed};

// Parameters
pub use params::{
    EpochParams, GenesisBiasParams, PricingParams, ProtocolParams, PruningParams, RewardParams,
    ValidationParams,
};

// Error type
pub use error::TesseraError;

// Traits
pub use traits::Ledger;

// Decimal type used for every fractional protocol quantity.
pub use rust_decimal::Decimal;
