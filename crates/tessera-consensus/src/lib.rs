// crates/tessera-consensus/src/lib.rs
//
// tessera-consensus: the validator-weighting half of an epoch transition.
//
// Converts proof-of-compute submissions into the next validator set: the
// phase clock decides when a boundary fires, the aggregator turns proof
// batches and peer votes into weights, the genesis bias and power cap adjust
// those weights, and the assigner partitions each participant's hardware
// nodes across workload types.

pub mod assignment;
pub mod capping;
pub mod epoch;
pub mod genesis;
pub mod weights;

pub use assignment::{assign_workloads, WorkloadAssigner};
pub use capping::{apply_power_capping, checked_total_power, validate_capping, CappingResult};
pub use epoch::{EpochContext, EpochPhase, EpochStages, ExchangeWindow};
pub use genesis::{apply_genesis_bias, validate_bias, BiasResult};
pub use weights::{AggregationReport, SkipReason, SkippedParticipant, WeightAggregator};
