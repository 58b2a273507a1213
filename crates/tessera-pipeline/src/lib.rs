// crates/tessera-pipeline/src/lib.rs
//
// tessera-pipeline: the per-block epoch transition orchestrator.
//
// The host calls `EpochPipeline::on_block` once per block. At the two epoch
// boundaries it sequences weight aggregation, genesis bias, power capping,
// workload assignment and reputation (end of validation), then settlement,
// pricing and the validator-set switch (set new validators).

pub mod config;
pub mod context;
pub mod events;
pub mod logging;
pub mod pipeline;

pub use config::PipelineConfig;
pub use context::PipelineContext;
pub use events::EpochEvent;
pub use logging::init_tracing;
pub use pipeline::EpochPipeline;
