// crates/tessera-economics/src/lib.rs
//
// tessera-economics: emission, settlement, and pricing for the Tessera
// epoch engine.
//
// Once per epoch the settlement engine converts accumulated work and refund
// balances into escrow transfers and mints the epoch reward under a halving
// schedule. The price resolver fixes the next unit-of-compute price from
// participant proposals.

pub mod emission;
pub mod pricing;
pub mod settlement;

pub use emission::reward_pool_at;
pub use pricing::{resolve_epoch_price, resolve_price};
pub use settlement::{
    compute_settle_amounts, settle_accounts, SettleAmount, SettleError, SettlementReport,
    SettlementTotals,
};
