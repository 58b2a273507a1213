// crates/tessera-store/src/lib.rs
//
// tessera-store: ledger backends for the Tessera epoch engine.
//
// Provides `MemoryLedger`, an ordered key-value implementation of the
// `Ledger` trait used by tests, simulations and replay tooling. Its whole
// state can be snapshotted to JSON and restored byte-for-byte.

pub mod memory;

pub use memory::MemoryLedger;
