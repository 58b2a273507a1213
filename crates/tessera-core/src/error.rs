// crates/tessera-core/src/error.rs

use thiserror::Error;

/// Engine-wide error types for Tessera.
///
/// These are host-level failures: any of them aborts the current epoch
/// boundary step and is propagated to the block executor. Per-participant
/// problems (negative balances, missing seeds) are never reported through
/// this type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TesseraError {
    /// Ledger read/write failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Required ledger entry is absent.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Protocol parameters failed validation.
    #[error("Invalid params: {0}")]
    InvalidParams(String),

    /// Invalid state transition (e.g. pipeline used before genesis).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Escrow transfer or mint failure.
    #[error("Transfer error: {0}")]
    Transfer(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file could not be read or parsed.
    #[error("Config error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for TesseraError {
    fn from(e: serde_json::Error) -> Self {
        TesseraError::Serialization(e.to_string())
    }
}
