//! Error types for ledger validation

use thiserror::Error;

use crate::codec::CodecError;
use crate::fx::FxError;
use crate::storage::StorageError;
use crate::types::{TxId, UtxoId};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Invalid genesis: {0}")]
    InvalidGenesis(String),

    #[error("Fx initialization failed: {0}")]
    FxInitialization(String),

    #[error("Invalid extension: {0}")]
    InvalidExtension(String),

    #[error("UTXO not found: {0}")]
    MissingUtxo(UtxoId),

    #[error("Verification failed: {0}")]
    Verification(#[from] FxError),

    #[error("Transaction already accepted: {0}")]
    DuplicateTx(TxId),

    #[error("Invalid transaction: {0}")]
    InvalidTx(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Engine is not initialized")]
    NotInitialized,

    #[error("Engine is already initialized")]
    AlreadyInitialized,

    #[error("Engine is shut down")]
    EngineShutdown,
}

pub type Result<T> = std::result::Result<T, LedgerError>;
