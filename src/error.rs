// Error types for the ledger

use crate::consensus::ValidationError;
use crate::core::Hash256;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Malformed key, signature or message material
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// An input points at a transaction that is not on the chain
    #[error("Referenced transaction not found: {0}")]
    ReferencedTxNotFound(Hash256),

    /// A transaction failed verification; the batch was rejected
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(Hash256),

    /// Two transactions on the chain share an id
    #[error("Duplicate transaction id: {0}")]
    DuplicateTransaction(Hash256),

    /// A sum of output values does not fit in a u64
    #[error("Value overflow")]
    ValueOverflow,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("Blockchain already exists")]
    AlreadyExists,

    #[error("No existing blockchain found, create one first")]
    NotFound,

    #[error("Nonce space exhausted without meeting the target")]
    NonceExhausted,

    /// The tip or a prev_hash link names a block the store does not have
    #[error("Block not found in store: {0}")]
    MissingBlock(Hash256),

    #[error("Invalid block: {0}")]
    InvalidBlock(#[from] ValidationError),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<secp256k1::Error> for LedgerError {
    fn from(err: secp256k1::Error) -> Self {
        LedgerError::Crypto(err.to_string())
    }
}
