// Proof-of-work ledger with a UTXO model

pub mod chain;
pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod error;
pub mod storage;
pub mod wallet;

// Re-exports for convenience
pub use chain::{Blockchain, ChainIter, ChainView, OutPoint, Utxo, UtxoSet};
pub use cli::{Cli, CliHandler, Commands};
pub use config::ChainConfig;
pub use consensus::{BlockValidator, ProofOfWork, Target, ValidationError};
pub use crate::core::{Block, Hash256, PubKeyHash, Transaction, TxInput, TxOutput, TxResolver};
pub use error::{LedgerError, Result};
pub use storage::BlockchainDB;
pub use wallet::{Address, KeyPair, Keystore, TransactionBuilder};
