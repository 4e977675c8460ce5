// Block validation

use crate::core::Block;
use crate::consensus::pow::ProofOfWork;
use thiserror::Error;

/// Structural and proof-of-work failures of a single block
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Block hash doesn't re-derive or doesn't meet the PoW target
    #[error("Invalid proof of work")]
    InvalidProofOfWork,
    /// Block stored under a hash that differs from its own
    #[error("Block does not link to the expected hash")]
    BrokenLink,
    /// Block has no transactions
    #[error("Block has no transactions")]
    NoTransactions,
    /// Coinbase transaction in non-first position
    #[error("Coinbase not in first position")]
    CoinbaseNotFirst,
    /// Transaction has no inputs or outputs
    #[error("Empty transaction")]
    EmptyTransaction,
    /// Stored transaction id doesn't match its contents
    #[error("Transaction id mismatch")]
    TransactionIdMismatch,
    /// Genesis block must hold exactly one coinbase transaction
    #[error("Genesis block must contain a single coinbase")]
    InvalidGenesis,
}

/// Block validator
pub struct BlockValidator {
    pow: ProofOfWork,
}

impl BlockValidator {
    pub fn new(pow: ProofOfWork) -> Self {
        Self { pow }
    }

    /// Validate a complete block
    pub fn validate_block(&self, block: &Block) -> Result<(), ValidationError> {
        // Must have at least one transaction
        if block.transactions.is_empty() {
            return Err(ValidationError::NoTransactions);
        }

        if block.is_genesis()
            && (block.transactions.len() != 1 || !block.transactions[0].is_coinbase())
        {
            return Err(ValidationError::InvalidGenesis);
        }

        // Only first transaction can be coinbase
        if block.transactions.iter().skip(1).any(|tx| tx.is_coinbase()) {
            return Err(ValidationError::CoinbaseNotFirst);
        }

        for tx in &block.transactions {
            if tx.inputs.is_empty() || tx.outputs.is_empty() {
                return Err(ValidationError::EmptyTransaction);
            }
            if tx.id != tx.compute_id() {
                return Err(ValidationError::TransactionIdMismatch);
            }
        }

        if !self.pow.validate(block) {
            return Err(ValidationError::InvalidProofOfWork);
        }

        Ok(())
    }
}
