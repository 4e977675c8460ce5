// Block data structures

use crate::core::{Hash256, sha256, Transaction, Serializable};
use crate::error::Result;
use std::io::{Write, Cursor};
use super::serialize::{write_varint, read_array, read_count};

/// Block - a batch of transactions linked to its predecessor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Proof-of-work hash, zero until mined
    pub hash: Hash256,
    /// Transactions in this block
    pub transactions: Vec<Transaction>,
    /// Hash of the previous block, zero for genesis
    pub prev_hash: Hash256,
    /// Proof-of-work witness
    pub nonce: u64,
}

impl Block {
    /// Create an unmined block
    pub fn new(transactions: Vec<Transaction>, prev_hash: Hash256) -> Self {
        Self {
            hash: Hash256::zero(),
            transactions,
            prev_hash,
            nonce: 0,
        }
    }

    /// Merkle root over the transaction ids
    pub fn hash_transactions(&self) -> Hash256 {
        Self::calculate_merkle_root(&self.transactions)
    }

    /// Calculate Merkle root from transactions
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Hash256 {
        if transactions.is_empty() {
            return Hash256::zero();
        }

        let mut hashes: Vec<Hash256> = transactions.iter().map(|tx| tx.id).collect();

        while hashes.len() > 1 {
            let mut next_level = Vec::with_capacity(hashes.len().div_ceil(2));

            for chunk in hashes.chunks(2) {
                let left = chunk[0];
                // Odd level: pair the last hash with itself
                let right = if chunk.len() == 2 { chunk[1] } else { chunk[0] };

                let mut combined = Vec::with_capacity(64);
                combined.extend_from_slice(left.as_bytes());
                combined.extend_from_slice(right.as_bytes());
                next_level.push(sha256(&combined));
            }

            hashes = next_level;
        }

        hashes[0]
    }

    /// Check if this is the genesis block
    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_zero()
    }
}

impl Serializable for Block {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.write_all(self.hash.as_bytes()).unwrap();
        buf.write_all(self.prev_hash.as_bytes()).unwrap();
        buf.write_all(&self.nonce.to_le_bytes()).unwrap();

        write_varint(&mut buf, self.transactions.len() as u64).unwrap();
        for tx in &self.transactions {
            buf.write_all(&tx.serialize()).unwrap();
        }

        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);

        let hash = Hash256::new(read_array(&mut cursor)?);
        let prev_hash = Hash256::new(read_array(&mut cursor)?);
        let nonce = u64::from_le_bytes(read_array(&mut cursor)?);

        let tx_count = read_count(&mut cursor, data.len())?;
        let mut transactions = Vec::with_capacity(tx_count);
        for _ in 0..tx_count {
            transactions.push(Transaction::from_reader(&mut cursor, data.len())?);
        }

        Ok(Self {
            hash,
            transactions,
            prev_hash,
            nonce,
        })
    }
}
