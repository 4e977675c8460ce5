// Proof of Work implementation

use crate::core::{Block, Hash256, Transaction, sha256};
use crate::error::{LedgerError, Result};
use std::time::{Duration, Instant};

/// Difficulty target: a qualifying hash, read as a big-endian 256-bit
/// integer, is below 2^(256 - difficulty_bits).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub difficulty_bits: u32,
}

impl Target {
    pub fn new(difficulty_bits: u32) -> Result<Self> {
        if !(1..=255).contains(&difficulty_bits) {
            return Err(LedgerError::Config(format!(
                "difficulty_bits must be in 1..=255, got {}",
                difficulty_bits
            )));
        }
        Ok(Self { difficulty_bits })
    }

    /// The target as a big-endian 256-bit value with a single set bit
    pub fn to_hash256(&self) -> Hash256 {
        let shift = (256 - self.difficulty_bits) as usize;
        let mut target = [0u8; 32];
        target[31 - shift / 8] = 1 << (shift % 8);
        Hash256::new(target)
    }

    /// Check if a hash meets this target (hash < target)
    pub fn is_valid_hash(&self, hash: &Hash256) -> bool {
        hash.as_bytes() < self.to_hash256().as_bytes()
    }

    /// Count leading zero bits in target
    pub fn leading_zeros(&self) -> u32 {
        self.to_hash256().leading_zero_bits()
    }
}

/// Nonce search over a block's transactions and predecessor
#[derive(Debug, Clone)]
pub struct ProofOfWork {
    pub target: Target,
    /// Cached target hash for fast comparison
    target_hash: Hash256,
}

impl ProofOfWork {
    /// Create an engine with a fixed difficulty
    pub fn new(difficulty_bits: u32) -> Result<Self> {
        let target = Target::new(difficulty_bits)?;
        Ok(Self {
            target,
            target_hash: target.to_hash256(),
        })
    }

    /// merkle_root || prev_hash, the nonce-independent part of the pre-image
    fn header_prefix(block: &Block) -> Vec<u8> {
        let mut data = Vec::with_capacity(80);
        data.extend_from_slice(block.hash_transactions().as_bytes());
        data.extend_from_slice(block.prev_hash.as_bytes());
        data
    }

    fn hash_with_nonce(&self, prefix: &[u8], nonce: u64) -> Hash256 {
        let mut data = Vec::with_capacity(prefix.len() + 16);
        data.extend_from_slice(prefix);
        data.extend_from_slice(&nonce.to_be_bytes());
        data.extend_from_slice(&(self.target.difficulty_bits as u64).to_be_bytes());
        sha256(&data)
    }

    /// PoW pre-image for `block` at `nonce`
    pub fn prepare_data(&self, block: &Block, nonce: u64) -> Vec<u8> {
        let mut data = Self::header_prefix(block);
        data.extend_from_slice(&nonce.to_be_bytes());
        data.extend_from_slice(&(self.target.difficulty_bits as u64).to_be_bytes());
        data
    }

    /// Find the first nonce, counting from zero, whose hash meets the target
    pub fn mine(&self, block: &Block) -> Result<MiningResult> {
        let start_time = Instant::now();
        let prefix = Self::header_prefix(block);
        let mut attempts = 0u64;

        for nonce in 0..=u64::MAX {
            let hash = self.hash_with_nonce(&prefix, nonce);
            attempts += 1;

            if hash.as_bytes() < self.target_hash.as_bytes() {
                return Ok(MiningResult {
                    nonce,
                    hash,
                    attempts,
                    duration: start_time.elapsed(),
                });
            }

            if attempts % 100_000 == 0 {
                let elapsed = start_time.elapsed();
                log::debug!("Mining attempts: {} ({:.1} KH/s)",
                    attempts,
                    attempts as f64 / elapsed.as_secs_f64() / 1000.0
                );
            }
        }

        Err(LedgerError::NonceExhausted)
    }

    /// Assemble and mine a block on top of `prev_hash`
    pub fn mine_block(&self, transactions: Vec<Transaction>, prev_hash: Hash256) -> Result<Block> {
        let mut block = Block::new(transactions, prev_hash);
        let result = self.mine(&block)?;

        log::debug!("Mined block {} after {} attempts in {:?} ({:.0} H/s)",
            result.hash, result.attempts, result.duration, result.hash_rate());

        block.nonce = result.nonce;
        block.hash = result.hash;
        Ok(block)
    }

    /// Recompute the hash from the stored nonce: it must match the stored
    /// hash and meet the target.
    pub fn validate(&self, block: &Block) -> bool {
        let hash = sha256(&self.prepare_data(block, block.nonce));
        hash == block.hash && self.target.is_valid_hash(&hash)
    }
}

/// Mining result
#[derive(Debug)]
pub struct MiningResult {
    /// The nonce that was found
    pub nonce: u64,
    /// The resulting hash
    pub hash: Hash256,
    /// Number of attempts
    pub attempts: u64,
    /// Time taken
    pub duration: Duration,
}

impl MiningResult {
    /// Calculate hash rate (hashes per second)
    pub fn hash_rate(&self) -> f64 {
        self.attempts as f64 / self.duration.as_secs_f64().max(f64::EPSILON)
    }
}
