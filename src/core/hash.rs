// Hashing primitives

use sha2::{Sha256, Digest};
use ripemd::Ripemd160;
use crate::core::{Hash256, PubKeyHash};

/// Length of the address checksum suffix
pub const CHECKSUM_LENGTH: usize = 4;

/// Single SHA256 hash - transaction ids, block hashes and PoW
pub fn sha256(data: &[u8]) -> Hash256 {
    Hash256::new(Sha256::digest(data).into())
}

/// SHA256(SHA256(data))
pub fn double_sha256(data: &[u8]) -> Hash256 {
    let first_hash = Sha256::digest(data);
    Hash256::new(Sha256::digest(first_hash).into())
}

/// RIPEMD160(SHA256(data)) - fingerprint of a public key
pub fn hash160(data: &[u8]) -> PubKeyHash {
    let sha = Sha256::digest(data);
    PubKeyHash::new(Ripemd160::digest(sha).into())
}

/// First 4 bytes of the double SHA256, appended to addresses
pub fn checksum(payload: &[u8]) -> [u8; CHECKSUM_LENGTH] {
    let hash = double_sha256(payload);
    let mut result = [0u8; CHECKSUM_LENGTH];
    result.copy_from_slice(&hash.as_bytes()[..CHECKSUM_LENGTH]);
    result
}
