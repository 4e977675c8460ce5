// Basic types for the ledger

use crate::error::{LedgerError, Result};
use std::fmt;

/// 256-bit hash type (32 bytes)
/// Used for block hashes, transaction IDs, and Merkle roots.
/// The all-zero value stands for "empty": the genesis block's prev_hash
/// and a coinbase input's referenced transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// Create a new Hash256 from a byte array
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a Hash256 from a slice
    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; 32] = slice.try_into().map_err(|_| {
            LedgerError::Decode(format!("Invalid hash length: expected 32, got {}", slice.len()))
        })?;
        Ok(Self(bytes))
    }

    /// Get the hash as a byte slice
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Create zero hash
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| LedgerError::Decode(format!("Invalid hex string: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Number of leading zero bits, most significant byte first
    pub fn leading_zero_bits(&self) -> u32 {
        let mut zeros = 0;
        for byte in &self.0 {
            if *byte == 0 {
                zeros += 8;
            } else {
                zeros += byte.leading_zeros();
                break;
            }
        }
        zeros
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// RIPEMD160(SHA256(pubkey)) - the owner tag carried by every output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PubKeyHash(pub [u8; 20]);

impl PubKeyHash {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(slice: &[u8]) -> Result<Self> {
        let bytes: [u8; 20] = slice.try_into().map_err(|_| {
            LedgerError::Decode(format!("Invalid pubkey hash length: expected 20, got {}", slice.len()))
        })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for PubKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash256_creation() {
        let hash = Hash256::new([1u8; 32]);
        assert_eq!(hash.as_bytes(), &[1u8; 32]);
        assert!(!hash.is_zero());
        assert!(Hash256::zero().is_zero());
    }

    #[test]
    fn test_hash256_hex() {
        let hash = Hash256::new([0x12, 0x34, 0x56, 0x78, 0x9a, 0xbc, 0xde, 0xf0,
                                 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88,
                                 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x00,
                                 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08]);
        let hex = hash.to_hex();
        assert!(hex.starts_with("12345678"));
        assert_eq!(Hash256::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_from_slice_rejects_wrong_length() {
        assert!(Hash256::from_slice(&[0u8; 31]).is_err());
        assert!(PubKeyHash::from_slice(&[0u8; 32]).is_err());
        assert!(PubKeyHash::from_slice(&[7u8; 20]).is_ok());
    }

    #[test]
    fn test_leading_zero_bits() {
        assert_eq!(Hash256::zero().leading_zero_bits(), 256);

        let mut bytes = [0xffu8; 32];
        bytes[0] = 0;
        bytes[1] = 0x0f;
        assert_eq!(Hash256::new(bytes).leading_zero_bits(), 12);
    }
}
