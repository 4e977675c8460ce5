// Base58Check addresses

use crate::core::{checksum, PubKeyHash, CHECKSUM_LENGTH};
use crate::error::{LedgerError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version byte prefixed to every address payload
pub const ADDRESS_VERSION: u8 = 0x00;

const PAYLOAD_LENGTH: usize = 1 + 20 + CHECKSUM_LENGTH;

/// Address: Base58(version || pubkey hash || checksum)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn from_pubkey_hash(hash: &PubKeyHash) -> Self {
        let mut payload = Vec::with_capacity(PAYLOAD_LENGTH);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(hash.as_bytes());
        let check = checksum(&payload);
        payload.extend_from_slice(&check);

        Self(bs58::encode(payload).into_string())
    }

    /// Parse and validate an address string
    pub fn parse(s: &str) -> Result<Self> {
        let address = Self(s.to_string());
        address.to_pubkey_hash()?;
        Ok(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode back to the public key hash, checking length, version
    /// and checksum
    pub fn to_pubkey_hash(&self) -> Result<PubKeyHash> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| LedgerError::InvalidAddress(format!("{}: {}", self.0, e)))?;

        if bytes.len() != PAYLOAD_LENGTH {
            return Err(LedgerError::InvalidAddress(format!(
                "{}: decoded length {}",
                self.0,
                bytes.len()
            )));
        }

        let (payload, check) = bytes.split_at(PAYLOAD_LENGTH - CHECKSUM_LENGTH);
        if checksum(payload)[..] != *check {
            return Err(LedgerError::InvalidAddress(format!("{}: bad checksum", self.0)));
        }
        if payload[0] != ADDRESS_VERSION {
            return Err(LedgerError::InvalidAddress(format!(
                "{}: unknown version {:#04x}",
                self.0, payload[0]
            )));
        }

        PubKeyHash::from_slice(&payload[1..])
    }

    pub fn validate(&self) -> bool {
        self.to_pubkey_hash().is_ok()
    }
}

impl FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
