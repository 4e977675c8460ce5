// Key management

use super::Address;
use crate::core::{hash160, signature, PubKeyHash};
use crate::error::{LedgerError, Result};
use rand::rngs::OsRng;
use secp256k1::{PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Stored form of a key pair
#[derive(Serialize, Deserialize)]
struct StoredKey {
    secret_key: String,
}

/// Key pair
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
    pub address: Address,
}

impl KeyPair {
    /// Generate a new key pair
    pub fn generate() -> Self {
        let secret_key = SecretKey::new(&mut OsRng);
        Self::from_secret_key(secret_key)
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(Self::from_secret_key(signature::secret_key_from_bytes(bytes)?))
    }

    fn from_secret_key(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = secret_key.public_key(&secp);
        let address = Address::from_pubkey_hash(&hash160(&public_key.serialize()));

        Self {
            secret_key,
            public_key,
            address,
        }
    }

    /// Compressed public key bytes
    pub fn pubkey_bytes(&self) -> Vec<u8> {
        self.public_key.serialize().to_vec()
    }

    pub fn pubkey_hash(&self) -> PubKeyHash {
        hash160(&self.pubkey_bytes())
    }
}

/// Keystore - the local wallet file, keyed by address
#[derive(Default)]
pub struct Keystore {
    keys: BTreeMap<Address, KeyPair>,
}

impl Keystore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new address
    pub fn new_address(&mut self) -> Address {
        let keypair = KeyPair::generate();
        let address = keypair.address.clone();
        self.keys.insert(address.clone(), keypair);
        address
    }

    /// Get key pair for address
    pub fn get_keypair(&self, address: &Address) -> Option<&KeyPair> {
        self.keys.get(address)
    }

    /// All addresses, sorted
    pub fn list_addresses(&self) -> Vec<Address> {
        self.keys.keys().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.keys.len()
    }

    /// Save keystore to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let stored: BTreeMap<&Address, StoredKey> = self
            .keys
            .iter()
            .map(|(addr, kp)| {
                let key = StoredKey {
                    secret_key: hex::encode(kp.secret_key.secret_bytes()),
                };
                (addr, key)
            })
            .collect();

        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Load keystore from file. Each entry's address must match its key.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let stored: BTreeMap<Address, StoredKey> = serde_json::from_str(&json)?;

        let mut keys = BTreeMap::new();
        for (addr, key) in stored {
            let bytes = hex::decode(&key.secret_key)
                .map_err(|e| LedgerError::Crypto(format!("Invalid secret key for {}: {}", addr, e)))?;
            let kp = KeyPair::from_secret_bytes(&bytes)?;
            if kp.address != addr {
                return Err(LedgerError::InvalidAddress(format!(
                    "{} does not match its stored key",
                    addr
                )));
            }
            keys.insert(addr, kp);
        }

        Ok(Self { keys })
    }

    /// Load from `path` if it exists, otherwise start empty
    pub fn load_or_new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }
}
