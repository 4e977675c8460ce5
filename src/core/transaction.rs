// Transaction data structures, signing and verification

use crate::core::{Hash256, PubKeyHash, Serializable, hash160, sha256, signature};
use crate::error::{LedgerError, Result};
use super::serialize::{write_varint, write_var_bytes, read_var_bytes, read_array, read_count};
use rand::RngCore;
use secp256k1::SecretKey;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};

/// Output index carried by the coinbase input
pub const COINBASE_INDEX: i32 = -1;

/// Looks up a committed transaction by id.
///
/// Signing and verification resolve every input's source transaction
/// through this trait. A missing id must be `ReferencedTxNotFound`.
pub trait TxResolver {
    fn resolve(&self, txid: &Hash256) -> Result<Transaction>;
}

impl TxResolver for HashMap<Hash256, Transaction> {
    fn resolve(&self, txid: &Hash256) -> Result<Transaction> {
        self.get(txid)
            .cloned()
            .ok_or(LedgerError::ReferencedTxNotFound(*txid))
    }
}

/// Transaction input - references a previous transaction output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Id of the transaction holding the spent output (zero for coinbase)
    pub prev_txid: Hash256,
    /// Index of the output in that transaction (-1 for coinbase)
    pub prev_index: i32,
    /// DER signature, empty until signed
    pub signature: Vec<u8>,
    /// Spender's serialized public key; coinbase data for coinbase inputs
    pub public_key: Vec<u8>,
}

impl TxInput {
    /// Create an unsigned input spending `prev_txid:prev_index`
    pub fn new(prev_txid: Hash256, prev_index: i32, public_key: Vec<u8>) -> Self {
        Self {
            prev_txid,
            prev_index,
            signature: Vec::new(),
            public_key,
        }
    }

    /// Create the sentinel input of a coinbase transaction
    pub fn coinbase(data: Vec<u8>) -> Self {
        Self {
            prev_txid: Hash256::zero(),
            prev_index: COINBASE_INDEX,
            signature: Vec::new(),
            public_key: data,
        }
    }

    pub fn is_coinbase(&self) -> bool {
        self.prev_txid.is_zero() && self.prev_index == COINBASE_INDEX
    }

    /// Referenced output index, `None` for negative indices
    pub fn output_index(&self) -> Option<usize> {
        usize::try_from(self.prev_index).ok()
    }

    /// Whether this input's public key hashes to `pubkey_hash`
    pub fn uses_key(&self, pubkey_hash: &PubKeyHash) -> bool {
        hash160(&self.public_key) == *pubkey_hash
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.write_all(self.prev_txid.as_bytes()).unwrap();
        buf.write_all(&self.prev_index.to_le_bytes()).unwrap();
        write_var_bytes(buf, &self.signature).unwrap();
        write_var_bytes(buf, &self.public_key).unwrap();
    }

    fn read_from(reader: &mut dyn Read) -> Result<Self> {
        let prev_txid = Hash256::new(read_array(reader)?);
        let prev_index = i32::from_le_bytes(read_array(reader)?);
        let signature = read_var_bytes(reader)?;
        let public_key = read_var_bytes(reader)?;

        Ok(Self {
            prev_txid,
            prev_index,
            signature,
            public_key,
        })
    }
}

/// Transaction output - a value locked to a public key hash
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub pubkey_hash: PubKeyHash,
}

impl TxOutput {
    pub fn new(value: u64, pubkey_hash: PubKeyHash) -> Self {
        Self { value, pubkey_hash }
    }

    pub fn is_locked_with_key(&self, pubkey_hash: &PubKeyHash) -> bool {
        self.pubkey_hash == *pubkey_hash
    }

    fn write_to(&self, buf: &mut Vec<u8>) {
        buf.write_all(&self.value.to_le_bytes()).unwrap();
        buf.write_all(self.pubkey_hash.as_bytes()).unwrap();
    }

    fn read_from(reader: &mut dyn Read) -> Result<Self> {
        let value = u64::from_le_bytes(read_array(reader)?);
        let pubkey_hash = PubKeyHash::new(read_array(reader)?);
        Ok(Self { value, pubkey_hash })
    }
}

/// Transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Content hash of inputs and outputs, signature-independent
    pub id: Hash256,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl Transaction {
    /// Create an unsigned transaction and assign its id
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        let mut tx = Self {
            id: Hash256::zero(),
            inputs,
            outputs,
        };
        tx.id = tx.compute_id();
        tx
    }

    /// Create a coinbase transaction minting `subsidy` to `to`.
    /// An empty `data` is replaced with random bytes so ids stay unique.
    pub fn coinbase(to: PubKeyHash, data: &str, subsidy: u64) -> Self {
        let data = if data.is_empty() {
            let mut random = [0u8; 24];
            rand::thread_rng().fill_bytes(&mut random);
            hex::encode(random)
        } else {
            data.to_string()
        };

        Self::new(
            vec![TxInput::coinbase(data.into_bytes())],
            vec![TxOutput::new(subsidy, to)],
        )
    }

    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].is_coinbase()
    }

    /// Hash of the canonical body with every non-coinbase input's
    /// signature and public key blanked.
    pub fn compute_id(&self) -> Hash256 {
        if self.is_coinbase() {
            sha256(&self.body_bytes())
        } else {
            sha256(&self.trimmed_copy().body_bytes())
        }
    }

    /// Copy with all signatures and public keys cleared
    pub fn trimmed_copy(&self) -> Transaction {
        let inputs = self
            .inputs
            .iter()
            .map(|input| TxInput::new(input.prev_txid, input.prev_index, Vec::new()))
            .collect();

        Transaction {
            id: self.id,
            inputs,
            outputs: self.outputs.clone(),
        }
    }

    /// Digest signed by input `index`: the trimmed copy with only that
    /// input's public key slot filled with the spent output's owner.
    pub fn signature_hash(&self, index: usize, spent_output: &TxOutput) -> Hash256 {
        let mut copy = self.trimmed_copy();
        copy.inputs[index].public_key = spent_output.pubkey_hash.as_bytes().to_vec();
        sha256(&copy.body_bytes())
    }

    /// Sign every input with `secret_key`.
    ///
    /// All referenced outputs are resolved before any signature is written,
    /// so a failed lookup leaves the transaction untouched.
    pub fn sign(&mut self, secret_key: &SecretKey, resolver: &dyn TxResolver) -> Result<()> {
        if self.is_coinbase() {
            return Ok(());
        }

        let spent_outputs = self.resolve_spent_outputs(resolver)?;
        let signatures: Vec<Vec<u8>> = spent_outputs
            .iter()
            .enumerate()
            .map(|(index, output)| {
                let digest = self.signature_hash(index, output);
                signature::sign(secret_key, &digest)
            })
            .collect();

        for (input, sig) in self.inputs.iter_mut().zip(signatures) {
            input.signature = sig;
        }

        Ok(())
    }

    /// Check every input's signature and ownership of the spent output.
    ///
    /// Returns `Ok(false)` for any mismatch; a missing referenced
    /// transaction is an error.
    pub fn verify(&self, resolver: &dyn TxResolver) -> Result<bool> {
        if self.is_coinbase() {
            return Ok(true);
        }

        if self.id != self.compute_id() {
            log::debug!("Transaction {} carries a stale id", self.id);
            return Ok(false);
        }

        for (index, input) in self.inputs.iter().enumerate() {
            let prev_tx = resolver.resolve(&input.prev_txid)?;
            let spent_output = match input.output_index().and_then(|i| prev_tx.outputs.get(i)) {
                Some(output) => output,
                None => {
                    log::debug!("Input {} of {} points past the referenced outputs", index, self.id);
                    return Ok(false);
                }
            };

            if !input.uses_key(&spent_output.pubkey_hash) {
                log::debug!("Input {} of {} is not owned by its public key", index, self.id);
                return Ok(false);
            }

            let digest = self.signature_hash(index, spent_output);
            match signature::verify(&input.public_key, &digest, &input.signature) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(e) => {
                    log::debug!("Input {} of {} has malformed key material: {}", index, self.id, e);
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    /// Outputs spent by each input, in input order
    pub fn resolve_spent_outputs(&self, resolver: &dyn TxResolver) -> Result<Vec<TxOutput>> {
        self.inputs
            .iter()
            .map(|input| {
                let prev_tx = resolver.resolve(&input.prev_txid)?;
                input
                    .output_index()
                    .and_then(|i| prev_tx.outputs.get(i))
                    .cloned()
                    .ok_or(LedgerError::InvalidTransaction(self.id))
            })
            .collect()
    }

    /// Calculate total output value, `None` on overflow
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Inputs and outputs without the id
    fn body_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        write_varint(&mut buf, self.inputs.len() as u64).unwrap();
        for input in &self.inputs {
            input.write_to(&mut buf);
        }

        write_varint(&mut buf, self.outputs.len() as u64).unwrap();
        for output in &self.outputs {
            output.write_to(&mut buf);
        }

        buf
    }

    /// Deserialize from a reader; `limit` bounds the element counts
    pub fn from_reader(reader: &mut dyn Read, limit: usize) -> Result<Self> {
        let id = Hash256::new(read_array(reader)?);

        let input_count = read_count(reader, limit)?;
        let mut inputs = Vec::with_capacity(input_count);
        for _ in 0..input_count {
            inputs.push(TxInput::read_from(reader)?);
        }

        let output_count = read_count(reader, limit)?;
        let mut outputs = Vec::with_capacity(output_count);
        for _ in 0..output_count {
            outputs.push(TxOutput::read_from(reader)?);
        }

        Ok(Self { id, inputs, outputs })
    }
}

impl Serializable for Transaction {
    fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_all(self.id.as_bytes()).unwrap();
        buf.extend_from_slice(&self.body_bytes());
        buf
    }

    fn deserialize(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        Self::from_reader(&mut cursor, data.len())
    }
}
