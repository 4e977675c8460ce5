// Append-only, hash-linked chain of blocks

mod utxo;

pub use utxo::{OutPoint, Utxo, UtxoSet};

use crate::config::ChainConfig;
use crate::consensus::{BlockValidator, ProofOfWork, ValidationError};
use crate::core::{Block, Hash256, PubKeyHash, Transaction};
use crate::error::{LedgerError, Result};
use crate::storage::BlockchainDB;
use secp256k1::SecretKey;
use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// The chain: a block store plus the tip pointer.
///
/// `append` holds the tip write lock from reading the tip until the new
/// tip is committed, so concurrent appends are serialized. Readers work
/// on a [`ChainView`] taken from a snapshot of the tip.
pub struct Blockchain {
    db: BlockchainDB,
    tip: RwLock<Hash256>,
    pow: ProofOfWork,
    config: ChainConfig,
}

impl Blockchain {
    /// Create a new chain whose genesis block holds `coinbase` alone
    pub fn init(config: ChainConfig, coinbase: Transaction) -> Result<Self> {
        config.validate()?;
        let db = BlockchainDB::open(&config)?;
        Self::init_with(db, config, coinbase)
    }

    /// `init` over an already opened store
    pub fn init_with(db: BlockchainDB, config: ChainConfig, coinbase: Transaction) -> Result<Self> {
        if db.get_tip()?.is_some() {
            return Err(LedgerError::AlreadyExists);
        }
        if !coinbase.is_coinbase() {
            return Err(LedgerError::InvalidTransaction(coinbase.id));
        }

        let pow = ProofOfWork::new(config.difficulty_bits)?;
        let genesis = pow.mine_block(vec![coinbase], Hash256::zero())?;
        db.commit_block(&genesis)?;

        log::info!("Genesis block {} created", genesis.hash);

        Ok(Self {
            db,
            tip: RwLock::new(genesis.hash),
            pow,
            config,
        })
    }

    /// Open an existing chain
    pub fn open(config: ChainConfig) -> Result<Self> {
        config.validate()?;
        let db = BlockchainDB::open(&config)?;
        Self::open_with(db, config)
    }

    /// `open` over an already opened store
    pub fn open_with(db: BlockchainDB, config: ChainConfig) -> Result<Self> {
        let tip = db.get_tip()?.ok_or(LedgerError::NotFound)?;
        if !db.has_block(&tip)? {
            return Err(LedgerError::MissingBlock(tip));
        }
        let pow = ProofOfWork::new(config.difficulty_bits)?;

        log::info!("Opened blockchain at tip {}", tip);

        Ok(Self {
            db,
            tip: RwLock::new(tip),
            pow,
            config,
        })
    }

    /// Snapshot of the current tip hash
    pub fn tip(&self) -> Hash256 {
        *self.tip.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read-only view at the current tip
    pub fn view(&self) -> ChainView<'_> {
        ChainView::new(&self.db, self.tip())
    }

    /// Blocks from the tip back to genesis
    pub fn iter(&self) -> ChainIter<'_> {
        self.view().iter()
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Verify `transactions`, mine them into a block on top of the tip and
    /// commit it. On any error the chain is unchanged.
    pub fn append(&self, transactions: Vec<Transaction>) -> Result<Block> {
        if transactions.is_empty() {
            return Err(ValidationError::NoTransactions.into());
        }

        let mut tip = self.tip.write().unwrap_or_else(PoisonError::into_inner);
        let view = ChainView::new(&self.db, *tip);
        view.check_batch(&transactions)?;

        let block = self.pow.mine_block(transactions, *tip)?;
        if !self.pow.validate(&block) {
            return Err(ValidationError::InvalidProofOfWork.into());
        }

        self.db.commit_block(&block)?;
        *tip = block.hash;

        log::info!("Appended block {} with {} transaction(s)", block.hash, block.transactions.len());
        Ok(block)
    }

    pub fn find_transaction(&self, id: &Hash256) -> Result<Option<Transaction>> {
        self.view().find_transaction(id)
    }

    /// Sign `tx` against the outputs it spends on this chain
    pub fn sign_transaction(&self, tx: &mut Transaction, secret_key: &SecretKey) -> Result<()> {
        tx.sign(secret_key, &self.view())
    }

    /// Full acceptance check for a single transaction
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        self.view().verify_transaction(tx)
    }

    pub fn scan_utxo(&self) -> Result<UtxoSet> {
        self.view().scan_utxo()
    }

    pub fn find_spendable_outputs(&self, owner: &PubKeyHash, amount: u64) -> Result<(u64, Vec<Utxo>)> {
        self.view().find_spendable_outputs(owner, amount)
    }

    pub fn balance(&self, owner: &PubKeyHash) -> Result<u64> {
        self.view().balance(owner)
    }

    /// Validate every block from the tip to genesis, checking each
    /// block's hash links to the next one down.
    pub fn verify_chain(&self) -> Result<usize> {
        let validator = BlockValidator::new(self.pow.clone());
        let mut expected = self.tip();
        let mut count = 0;

        for block in self.iter() {
            let block = block?;
            if block.hash != expected {
                return Err(ValidationError::BrokenLink.into());
            }
            validator.validate_block(&block)?;
            expected = block.prev_hash;
            count += 1;
        }

        Ok(count)
    }
}

/// The chain as seen from one tip hash
#[derive(Clone, Copy)]
pub struct ChainView<'a> {
    db: &'a BlockchainDB,
    tip: Hash256,
}

impl<'a> ChainView<'a> {
    pub fn new(db: &'a BlockchainDB, tip: Hash256) -> Self {
        Self { db, tip }
    }

    pub fn tip(&self) -> Hash256 {
        self.tip
    }

    /// Fresh cursor starting at this view's tip
    pub fn iter(self) -> ChainIter<'a> {
        ChainIter {
            db: self.db,
            next: Some(self.tip),
        }
    }

    /// Signature, ownership, unspent and value checks for one transaction
    pub fn verify_transaction(&self, tx: &Transaction) -> Result<bool> {
        let utxos = self.scan_utxo()?;
        self.accepts(tx, &utxos, &mut HashSet::new())
    }

    /// Reject the whole batch with `InvalidTransaction` on the first
    /// transaction that fails acceptance
    fn check_batch(&self, transactions: &[Transaction]) -> Result<()> {
        let utxos = self.scan_utxo()?;
        let mut spent_in_batch = HashSet::new();
        let mut batch_ids = HashSet::new();

        for (position, tx) in transactions.iter().enumerate() {
            if tx.is_coinbase() && position != 0 {
                log::warn!("Rejecting coinbase {} at position {}", tx.id, position);
                return Err(LedgerError::InvalidTransaction(tx.id));
            }
            if !batch_ids.insert(tx.id) {
                log::warn!("Rejecting transaction {} repeated within the batch", tx.id);
                return Err(LedgerError::InvalidTransaction(tx.id));
            }
            if !self.accepts(tx, &utxos, &mut spent_in_batch)? {
                log::warn!("Rejecting transaction {}", tx.id);
                return Err(LedgerError::InvalidTransaction(tx.id));
            }
        }

        Ok(())
    }

    fn accepts(
        &self,
        tx: &Transaction,
        utxos: &UtxoSet,
        spent_in_batch: &mut HashSet<OutPoint>,
    ) -> Result<bool> {
        if tx.inputs.is_empty() || tx.outputs.is_empty() {
            return Ok(false);
        }
        let Some(output_value) = tx.total_output_value() else {
            log::debug!("Transaction {} output values overflow", tx.id);
            return Ok(false);
        };
        if self.find_transaction(&tx.id)?.is_some() {
            log::debug!("Transaction {} is already on the chain", tx.id);
            return Ok(false);
        }
        if tx.is_coinbase() {
            return Ok(tx.id == tx.compute_id());
        }

        if !tx.verify(self)? {
            log::debug!("Transaction {} failed signature verification", tx.id);
            return Ok(false);
        }

        let mut input_value = 0u64;
        for input in &tx.inputs {
            let Some(outpoint) = OutPoint::from_input(input) else {
                return Ok(false);
            };
            let Some(output) = utxos.get(&outpoint) else {
                log::debug!("Transaction {} spends {} which is not unspent", tx.id, outpoint);
                return Ok(false);
            };
            if !spent_in_batch.insert(outpoint) {
                log::debug!("Transaction {} double-spends {} within the batch", tx.id, outpoint);
                return Ok(false);
            }
            let Some(sum) = input_value.checked_add(output.value) else {
                log::debug!("Transaction {} input values overflow", tx.id);
                return Ok(false);
            };
            input_value = sum;
        }

        if input_value < output_value {
            log::debug!("Transaction {} spends more than its inputs hold", tx.id);
            return Ok(false);
        }

        Ok(true)
    }
}

/// Backward iterator over blocks: tip first, genesis last
pub struct ChainIter<'a> {
    db: &'a BlockchainDB,
    next: Option<Hash256>,
}

impl Iterator for ChainIter<'_> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let hash = self.next.take()?;

        match self.db.get_block(&hash) {
            Ok(Some(block)) => {
                if !block.is_genesis() {
                    self.next = Some(block.prev_hash);
                }
                Some(Ok(block))
            }
            Ok(None) => Some(Err(LedgerError::MissingBlock(hash))),
            Err(e) => Some(Err(e)),
        }
    }
}
