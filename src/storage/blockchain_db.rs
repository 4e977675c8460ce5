// Block database using sled

use crate::config::ChainConfig;
use crate::core::{Block, Hash256, Serializable};
use crate::error::Result;
use sled::{Batch, Db};
use std::path::Path;

/// Reserved key holding the tip hash. Every other key is a block hash.
pub const TIP_KEY: &[u8] = b"lh";

/// Blockchain database. Clones share the same underlying store.
#[derive(Clone)]
pub struct BlockchainDB {
    db: Db,
}

impl BlockchainDB {
    /// Open (or create) a database at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Create an in-memory database (for testing)
    pub fn memory() -> Result<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// Open the store described by `config`
    pub fn open(config: &ChainConfig) -> Result<Self> {
        if config.temporary {
            Self::memory()
        } else {
            Self::new(config.blocks_path())
        }
    }

    /// Get a block by hash
    pub fn get_block(&self, hash: &Hash256) -> Result<Option<Block>> {
        match self.db.get(hash.as_bytes())? {
            Some(data) => Ok(Some(Block::deserialize(&data)?)),
            None => Ok(None),
        }
    }

    /// Check if a block exists
    pub fn has_block(&self, hash: &Hash256) -> Result<bool> {
        Ok(self.db.contains_key(hash.as_bytes())?)
    }

    /// Get the chain tip, `None` for an uninitialized store
    pub fn get_tip(&self) -> Result<Option<Hash256>> {
        match self.db.get(TIP_KEY)? {
            Some(data) => Ok(Some(Hash256::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Store a block without moving the tip
    pub fn store_block(&self, block: &Block) -> Result<()> {
        self.db.insert(block.hash.as_bytes(), block.serialize())?;
        Ok(())
    }

    /// Write `block` and point the tip at it in one atomic batch
    pub fn commit_block(&self, block: &Block) -> Result<()> {
        let mut batch = Batch::default();
        batch.insert(&block.hash.as_bytes()[..], block.serialize());
        batch.insert(TIP_KEY, &block.hash.as_bytes()[..]);

        self.db.apply_batch(batch)?;
        self.flush()
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Raw write, used to inject corrupt data in tests
    #[cfg(test)]
    pub(crate) fn insert_raw(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.db.insert(key, value)?;
        Ok(())
    }
}
