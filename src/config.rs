// Chain configuration

use crate::consensus::Target;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.json";
pub const WALLET_FILE: &str = "wallets.json";
const BLOCKS_DIR: &str = "blocks";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChainConfig {
    /// Directory holding the block store and the wallet file
    pub data_dir: PathBuf,
    /// Use a self-deleting in-memory store instead of `data_dir`
    pub temporary: bool,
    /// Leading zero bits a block hash needs
    pub difficulty_bits: u32,
    /// Value minted by the genesis coinbase
    pub subsidy: u64,
    /// Coinbase input data of the genesis transaction
    pub genesis_data: String,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            temporary: false,
            difficulty_bits: 12,
            subsidy: 100,
            genesis_data: "First Transaction from Genesis".to_string(),
        }
    }
}

impl ChainConfig {
    /// Defaults rooted at `data_dir`
    pub fn with_data_dir<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        let config: ChainConfig = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<data_dir>/config.json` if present, defaults otherwise.
    /// `data_dir` always wins over the file's own entry.
    pub fn load_or_default<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let path = data_dir.as_ref().join(CONFIG_FILE);
        let mut config = if path.exists() {
            log::info!("Loading config from {}", path.display());
            Self::load(&path)?
        } else {
            Self::default()
        };
        config.data_dir = data_dir.as_ref().to_path_buf();
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        Target::new(self.difficulty_bits)?;
        Ok(())
    }

    pub fn blocks_path(&self) -> PathBuf {
        self.data_dir.join(BLOCKS_DIR)
    }

    pub fn wallet_path(&self) -> PathBuf {
        self.data_dir.join(WALLET_FILE)
    }
}
