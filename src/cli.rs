// CLI commands

use crate::chain::Blockchain;
use crate::config::ChainConfig;
use crate::core::{Block, Transaction};
use crate::error::{LedgerError, Result};
use crate::wallet::{Address, Keystore, TransactionBuilder};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "pow-ledger")]
#[command(about = "Proof-of-work ledger with a UTXO model", long_about = None)]
pub struct Cli {
    /// Directory holding the block store, wallets and config
    #[arg(long, global = true, default_value = "./data")]
    pub data_dir: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new key pair in the wallet file
    CreateWallet,

    /// List wallet addresses
    ListAddresses,

    /// Create a blockchain whose genesis pays the subsidy to an address
    CreateBlockchain {
        #[arg(long)]
        address: String,
    },

    /// Get balance for an address
    GetBalance {
        #[arg(long)]
        address: String,
    },

    /// Send coins from a wallet address and mine the block
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },

    /// Print every block from tip to genesis
    PrintChain,
}

/// CLI handler
pub struct CliHandler {
    config: ChainConfig,
    keystore: Keystore,
}

impl CliHandler {
    pub fn new(data_dir: &Path) -> Result<Self> {
        fs::create_dir_all(data_dir)?;
        let config = ChainConfig::load_or_default(data_dir)?;

        let wallet_path = config.wallet_path();
        if wallet_path.exists() {
            log::info!("Loading wallets from {}", wallet_path.display());
        }
        let keystore = Keystore::load_or_new(&wallet_path)?;

        Ok(Self { config, keystore })
    }

    fn save_keystore(&self) -> Result<()> {
        self.keystore.save(self.config.wallet_path())
    }

    /// Handle CLI command
    pub fn handle(&mut self, cli: Cli) -> Result<()> {
        match cli.command {
            Commands::CreateWallet => self.create_wallet(),
            Commands::ListAddresses => self.list_addresses(),
            Commands::CreateBlockchain { address } => self.create_blockchain(&address),
            Commands::GetBalance { address } => self.get_balance(&address),
            Commands::Send { from, to, amount } => self.send(&from, &to, amount),
            Commands::PrintChain => self.print_chain(),
        }
    }

    fn create_wallet(&mut self) -> Result<()> {
        let addr = self.keystore.new_address();
        self.save_keystore()?;
        println!("New address: {}", addr);
        Ok(())
    }

    fn list_addresses(&self) -> Result<()> {
        for addr in self.keystore.list_addresses() {
            println!("{}", addr);
        }
        Ok(())
    }

    fn create_blockchain(&self, address: &str) -> Result<()> {
        let owner = Address::parse(address)?.to_pubkey_hash()?;
        let coinbase = Transaction::coinbase(owner, &self.config.genesis_data, self.config.subsidy);

        let chain = Blockchain::init(self.config.clone(), coinbase)?;
        println!("Genesis block: {}", chain.tip());
        println!("Finished!");
        Ok(())
    }

    fn get_balance(&self, address: &str) -> Result<()> {
        let address = Address::parse(address)?;
        let chain = Blockchain::open(self.config.clone())?;

        let balance = TransactionBuilder::new(&chain).get_balance(&address)?;
        println!("Balance of {}: {}", address, balance);
        Ok(())
    }

    fn send(&self, from: &str, to: &str, amount: u64) -> Result<()> {
        let from = Address::parse(from)?;
        let to = Address::parse(to)?;
        let keypair = self
            .keystore
            .get_keypair(&from)
            .ok_or_else(|| LedgerError::InvalidAddress(format!("{} is not in the wallet", from)))?;

        let chain = Blockchain::open(self.config.clone())?;
        let tx = TransactionBuilder::new(&chain).build_to_address(keypair, &to, amount)?;
        let block = chain.append(vec![tx])?;

        println!("Transaction {} mined in block {}", block.transactions[0].id, block.hash);
        println!("Success!");
        Ok(())
    }

    fn print_chain(&self) -> Result<()> {
        let chain = Blockchain::open(self.config.clone())?;

        for block in chain.iter() {
            let block = block?;
            self.print_block(&chain, &block);
        }

        let count = chain.verify_chain()?;
        println!("Chain verified: {} block(s)", count);
        Ok(())
    }

    fn print_block(&self, chain: &Blockchain, block: &Block) {
        println!("Prev. hash: {}", block.prev_hash);
        println!("Hash: {}", block.hash);
        println!("Nonce: {}", block.nonce);
        println!("PoW: {}", chain.pow().validate(block));

        for tx in &block.transactions {
            println!("  Transaction {}:", tx.id);
            for (i, input) in tx.inputs.iter().enumerate() {
                if input.is_coinbase() {
                    println!("    Input {}: coinbase", i);
                } else {
                    println!("    Input {}: {}:{}", i, input.prev_txid, input.prev_index);
                }
            }
            for (i, output) in tx.outputs.iter().enumerate() {
                println!(
                    "    Output {}: {} to {}",
                    i,
                    output.value,
                    Address::from_pubkey_hash(&output.pubkey_hash)
                );
            }
        }
        println!();
    }
}
