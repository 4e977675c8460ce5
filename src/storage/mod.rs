// Storage layer for blocks

mod blockchain_db;

pub use blockchain_db::{BlockchainDB, TIP_KEY};
