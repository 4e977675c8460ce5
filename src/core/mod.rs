// Core ledger data structures and crypto primitives

mod types;
mod transaction;
mod block;
mod serialize;
mod hash;
pub mod signature;

pub use types::*;
pub use transaction::*;
pub use block::*;
pub use serialize::*;
pub use hash::*;
