//! Ledger module: block format, hash rule and the in-memory hash chain.

pub mod block;
pub mod chain;

pub use block::{calculate_hash, Block, GENESIS_DATA};
pub use chain::{ChainError, HashChain};
