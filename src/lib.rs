//! Peerchain: a hash-chained ledger replicated best-effort between TCP peers.
//!
//! - `ledger`: block format, hash rule, in-memory chain
//! - `network`: line framing, peer registry, sessions, broadcast, acceptor
//! - `contract`: contract capability and its periodic scheduler
//! - `node`: configuration, CLI and wiring

pub mod contract;
pub mod ledger;
pub mod network;
pub mod node;
pub mod utils;

pub use ledger::{Block, HashChain};
pub use node::{Node, NodeConfig, RunningNode};
