//! HashChain: the append-only, in-memory sequence of blocks.
//!
//! A single `parking_lot::Mutex` guards the sequence. Every append reads the tail,
//! builds the successor and pushes it under one guard, so two writers can never
//! derive the same index. The lock is never held across an `.await`.

use crate::ledger::block::{now_timestamp, Block};
use crate::utils::metrics::{BLOCKS_APPENDED, BLOCKS_INGESTED, METRICS};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("block {index} has hash {found}, expected {expected}")]
    HashMismatch { index: usize, expected: String, found: String },
    #[error("block {index} links to {found}, previous block hash is {expected}")]
    BrokenLink { index: usize, expected: String, found: String },
    #[error("block at position {position} has index {found}, expected {expected}")]
    IndexGap { position: usize, expected: u64, found: u64 },
    #[error("block at position {position} follows index {previous}, which has no successor")]
    IndexOverflow { position: usize, previous: u64 },
    #[error("chain is empty")]
    Empty,
}

pub struct HashChain {
    blocks: Mutex<Vec<Block>>,
}

impl HashChain {
    /// New chain holding a genesis block stamped with the current time.
    pub fn new() -> Self {
        Self::with_genesis(Block::genesis(now_timestamp()))
    }

    pub fn with_genesis(genesis: Block) -> Self {
        Self { blocks: Mutex::new(vec![genesis]) }
    }

    /// Append `data` as the successor of the current tail.
    pub fn append(&self, data: impl Into<String>) -> Block {
        self.append_at(data, now_timestamp())
    }

    pub fn append_at(&self, data: impl Into<String>, timestamp: impl Into<String>) -> Block {
        let mut blocks = self.blocks.lock();
        let (index, previous_hash) = match blocks.last() {
            // Ingested blocks carry arbitrary indices; u64::MAX wraps to 0.
            Some(last) => (last.index.wrapping_add(1), last.hash.clone()),
            // with_genesis always seeds one block; this arm keeps append total.
            None => (0, String::new()),
        };
        let block = Block::new(index, timestamp.into(), data.into(), previous_hash);
        blocks.push(block.clone());
        drop(blocks);

        METRICS.inc_counter(BLOCKS_APPENDED);
        debug!(index = block.index, "appended block");
        block
    }

    /// Append a block received from a peer exactly as it arrived.
    ///
    /// Linkage and digest are not checked; a replayed block is appended again.
    pub fn ingest(&self, candidate: Block) -> bool {
        self.blocks.lock().push(candidate);
        METRICS.inc_counter(BLOCKS_INGESTED);
        true
    }

    /// Decode one wire line and ingest it. `None` if the line is not a block.
    pub fn ingest_json(&self, raw: &str) -> Option<Block> {
        let block = Block::from_json(raw)?;
        self.ingest(block.clone());
        Some(block)
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().len()
    }

    pub fn tail(&self) -> Option<Block> {
        self.blocks.lock().last().cloned()
    }

    pub fn get(&self, position: usize) -> Option<Block> {
        self.blocks.lock().get(position).cloned()
    }

    pub fn snapshot(&self) -> Vec<Block> {
        self.blocks.lock().clone()
    }

    /// Audit every block: digest recomputation plus index and hash linkage.
    /// Reports the first violation found.
    pub fn verify(&self) -> Result<(), ChainError> {
        let blocks = self.blocks.lock();
        if blocks.is_empty() {
            return Err(ChainError::Empty);
        }
        for (i, block) in blocks.iter().enumerate() {
            let expected = block.computed_hash();
            if block.hash != expected {
                return Err(ChainError::HashMismatch { index: i, expected, found: block.hash.clone() });
            }
            if i == 0 {
                continue;
            }
            let prev = &blocks[i - 1];
            let expected = prev.index.checked_add(1).ok_or(ChainError::IndexOverflow { position: i, previous: prev.index })?;
            if block.index != expected {
                return Err(ChainError::IndexGap { position: i, expected, found: block.index });
            }
            if block.previous_hash != prev.hash {
                return Err(ChainError::BrokenLink {
                    index: i,
                    expected: prev.hash.clone(),
                    found: block.previous_hash.clone(),
                });
            }
        }
        Ok(())
    }
}

impl Default for HashChain {
    fn default() -> Self {
        Self::new()
    }
}
