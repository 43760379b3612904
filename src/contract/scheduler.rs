//! ContractScheduler: the one background writer of the chain.
//!
//! Ticks immediately on start and then every `interval`. Each tick invokes the
//! contract, appends the output under the chain lock and broadcasts the new block
//! after the lock is released. Stops when the shutdown signal flips.

use crate::contract::SmartContract;
use crate::ledger::{Block, HashChain};
use crate::network::gossip::Gossiper;
use crate::node::service_handle::wait_for_shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Period used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);

pub struct ContractScheduler {
    contract: Arc<dyn SmartContract>,
    chain: Arc<HashChain>,
    gossiper: Gossiper,
    interval: Duration,
}

impl ContractScheduler {
    pub fn new(contract: Arc<dyn SmartContract>, chain: Arc<HashChain>, gossiper: Gossiper, interval: Duration) -> Self {
        Self { contract, chain, gossiper, interval }
    }

    /// One invocation: compute, append, broadcast.
    pub async fn tick(&self) -> Block {
        let data = self.contract.invoke();
        let block = self.chain.append(data);
        info!("contract {} appended block {}: {}", self.contract.name(), block.index, block.data);
        self.gossiper.broadcast_block(&block).await;
        block
    }

    /// Run until shutdown. Returns the number of blocks produced.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut produced = 0u64;
        loop {
            tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break,
                _ = ticker.tick() => {
                    self.tick().await;
                    produced += 1;
                }
            }
        }
        info!("contract {} stopped after {} blocks", self.contract.name(), produced);
        produced
    }
}
