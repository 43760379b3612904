//! Broadcaster: best-effort fan-out of blocks and relayed text to every peer.
//!
//! Writes happen inside `PeerStore::for_each`, so the registry lock serializes
//! whole messages per connection. A failing peer is logged and skipped; nothing is
//! retried and no acknowledgement is awaited.

use crate::ledger::Block;
use crate::network::message::WireMessage;
use crate::network::peerstore::{PeerId, PeerStore};
use crate::utils::metrics::{BROADCAST_DELIVERED, BROADCAST_FAILED, METRICS};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of one fan-out pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct Gossiper {
    peerstore: PeerStore,
    write_timeout: Option<Duration>,
}

impl Gossiper {
    pub fn new(peerstore: PeerStore, write_timeout: Option<Duration>) -> Self {
        Self { peerstore, write_timeout }
    }

    pub fn peerstore(&self) -> &PeerStore {
        &self.peerstore
    }

    /// Send `block` to every registered peer.
    pub async fn broadcast_block(&self, block: &Block) -> BroadcastReport {
        let line = WireMessage::Block(block.clone()).encode();
        let report = self.fan_out(Arc::from(line), None).await;
        debug!(index = block.index, delivered = report.delivered, failed = report.failed, "block broadcast");
        report
    }

    /// Forward a text line to every peer except its sender.
    pub async fn relay_text(&self, text: &str, from: PeerId) -> BroadcastReport {
        self.fan_out(Arc::from(text), Some(from)).await
    }

    async fn fan_out(&self, line: Arc<str>, except: Option<PeerId>) -> BroadcastReport {
        let delivered = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));
        let timeout = self.write_timeout;
        self.peerstore
            .for_each(|peer| {
                let line = line.clone();
                let delivered = delivered.clone();
                let failed = failed.clone();
                Box::pin(async move {
                    if Some(peer.id) == except {
                        return;
                    }
                    match peer.send_line(&line, timeout).await {
                        Ok(()) => {
                            delivered.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            warn!("failed send to {}: {}", peer.label(), e);
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .await;

        let report = BroadcastReport {
            delivered: delivered.load(Ordering::Relaxed),
            failed: failed.load(Ordering::Relaxed),
        };
        METRICS.add_counter(BROADCAST_DELIVERED, report.delivered as u64);
        METRICS.add_counter(BROADCAST_FAILED, report.failed as u64);
        report
    }
}
