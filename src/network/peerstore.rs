//! PeerStore: the registry of live peer connections.
//!
//! Each entry owns the write half of one connection, framed as lines. The map is
//! guarded by a `tokio::sync::Mutex` that stays held while writes are in flight, so
//! two messages never interleave on a connection and a removed peer is never written
//! to afterwards.

use crate::network::codec::LineCodec;
use crate::utils::errors::{NodeError, Result};
use crate::utils::metrics::{METRICS, PEERS_CONNECTED};
use futures::future::BoxFuture;
use futures::SinkExt;
use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;

/// Identifies one connection instance. A peer that reconnects gets a new id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub u64);

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

pub type BoxedWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// A registered connection.
pub struct Peer {
    pub id: PeerId,
    pub addr: SocketAddr,
    /// Self-reported address from the announce handshake, if any.
    pub announced: Option<String>,
    sink: FramedWrite<BoxedWriter, LineCodec>,
}

impl Peer {
    /// Write one line, bounded by `timeout` when given.
    pub async fn send_line(&mut self, line: &str, timeout: Option<Duration>) -> Result<()> {
        let write = self.sink.send(line);
        match timeout {
            Some(t) => tokio::time::timeout(t, write)
                .await
                .map_err(|_| NodeError::Timeout(t))??,
            None => write.await?,
        }
        Ok(())
    }

    /// Name used in logs: announced address when known, socket address otherwise.
    pub fn label(&self) -> String {
        match &self.announced {
            Some(a) => a.clone(),
            None => self.addr.to_string(),
        }
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .field("announced", &self.announced)
            .finish()
    }
}

#[derive(Clone, Default)]
pub struct PeerStore {
    inner: Arc<Mutex<BTreeMap<PeerId, Peer>>>,
    next_id: Arc<AtomicU64>,
}

impl PeerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a connection's write half and register it.
    pub async fn register<W>(&self, addr: SocketAddr, announced: Option<String>, writer: W) -> PeerId
    where
        W: AsyncWrite + Send + 'static,
    {
        let id = PeerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let sink = FramedWrite::new(Box::pin(writer) as BoxedWriter, LineCodec::new());
        let mut map = self.inner.lock().await;
        map.insert(id, Peer { id, addr, announced, sink });
        METRICS.set_gauge(PEERS_CONNECTED, map.len() as f64);
        id
    }

    /// Remove a peer and drop its write half. Returns false if it was already gone.
    pub async fn unregister(&self, id: PeerId) -> bool {
        let mut map = self.inner.lock().await;
        let removed = map.remove(&id).is_some();
        METRICS.set_gauge(PEERS_CONNECTED, map.len() as f64);
        removed
    }

    /// Run `f` on every registered peer, in registration order, while holding the
    /// registry lock. Registration and removal wait until the pass completes.
    pub async fn for_each<F>(&self, mut f: F)
    where
        F: for<'a> FnMut(&'a mut Peer) -> BoxFuture<'a, ()>,
    {
        let mut map = self.inner.lock().await;
        for peer in map.values_mut() {
            f(peer).await;
        }
    }

    /// Write one line to a single peer.
    pub async fn send_to(&self, id: PeerId, line: &str, timeout: Option<Duration>) -> Result<()> {
        let mut map = self.inner.lock().await;
        let peer = map.get_mut(&id).ok_or(NodeError::UnknownPeer(id.0))?;
        peer.send_line(line, timeout).await
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub async fn contains(&self, id: PeerId) -> bool {
        self.inner.lock().await.contains_key(&id)
    }

    /// Snapshot of (id, log label) pairs.
    pub async fn list_peers(&self) -> Vec<(PeerId, String)> {
        let map = self.inner.lock().await;
        map.values().map(|p| (p.id, p.label())).collect()
    }
}
