//! Per-connection session: optional announce, register, welcome, read loop, unregister.
//!
//! Every received line is classified with `WireMessage::decode`. Blocks go straight
//! into the chain; anything else stays out of it and is relayed only when relaying
//! is switched on and the line came from an inbound peer. A read error, EOF, an expired read deadline or the node shutdown
//! signal ends the session, and the peer is removed from the registry on the way out.

use crate::ledger::HashChain;
use crate::network::codec::{LineCodec, MAX_LINE_LEN};
use crate::network::gossip::Gossiper;
use crate::network::handshake;
use crate::network::message::{ack_line, WireMessage, WELCOME_LINE};
use crate::network::peerstore::{PeerId, PeerStore};
use crate::node::service_handle::wait_for_shutdown;
use crate::utils::errors::{NodeError, Result};
use crate::utils::metrics::{MESSAGES_DISCARDED, METRICS};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

/// Protocol switches applied to every session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Greet inbound peers with `WELCOME_LINE`.
    pub welcome: bool,
    /// Answer every inbound line with `Received: <line>`.
    pub ack: bool,
    /// Forward non-block lines to all other peers.
    pub relay: bool,
    /// Expect an address announce as the first inbound line.
    pub require_address: bool,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub max_line_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            welcome: true,
            ack: true,
            relay: false,
            require_address: false,
            read_timeout: None,
            write_timeout: Some(Duration::from_secs(5)),
            max_line_len: MAX_LINE_LEN,
        }
    }
}

/// Which side opened the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    /// We dialed out; `announce` is sent as our first line when set.
    Outbound { announce: Option<String> },
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Eof,
    Shutdown,
    NoAnnounce,
    ReadError(String),
}

/// Shared handles every session needs.
#[derive(Clone)]
pub struct Connection {
    chain: Arc<HashChain>,
    peerstore: PeerStore,
    gossiper: Gossiper,
    cfg: Arc<SessionConfig>,
}

impl Connection {
    pub fn new(chain: Arc<HashChain>, gossiper: Gossiper, cfg: SessionConfig) -> Self {
        Self {
            chain,
            peerstore: gossiper.peerstore().clone(),
            gossiper,
            cfg: Arc::new(cfg),
        }
    }

    /// Run the session on its own task.
    pub fn spawn<S>(
        &self,
        stream: S,
        peer_addr: SocketAddr,
        direction: Direction,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<CloseReason>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let conn = self.clone();
        tokio::spawn(async move { conn.run(stream, peer_addr, direction, shutdown).await })
    }

    /// Drive one connection until it closes.
    pub async fn run<S>(
        &self,
        stream: S,
        peer_addr: SocketAddr,
        direction: Direction,
        mut shutdown: watch::Receiver<bool>,
    ) -> CloseReason
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader = FramedRead::new(read_half, LineCodec::with_max_length(self.cfg.max_line_len));
        let mut writer = FramedWrite::new(write_half, LineCodec::new());
        let inbound = direction == Direction::Inbound;

        if let Direction::Outbound { announce: Some(address) } = &direction {
            if let Err(e) = handshake::send_announce(&mut writer, address).await {
                warn!("announce to {} failed: {}", peer_addr, e);
                return CloseReason::ReadError(e.to_string());
            }
        }

        let mut announced = None;
        if inbound && self.cfg.require_address {
            let first = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => return CloseReason::Shutdown,
                first = self.next_line(&mut reader) => first,
            };
            match first {
                Ok(Some(line)) => announced = handshake::parse_announce(&line),
                Ok(None) => {}
                Err(e) => {
                    info!("peer {} failed before announcing: {}", peer_addr, e);
                    return CloseReason::ReadError(e.to_string());
                }
            }
            if announced.is_none() {
                info!("peer {} closed before announcing", peer_addr);
                return CloseReason::NoAnnounce;
            }
        }

        let id = self.peerstore.register(peer_addr, announced.clone(), writer.into_inner()).await;
        let label = announced.unwrap_or_else(|| peer_addr.to_string());
        info!("connected to peer {} ({})", label, id);

        if inbound && self.cfg.welcome {
            // Best effort; the read loop notices a dead socket on its own.
            if let Err(e) = self.peerstore.send_to(id, WELCOME_LINE, self.cfg.write_timeout).await {
                debug!("welcome to {} failed: {}", label, e);
            }
        }

        let reason = loop {
            let next = tokio::select! {
                biased;
                _ = wait_for_shutdown(&mut shutdown) => break CloseReason::Shutdown,
                next = self.next_line(&mut reader) => next,
            };
            match next {
                Ok(Some(line)) => self.handle_line(id, &label, &line, inbound).await,
                Ok(None) => break CloseReason::Eof,
                Err(e) => break CloseReason::ReadError(e.to_string()),
            }
        };

        self.peerstore.unregister(id).await;
        match &reason {
            CloseReason::ReadError(e) => warn!("peer {} disconnected: {}", label, e),
            other => info!("peer {} disconnected ({:?})", label, other),
        }
        reason
    }

    async fn next_line<R>(&self, reader: &mut FramedRead<R, LineCodec>) -> Result<Option<String>>
    where
        R: AsyncRead + Unpin,
    {
        let next = match self.cfg.read_timeout {
            Some(t) => tokio::time::timeout(t, reader.next())
                .await
                .map_err(|_| NodeError::Timeout(t))?,
            None => reader.next().await,
        };
        next.transpose().map_err(NodeError::from)
    }

    async fn handle_line(&self, id: PeerId, label: &str, line: &str, inbound: bool) {
        match WireMessage::decode(line) {
            WireMessage::Block(block) => {
                let index = block.index;
                let data = block.data.clone();
                if self.chain.ingest(block) {
                    info!("New block added from {}: index={} data={:?}", label, index, data);
                } else {
                    warn!("block index={} from {} was not added", index, label);
                }
            }
            WireMessage::Text(text) => {
                METRICS.inc_counter(MESSAGES_DISCARDED);
                debug!("message from {}: {}", label, text);
                // Outbound sessions only carry the upstream's welcome and acks.
                if self.cfg.relay && inbound {
                    self.gossiper.relay_text(&text, id).await;
                }
            }
        }

        if inbound && self.cfg.ack {
            if let Err(e) = self.peerstore.send_to(id, &ack_line(line), self.cfg.write_timeout).await {
                debug!("ack to {} failed: {}", label, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Block;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf};

    const BLOCK_LINE: &str = r#"{"index":1,"timestamp":"t","data":"d","previous_hash":"","hash":"h"}"#;

    struct Client {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl Client {
        async fn send(&mut self, line: &str) {
            self.writer.write_all(format!("{}\n", line).as_bytes()).await.unwrap();
        }

        async fn send_raw(&mut self, bytes: &[u8]) {
            self.writer.write_all(bytes).await.unwrap();
        }

        async fn recv(&mut self) -> Option<String> {
            self.lines.next_line().await.unwrap()
        }
    }

    struct Harness {
        chain: Arc<HashChain>,
        store: PeerStore,
        conn: Connection,
        shutdown_tx: watch::Sender<bool>,
    }

    impl Harness {
        fn new(cfg: SessionConfig) -> Self {
            let chain = Arc::new(HashChain::with_genesis(Block::genesis("ts")));
            let store = PeerStore::new();
            let conn = Connection::new(chain.clone(), Gossiper::new(store.clone(), None), cfg);
            let (shutdown_tx, _) = watch::channel(false);
            Self { chain, store, conn, shutdown_tx }
        }

        fn connect(&self, port: u16) -> (Client, JoinHandle<CloseReason>) {
            let (client, server) = tokio::io::duplex(4096);
            let handle = self.conn.spawn(
                server,
                SocketAddr::from(([127, 0, 0, 1], port)),
                Direction::Inbound,
                self.shutdown_tx.subscribe(),
            );
            let (r, w) = tokio::io::split(client);
            (Client { lines: BufReader::new(r).lines(), writer: w }, handle)
        }
    }

    #[tokio::test]
    async fn welcome_then_ingest_unlinked_block() {
        let h = Harness::new(SessionConfig::default());
        let (mut client, _handle) = h.connect(1);
        assert_eq!(client.recv().await.as_deref(), Some(WELCOME_LINE));

        client.send(BLOCK_LINE).await;
        assert_eq!(client.recv().await, Some(format!("Received: {}", BLOCK_LINE)));
        assert_eq!(h.chain.len(), 2);
        assert_eq!(h.chain.tail().unwrap().hash, "h");
    }

    #[tokio::test]
    async fn peer_is_registered_when_welcome_arrives() {
        let h = Harness::new(SessionConfig::default());
        let (mut client, _handle) = h.connect(10);
        assert_eq!(client.recv().await.as_deref(), Some(WELCOME_LINE));
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn invalid_utf8_line_does_not_close_the_session() {
        let h = Harness::new(SessionConfig::default());
        let (mut client, _handle) = h.connect(11);
        client.recv().await;

        client.send_raw(b"\xff\xfe\n").await;
        client.send(BLOCK_LINE).await;
        assert_eq!(client.recv().await, Some(format!("Received: {}", BLOCK_LINE)));

        assert_eq!(h.chain.len(), 2);
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn garbage_does_not_close_the_session() {
        let h = Harness::new(SessionConfig::default());
        let (mut client, _handle) = h.connect(2);
        client.recv().await;

        client.send("not-json").await;
        assert_eq!(client.recv().await.as_deref(), Some("Received: not-json"));
        client.send(BLOCK_LINE).await;
        client.recv().await;

        assert_eq!(h.chain.len(), 2);
        assert_eq!(h.store.len().await, 1);
    }

    #[tokio::test]
    async fn eof_unregisters_peer() {
        let h = Harness::new(SessionConfig::default());
        let (mut client, handle) = h.connect(3);
        client.recv().await;
        assert_eq!(h.store.len().await, 1);

        drop(client);
        assert_eq!(handle.await.unwrap(), CloseReason::Eof);
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn announce_is_recorded_before_registration() {
        let cfg = SessionConfig { require_address: true, welcome: false, ..Default::default() };
        let h = Harness::new(cfg);
        let (mut client, _handle) = h.connect(4);
        client.send("10.1.1.1:9000").await;
        client.send("ping").await;
        assert_eq!(client.recv().await.as_deref(), Some("Received: ping"));

        let peers = h.store.list_peers().await;
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].1, "10.1.1.1:9000");
    }

    #[tokio::test]
    async fn missing_announce_closes_without_registering() {
        let cfg = SessionConfig { require_address: true, ..Default::default() };
        let h = Harness::new(cfg);
        let (client, handle) = h.connect(5);
        drop(client);
        assert_eq!(handle.await.unwrap(), CloseReason::NoAnnounce);
        assert!(h.store.is_empty().await);
    }

    #[tokio::test]
    async fn relay_forwards_text_to_other_peers() {
        let cfg = SessionConfig { relay: true, ack: false, welcome: false, ..Default::default() };
        let h = Harness::new(cfg);
        let (mut alice, _a) = h.connect(6);
        let (mut bob, _b) = h.connect(7);
        while h.store.len().await < 2 {
            tokio::task::yield_now().await;
        }

        alice.send("hello-bob").await;
        assert_eq!(bob.recv().await.as_deref(), Some("hello-bob"));
        assert_eq!(h.chain.len(), 1);
    }

    #[tokio::test]
    async fn outbound_session_does_not_relay_upstream_text() {
        let cfg = SessionConfig { relay: true, ack: false, welcome: false, ..Default::default() };
        let h = Harness::new(cfg);
        let (mut bob, _b) = h.connect(12);
        while h.store.len().await < 1 {
            tokio::task::yield_now().await;
        }

        let (upstream, local) = tokio::io::duplex(4096);
        let _out = h.conn.spawn(
            local,
            SocketAddr::from(([127, 0, 0, 1], 13)),
            Direction::Outbound { announce: None },
            h.shutdown_tx.subscribe(),
        );
        let (_r, mut w) = tokio::io::split(upstream);
        let script = format!("{}\nReceived: hi\n{}\n", WELCOME_LINE, BLOCK_LINE);
        w.write_all(script.as_bytes()).await.unwrap();
        while h.chain.len() < 2 {
            tokio::task::yield_now().await;
        }

        let relayed = tokio::time::timeout(Duration::from_millis(50), bob.recv()).await;
        assert!(relayed.is_err(), "outbound text leaked to {:?}", relayed);
    }

    #[tokio::test]
    async fn shutdown_ends_session() {
        let h = Harness::new(SessionConfig::default());
        let (mut client, handle) = h.connect(8);
        client.recv().await;
        h.shutdown_tx.send(true).unwrap();
        assert_eq!(handle.await.unwrap(), CloseReason::Shutdown);
        assert!(h.store.is_empty().await);
    }

    #[tokio::test(start_paused = true)]
    async fn read_deadline_closes_idle_peer() {
        let cfg = SessionConfig { read_timeout: Some(Duration::from_secs(30)), ..Default::default() };
        let h = Harness::new(cfg);
        let (_client, handle) = h.connect(9);
        match handle.await.unwrap() {
            CloseReason::ReadError(msg) => assert!(msg.contains("Timed out")),
            other => panic!("unexpected close: {:?}", other),
        }
        assert!(h.store.is_empty().await);
    }
}
