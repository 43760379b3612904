//! Acceptor and dialer: turn TCP connections into sessions.
//!
//! The acceptor loop never dies on a failed accept; it logs, pauses briefly and
//! carries on. Each connection runs on its own task so a stalled peer cannot hold up
//! acceptance or other peers. An optional semaphore caps concurrent sessions.

use crate::network::connection::{CloseReason, Connection, Direction};
use crate::network::transport;
use crate::node::service_handle::wait_for_shutdown;
use crate::utils::metrics::{CONNECTIONS_ACCEPTED, METRICS};
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Semaphore};
use tokio::time::{sleep, Duration};
use tracing::{info, warn};

/// Pause after a failed accept.
const ACCEPT_RETRY: Duration = Duration::from_millis(100);
/// First and maximum reconnect delay for outbound peers.
const DIAL_BACKOFF_START_MS: u64 = 500;
const DIAL_BACKOFF_MAX_MS: u64 = 30_000;

pub struct Acceptor {
    listener: TcpListener,
    conn: Connection,
    limit: Option<Arc<Semaphore>>,
}

impl Acceptor {
    /// Bind the listening socket. Failure here is fatal for the node.
    pub async fn bind(addr: &str, conn: Connection, max_connections: Option<usize>) -> Result<Self> {
        let listener = transport::bind(addr).await?;
        info!("listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            conn,
            limit: max_connections.map(|n| Arc::new(Semaphore::new(n))),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept until shutdown is signalled.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            // Wait for a free slot before accepting, so excess peers queue in the backlog.
            let permit = match &self.limit {
                Some(sem) => {
                    let acquired = tokio::select! {
                        _ = wait_for_shutdown(&mut shutdown) => break,
                        p = sem.clone().acquire_owned() => p,
                    };
                    match acquired {
                        Ok(p) => Some(p),
                        Err(_) => break,
                    }
                }
                None => None,
            };

            let accepted = tokio::select! {
                _ = wait_for_shutdown(&mut shutdown) => break,
                a = self.listener.accept() => a,
            };

            match accepted {
                Ok((stream, peer_addr)) => {
                    METRICS.inc_counter(CONNECTIONS_ACCEPTED);
                    info!("New connection: {}", peer_addr);
                    if let Err(e) = stream.set_nodelay(true) {
                        warn!("set_nodelay failed for {}: {:?}", peer_addr, e);
                    }
                    let conn = self.conn.clone();
                    let rx = shutdown.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        conn.run(stream, peer_addr, Direction::Inbound, rx).await
                    });
                }
                Err(e) => {
                    warn!("Error accepting connection: {:?}", e);
                    sleep(ACCEPT_RETRY).await;
                }
            }
        }
        info!("acceptor observed shutdown");
        Ok(())
    }
}

/// Keep an outbound connection to `addr` alive, reconnecting with exponential
/// backoff whenever it fails or drops, until shutdown.
pub async fn maintain_peer(
    addr: String,
    conn: Connection,
    announce: Option<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = DIAL_BACKOFF_START_MS;
    loop {
        let dialed = tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => return,
            d = transport::connect(&addr) => d,
        };
        match dialed {
            Ok(stream) => match stream.peer_addr() {
                Ok(peer_addr) => {
                    info!("connected to peer {}", addr);
                    backoff = DIAL_BACKOFF_START_MS;
                    let direction = Direction::Outbound { announce: announce.clone() };
                    let reason = conn.run(stream, peer_addr, direction, shutdown.clone()).await;
                    if reason == CloseReason::Shutdown {
                        return;
                    }
                }
                Err(e) => warn!("connected to {} but peer address unavailable: {:?}", addr, e),
            },
            Err(e) => {
                warn!("connect failed to {}: {:#}", addr, e);
            }
        }
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => return,
            _ = sleep(Duration::from_millis(backoff)) => {}
        }
        backoff = (backoff * 2).min(DIAL_BACKOFF_MAX_MS);
    }
}
