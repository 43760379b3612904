//! Node orchestration: wire up chain, peer registry, acceptor, dialers and the
//! contract scheduler.

use crate::contract::{ContractScheduler, SmartContract};
use crate::ledger::HashChain;
use crate::network::{maintain_peer, Acceptor, Connection, Gossiper, PeerStore};
use crate::node::config::NodeConfig;
use crate::node::service_handle::ServiceHandle;
use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Main Node object
pub struct Node {
    cfg: NodeConfig,
    contract: Option<Arc<dyn SmartContract>>,
}

/// Handles to a started node. Dropping it leaves tasks running; call `shutdown`.
pub struct RunningNode {
    pub local_addr: SocketAddr,
    pub chain: Arc<HashChain>,
    pub peerstore: PeerStore,
    pub gossiper: Gossiper,
    services: ServiceHandle,
}

impl RunningNode {
    pub async fn shutdown(self) -> Result<()> {
        self.services.shutdown().await
    }
}

impl Node {
    /// Node running the contract selected in `cfg`.
    pub fn new(cfg: NodeConfig) -> Self {
        let contract = cfg.contract.build(cfg.script.as_deref());
        Self { cfg, contract }
    }

    /// Replace the configured contract; `None` disables the scheduler.
    pub fn with_contract(mut self, contract: Option<Arc<dyn SmartContract>>) -> Self {
        self.contract = contract;
        self
    }

    /// Start the node: bind, then spawn subsystems. A bind failure is returned
    /// before anything is spawned.
    pub async fn start(self) -> Result<RunningNode> {
        self.cfg.validate()?;
        let (mut services, shutdown_rx) = ServiceHandle::new();

        let chain = Arc::new(HashChain::new());
        if let Some(genesis) = chain.tail() {
            info!("genesis block {} at {}", genesis.hash, genesis.timestamp);
        }

        let peerstore = PeerStore::new();
        let session = self.cfg.session();
        let gossiper = Gossiper::new(peerstore.clone(), session.write_timeout);
        let conn = Connection::new(chain.clone(), gossiper.clone(), session);

        let acceptor = Acceptor::bind(&self.cfg.bind_addr(), conn.clone(), self.cfg.max_connections).await?;
        let local_addr = acceptor.local_addr()?;
        services.attach("acceptor", tokio::spawn(acceptor.run(shutdown_rx.clone())));

        if let Some(contract) = self.contract {
            info!("running contract {} every {:?}", contract.name(), self.cfg.interval());
            let scheduler = ContractScheduler::new(contract, chain.clone(), gossiper.clone(), self.cfg.interval());
            let rx = shutdown_rx.clone();
            services.attach("contract", tokio::spawn(async move {
                scheduler.run(rx).await;
                Ok(())
            }));
        }

        for peer in self.cfg.peers {
            let conn = conn.clone();
            let announce = self.cfg.announce.clone();
            let rx = shutdown_rx.clone();
            services.attach("dialer", tokio::spawn(async move {
                maintain_peer(peer, conn, announce, rx).await;
                Ok(())
            }));
        }

        info!("Blockchain server started on port {}", local_addr.port());
        Ok(RunningNode { local_addr, chain, peerstore, gossiper, services })
    }
}
