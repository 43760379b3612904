use clap::Parser;
use anyhow::Result;
use std::path::PathBuf;
use crate::contract::ContractKind;
use crate::node::config::{parse_peers_csv, parse_port, NodeConfig};
use crate::node::Node;
use crate::utils::logging::init_logging;
use crate::utils::metrics::METRICS;
use tracing::info;

/// Peer-to-peer hash-chain node.
#[derive(Parser, Debug)]
#[clap(name = "peerchain", version)]
pub struct Cli {
    /// Listening port (default 8080)
    pub port: Option<String>,

    /// TOML config file; flags override its values
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Listening host
    #[clap(long)]
    pub host: Option<String>,

    /// Peers to dial, host:port (repeatable or comma separated)
    #[clap(long = "peer")]
    pub peers: Vec<String>,

    /// Address announced to peers we dial
    #[clap(long)]
    pub announce: Option<String>,

    /// Contract to run: random, script or none
    #[clap(long)]
    pub contract: Option<ContractKind>,

    /// Code text for the script contract
    #[clap(long)]
    pub script: Option<String>,

    /// Seconds between contract runs
    #[clap(long)]
    pub interval_secs: Option<u64>,

    /// Expect an address announce as each peer's first line
    #[clap(long)]
    pub require_address: bool,

    /// Forward non-block messages to the other peers
    #[clap(long)]
    pub relay: bool,

    /// Do not greet new peers
    #[clap(long)]
    pub no_welcome: bool,

    /// Do not acknowledge received lines
    #[clap(long)]
    pub no_ack: bool,

    /// Cap on concurrently served connections
    #[clap(long)]
    pub max_connections: Option<usize>,
}

impl Cli {
    /// Merge file config (if any) with command-line overrides.
    pub fn into_config(self) -> Result<NodeConfig> {
        let mut cfg = match &self.config {
            Some(path) => NodeConfig::load(path)?,
            None => NodeConfig::default(),
        };
        if let Some(p) = &self.port {
            cfg.port = parse_port(p)?;
        }
        if let Some(h) = self.host {
            cfg.host = h;
        }
        for p in &self.peers {
            cfg.peers.extend(parse_peers_csv(p));
        }
        if self.announce.is_some() {
            cfg.announce = self.announce;
        }
        if let Some(c) = self.contract {
            cfg.contract = c;
        }
        if self.script.is_some() {
            cfg.script = self.script;
        }
        if let Some(i) = self.interval_secs {
            cfg.interval_secs = i;
        }
        if let Some(m) = self.max_connections {
            cfg.max_connections = Some(m);
        }
        cfg.require_address |= self.require_address;
        cfg.relay |= self.relay;
        cfg.welcome &= !self.no_welcome;
        cfg.ack &= !self.no_ack;
        cfg.validate()?;
        Ok(cfg)
    }
}

pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.into_config()?;
    init_logging(&config.log_level);

    let node = Node::new(config);
    let running = node.start().await?;

    // Wait for Ctrl+C
    tokio::signal::ctrl_c().await?;
    info!("Shutting down node...");
    let chain_len = running.chain.len();
    running.shutdown().await?;
    info!("Node stopped with {} blocks", chain_len);
    info!("Node metrics: {}", METRICS.summary());
    Ok(())
}
