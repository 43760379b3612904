//! Network module - framing, wire messages, peer registry, sessions, broadcast,
//! acceptor and dialer.

pub mod codec;
pub mod message;
pub mod handshake;
pub mod connection;
pub mod manager;
pub mod gossip;
pub mod peerstore;
pub mod transport;

pub use message::WireMessage;
pub use connection::{CloseReason, Connection, Direction, SessionConfig};
pub use manager::{maintain_peer, Acceptor};
pub use gossip::{BroadcastReport, Gossiper};
pub use peerstore::{Peer, PeerId, PeerStore};
