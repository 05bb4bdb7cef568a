//! Peer discovery, the wire codec and state replication over UDP.

pub mod peer;
pub mod replication;
pub mod wire;

pub use peer::{peer_tint, Endpoint, NetError, PeerTable, PEER_TINTS};
pub use replication::Replicator;
pub use wire::{
    GlobalState, Message, ObjectUpdate, Payload, PeerAnnounce, ScenarioChange, MAX_DATAGRAM,
};
