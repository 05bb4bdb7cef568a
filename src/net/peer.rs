//! Peer discovery and the UDP endpoint.
//!
//! Every peer binds the first free port of a fixed range; the offset into
//! that range *is* the peer id. Discovery is a `PeerAnnounce` broadcast to
//! the whole range, answered by re-announcing, so any two live peers
//! converge on knowing each other.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::SimConfig;

use super::wire::{self, Message, Payload, PeerAnnounce};

/// Rendering tint per peer id, cycled for ids past the palette end.
pub const PEER_TINTS: [[f32; 4]; 8] = [
    [0.91, 0.30, 0.24, 1.0], // red
    [0.18, 0.55, 0.85, 1.0], // blue
    [0.15, 0.68, 0.38, 1.0], // green
    [0.95, 0.77, 0.06, 1.0], // yellow
    [0.61, 0.35, 0.71, 1.0], // purple
    [0.90, 0.49, 0.13, 1.0], // orange
    [0.10, 0.74, 0.61, 1.0], // teal
    [0.58, 0.65, 0.65, 1.0], // gray
];

pub fn peer_tint(peer_id: u8) -> [f32; 4] {
    PEER_TINTS[peer_id as usize % PEER_TINTS.len()]
}

#[derive(Debug, Error)]
pub enum NetError {
    #[error("every port in {start}..{end} is already bound")]
    PortsExhausted { start: u16, end: u16 },
    #[error("socket setup failed")]
    Io(#[from] std::io::Error),
}

/// Known remote peers, keyed by peer id.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: Mutex<HashMap<u8, SocketAddr>>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a peer. Returns true when the peer was not known before.
    pub fn register(&self, peer_id: u8, addr: SocketAddr) -> bool {
        self.peers.lock().insert(peer_id, addr).is_none()
    }

    /// Snapshot of all known peers.
    pub fn entries(&self) -> Vec<(u8, SocketAddr)> {
        let mut entries: Vec<_> = self.peers.lock().iter().map(|(&id, &a)| (id, a)).collect();
        entries.sort_unstable_by_key(|&(id, _)| id);
        entries
    }

    pub fn peer_ids(&self) -> Vec<u8> {
        let mut ids: Vec<_> = self.peers.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }
}

/// The local UDP socket plus everything derived from its bound port.
#[derive(Debug)]
pub struct Endpoint {
    socket: UdpSocket,
    local_peer_id: u8,
    local_port: u16,
    base_port: u16,
    num_peers: u8,
    pub peers: PeerTable,
    datagrams_received: AtomicU64,
    started: Instant,
}

impl Endpoint {
    /// Bind the first free port of the configured range. The offset of
    /// the bound port defines this process's peer id. Ports held by other
    /// peers are skipped; any other bind failure is fatal.
    pub fn bind(config: &SimConfig) -> Result<Self, NetError> {
        for offset in 0..config.num_peers {
            let port = config.base_port + offset as u16;
            match UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)) {
                Ok(socket) => {
                    socket.set_nonblocking(true)?;
                    socket.set_broadcast(true)?;
                    debug!(peer_id = offset, port, "bound discovery port");
                    return Ok(Self {
                        socket,
                        local_peer_id: offset,
                        local_port: port,
                        base_port: config.base_port,
                        num_peers: config.num_peers,
                        peers: PeerTable::new(),
                        datagrams_received: AtomicU64::new(0),
                        started: Instant::now(),
                    });
                }
                Err(err) if err.kind() == ErrorKind::AddrInUse => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(NetError::PortsExhausted {
            start: config.base_port,
            end: config.port_range_end(),
        })
    }

    pub fn local_peer_id(&self) -> u8 {
        self.local_peer_id
    }

    pub fn local_port(&self) -> u16 {
        self.local_port
    }

    /// Milliseconds since this endpoint came up; stamps outgoing messages.
    pub fn timestamp_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Total datagrams received, for the rate monitor.
    pub fn datagram_count(&self) -> u64 {
        self.datagrams_received.load(Ordering::Relaxed)
    }

    /// Send one payload to one address. Send failures degrade to a trace
    /// event; UDP gives no delivery promise anyway.
    pub fn send_to(&self, addr: SocketAddr, payload: Payload) {
        let message = Message {
            timestamp_ms: self.timestamp_ms(),
            payload,
        };
        match wire::encode(&message) {
            Ok(bytes) => {
                if let Err(err) = self.socket.send_to(&bytes, addr) {
                    trace!(%addr, %err, "datagram send failed");
                }
            }
            Err(err) => trace!(%err, "unencodable message dropped"),
        }
    }

    /// Send one payload to every known peer.
    pub fn send_to_all_peers(&self, payload: Payload) {
        for (_, addr) in self.peers.entries() {
            self.send_to(addr, payload);
        }
    }

    /// Introduce this peer to the whole LAN segment: broadcast a
    /// `PeerAnnounce` to every port another peer could have bound.
    pub fn announce(&self) {
        let announce = Payload::PeerAnnounce(PeerAnnounce {
            peer_id: self.local_peer_id,
            port: self.local_port,
        });
        for offset in 0..self.num_peers {
            let port = self.base_port + offset as u16;
            self.send_to(SocketAddr::from((Ipv4Addr::BROADCAST, port)), announce);
        }
    }

    /// Try to receive and decode one datagram. Returns `None` when the
    /// socket has nothing or the datagram was malformed.
    pub fn try_recv(&self) -> Option<(Message, SocketAddr)> {
        let mut buffer = [0u8; wire::MAX_DATAGRAM];
        match self.socket.recv_from(&mut buffer) {
            Ok((len, src)) => {
                self.datagrams_received.fetch_add(1, Ordering::Relaxed);
                wire::decode(&buffer[..len]).map(|message| (message, src))
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => None,
            Err(err) => {
                trace!(%err, "recv failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_port: u16) -> SimConfig {
        SimConfig {
            base_port,
            num_peers: 3,
            ..SimConfig::default()
        }
    }

    #[test]
    fn test_peer_id_from_bound_port() {
        let config = test_config(47100);
        let first = Endpoint::bind(&config).unwrap();
        assert_eq!(first.local_peer_id(), 0);
        assert_eq!(first.local_port(), 47100);

        // The next process on the same host lands on the next port.
        let second = Endpoint::bind(&config).unwrap();
        assert_eq!(second.local_peer_id(), 1);
        assert_eq!(second.local_port(), 47101);
    }

    #[test]
    fn test_bind_exhaustion_is_fatal() {
        let config = test_config(47110);
        let _a = Endpoint::bind(&config).unwrap();
        let _b = Endpoint::bind(&config).unwrap();
        let _c = Endpoint::bind(&config).unwrap();
        match Endpoint::bind(&config) {
            Err(NetError::PortsExhausted { start, end }) => {
                assert_eq!(start, 47110);
                assert_eq!(end, 47113);
            }
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn test_loopback_send_receive() {
        let config = test_config(47120);
        let sender = Endpoint::bind(&config).unwrap();
        let receiver = Endpoint::bind(&config).unwrap();

        let target = SocketAddr::from(([127, 0, 0, 1], receiver.local_port()));
        sender.send_to(
            target,
            Payload::ScenarioChange(wire::ScenarioChange { scenario_id: 7 }),
        );

        // Non-blocking socket: poll briefly for arrival.
        let mut received = None;
        for _ in 0..200 {
            if let Some(hit) = receiver.try_recv() {
                received = Some(hit);
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let (message, _src) = received.expect("datagram should arrive on loopback");
        assert_eq!(
            message.payload,
            Payload::ScenarioChange(wire::ScenarioChange { scenario_id: 7 })
        );
        assert_eq!(receiver.datagram_count(), 1);
    }

    #[test]
    fn test_peer_table_register_once() {
        let table = PeerTable::new();
        let addr = SocketAddr::from(([127, 0, 0, 1], 9000));
        assert!(table.register(2, addr));
        assert!(!table.register(2, addr));
        assert_eq!(table.peer_ids(), vec![2]);
        assert_eq!(table.entries(), vec![(2, addr)]);
    }

    #[test]
    fn test_tint_palette_cycles() {
        assert_eq!(peer_tint(0), PEER_TINTS[0]);
        assert_eq!(peer_tint(9), PEER_TINTS[1]);
    }
}
