//! Wire format: one envelope, four message kinds, bincode-encoded into
//! single UDP datagrams.
//!
//! Decoding is total: anything that is not a well-formed message of a
//! known kind comes back as `None` and the datagram is dropped. Envelope
//! timestamps are the sender's monotonic milliseconds and are only good
//! for freshness judgments, never for ordering.

use bincode::Options;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::params::SharedParams;

/// Hard ceiling on the size of one datagram.
pub const MAX_DATAGRAM: usize = 512;

#[derive(Debug, Error)]
pub enum WireError {
    #[error("message does not fit in a {MAX_DATAGRAM}-byte datagram")]
    Oversize(#[source] bincode::Error),
}

/// Peer introduction, broadcast over the discovery port range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeerAnnounce {
    pub peer_id: u8,
    pub port: u16,
}

/// Full snapshot of the shared simulation parameters. Receivers overwrite
/// their local values; there is no merging.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalState {
    pub paused: bool,
    pub gravity_enabled: bool,
    pub gravity_y: f32,
    pub elasticity: f32,
    pub static_friction: f32,
    pub dynamic_friction: f32,
    pub target_sim_hz: f32,
    pub target_net_hz: f32,
}

impl GlobalState {
    /// Snapshot the current shared parameters.
    pub fn capture(params: &SharedParams) -> Self {
        Self {
            paused: params.paused(),
            gravity_enabled: params.gravity_enabled(),
            gravity_y: params.gravity_y(),
            elasticity: params.elasticity(),
            static_friction: params.static_friction(),
            dynamic_friction: params.dynamic_friction(),
            target_sim_hz: params.target_sim_hz(),
            target_net_hz: params.target_net_hz(),
        }
    }

    /// Overwrite the shared parameters with this snapshot.
    pub fn apply_to(&self, params: &SharedParams) {
        params.set_paused(self.paused);
        params.set_gravity_enabled(self.gravity_enabled);
        params.set_gravity_y(self.gravity_y);
        params.set_elasticity(self.elasticity);
        params.set_static_friction(self.static_friction);
        params.set_dynamic_friction(self.dynamic_friction);
        params.set_target_sim_hz(self.target_sim_hz);
        params.set_target_net_hz(self.target_net_hz);
    }
}

/// Authoritative state of one owned body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    pub object_id: u32,
    pub position: Vec3,
    pub rotation: Vec3,
    pub velocity: Vec3,
    pub scale: Vec3,
    pub owner_peer_id: u8,
}

/// Order to switch every peer to another scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioChange {
    pub scenario_id: u8,
}

/// The tagged union of everything that goes over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    PeerAnnounce(PeerAnnounce),
    GlobalState(GlobalState),
    ObjectUpdate(ObjectUpdate),
    ScenarioChange(ScenarioChange),
}

/// Envelope shared by every message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Sender-monotonic milliseconds.
    pub timestamp_ms: u64,
    pub payload: Payload,
}

fn codec() -> impl Options {
    bincode::options().with_limit(MAX_DATAGRAM as u64)
}

/// Encode a message into a datagram-sized buffer.
pub fn encode(message: &Message) -> Result<Vec<u8>, WireError> {
    codec().serialize(message).map_err(WireError::Oversize)
}

/// Decode one datagram. Malformed buffers and unknown tags yield `None`.
pub fn decode(buffer: &[u8]) -> Option<Message> {
    match codec().deserialize(buffer) {
        Ok(message) => Some(message),
        Err(err) => {
            trace!(len = buffer.len(), %err, "dropping undecodable datagram");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(payload: Payload) -> Message {
        let message = Message {
            timestamp_ms: 12_345,
            payload,
        };
        let bytes = encode(&message).unwrap();
        assert!(bytes.len() <= MAX_DATAGRAM);
        decode(&bytes).unwrap()
    }

    #[test]
    fn test_peer_announce_roundtrip() {
        let decoded = roundtrip(Payload::PeerAnnounce(PeerAnnounce {
            peer_id: 2,
            port: 8890,
        }));
        assert_eq!(decoded.timestamp_ms, 12_345);
        match decoded.payload {
            Payload::PeerAnnounce(announce) => {
                assert_eq!(announce.peer_id, 2);
                assert_eq!(announce.port, 8890);
            }
            other => panic!("wrong payload: {other:?}"),
        }
    }

    #[test]
    fn test_global_state_roundtrip() {
        let state = GlobalState {
            paused: true,
            gravity_enabled: false,
            gravity_y: -3.7,
            elasticity: 0.5,
            static_friction: -1.0,
            dynamic_friction: 0.25,
            target_sim_hz: 125.0,
            target_net_hz: 20.0,
        };
        let decoded = roundtrip(Payload::GlobalState(state));
        assert_eq!(decoded.payload, Payload::GlobalState(state));
    }

    #[test]
    fn test_object_update_roundtrip() {
        let update = ObjectUpdate {
            object_id: (3 << 24) | 17,
            position: Vec3::new(1.0, -2.0, 0.5),
            rotation: Vec3::new(0.0, 45.0, 0.0),
            velocity: Vec3::new(0.1, 0.0, -0.3),
            scale: Vec3::splat(0.2),
            owner_peer_id: 3,
        };
        let decoded = roundtrip(Payload::ObjectUpdate(update));
        assert_eq!(decoded.payload, Payload::ObjectUpdate(update));
    }

    #[test]
    fn test_scenario_change_roundtrip() {
        let decoded = roundtrip(Payload::ScenarioChange(ScenarioChange { scenario_id: 2 }));
        assert_eq!(
            decoded.payload,
            Payload::ScenarioChange(ScenarioChange { scenario_id: 2 })
        );
    }

    #[test]
    fn test_malformed_buffers_drop() {
        assert!(decode(&[]).is_none());
        assert!(decode(&[0xFF; 64]).is_none());

        // A truncated valid message must not decode.
        let bytes = encode(&Message {
            timestamp_ms: 1,
            payload: Payload::PeerAnnounce(PeerAnnounce {
                peer_id: 0,
                port: 8888,
            }),
        })
        .unwrap();
        assert!(decode(&bytes[..bytes.len() - 1]).is_none());

        // Trailing garbage is not a valid datagram either.
        let mut padded = bytes;
        padded.push(0);
        assert!(decode(&padded).is_none());
    }

    #[test]
    fn test_global_state_capture_apply() {
        let params = SharedParams::default();
        params.set_paused(true);
        params.set_gravity_y(-4.0);
        params.set_elasticity(0.9);

        let snapshot = GlobalState::capture(&params);

        let other = SharedParams::default();
        snapshot.apply_to(&other);
        assert!(other.paused());
        assert_eq!(other.gravity_y(), -4.0);
        assert_eq!(other.elasticity(), 0.9);
        assert_eq!(other.target_sim_hz(), 125.0);
    }
}
