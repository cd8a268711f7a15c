// Use-case level outputs of the game loop and the encoding port they go through.

use crate::domain::{Leaderboard, ProjectileSnapshot, SessionId, WorldSnapshot};
use axum::extract::ws::Utf8Bytes;
use std::collections::BTreeMap;
use std::fmt;

/// One serialized outbound message, shared by every session it is fanned out to.
pub type Frame = Utf8Bytes;

/// Messages the game loop sends to sessions, before encoding.
#[derive(Debug, Clone)]
pub enum OutboundMessage {
    // Private greeting: the receiver's own id plus everyone currently connected.
    Hello {
        my_id: SessionId,
        id_to_name: BTreeMap<SessionId, String>,
    },
    PlayerJoined {
        id: SessionId,
        name: String,
    },
    PlayerLeft {
        id: SessionId,
    },
    WorldSnapshot(WorldSnapshot),
    Leaderboard(Leaderboard),
    Shot(ProjectileSnapshot),
}

impl OutboundMessage {
    pub fn label(&self) -> &'static str {
        match self {
            OutboundMessage::Hello { .. } => "hello",
            OutboundMessage::PlayerJoined { .. } => "player_joined",
            OutboundMessage::PlayerLeft { .. } => "player_left",
            OutboundMessage::WorldSnapshot(_) => "world_snapshot",
            OutboundMessage::Leaderboard(_) => "leaderboard",
            OutboundMessage::Shot(_) => "shot",
        }
    }
}

#[derive(Debug)]
pub struct EncodeError {
    pub reason: String,
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to encode message: {}", self.reason)
    }
}

impl std::error::Error for EncodeError {}

/// Port for the wire encoding owned by the interface adapters.
pub trait FrameEncoder: Send {
    fn encode(&self, msg: &OutboundMessage) -> Result<Frame, EncodeError>;
}
