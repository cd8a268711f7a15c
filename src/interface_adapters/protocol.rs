// Wire protocol DTOs and the JSON frame encoder used by the game loop.
// Internal HTTP payloads (stats) live at the bottom of this module.

use crate::domain::{
    Leaderboard, PlayerInput, ProjectileSnapshot, SessionId, ShipSnapshot, WorldSnapshot,
};
use crate::use_cases::{
    ActivityStats, EncodeError, Frame, FrameEncoder, LoopStats, OutboundMessage,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Sent once, privately, after the session is registered.
    Hello(HelloDto),
    PlayerJoined(PlayerDto),
    PlayerLeft { id: SessionId },
    // Snapshot of the world for a given frame.
    WorldUpdate(WorldUpdateDto),
    Leaderboard(LeaderboardDto),
    ProjectileFired(ProjectileStateDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // First message on every connection.
    Join(JoinPayload),
    // Input messages sent after a successful Join.
    Input(PlayerInputDto),
}

#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    pub display_name: String,
}

/// Per-tick input payload sent by the client after joining.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerInputDto {
    #[serde(default)]
    pub thrust: f32,
    #[serde(default)]
    pub turn: f32,
    #[serde(default)]
    pub shoot: bool,
}

impl From<PlayerInputDto> for PlayerInput {
    fn from(input: PlayerInputDto) -> Self {
        Self {
            thrust: input.thrust,
            turn: input.turn,
            shoot: input.shoot,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HelloDto {
    pub my_id: SessionId,
    // Everyone connected at the time of the greeting, the receiver included.
    pub id_to_name: BTreeMap<SessionId, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerDto {
    pub id: SessionId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorldUpdateDto {
    pub frame_id: u64,
    pub ships: Vec<ShipStateDto>,
    pub projectiles: Vec<ProjectileStateDto>,
}

impl From<&WorldSnapshot> for WorldUpdateDto {
    fn from(snapshot: &WorldSnapshot) -> Self {
        Self {
            frame_id: snapshot.frame_id,
            ships: snapshot.ships.iter().map(ShipStateDto::from).collect(),
            projectiles: snapshot
                .projectiles
                .iter()
                .map(ProjectileStateDto::from)
                .collect(),
        }
    }
}

/// Flattened ship state for wire transmission in world updates.
#[derive(Debug, Clone, Serialize)]
pub struct ShipStateDto {
    pub id: SessionId,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub hp: i32,
    pub score: u32,
}

impl From<&ShipSnapshot> for ShipStateDto {
    fn from(ship: &ShipSnapshot) -> Self {
        Self {
            id: ship.id,
            x: ship.x,
            y: ship.y,
            rot: ship.rot,
            hp: ship.hp,
            score: ship.score,
        }
    }
}

/// Flattened projectile state; also the payload of a shot broadcast.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectileStateDto {
    pub id: u64,
    pub owner_id: SessionId,
    pub x: f32,
    pub y: f32,
    pub rot: f32,
    pub vx: f32,
    pub vy: f32,
}

impl From<&ProjectileSnapshot> for ProjectileStateDto {
    fn from(projectile: &ProjectileSnapshot) -> Self {
        Self {
            id: projectile.id,
            owner_id: projectile.owner_id,
            x: projectile.x,
            y: projectile.y,
            rot: projectile.rot,
            vx: projectile.vx,
            vy: projectile.vy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardDto {
    pub ranks: Vec<RankDto>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankDto {
    pub id: SessionId,
    pub score: u32,
}

impl From<&Leaderboard> for LeaderboardDto {
    fn from(board: &Leaderboard) -> Self {
        Self {
            ranks: board
                .ranks
                .iter()
                .map(|rank| RankDto {
                    id: rank.id,
                    score: rank.score,
                })
                .collect(),
        }
    }
}

impl From<&OutboundMessage> for ServerMessage {
    fn from(msg: &OutboundMessage) -> Self {
        match msg {
            OutboundMessage::Hello { my_id, id_to_name } => ServerMessage::Hello(HelloDto {
                my_id: *my_id,
                id_to_name: id_to_name.clone(),
            }),
            OutboundMessage::PlayerJoined { id, name } => ServerMessage::PlayerJoined(PlayerDto {
                id: *id,
                name: name.clone(),
            }),
            OutboundMessage::PlayerLeft { id } => ServerMessage::PlayerLeft { id: *id },
            OutboundMessage::WorldSnapshot(snapshot) => {
                ServerMessage::WorldUpdate(WorldUpdateDto::from(snapshot))
            }
            OutboundMessage::Leaderboard(board) => {
                ServerMessage::Leaderboard(LeaderboardDto::from(board))
            }
            OutboundMessage::Shot(projectile) => {
                ServerMessage::ProjectileFired(ProjectileStateDto::from(projectile))
            }
        }
    }
}

/// Serializes each outbound message once into a shareable JSON text frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFrameEncoder;

impl FrameEncoder for JsonFrameEncoder {
    fn encode(&self, msg: &OutboundMessage) -> Result<Frame, EncodeError> {
        serde_json::to_string(&ServerMessage::from(msg))
            .map(Frame::from)
            .map_err(|e| EncodeError {
                reason: e.to_string(),
            })
    }
}

/// Response body of `GET /stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsDto {
    pub running: bool,
    pub frame_id: u64,
    pub sessions: usize,
    pub ships: usize,
    pub projectiles: usize,
    pub pending_control: usize,
    pub steps: u64,
    pub avg_step_us: u64,
    pub max_step_us: u64,
    pub activity: ActivityDto,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityDto {
    pub joined: u64,
    pub left: u64,
    pub inputs: u64,
}

impl StatsDto {
    pub fn new(running: bool, stats: LoopStats, activity: ActivityStats) -> Self {
        Self {
            running,
            frame_id: stats.frame_id,
            sessions: stats.sessions,
            ships: stats.ships,
            projectiles: stats.projectiles,
            pending_control: stats.pending_control,
            steps: stats.steps.steps,
            avg_step_us: stats.steps.average.as_micros() as u64,
            max_step_us: stats.steps.max.as_micros() as u64,
            activity: ActivityDto {
                joined: activity.joined,
                left: activity.left,
                inputs: activity.inputs,
            },
        }
    }
}
