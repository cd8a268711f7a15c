// Broadcast notifications carried by the event bus.

use crate::domain::state::{PlayerInput, ProjectileSnapshot, SessionId};
use std::time::Instant;

/// Closed set of event kinds; each kind owns one queue and one listener list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Tick,
    ProjectileFired,
    UserInput,
    UserJoined,
    UserLeft,
}

impl EventKind {
    pub const COUNT: usize = 5;

    /// Every kind, in queue index order.
    pub const ALL: [EventKind; Self::COUNT] = [
        EventKind::Tick,
        EventKind::ProjectileFired,
        EventKind::UserInput,
        EventKind::UserJoined,
        EventKind::UserLeft,
    ];

    pub fn index(self) -> usize {
        match self {
            EventKind::Tick => 0,
            EventKind::ProjectileFired => 1,
            EventKind::UserInput => 2,
            EventKind::UserJoined => 3,
            EventKind::UserLeft => 4,
        }
    }
}

/// Periodic clock pulse driving one simulation step and one broadcast cycle.
#[derive(Debug, Clone, Copy)]
pub struct TickEvent {
    pub frame_id: u64,
    pub at: Instant,
}

#[derive(Debug, Clone)]
pub struct ProjectileFired {
    pub projectile: ProjectileSnapshot,
}

#[derive(Debug, Clone)]
pub struct UserInputEvent {
    pub session_id: SessionId,
    pub input: PlayerInput,
}

#[derive(Debug, Clone)]
pub struct UserJoinedEvent {
    pub session_id: SessionId,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct UserLeftEvent {
    pub session_id: SessionId,
}

/// An immutable notification. It lives only until the last listener of its
/// kind has handled it.
#[derive(Debug, Clone)]
pub enum Event {
    Tick(TickEvent),
    ProjectileFired(ProjectileFired),
    UserInput(UserInputEvent),
    UserJoined(UserJoinedEvent),
    UserLeft(UserLeftEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Tick(_) => EventKind::Tick,
            Event::ProjectileFired(_) => EventKind::ProjectileFired,
            Event::UserInput(_) => EventKind::UserInput,
            Event::UserJoined(_) => EventKind::UserJoined,
            Event::UserLeft(_) => EventKind::UserLeft,
        }
    }
}
