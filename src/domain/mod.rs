// Domain layer: core simulation types, events and rules.

pub mod events;
pub mod leaderboard;
pub mod state;
pub mod systems;
pub mod tuning;

pub use events::{
    Event, EventKind, ProjectileFired, TickEvent, UserInputEvent, UserJoinedEvent, UserLeftEvent,
};
pub use leaderboard::{Leaderboard, Rank};
pub use state::{
    PlayerInput, Projectile, ProjectileSnapshot, SessionId, ShipSnapshot, Spaceship, World,
    WorldSnapshot,
};
