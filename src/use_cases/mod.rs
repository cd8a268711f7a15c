// Use cases layer: event dispatch, control intake and the authoritative game loop.

pub mod control;
pub mod event_bus;
pub mod game_loop;
pub mod monitor;
pub mod sessions;
pub mod simulation;
pub mod ticker;
pub mod types;

pub use control::{ControlBudget, ControlCommand, ControlError, ControlHandle, control_channel};
pub use event_bus::{BusSettings, EventBus, Listener, ListenerId, PublishError, Publisher};
pub use game_loop::{GameLoop, GameLoopSettings};
pub use monitor::{ActivityStats, ActivityTracker, LoopStats, StepWindow};
pub use sessions::{ClientSession, SessionRegistry, SessionSink};
pub use simulation::{ArenaSimulation, Simulation};
pub use ticker::run_ticker;
pub use types::{EncodeError, Frame, FrameEncoder, OutboundMessage};
