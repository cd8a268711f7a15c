use crate::use_cases::{ActivityStats, ControlHandle, LoopStats};
use tokio::sync::watch;

#[derive(Clone)]
pub struct AppState {
    // Commands flowing from sessions into the game loop.
    pub control: ControlHandle,
    // Copies published by the game loop and the activity tracker.
    pub loop_stats: watch::Receiver<LoopStats>,
    pub activity: watch::Receiver<ActivityStats>,
    // Flips to true once the game loop has absorbed a shutdown.
    pub shutdown: watch::Receiver<bool>,
    // Per-session outbound queue length.
    pub outbound_capacity: usize,
}

impl AppState {
    pub fn accepting_sessions(&self) -> bool {
        !*self.shutdown.borrow() && !self.control.is_closed()
    }
}
