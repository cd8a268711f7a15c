use crate::use_cases::ControlBudget;
use std::{env, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("ARENA_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

pub fn tick_interval() -> Duration {
    let hz = env::var("TICK_RATE_HZ")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|hz| (1..=1000).contains(hz))
        .unwrap_or(DEFAULT_TICK_RATE_HZ);
    Duration::from_secs(1) / hz
}

pub fn control_budget() -> ControlBudget {
    match env::var("CONTROL_BUDGET") {
        Ok(value) => value.parse().unwrap_or_else(|e: String| {
            tracing::warn!(error = %e, "ignoring CONTROL_BUDGET; draining all commands");
            ControlBudget::Unlimited
        }),
        Err(_) => ControlBudget::Unlimited,
    }
}

pub fn event_queue_capacity() -> usize {
    env::var("EVENT_QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|capacity| *capacity > 0)
        .unwrap_or(DEFAULT_EVENT_QUEUE_CAPACITY)
}

pub const DEFAULT_TICK_RATE_HZ: u32 = 60;
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 10_000;

pub const CONTROL_CHANNEL_CAPACITY: usize = 1024;
pub const SESSION_OUTBOUND_CAPACITY: usize = 256;

pub const IDLE_SLEEP: Duration = Duration::from_millis(5);
pub const LEADERBOARD_EVERY_FRAMES: u64 = 50;
pub const STATS_EVERY_FRAMES: u64 = 60;
// Longest simulation step after a stall.
pub const MAX_STEP: Duration = Duration::from_millis(50);
