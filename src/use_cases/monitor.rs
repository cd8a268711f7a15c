// Step timing and session activity counters, exported as watch snapshots so
// readers outside the dispatch loop only ever hold copies.

use crate::domain::{Event, EventKind};
use crate::use_cases::event_bus::Listener;
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Minimum gap between repeated warnings of the same kind.
pub const LOG_THROTTLE: Duration = Duration::from_secs(2);

/// True at most once per [`LOG_THROTTLE`] for the given timestamp slot.
pub fn should_log(last: &mut Option<Instant>) -> bool {
    let now = Instant::now();
    match last {
        Some(at) if now.duration_since(*at) < LOG_THROTTLE => false,
        _ => {
            *last = Some(now);
            true
        }
    }
}

#[derive(Debug, Default)]
pub struct StepMonitor {
    steps: u64,
    total: Duration,
    max: Duration,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepWindow {
    pub steps: u64,
    pub average: Duration,
    pub max: Duration,
}

impl StepMonitor {
    pub fn record(&mut self, elapsed: Duration) {
        self.steps += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }

    /// Summarizes the steps recorded since the last call and starts a new window.
    pub fn take_window(&mut self) -> StepWindow {
        let average = if self.steps == 0 {
            Duration::ZERO
        } else {
            self.total / self.steps as u32
        };
        let window = StepWindow {
            steps: self.steps,
            average,
            max: self.max,
        };
        *self = Self::default();
        window
    }
}

/// Copy of the game loop's state published every few frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frame_id: u64,
    pub sessions: usize,
    pub ships: usize,
    pub projectiles: usize,
    pub pending_control: usize,
    pub steps: StepWindow,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityStats {
    pub joined: u64,
    pub left: u64,
    pub inputs: u64,
}

/// Counts session lifecycle notifications seen on the bus.
pub struct ActivityTracker {
    stats: ActivityStats,
    tx: watch::Sender<ActivityStats>,
}

impl ActivityTracker {
    pub const KINDS: [EventKind; 3] = [
        EventKind::UserJoined,
        EventKind::UserLeft,
        EventKind::UserInput,
    ];

    pub fn new() -> (Self, watch::Receiver<ActivityStats>) {
        let (tx, rx) = watch::channel(ActivityStats::default());
        (
            Self {
                stats: ActivityStats::default(),
                tx,
            },
            rx,
        )
    }
}

impl Listener for ActivityTracker {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::UserJoined(_) => self.stats.joined += 1,
            Event::UserLeft(_) => self.stats.left += 1,
            Event::UserInput(_) => self.stats.inputs += 1,
            Event::Tick(_) | Event::ProjectileFired(_) => return,
        }
        self.tx.send_replace(self.stats);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{UserJoinedEvent, UserLeftEvent};

    #[test]
    fn when_window_is_taken_then_average_and_max_cover_recorded_steps() {
        let mut monitor = StepMonitor::default();
        monitor.record(Duration::from_micros(100));
        monitor.record(Duration::from_micros(300));

        let window = monitor.take_window();

        assert_eq!(window.steps, 2);
        assert_eq!(window.average, Duration::from_micros(200));
        assert_eq!(window.max, Duration::from_micros(300));
        assert_eq!(monitor.take_window(), StepWindow::default());
    }

    #[test]
    fn when_lifecycle_events_arrive_then_tracker_publishes_counts() {
        let (mut tracker, rx) = ActivityTracker::new();

        tracker.on_event(&Event::UserJoined(UserJoinedEvent {
            session_id: 1,
            name: "Pilot".to_string(),
        }));
        tracker.on_event(&Event::UserLeft(UserLeftEvent { session_id: 1 }));

        assert_eq!(
            *rx.borrow(),
            ActivityStats {
                joined: 1,
                left: 1,
                inputs: 0,
            }
        );
    }

    #[test]
    fn when_logging_is_throttled_then_only_first_call_in_window_logs() {
        let mut last = None;

        assert!(should_log(&mut last));
        assert!(!should_log(&mut last));

        last = Instant::now().checked_sub(LOG_THROTTLE);
        assert!(should_log(&mut last));
    }
}
