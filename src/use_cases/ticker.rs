// Timer source publishing Tick events at a fixed rate.

use crate::domain::{Event, TickEvent};
use crate::use_cases::event_bus::Publisher;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{info, warn};

/// Publishes `Tick` with frame ids 1, 2, 3, ... until shutdown or the bus closes.
///
/// Publishing waits when the tick queue is full, so a stalled dispatcher
/// slows the ticker down instead of losing frames.
pub async fn run_ticker(
    publisher: Publisher,
    tick_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(tick_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first tick fires immediately; skip it so frame 1 lands one interval in.
    interval.tick().await;

    info!(
        tick_interval_ms = tick_interval.as_millis() as u64,
        "ticker running"
    );

    let mut frame_id: u64 = 0;
    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
            at = interval.tick() => {
                frame_id += 1;
                let tick = Event::Tick(TickEvent {
                    frame_id,
                    at: at.into_std(),
                });
                if publisher.publish(tick).await.is_err() {
                    warn!(frame_id, "event bus closed; ticker exiting");
                    break;
                }
            }
        }
    }

    info!(last_frame_id = frame_id, "ticker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EventKind;
    use crate::use_cases::event_bus::{BusSettings, EventBus};
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn when_ticker_runs_then_frame_ids_increase_from_one() {
        let mut bus = EventBus::new(BusSettings::default());
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = frames.clone();
        let id = bus.register(move |event: &Event| {
            if let Event::Tick(tick) = event {
                sink.lock().expect("frames mutex poisoned").push(tick.frame_id);
            }
        });
        bus.subscribe(EventKind::Tick, id);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let ticker = tokio::spawn(run_ticker(
            bus.publisher(),
            Duration::from_millis(2),
            shutdown_rx,
        ));
        tokio::time::timeout(Duration::from_secs(2), async {
            while bus.publisher().pending(EventKind::Tick) < 3 {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("ticker should publish three ticks");

        shutdown_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), ticker)
            .await
            .expect("ticker should stop")
            .expect("ticker task should not panic");

        while bus.dispatch_next().is_some() {}
        let frames = frames.lock().expect("frames mutex poisoned");
        assert!(frames.len() >= 3);
        let expected: Vec<u64> = (1..=frames.len() as u64).collect();
        assert_eq!(*frames, expected);
    }

    #[tokio::test]
    async fn when_bus_is_dropped_then_ticker_exits() {
        let bus = EventBus::new(BusSettings::default());
        let publisher = bus.publisher();
        drop(bus);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::time::timeout(
            Duration::from_secs(1),
            run_ticker(publisher, Duration::from_millis(1), shutdown_rx),
        )
        .await
        .expect("ticker should exit once the bus is gone");
    }
}
