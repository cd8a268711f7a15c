//! Typed publish/subscribe bus with a single dispatch loop.
//!
//! Every [`EventKind`] owns one bounded FIFO queue and an insertion-ordered
//! list of listeners. [`EventBus::run`] is the only consumer: each iteration it
//! takes exactly one event from one non-empty queue and hands it to every
//! listener of that kind, in registration order, before looking at any queue
//! again. State touched only from listeners therefore never needs a lock.
//!
//! Queues are scanned round-robin starting after the kind serviced last, so a
//! burst of one kind cannot starve another: with every queue backlogged each
//! kind is serviced once per [`EventKind::COUNT`] iterations.
//!
//! Overflow policy: [`Publisher::publish`] waits for space (backpressure, no
//! loss). Code running inside a listener must use [`Publisher::try_publish`],
//! which hands the event back on a full queue, since waiting there would wait
//! on the dispatch loop itself.

use crate::domain::{Event, EventKind};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::watch;
use tracing::{debug, info};

pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;
pub const DEFAULT_IDLE_SLEEP: Duration = Duration::from_millis(5);

// Dispatches in a row before the loop yields back to the runtime.
const DISPATCH_BATCH: u32 = 64;

#[derive(Debug, Clone)]
pub struct BusSettings {
    /// Capacity of each per-kind queue.
    pub queue_capacity: usize,
    /// How long the loop sleeps when every queue is empty.
    pub idle_sleep: Duration,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            idle_sleep: DEFAULT_IDLE_SLEEP,
        }
    }
}

/// Receives events of the kinds it was subscribed to, on the dispatch loop.
pub trait Listener: Send {
    fn on_event(&mut self, event: &Event);
}

impl<F> Listener for F
where
    F: FnMut(&Event) + Send,
{
    fn on_event(&mut self, event: &Event) {
        self(event)
    }
}

/// Handle to a registered listener, used to subscribe it to one or more kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerId(usize);

pub enum PublishError {
    /// The kind's queue is at capacity; the event was not enqueued.
    Full(Event),
    /// The bus is gone.
    Closed(Event),
}

impl PublishError {
    pub fn into_event(self) -> Event {
        match self {
            PublishError::Full(event) | PublishError::Closed(event) => event,
        }
    }
}

impl fmt::Debug for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Full(event) => write!(f, "Full({:?})", event.kind()),
            PublishError::Closed(event) => write!(f, "Closed({:?})", event.kind()),
        }
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::Full(event) => write!(f, "{:?} queue is full", event.kind()),
            PublishError::Closed(event) => write!(f, "{:?} queue is closed", event.kind()),
        }
    }
}

impl std::error::Error for PublishError {}

/// Cloneable, thread-safe entry point for enqueueing events.
#[derive(Clone)]
pub struct Publisher {
    queues: Arc<[mpsc::Sender<Event>]>,
}

impl Publisher {
    fn queue(&self, kind: EventKind) -> &mpsc::Sender<Event> {
        &self.queues[kind.index()]
    }

    /// Enqueues the event, waiting while its queue is full.
    pub async fn publish(&self, event: Event) -> Result<(), PublishError> {
        let queue = self.queue(event.kind());
        queue
            .send(event)
            .await
            .map_err(|e| PublishError::Closed(e.0))
    }

    /// Enqueues the event or hands it back immediately if its queue is full.
    pub fn try_publish(&self, event: Event) -> Result<(), PublishError> {
        let queue = self.queue(event.kind());
        queue.try_send(event).map_err(|e| match e {
            TrySendError::Full(event) => PublishError::Full(event),
            TrySendError::Closed(event) => PublishError::Closed(event),
        })
    }

    /// Waiting variant for plain OS threads. Panics if called from within an
    /// async execution context, like [`mpsc::Sender::blocking_send`].
    pub fn blocking_publish(&self, event: Event) -> Result<(), PublishError> {
        let queue = self.queue(event.kind());
        queue
            .blocking_send(event)
            .map_err(|e| PublishError::Closed(e.0))
    }

    /// Events currently waiting in the kind's queue.
    pub fn pending(&self, kind: EventKind) -> usize {
        let queue = self.queue(kind);
        queue.max_capacity() - queue.capacity()
    }
}

struct Lane {
    kind: EventKind,
    rx: mpsc::Receiver<Event>,
    listeners: Vec<ListenerId>,
}

pub struct EventBus {
    lanes: Vec<Lane>,
    listeners: Vec<Box<dyn Listener>>,
    // Lane the next scan starts from.
    cursor: usize,
    idle_sleep: Duration,
    publisher: Publisher,
}

impl EventBus {
    pub fn new(settings: BusSettings) -> Self {
        let capacity = settings.queue_capacity.max(1);
        let mut senders = Vec::with_capacity(EventKind::COUNT);
        let mut lanes = Vec::with_capacity(EventKind::COUNT);
        for kind in EventKind::ALL {
            let (tx, rx) = mpsc::channel::<Event>(capacity);
            senders.push(tx);
            lanes.push(Lane {
                kind,
                rx,
                listeners: Vec::new(),
            });
        }

        Self {
            lanes,
            listeners: Vec::new(),
            cursor: 0,
            idle_sleep: settings.idle_sleep,
            publisher: Publisher {
                queues: senders.into(),
            },
        }
    }

    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Takes ownership of a listener. It receives nothing until subscribed.
    pub fn register<L>(&mut self, listener: L) -> ListenerId
    where
        L: Listener + 'static,
    {
        self.listeners.push(Box::new(listener));
        ListenerId(self.listeners.len() - 1)
    }

    /// Appends the listener to the kind's dispatch order.
    ///
    /// Subscriptions are fixed once [`EventBus::run`] takes the bus by value.
    pub fn subscribe(&mut self, kind: EventKind, listener: ListenerId) {
        self.lanes[kind.index()].listeners.push(listener);
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.lanes[kind.index()].listeners.len()
    }

    /// Dispatches at most one event and reports its kind, or `None` when every
    /// queue is empty.
    pub fn dispatch_next(&mut self) -> Option<EventKind> {
        let lane_count = self.lanes.len();
        for offset in 0..lane_count {
            let index = (self.cursor + offset) % lane_count;
            let Ok(event) = self.lanes[index].rx.try_recv() else {
                continue;
            };
            self.cursor = (index + 1) % lane_count;

            for id in &self.lanes[index].listeners {
                self.listeners[id.0].on_event(&event);
            }
            return Some(self.lanes[index].kind);
        }
        None
    }

    /// Runs the dispatch loop until `shutdown` turns true or its sender is dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            listeners = self.listeners.len(),
            idle_sleep_ms = self.idle_sleep.as_millis() as u64,
            "event dispatcher running"
        );

        let mut batch = 0u32;
        loop {
            if *shutdown.borrow() {
                break;
            }

            if self.dispatch_next().is_some() {
                batch += 1;
                if batch >= DISPATCH_BATCH {
                    batch = 0;
                    tokio::task::yield_now().await;
                }
                continue;
            }
            batch = 0;

            // Nothing pending: trade a little latency for an idle CPU.
            tokio::select! {
                _ = tokio::time::sleep(self.idle_sleep) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("shutdown sender dropped");
                        break;
                    }
                }
            }
        }

        info!("event dispatcher stopped");
    }
}
