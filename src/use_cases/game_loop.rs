//! Authoritative game loop.
//!
//! [`GameLoop`] exclusively owns the [`World`] and the [`SessionRegistry`]. It
//! is registered on the event bus as the listener for `Tick` and
//! `ProjectileFired`, so all of its work runs on the dispatch loop and needs no
//! locking. Each tick it:
//!
//! 1. steps the simulation and publishes whatever events the step emitted
//!    (they are dispatched on a later iteration, never inline);
//! 2. drains pending control commands up to its [`ControlBudget`];
//! 3. broadcasts the world snapshot to every session;
//! 4. on every `leaderboard_every`-th frame, broadcasts the leaderboard.
//!
//! `ProjectileFired` is answered with a shot broadcast whenever it arrives,
//! independent of the tick cadence.

use crate::domain::{
    Event, EventKind, Leaderboard, PlayerInput, ProjectileFired, SessionId, TickEvent,
    UserInputEvent, UserJoinedEvent, UserLeftEvent, World,
};
use crate::use_cases::control::{ControlBudget, ControlCommand};
use crate::use_cases::event_bus::{Listener, PublishError, Publisher};
use crate::use_cases::monitor::{LoopStats, StepMonitor, should_log};
use crate::use_cases::sessions::{ClientSession, SendOutcome, SessionRegistry};
use crate::use_cases::simulation::Simulation;
use crate::use_cases::types::{FrameEncoder, OutboundMessage};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct GameLoopSettings {
    /// Control commands absorbed per tick.
    pub control_budget: ControlBudget,
    /// Leaderboard is broadcast when `frame_id % leaderboard_every == 0` (0 disables).
    pub leaderboard_every: u64,
    /// Stats snapshot is published when `frame_id % stats_every == 0` (0 disables).
    pub stats_every: u64,
    /// Upper bound on the elapsed time handed to one simulation step.
    pub max_step: Duration,
}

impl Default for GameLoopSettings {
    fn default() -> Self {
        Self {
            control_budget: ControlBudget::Unlimited,
            leaderboard_every: 50,
            stats_every: 60,
            max_step: Duration::from_millis(50),
        }
    }
}

pub struct GameLoop {
    world: World,
    sessions: SessionRegistry,
    simulation: Box<dyn Simulation>,
    encoder: Box<dyn FrameEncoder>,
    control_rx: mpsc::Receiver<ControlCommand>,
    publisher: Publisher,
    settings: GameLoopSettings,
    // Last id handed out; ids start at 1 and are never reused.
    last_session_id: SessionId,
    last_tick_at: Option<Instant>,
    running: bool,
    shutdown_tx: watch::Sender<bool>,
    monitor: StepMonitor,
    stats_tx: watch::Sender<LoopStats>,
    last_drop_log: Option<Instant>,
    last_publish_log: Option<Instant>,
}

impl GameLoop {
    /// Kinds the game loop must be subscribed to.
    pub const KINDS: [EventKind; 2] = [EventKind::Tick, EventKind::ProjectileFired];

    pub fn new<S, E>(
        control_rx: mpsc::Receiver<ControlCommand>,
        publisher: Publisher,
        simulation: S,
        encoder: E,
        settings: GameLoopSettings,
    ) -> Self
    where
        S: Simulation + 'static,
        E: FrameEncoder + 'static,
    {
        let (shutdown_tx, _) = watch::channel(false);
        let (stats_tx, _) = watch::channel(LoopStats::default());
        Self {
            world: World::new(),
            sessions: SessionRegistry::new(),
            simulation: Box::new(simulation),
            encoder: Box::new(encoder),
            control_rx,
            publisher,
            settings,
            last_session_id: 0,
            last_tick_at: None,
            running: true,
            shutdown_tx,
            monitor: StepMonitor::default(),
            stats_tx,
            last_drop_log: None,
            last_publish_log: None,
        }
    }

    /// Flips to `true` once a `Shutdown` command has been absorbed.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    pub fn stats(&self) -> watch::Receiver<LoopStats> {
        self.stats_tx.subscribe()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn on_tick(&mut self, tick: &TickEvent) {
        if !self.running {
            return;
        }

        let elapsed = self.elapsed_until(tick.at);
        self.step_simulation(elapsed);

        self.drain_control();
        if !self.running {
            return;
        }

        let snapshot = self.world.snapshot(tick.frame_id);
        self.broadcast(&OutboundMessage::WorldSnapshot(snapshot));

        if is_due(tick.frame_id, self.settings.leaderboard_every) {
            let leaderboard = Leaderboard::from_world(&self.world);
            self.broadcast(&OutboundMessage::Leaderboard(leaderboard));
        }

        if is_due(tick.frame_id, self.settings.stats_every) {
            self.publish_stats(tick.frame_id);
        }
    }

    pub fn on_projectile_fired(&mut self, fired: &ProjectileFired) {
        if !self.running {
            return;
        }
        self.broadcast(&OutboundMessage::Shot(fired.projectile.clone()));
    }

    /// Absorbs pending control commands without waiting, up to the budget.
    /// Returns how many were handled.
    pub fn drain_control(&mut self) -> usize {
        let mut drained = 0;
        while self.running && self.settings.control_budget.allows(drained) {
            let Ok(command) = self.control_rx.try_recv() else {
                break;
            };
            drained += 1;
            self.handle_command(command);
        }
        drained
    }

    fn elapsed_until(&mut self, at: Instant) -> Duration {
        let elapsed = match self.last_tick_at {
            Some(previous) => at.saturating_duration_since(previous),
            None => Duration::ZERO,
        };
        self.last_tick_at = Some(at);

        if elapsed > self.settings.max_step {
            debug!(
                elapsed_ms = elapsed.as_millis() as u64,
                "large tick gap; capping simulation step"
            );
            self.settings.max_step
        } else {
            elapsed
        }
    }

    fn step_simulation(&mut self, elapsed: Duration) {
        let started = Instant::now();
        let events = self.simulation.step(&mut self.world, elapsed);
        self.monitor.record(started.elapsed());

        for event in events {
            self.notify(event);
        }
    }

    fn handle_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Connect(session) => self.handle_connect(session),
            ControlCommand::Disconnect { session_id } => self.handle_disconnect(session_id),
            ControlCommand::Input { session_id, input } => self.handle_input(session_id, input),
            ControlCommand::RequestId { reply } => self.handle_request_id(reply),
            ControlCommand::ReportError { message } => {
                warn!(error = %message, "session reported error");
            }
            ControlCommand::Shutdown => {
                info!(sessions = self.sessions.len(), "shutdown requested");
                self.running = false;
                self.shutdown_tx.send_replace(true);
            }
        }
    }

    fn handle_connect(&mut self, session: ClientSession) {
        let id = session.id;
        let name = session.name.clone();
        if self.sessions.insert(session).is_some() {
            warn!(session_id = id, "session re-registered; previous sink replaced");
        }
        if !self.world.contains_spaceship(id) {
            self.simulation.spawn(&mut self.world, id);
        }
        info!(
            session_id = id,
            name = %name,
            sessions = self.sessions.len(),
            "client connected"
        );

        let hello = OutboundMessage::Hello {
            my_id: id,
            id_to_name: self.sessions.names(),
        };
        self.send_private(id, &hello);
        if !self.sessions.contains(id) {
            // Sink closed before the join was absorbed; the reap already
            // announced the departure.
            debug!(session_id = id, "session gone before join was announced");
            return;
        }
        self.broadcast(&OutboundMessage::PlayerJoined {
            id,
            name: name.clone(),
        });
        self.notify(Event::UserJoined(UserJoinedEvent {
            session_id: id,
            name,
        }));
    }

    fn handle_disconnect(&mut self, id: SessionId) {
        if self.remove_session(id) {
            self.broadcast(&OutboundMessage::PlayerLeft { id });
        } else {
            debug!(session_id = id, "disconnect for unknown session ignored");
        }
    }

    fn handle_input(&mut self, id: SessionId, input: PlayerInput) {
        if !self.sessions.contains(id) {
            debug!(session_id = id, "input for unknown session ignored");
            return;
        }
        self.world.queue_input(id, input);
        self.notify(Event::UserInput(UserInputEvent {
            session_id: id,
            input,
        }));
    }

    fn handle_request_id(&mut self, reply: oneshot::Sender<SessionId>) {
        let Some(id) = self.last_session_id.checked_add(1) else {
            // Dropping the reply tells the requester no id is available.
            error!("session id space exhausted");
            return;
        };
        self.last_session_id = id;
        if reply.send(id).is_err() {
            debug!(session_id = id, "id requester went away; id stays retired");
        }
    }

    /// Drops the session and its ship. Returns false for unknown ids.
    fn remove_session(&mut self, id: SessionId) -> bool {
        let Some(session) = self.sessions.remove(id) else {
            return false;
        };
        self.world.remove_spaceship(id);
        info!(
            session_id = id,
            name = %session.name,
            sessions = self.sessions.len(),
            "client disconnected"
        );
        self.notify(Event::UserLeft(UserLeftEvent { session_id: id }));
        true
    }

    fn send_private(&mut self, id: SessionId, msg: &OutboundMessage) {
        let frame = match self.encoder.encode(msg) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, message = msg.label(), session_id = id, "skipping send");
                return;
            }
        };
        if self.sessions.send_to(id, frame) == Some(SendOutcome::Closed) {
            self.reap(vec![id]);
        }
    }

    fn broadcast(&mut self, msg: &OutboundMessage) {
        let closed = self.fan_out(msg);
        self.reap(closed);
    }

    // Encodes once and offers the frame to every session; returns the ids
    // whose sinks turned out to be closed.
    fn fan_out(&mut self, msg: &OutboundMessage) -> Vec<SessionId> {
        let frame = match self.encoder.encode(msg) {
            Ok(frame) => frame,
            Err(e) => {
                error!(error = %e, message = msg.label(), "skipping broadcast");
                return Vec::new();
            }
        };

        let report = self.sessions.broadcast(&frame);
        if report.dropped > 0 && should_log(&mut self.last_drop_log) {
            warn!(
                dropped = report.dropped,
                message = msg.label(),
                "outbound sinks full; frames dropped"
            );
        }
        report.closed
    }

    // Sessions whose socket writer is gone leave through the ordinary
    // disconnect path; announcing one departure may uncover more.
    fn reap(&mut self, mut closed: Vec<SessionId>) {
        while let Some(id) = closed.pop() {
            if self.remove_session(id) {
                debug!(session_id = id, "reaped session with closed sink");
                let more = self.fan_out(&OutboundMessage::PlayerLeft { id });
                closed.extend(more);
            }
        }
    }

    // Bus notifications from inside the dispatch loop never wait.
    fn notify(&mut self, event: Event) {
        match self.publisher.try_publish(event) {
            Ok(()) => {}
            Err(PublishError::Full(event)) => {
                if should_log(&mut self.last_publish_log) {
                    warn!(kind = ?event.kind(), "event queue full; event dropped");
                }
            }
            Err(PublishError::Closed(event)) => {
                debug!(kind = ?event.kind(), "event bus closed; event dropped");
            }
        }
    }

    fn publish_stats(&mut self, frame_id: u64) {
        let stats = LoopStats {
            frame_id,
            sessions: self.sessions.len(),
            ships: self.world.spaceships.len(),
            projectiles: self.world.projectiles.len(),
            pending_control: self.control_rx.len(),
            steps: self.monitor.take_window(),
        };
        debug!(
            frame_id,
            sessions = stats.sessions,
            pending_control = stats.pending_control,
            avg_step_us = stats.steps.average.as_micros() as u64,
            max_step_us = stats.steps.max.as_micros() as u64,
            "loop stats"
        );
        self.stats_tx.send_replace(stats);
    }
}

impl Listener for GameLoop {
    fn on_event(&mut self, event: &Event) {
        match event {
            Event::Tick(tick) => self.on_tick(tick),
            Event::ProjectileFired(fired) => self.on_projectile_fired(fired),
            Event::UserInput(_) | Event::UserJoined(_) | Event::UserLeft(_) => {}
        }
    }
}

fn is_due(frame_id: u64, every: u64) -> bool {
    every != 0 && frame_id % every == 0
}
