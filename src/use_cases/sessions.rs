// Session registry: who is connected and where their outbound frames go.
//
// Only the game loop owns a registry. Sends never wait: a full or closed sink
// affects that one session and never the rest of a broadcast.

use crate::domain::SessionId;
use crate::use_cases::types::Frame;
use std::collections::BTreeMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

/// Outbound queue drained by the session's socket writer.
pub type SessionSink = mpsc::Sender<Frame>;

pub struct ClientSession {
    pub id: SessionId,
    pub name: String,
    sink: SessionSink,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Delivered,
    // Sink full (slow socket); the frame is skipped for this session only.
    Dropped,
    // Socket writer is gone.
    Closed,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    pub closed: Vec<SessionId>,
}

impl ClientSession {
    pub fn new(id: SessionId, name: impl Into<String>, sink: SessionSink) -> Self {
        Self {
            id,
            name: name.into(),
            sink,
        }
    }

    pub fn send(&self, frame: Frame) -> SendOutcome {
        match self.sink.try_send(frame) {
            Ok(()) => SendOutcome::Delivered,
            Err(TrySendError::Full(_)) => {
                debug!(session_id = self.id, "outbound sink full; frame dropped");
                SendOutcome::Dropped
            }
            Err(TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, ClientSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: BTreeMap::new(),
        }
    }

    /// Registers the session, returning any previous session with the same id.
    pub fn insert(&mut self, session: ClientSession) -> Option<ClientSession> {
        self.sessions.insert(session.id, session)
    }

    pub fn remove(&mut self, id: SessionId) -> Option<ClientSession> {
        self.sessions.remove(&id)
    }

    pub fn get(&self, id: SessionId) -> Option<&ClientSession> {
        self.sessions.get(&id)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn names(&self) -> BTreeMap<SessionId, String> {
        self.sessions
            .values()
            .map(|s| (s.id, s.name.clone()))
            .collect()
    }

    pub fn for_each(&self, mut f: impl FnMut(&ClientSession)) {
        for session in self.sessions.values() {
            f(session);
        }
    }

    /// `None` when the id is not registered.
    pub fn send_to(&self, id: SessionId, frame: Frame) -> Option<SendOutcome> {
        self.get(id).map(|s| s.send(frame))
    }

    /// Offers the frame to every session; failures are collected, not propagated.
    pub fn broadcast(&self, frame: &Frame) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        self.for_each(|session| match session.send(frame.clone()) {
            SendOutcome::Delivered => report.delivered += 1,
            SendOutcome::Dropped => report.dropped += 1,
            SendOutcome::Closed => report.closed.push(session.id),
        });
        report
    }
}
