// Imperative commands to the game loop, sent by transport sessions.
//
// All commands share one FIFO channel, so a connect followed by that
// session's input is always absorbed in that order.

use crate::domain::{PlayerInput, SessionId};
use crate::use_cases::sessions::ClientSession;
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;

pub enum ControlCommand {
    Connect(ClientSession),
    Disconnect {
        session_id: SessionId,
    },
    Input {
        session_id: SessionId,
        input: PlayerInput,
    },
    // The fresh id is returned over the dedicated reply channel.
    RequestId {
        reply: oneshot::Sender<SessionId>,
    },
    ReportError {
        message: String,
    },
    Shutdown,
}

impl ControlCommand {
    pub fn label(&self) -> &'static str {
        match self {
            ControlCommand::Connect(_) => "connect",
            ControlCommand::Disconnect { .. } => "disconnect",
            ControlCommand::Input { .. } => "input",
            ControlCommand::RequestId { .. } => "request_id",
            ControlCommand::ReportError { .. } => "report_error",
            ControlCommand::Shutdown => "shutdown",
        }
    }
}

impl fmt::Debug for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Connect(session) => write!(f, "Connect({})", session.id),
            ControlCommand::Disconnect { session_id } => write!(f, "Disconnect({session_id})"),
            ControlCommand::Input { session_id, input } => {
                write!(f, "Input({session_id}, {input:?})")
            }
            ControlCommand::RequestId { .. } => write!(f, "RequestId"),
            ControlCommand::ReportError { message } => write!(f, "ReportError({message})"),
            ControlCommand::Shutdown => write!(f, "Shutdown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlError {
    /// The game loop is gone (shut down or never started).
    Closed,
    /// The control channel is at capacity; only returned by non-waiting sends.
    Full,
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlError::Closed => write!(f, "control channel closed"),
            ControlError::Full => write!(f, "control channel full"),
        }
    }
}

impl std::error::Error for ControlError {}

/// How many control commands the game loop absorbs per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ControlBudget {
    /// Drain until the channel is empty.
    #[default]
    Unlimited,
    /// Drain at most this many; a burst of N commands takes N / cap ticks.
    PerTick(NonZeroUsize),
}

impl ControlBudget {
    pub const ONE_PER_TICK: ControlBudget = ControlBudget::PerTick(NonZeroUsize::MIN);

    /// Whether another command may be drained after `drained` this tick.
    pub fn allows(self, drained: usize) -> bool {
        match self {
            ControlBudget::Unlimited => true,
            ControlBudget::PerTick(cap) => drained < cap.get(),
        }
    }
}

impl FromStr for ControlBudget {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("all") || value.eq_ignore_ascii_case("unlimited") {
            return Ok(ControlBudget::Unlimited);
        }
        value
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .map(ControlBudget::PerTick)
            .ok_or_else(|| format!("invalid control budget {value:?}; expected \"all\" or a positive count"))
    }
}

/// Sending half of the control channel, cloned into every transport session.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlCommand>,
}

pub fn control_channel(capacity: usize) -> (ControlHandle, mpsc::Receiver<ControlCommand>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ControlHandle { tx }, rx)
}

impl ControlHandle {
    async fn send(&self, command: ControlCommand) -> Result<(), ControlError> {
        self.tx.send(command).await.map_err(|_| ControlError::Closed)
    }

    pub async fn connect(&self, session: ClientSession) -> Result<(), ControlError> {
        self.send(ControlCommand::Connect(session)).await
    }

    pub async fn disconnect(&self, session_id: SessionId) -> Result<(), ControlError> {
        self.send(ControlCommand::Disconnect { session_id }).await
    }

    pub async fn submit_input(
        &self,
        session_id: SessionId,
        input: PlayerInput,
    ) -> Result<(), ControlError> {
        self.send(ControlCommand::Input { session_id, input }).await
    }

    /// Non-waiting input submission; the caller decides whether to drop on `Full`.
    pub fn try_submit_input(
        &self,
        session_id: SessionId,
        input: PlayerInput,
    ) -> Result<(), ControlError> {
        self.tx
            .try_send(ControlCommand::Input { session_id, input })
            .map_err(|e| match e {
                TrySendError::Full(_) => ControlError::Full,
                TrySendError::Closed(_) => ControlError::Closed,
            })
    }

    /// Asks the game loop for a fresh session id and waits for the answer.
    pub async fn request_id(&self) -> Result<SessionId, ControlError> {
        let (reply, response) = oneshot::channel();
        self.send(ControlCommand::RequestId { reply }).await?;
        response.await.map_err(|_| ControlError::Closed)
    }

    pub async fn report_error(&self, message: impl Into<String>) -> Result<(), ControlError> {
        self.send(ControlCommand::ReportError {
            message: message.into(),
        })
        .await
    }

    pub async fn shutdown(&self) -> Result<(), ControlError> {
        self.send(ControlCommand::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn when_budget_text_is_all_then_budget_is_unlimited() {
        assert_eq!("all".parse::<ControlBudget>(), Ok(ControlBudget::Unlimited));
        assert_eq!(
            " Unlimited ".parse::<ControlBudget>(),
            Ok(ControlBudget::Unlimited)
        );
    }

    #[test]
    fn when_budget_text_is_a_count_then_budget_caps_per_tick() {
        let budget: ControlBudget = "3".parse().expect("valid budget");

        assert!(budget.allows(0));
        assert!(budget.allows(2));
        assert!(!budget.allows(3));
    }

    #[test]
    fn when_budget_text_is_zero_or_garbage_then_parsing_fails() {
        assert!("0".parse::<ControlBudget>().is_err());
        assert!("lots".parse::<ControlBudget>().is_err());
    }

    #[test]
    fn when_budget_is_one_per_tick_then_only_first_command_is_allowed() {
        let budget = ControlBudget::ONE_PER_TICK;
        assert!(budget.allows(0));
        assert!(!budget.allows(1));
        assert!(ControlBudget::default().allows(usize::MAX - 1));
    }

    #[tokio::test]
    async fn when_id_is_requested_then_reply_channel_carries_the_answer() {
        let (control, mut rx) = control_channel(4);
        let responder = tokio::spawn(async move {
            match rx.recv().await {
                Some(ControlCommand::RequestId { reply }) => {
                    let _ = reply.send(42);
                }
                other => panic!("unexpected command {other:?}"),
            }
        });

        let id = control.request_id().await.expect("id should be granted");

        assert_eq!(id, 42);
        responder.await.expect("responder should not panic");
    }

    #[tokio::test]
    async fn when_request_is_dropped_unanswered_then_request_id_reports_closed() {
        let (control, mut rx) = control_channel(4);
        let responder = tokio::spawn(async move {
            // Receive and drop the reply sender without answering.
            let _ = rx.recv().await;
        });

        assert_eq!(control.request_id().await, Err(ControlError::Closed));
        responder.await.expect("responder should not panic");
    }

    #[test]
    fn when_channel_is_full_then_try_submit_input_reports_full() {
        let (control, _rx) = control_channel(1);

        assert_eq!(control.try_submit_input(1, PlayerInput::default()), Ok(()));
        assert_eq!(
            control.try_submit_input(1, PlayerInput::default()),
            Err(ControlError::Full)
        );
    }

    #[tokio::test]
    async fn when_receiver_is_dropped_then_commands_report_closed() {
        let (control, rx) = control_channel(4);
        drop(rx);

        assert!(control.is_closed());
        assert_eq!(control.disconnect(1).await, Err(ControlError::Closed));
        assert_eq!(
            control.try_submit_input(1, PlayerInput::default()),
            Err(ControlError::Closed)
        );
    }
}
