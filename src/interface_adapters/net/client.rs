use crate::domain::{PlayerInput, SessionId};
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::ClientMessage;
use crate::interface_adapters::state::AppState;
use crate::use_cases::monitor::should_log;
use crate::use_cases::{ClientSession, ControlError, ControlHandle, Frame};

use axum::{
    Json,
    extract::{
        State,
        ws::{
            CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code,
            rejection::WebSocketUpgradeRejection,
        },
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::SinkExt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, info, info_span, warn};

const MAX_INVALID_JSON: u32 = 10;
const MAX_DISPLAY_NAME_CHARS: usize = 32;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

// Correlates log lines before a session id exists.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug)]
enum NetError {
    #[allow(dead_code)]
    Ws(axum::Error),
    ControlClosed,
    JoinRequired,
    JoinTimeout,
    InvalidName,
    ClosedBeforeJoin,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

pub async fn ws_handler(
    State(state): State<Arc<AppState>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if !state.accepting_sessions() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::new("game loop is not running")),
        )
            .into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let control = state.control.clone();
    let outbound_capacity = state.outbound_capacity;
    let conn_id = NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed);
    let span = info_span!("conn", conn_id, session_id = tracing::field::Empty);
    ws.on_upgrade(move |socket| handle_socket(socket, control, outbound_capacity).instrument(span))
}

async fn handle_socket(mut socket: WebSocket, control: ControlHandle, outbound_capacity: usize) {
    let mut ctx = match bootstrap_connection(&mut socket, control, outbound_capacity).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(NetError::ControlClosed) => {
            warn!("game loop unavailable during join");
            let _ = send_close_with_reason(&mut socket, close_code::AGAIN, "server unavailable").await;
            return;
        }
        Err(e) => {
            // The handshake already told the client why.
            warn!(error = ?e, "join handshake failed");
            return;
        }
    };

    Span::current().record("session_id", ctx.session_id);
    info!(
        session_id = ctx.session_id,
        display_name = %ctx.display_name,
        "client connected"
    );

    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
    disconnect_cleanup(&ctx).await;
}

struct ConnCtx {
    session_id: SessionId,
    display_name: String,
    control: ControlHandle,
    // Frames the game loop addressed to this session.
    outbound_rx: mpsc::Receiver<Frame>,

    msgs_in: u64,
    msgs_out: u64,
    bytes_in: u64,
    bytes_out: u64,

    invalid_json: u32,

    last_input_full_log: Option<Instant>,
    last_invalid_input_log: Option<Instant>,

    close_frame: Option<CloseFrame>,
}

#[derive(Debug)]
struct JoinHandshake {
    display_name: String,
    bytes_in: u64,
    msgs_in: u64,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    control: ControlHandle,
    outbound_capacity: usize,
) -> Result<ConnCtx, NetError> {
    let join = match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(socket)).await {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };

    let session_id = control
        .request_id()
        .await
        .map_err(|_| NetError::ControlClosed)?;

    // The sink is created before connect so the Hello is already queued
    // when the client loop starts reading.
    let (sink, outbound_rx) = mpsc::channel(outbound_capacity.max(1));
    control
        .connect(ClientSession::new(
            session_id,
            join.display_name.clone(),
            sink,
        ))
        .await
        .map_err(|_| NetError::ControlClosed)?;

    Ok(ConnCtx {
        session_id,
        display_name: join.display_name,
        control,
        outbound_rx,

        msgs_in: join.msgs_in,
        msgs_out: 0,
        bytes_in: join.bytes_in,
        bytes_out: 0,

        invalid_json: 0,

        last_input_full_log: None,
        last_invalid_input_log: None,

        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn read_join_handshake(socket: &mut WebSocket) -> Result<JoinHandshake, NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        match incoming? {
            Message::Text(text) => {
                let bytes_in = text.len() as u64;
                let payload = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => payload,
                    Ok(ClientMessage::Input(_)) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "join required")
                            .await;
                        return Err(NetError::JoinRequired);
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid join payload",
                        )
                        .await;
                        return Err(NetError::JoinRequired);
                    }
                };

                let Some(display_name) = normalize_display_name(&payload.display_name) else {
                    let _ =
                        send_close_with_reason(socket, close_code::POLICY, "invalid display name")
                            .await;
                    return Err(NetError::InvalidName);
                };

                return Ok(JoinHandshake {
                    display_name,
                    bytes_in,
                    msgs_in: 1,
                });
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn normalize_display_name(raw: &str) -> Option<String> {
    let name = raw.trim();
    let chars = name.chars().count();
    if chars == 0 || chars > MAX_DISPLAY_NAME_CHARS || name.chars().any(char::is_control) {
        return None;
    }
    Some(name.to_string())
}

fn sanitize_input(mut input: PlayerInput) -> Option<PlayerInput> {
    if !input.thrust.is_finite() || !input.turn.is_finite() {
        return None;
    }

    input.thrust = input.thrust.clamp(-1.0, 1.0);
    input.turn = input.turn.clamp(-1.0, 1.0);

    Some(input)
}

fn process_input_message(ctx: &mut ConnCtx, input: PlayerInput) -> Result<LoopControl, NetError> {
    let session_id = ctx.session_id;
    let Some(input) = sanitize_input(input) else {
        if should_log(&mut ctx.last_invalid_input_log) {
            warn!(session_id, "invalid input values (NaN/inf); dropping");
        }
        return Ok(LoopControl::Continue);
    };

    // Never wait on the game loop from the socket task; a later input
    // supersedes a dropped one anyway.
    match ctx.control.try_submit_input(session_id, input) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(ControlError::Full) => {
            if should_log(&mut ctx.last_input_full_log) {
                warn!(session_id, "control channel full; dropping input");
            }
            Ok(LoopControl::Continue)
        }
        Err(ControlError::Closed) => Err(NetError::ControlClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(incoming, ctx).await {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            frame = ctx.outbound_rx.recv() => {
                match frame {
                    Some(frame) => match forward_frame(frame, socket, ctx).await {
                        LoopControl::Continue => false,
                        LoopControl::Disconnect => true,
                    },
                    None => {
                        // The game loop let go of this session: shutdown or reaped.
                        ctx.close_frame = Some(CloseFrame {
                            code: close_code::AWAY,
                            reason: "session ended by server".into(),
                        });
                        true
                    }
                }
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    incoming: Option<Result<Message, axum::Error>>,
    ctx: &mut ConnCtx,
) -> Result<LoopControl, NetError> {
    let session_id = ctx.session_id;
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(_)) => {
                        // Identity is fixed at the handshake.
                        if should_log(&mut ctx.last_invalid_input_log) {
                            warn!(session_id, "duplicate join ignored");
                        }
                        Ok(LoopControl::Continue)
                    }
                    Ok(ClientMessage::Input(input)) => process_input_message(ctx, input.into()),
                    Err(parse_err) => {
                        ctx.invalid_json += 1;
                        if should_log(&mut ctx.last_invalid_input_log) {
                            warn!(
                                session_id,
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }

                        if ctx.invalid_json > MAX_INVALID_JSON {
                            ctx.close_frame = Some(CloseFrame {
                                code: close_code::POLICY,
                                reason: "too many invalid messages".into(),
                            });
                            return Ok(LoopControl::Disconnect);
                        }

                        Ok(LoopControl::Continue)
                    }
                }
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                Ok(LoopControl::Disconnect)
            }
            Message::Ping(_) | Message::Pong(_) => Ok(LoopControl::Continue),
            Message::Close(_) => Ok(LoopControl::Disconnect),
        },
        Some(Err(e)) => {
            warn!(session_id, error = %e, "websocket recv error");
            let report = format!("session {session_id}: websocket error: {e}");
            if ctx.control.report_error(report).await.is_err() {
                debug!(session_id, "game loop gone; socket error not reported");
            }
            Ok(LoopControl::Disconnect)
        }
        None => {
            info!(session_id, "websocket closed");
            Ok(LoopControl::Disconnect)
        }
    }
}

async fn forward_frame(frame: Frame, socket: &mut WebSocket, ctx: &mut ConnCtx) -> LoopControl {
    let bytes_len = frame.len();
    match socket.send(Message::Text(frame)).await.map_err(NetError::Ws) {
        Ok(()) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes_len as u64;
            LoopControl::Continue
        }
        Err(err) => {
            // Disconnect follows immediately.
            warn!(error = ?err, "failed to send frame");
            LoopControl::Disconnect
        }
    }
}

async fn disconnect_cleanup(ctx: &ConnCtx) {
    // A second disconnect for an already reaped session is a no-op in the loop.
    if let Err(e) = ctx.control.disconnect(ctx.session_id).await {
        debug!(session_id = ctx.session_id, error = %e, "disconnect not delivered");
    }

    debug!(
        session_id = ctx.session_id,
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_json = ctx.invalid_json,
        "connection stats"
    );
    info!(session_id = ctx.session_id, "client disconnected");
}
