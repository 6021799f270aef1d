use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use lasertag_core::net::messages::ClientAction;
use lasertag_core::net::protocol::decode_action;
use lasertag_core::player::{PlayerId, Room, TeamColor};

use crate::state::{AppState, ConnectionGuard};

/// Connection classification from the URL path segment:
/// `lobby` | `game` | `spectate`. Anything else falls back to the lobby.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoomHint {
    Lobby,
    Game,
    Spectate,
}

impl RoomHint {
    fn parse(s: &str) -> Self {
        match s {
            "game" => Self::Game,
            "spectate" => Self::Spectate,
            _ => Self::Lobby,
        }
    }
}

/// Identity declared by player connections via query parameters. Absent for
/// spectators.
#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    pub player: Option<String>,
    pub color: Option<String>,
}

/// `/ws/{code}` — no room hint means lobby.
pub async fn ws_connect_default(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    serve(state, code, RoomHint::Lobby, query, ws)
}

/// `/ws/{code}/{room}`
pub async fn ws_connect(
    State(state): State<AppState>,
    Path((code, room)): Path<(String, String)>,
    Query(query): Query<ConnectQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    serve(state, code, RoomHint::parse(&room), query, ws)
}

fn serve(
    state: AppState,
    code: String,
    hint: RoomHint,
    query: ConnectQuery,
    ws: WebSocketUpgrade,
) -> Response {
    let max = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max {
        tracing::warn!(current, max, "WS connection limit reached");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));

    ws.on_upgrade(move |socket| handle_socket(socket, state, code, hint, query, guard))
        .into_response()
}

async fn handle_socket(
    mut socket: WebSocket,
    state: AppState,
    code: String,
    hint: RoomHint,
    query: ConnectQuery,
    _guard: ConnectionGuard,
) {
    if hint == RoomHint::Spectate {
        spectate(socket, state, code).await;
        return;
    }

    // Player paths must declare a display name; the claimed color is
    // optional but must come from the scanner palette to count.
    let Some(name) = query
        .player
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
    else {
        close_with_policy(&mut socket, "player name required").await;
        return;
    };
    let color = query
        .color
        .as_deref()
        .and_then(|c| c.parse::<TeamColor>().ok());
    let room = match hint {
        RoomHint::Game => Room::Battle,
        _ => Room::Lobby,
    };

    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.player_message_buffer);
    let joined = {
        let mut registry = state.registry.write().await;
        registry.connect_player(&code, &name, color, room, tx)
    };
    let player_id = match joined {
        Ok(id) => id,
        Err(refusal) => {
            tracing::warn!(%code, %name, %refusal, "player connection refused");
            close_with_policy(&mut socket, "session is full").await;
            return;
        },
    };

    let (ws_tx, ws_rx) = socket.split();
    spawn_writer(ws_tx, rx);

    read_loop(ws_rx, &state, &code, player_id).await;

    let mut registry = state.registry.write().await;
    registry.disconnect_player(&code, player_id, Instant::now());
    drop(registry);
    tracing::info!(player_id, %code, "player disconnected");
}

async fn spectate(socket: WebSocket, state: AppState, code: String) {
    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.player_message_buffer);
    let spectator_id = {
        let mut registry = state.registry.write().await;
        registry.connect_spectator(&code, tx)
    };
    tracing::info!(%code, %spectator_id, "spectator joined");

    let (ws_tx, mut ws_rx) = socket.split();
    spawn_writer(ws_tx, rx);

    // Spectators send nothing meaningful; drain until the socket closes.
    while let Some(Ok(msg)) = ws_rx.next().await {
        if matches!(msg, Message::Close(_)) {
            break;
        }
    }

    let mut registry = state.registry.write().await;
    registry.disconnect_spectator(&code, &spectator_id, Instant::now());
    drop(registry);
    tracing::info!(%code, %spectator_id, "spectator disconnected");
}

async fn close_with_policy(socket: &mut WebSocket, reason: &'static str) {
    let frame = CloseFrame {
        code: close_code::POLICY,
        reason: Utf8Bytes::from_static(reason),
    };
    if let Err(e) = socket.send(Message::Close(Some(frame))).await {
        tracing::debug!(error = %e, "failed to send close frame");
    }
}

fn spawn_writer(mut ws_tx: SplitSink<WebSocket, Message>, mut rx: mpsc::Receiver<Utf8Bytes>) {
    tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    mut ws_rx: SplitStream<WebSocket>,
    state: &AppState,
    code: &str,
    player_id: PlayerId,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut limiter = RateLimiter::new(rate, rate);

    while let Some(Ok(msg)) = ws_rx.next().await {
        let text = match msg {
            Message::Text(t) => t,
            Message::Close(_) => break,
            _ => continue,
        };

        if !limiter.allow() {
            tracing::warn!(player_id, code, "rate limited");
            continue;
        }

        // Malformed or unknown actions are dropped; the connection stays
        // open and the sender gets no error.
        match decode_action(text.as_str()) {
            Ok(action) => {
                let leaving = matches!(action, ClientAction::Leave);
                {
                    let mut registry = state.registry.write().await;
                    registry.handle_action(code, player_id, action, Instant::now());
                }
                if leaving {
                    break;
                }
            },
            Err(e) => {
                tracing::debug!(player_id, code, error = %e, "ignoring malformed message");
            },
        }
    }
}
