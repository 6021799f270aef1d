#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use lasertag_core::net::messages::{ClientAction, ServerEvent};
use lasertag_core::net::protocol::decode_event;
use lasertag_server::config::ServerConfig;
use lasertag_server::{build_app, clock};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub struct TestServer {
    pub addr: SocketAddr,
    _server: tokio::task::JoinHandle<()>,
    _clock: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with the default config.
    pub async fn new() -> Self {
        Self::from_config(ServerConfig::default()).await
    }

    pub async fn from_config(config: ServerConfig) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (app, state) = build_app(config);
        let clock_handle = clock::spawn_game_clock(state);
        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            _server: server_handle,
            _clock: clock_handle,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn player_url(&self, code: &str, room: &str, name: &str, color: &str) -> String {
        format!(
            "ws://{}/ws/{code}/{room}?player={name}&color={color}",
            self.addr
        )
    }

    pub fn bare_url(&self, code: &str, room: &str) -> String {
        format!("ws://{}/ws/{code}/{room}", self.addr)
    }

    pub fn spectator_url(&self, code: &str) -> String {
        format!("ws://{}/ws/{code}/spectate", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Join a player into a session's lobby and consume the first lobby roster
/// broadcast.
pub async fn join_lobby(server: &TestServer, code: &str, name: &str, color: &str) -> WsStream {
    let mut stream = ws_connect(&server.player_url(code, "lobby", name, color)).await;
    wait_for(&mut stream, |e| {
        matches!(e, ServerEvent::LobbyUpdate { .. })
    })
    .await;
    stream
}

pub async fn send_action(stream: &mut WsStream, action: &ClientAction) {
    let json = serde_json::to_string(action).unwrap();
    stream.send(Message::Text(json.into())).await.unwrap();
}

pub async fn send_raw(stream: &mut WsStream, text: &str) {
    stream
        .send(Message::Text(text.to_string().into()))
        .await
        .unwrap();
}

/// Read the next ServerEvent from the stream (5s timeout).
pub async fn next_event(stream: &mut WsStream) -> ServerEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return decode_event(text.as_str()).expect("server sent undecodable event");
                },
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
            }
        }
    })
    .await
    .expect("timed out waiting for server event")
}

/// Read events until one matches the predicate (5s timeout).
pub async fn wait_for<F>(stream: &mut WsStream, pred: F) -> ServerEvent
where
    F: Fn(&ServerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = next_event(stream).await;
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for matching event")
}

/// Like `wait_for`, but returns None if nothing matches within the window.
pub async fn try_wait_for<F>(stream: &mut WsStream, timeout_ms: u64, pred: F) -> Option<ServerEvent>
where
    F: Fn(&ServerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    if let Ok(event) = decode_event(text.as_str())
                        && pred(&event)
                    {
                        return event;
                    }
                },
                Some(Ok(_)) => continue,
                _ => std::future::pending::<()>().await,
            }
        }
    })
    .await
    .ok()
}
