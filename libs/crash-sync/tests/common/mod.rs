//! Common test utilities for crash-sync integration tests
//!
//! Provides a scriptable mock crash game server and polling helpers.

#![allow(dead_code)]

use crash_sync::{ClientConfig, GameClient};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tokio_tungstenite::tungstenite::Message;

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

pub const STARTING_BALANCE: f64 = 1000.0;

struct ServerState {
    connections: AtomicUsize,
    /// Record requests without answering them
    silent: AtomicBool,
    received: Mutex<Vec<Value>>,
    push: broadcast::Sender<String>,
    kick: Notify,
    shutdown: Notify,
}

/// A mock crash game server
///
/// Every connection is greeted with `connected` and a waiting round, and
/// `set_player_name`, `place_bet` and `cash_out` are answered the way the
/// real server does. Tests push extra messages to every live connection with
/// [`MockCrashServer::broadcast`] and drop connections with
/// [`MockCrashServer::kick_all`].
pub struct MockCrashServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
}

impl MockCrashServer {
    /// Create and start a new mock server
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (push, _) = broadcast::channel(64);
        let state = Arc::new(ServerState {
            connections: AtomicUsize::new(0),
            silent: AtomicBool::new(false),
            received: Mutex::new(Vec::new()),
            push,
            kick: Notify::new(),
            shutdown: Notify::new(),
        });

        let accept_state = Arc::clone(&state);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let state = Arc::clone(&accept_state);
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, state).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = accept_state.shutdown.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, state }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, state: Arc<ServerState>) {
        use tokio_tungstenite::accept_async;

        let ws_stream = match accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let n = state.connections.fetch_add(1, Ordering::SeqCst) + 1;
        let mut push_rx = state.push.subscribe();
        let (mut write, mut read) = ws_stream.split();
        let mut balance = STARTING_BALANCE;
        let mut bet: Option<Value> = None;

        let greeting = json!({
            "type": "connected",
            "data": {
                "sessionId": format!("session-{:06}", n),
                "balance": balance,
                "gameState": { "phase": "waiting", "multiplier": 1.0, "timeLeft": 5, "currentRound": 1 }
            }
        });
        if write.send(Message::Text(greeting.to_string())).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(Message::Text(text))) => text,
                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                        Some(Ok(_)) => continue,
                    };
                    let Ok(request) = serde_json::from_str::<Value>(&text) else {
                        continue;
                    };
                    state.received.lock().push(request.clone());
                    if state.silent.load(Ordering::SeqCst) {
                        continue;
                    }

                    let reply = match request["type"].as_str() {
                        Some("set_player_name") => Some(json!({
                            "type": "player_name_set",
                            "data": { "playerName": request["data"]["playerName"], "balance": balance }
                        })),
                        Some("place_bet") => {
                            let amount = request["data"]["usdAmount"].as_f64().unwrap_or(0.0);
                            if amount <= 0.0 || amount > balance {
                                Some(json!({ "type": "error", "data": { "message": "Insufficient balance" } }))
                            } else {
                                balance -= amount;
                                let placed = json!({
                                    "usdAmount": amount,
                                    "cryptocurrency": request["data"]["cryptocurrency"]
                                });
                                bet = Some(placed.clone());
                                Some(json!({ "type": "bet_placed", "data": { "newBalance": balance, "bet": placed } }))
                            }
                        }
                        Some("cash_out") => match bet.take() {
                            Some(placed) => {
                                let win = placed["usdAmount"].as_f64().unwrap_or(0.0) * 2.0;
                                balance += win;
                                Some(json!({
                                    "type": "cash_out_success",
                                    "data": { "newBalance": balance, "winAmount": win }
                                }))
                            }
                            None => Some(json!({ "type": "error", "data": { "message": "No active bet" } })),
                        },
                        _ => None,
                    };

                    if let Some(reply) = reply {
                        if write.send(Message::Text(reply.to_string())).await.is_err() {
                            break;
                        }
                    }
                }
                pushed = push_rx.recv() => {
                    match pushed {
                        Ok(text) => {
                            if write.send(Message::Text(text)).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                _ = state.kick.notified() => {
                    let _ = write.close().await;
                    break;
                }
                _ = state.shutdown.notified() => {
                    break;
                }
            }
        }
    }

    /// Get the WebSocket URL for this server
    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Send a message to every live connection
    pub fn broadcast(&self, message: Value) {
        self.broadcast_raw(&message.to_string());
    }

    /// Send arbitrary text, valid JSON or not
    pub fn broadcast_raw(&self, text: &str) {
        let _ = self.state.push.send(text.to_string());
    }

    /// Stop (or resume) answering client requests
    pub fn set_silent(&self, silent: bool) {
        self.state.silent.store(silent, Ordering::SeqCst);
    }

    /// Send a game state update to every live connection
    pub fn game_state(&self, phase: &str, multiplier: f64, time_left: u64, round: u64) {
        self.broadcast(json!({
            "type": "game_state_update",
            "data": {
                "phase": phase,
                "multiplier": multiplier,
                "timeLeft": time_left,
                "currentRound": round
            }
        }));
    }

    /// Close every live connection from the server side
    pub fn kick_all(&self) {
        self.state.kick.notify_waiters();
    }

    /// Total connections accepted so far
    pub fn connection_count(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    /// Messages received from clients, in arrival order
    pub fn received(&self) -> Vec<Value> {
        self.state.received.lock().clone()
    }

    /// Received messages of one type
    pub fn received_of(&self, kind: &str) -> Vec<Value> {
        self.received()
            .into_iter()
            .filter(|m| m["type"] == kind)
            .collect()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.state.shutdown.notify_waiters();
    }
}

impl Drop for MockCrashServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Config pointed at `url` with fast timers
pub fn fast_config(url: &str) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.server_url = url.to_string();
    config.reconnect.base_delay_ms = 50;
    config.reconnect.max_delay_ms = 200;
    config.reconnect.jitter_ms = 0;
    config.reconnect.max_attempts = 3;
    config.timeouts.intent_timeout_ms = 300;
    config.timeouts.watchdog_interval_ms = 100;
    config
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn wait_for<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Start a client against `server` and wait until the session is set up
pub async fn connected_client(server: &MockCrashServer) -> GameClient {
    let client = GameClient::start(&fast_config(&server.ws_url())).unwrap();
    client.connect().unwrap();
    let ready = wait_for(Duration::from_secs(5), || {
        let snapshot = client.snapshot();
        snapshot.status.is_connected()
            && snapshot.player.session_id.is_some()
            && snapshot.game.is_some()
    })
    .await;
    assert!(ready, "client did not connect to {}", server.ws_url());
    client
}
