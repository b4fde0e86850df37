//! Connection lifecycle state machine
//!
//! [`ConnectionSession`] is synchronous and performs no I/O. Everything that
//! happens to it arrives as a [`SessionEvent`] through one entry point,
//! [`ConnectionSession::dispatch`], which returns the [`SessionEffect`]s the
//! runtime has to carry out (open a socket, send a frame, start a timer...).
//! Tests drive it with synthetic event sequences and inspect the effects.
//!
//! ```text
//!                 Connect                 Opened
//!  Disconnected ──────────▶ Connecting ──────────▶ Connected
//!       ▲  ▲                    │                      │
//!       │  └──── Closed/Failed ─┘                      │
//!       │                                              │
//!       └────────────────── Closed/Failed ─────────────┘
//!                     (reconnect timer or exhausted)
//! ```

use crate::core::connection_state::{ConnectionId, ConnectionState, ConnectionStatus};
use crate::core::snapshot::ClientSnapshot;
use crate::core::timers::{TimerKind, TimerSet, TimerToken};
use crate::error::UserInputError;
use crate::game::{
    Cryptocurrency, Notice, OutboundMessage, PendingKind, StateReconciler,
};
use crate::logging::Logger;
use crate::network::NetworkMonitor;
use crate::traits::WsMessage;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Something the transport reported about one connection attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Frame(WsMessage),
    /// Orderly close, with the peer's reason if any
    Closed(Option<String>),
    /// Open, read or write failure
    Failed(String),
}

/// A user action
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    SetPlayerName(String),
    PlaceBet {
        usd_amount: f64,
        cryptocurrency: Cryptocurrency,
    },
    CashOut,
}

/// Everything the session reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Manual connect; also resumes after reconnect exhaustion
    Connect,
    Transport {
        connection: ConnectionId,
        event: TransportEvent,
    },
    TimerFired {
        kind: TimerKind,
        token: TimerToken,
    },
    NetworkChanged {
        online: bool,
    },
    Intent(Intent),
    Teardown,
}

/// Work the runtime performs on behalf of the session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEffect {
    OpenTransport {
        connection: ConnectionId,
        url: String,
    },
    Send {
        connection: ConnectionId,
        message: WsMessage,
    },
    CloseTransport {
        connection: ConnectionId,
    },
    /// Start (or restart) the timer of this kind; report back with `token`
    StartTimer {
        kind: TimerKind,
        token: TimerToken,
        after: Duration,
    },
    CancelTimer {
        kind: TimerKind,
    },
    Notify(Notice),
    StatusChanged(ConnectionStatus),
}

/// Fixed parameters of a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub url: String,
    /// How long a place-bet or cash-out guard may stay set without a response
    pub intent_timeout: Duration,
    pub watchdog_interval: Duration,
}

impl SessionSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            intent_timeout: Duration::from_millis(10_000),
            watchdog_interval: Duration::from_millis(5_000),
        }
    }
}

pub struct ConnectionSession {
    settings: SessionSettings,
    conn: ConnectionState,
    timers: TimerSet,
    reconciler: StateReconciler,
    monitor: Arc<NetworkMonitor>,
    logger: Logger,
    effects: Vec<SessionEffect>,
}

impl ConnectionSession {
    pub fn new(settings: SessionSettings, monitor: Arc<NetworkMonitor>, logger: Logger) -> Self {
        Self {
            settings,
            conn: ConnectionState::new(),
            timers: TimerSet::new(),
            reconciler: StateReconciler::new(logger.clone()),
            monitor,
            logger,
            effects: Vec::new(),
        }
    }

    #[inline]
    pub fn status(&self) -> ConnectionStatus {
        self.conn.status
    }

    /// Reconnect budget spent; only a manual connect resumes
    pub fn is_exhausted(&self) -> bool {
        self.conn.exhausted
    }

    pub fn is_torn_down(&self) -> bool {
        self.conn.torn_down
    }

    pub fn reconciler(&self) -> &StateReconciler {
        &self.reconciler
    }

    pub fn is_timer_armed(&self, kind: TimerKind) -> bool {
        self.timers.is_armed(kind)
    }

    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot {
            status: self.conn.status,
            network: self.monitor.connection_info(),
            exhausted: self.conn.exhausted,
            game: self.reconciler.game().cloned(),
            player: self.reconciler.player().clone(),
            pending: *self.reconciler.pending(),
            show_name_prompt: self.reconciler.name_prompt_open(),
            status_text: self.reconciler.status_text(),
            potential_win: self.reconciler.potential_win(),
        }
    }

    /// Apply one event and return the resulting effects, in order
    pub fn dispatch(&mut self, event: SessionEvent) -> Vec<SessionEffect> {
        if self.conn.torn_down {
            self.logger.debug(
                "Ignoring event after teardown",
                Some(json!({ "event": format!("{:?}", event) })),
            );
            return Vec::new();
        }

        match event {
            SessionEvent::Connect => self.on_connect(),
            SessionEvent::Transport { connection, event } => self.on_transport(connection, event),
            SessionEvent::TimerFired { kind, token } => self.on_timer(kind, token),
            SessionEvent::NetworkChanged { online } => self.on_network_changed(online),
            SessionEvent::Intent(intent) => self.on_intent(intent),
            SessionEvent::Teardown => self.on_teardown(),
        }

        if !self.conn.torn_down {
            self.sync_safety_timers();
        }
        self.flush_notices();
        std::mem::take(&mut self.effects)
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    fn on_connect(&mut self) {
        if self.conn.status != ConnectionStatus::Disconnected {
            self.logger.debug(
                "Connect ignored",
                Some(json!({ "status": self.conn.status.as_str() })),
            );
            return;
        }

        if self.conn.exhausted {
            self.logger.info("Manual reconnect after exhaustion", None);
            self.conn.exhausted = false;
            self.monitor.reset_reconnect_attempts();
        }
        if self.timers.disarm(TimerKind::Reconnect) {
            self.effects.push(SessionEffect::CancelTimer {
                kind: TimerKind::Reconnect,
            });
        }
        if !self.timers.is_armed(TimerKind::Watchdog) {
            self.arm(TimerKind::Watchdog, self.settings.watchdog_interval);
        }

        self.open_transport();
    }

    fn open_transport(&mut self) {
        let connection = self.conn.begin_attempt();
        self.logger.info(
            "Connecting",
            Some(json!({ "url": self.settings.url, "connection": connection.to_string() })),
        );
        self.effects
            .push(SessionEffect::StatusChanged(ConnectionStatus::Connecting));
        self.effects.push(SessionEffect::OpenTransport {
            connection,
            url: self.settings.url.clone(),
        });
    }

    fn on_transport(&mut self, connection: ConnectionId, event: TransportEvent) {
        if !self.conn.is_current(connection) {
            self.logger.debug(
                "Ignoring event from superseded connection",
                Some(json!({ "connection": connection.to_string() })),
            );
            if event == TransportEvent::Opened {
                self.effects.push(SessionEffect::CloseTransport { connection });
            }
            return;
        }

        match event {
            TransportEvent::Opened => self.on_opened(connection),
            TransportEvent::Frame(frame) => {
                if self.conn.status != ConnectionStatus::Connected {
                    self.logger.warn("Frame received before open", None);
                    return;
                }
                // Malformed frames are logged by the reconciler and dropped
                let _ = self.reconciler.handle_frame(&frame);
            }
            TransportEvent::Closed(reason) => {
                self.logger.info(
                    "Connection closed",
                    Some(json!({ "connection": connection.to_string(), "reason": reason })),
                );
                self.on_disconnected();
            }
            TransportEvent::Failed(error) => {
                self.logger.error(
                    "Connection error",
                    Some(json!({ "connection": connection.to_string(), "error": error })),
                );
                self.effects
                    .push(SessionEffect::Notify(Notice::error("Connection error")));
                self.on_disconnected();
            }
        }
    }

    fn on_opened(&mut self, connection: ConnectionId) {
        self.conn.status = ConnectionStatus::Connected;
        self.monitor.reset_reconnect_attempts();
        self.reconciler.on_transport_opened();

        self.logger.info(
            "Connected",
            Some(json!({ "connection": connection.to_string() })),
        );
        self.effects
            .push(SessionEffect::StatusChanged(ConnectionStatus::Connected));
        self.effects
            .push(SessionEffect::Notify(Notice::success("Connected to game server")));

        if let Some(name) = self.reconciler.player_name_for_replay() {
            let message = OutboundMessage::SetPlayerName {
                player_name: name.to_string(),
            };
            self.send(message);
        }
    }

    fn on_disconnected(&mut self) {
        let was_connected = self.conn.status == ConnectionStatus::Connected;
        // The runtime drops its handle for the finished transport
        if let Some(connection) = self.conn.release() {
            self.effects.push(SessionEffect::CloseTransport { connection });
        }
        self.effects
            .push(SessionEffect::StatusChanged(ConnectionStatus::Disconnected));
        if was_connected {
            self.effects.push(SessionEffect::Notify(Notice::warning(
                "Disconnected from server",
            )));
        }
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        let delay = if self.monitor.should_reconnect() {
            self.monitor.get_reconnect_delay()
        } else {
            None
        };

        let Some(delay) = delay else {
            self.exhaust();
            return;
        };

        let attempt = self.monitor.increment_reconnect_attempts();
        let max = self.monitor.max_reconnect_attempts();
        self.logger.info(
            "Scheduling reconnect",
            Some(json!({
                "attempt": attempt,
                "maxAttempts": max,
                "delayMs": delay.as_millis() as u64,
            })),
        );
        self.arm(TimerKind::Reconnect, delay);

        let text = match max {
            Some(max) => format!(
                "Attempting to reconnect in {:.1}s ({}/{})",
                delay.as_secs_f64(),
                attempt,
                max
            ),
            None => format!(
                "Attempting to reconnect in {:.1}s (attempt {})",
                delay.as_secs_f64(),
                attempt
            ),
        };
        self.effects.push(SessionEffect::Notify(Notice::info(text)));
    }

    fn exhaust(&mut self) {
        self.conn.exhausted = true;
        if self.timers.disarm(TimerKind::Reconnect) {
            self.effects.push(SessionEffect::CancelTimer {
                kind: TimerKind::Reconnect,
            });
        }

        let online = self.monitor.is_online();
        self.logger.error(
            "Giving up on reconnecting",
            Some(json!({
                "online": online,
                "attempts": self.monitor.reconnect_attempts(),
            })),
        );
        let text = if online {
            "Unable to reconnect. Please reload to try again."
        } else {
            "You are offline. Please reload once your connection is back."
        };
        self.effects.push(SessionEffect::Notify(Notice::error(text)));
    }

    // =========================================================================
    // Timers
    // =========================================================================

    fn arm(&mut self, kind: TimerKind, after: Duration) {
        let token = self.timers.arm(kind);
        self.effects.push(SessionEffect::StartTimer { kind, token, after });
    }

    fn on_timer(&mut self, kind: TimerKind, token: TimerToken) {
        if !self.timers.fire(kind, token) {
            self.logger.debug(
                "Ignoring stale timer",
                Some(json!({ "kind": kind.as_str(), "token": token.0 })),
            );
            return;
        }

        match kind {
            TimerKind::Reconnect => {
                if self.conn.status == ConnectionStatus::Disconnected && !self.conn.exhausted {
                    self.open_transport();
                }
            }
            TimerKind::BetSafety => {
                self.reconciler.expire_pending(PendingKind::PlaceBet);
            }
            TimerKind::CashOutSafety => {
                self.reconciler.expire_pending(PendingKind::CashOut);
            }
            TimerKind::Watchdog => {
                self.reconciler.run_watchdog();
                self.arm(TimerKind::Watchdog, self.settings.watchdog_interval);
            }
        }
    }

    /// Cancel safety timers whose guard has already been cleared by a response
    fn sync_safety_timers(&mut self) {
        let pending = *self.reconciler.pending();
        for (kind, guard) in [
            (TimerKind::BetSafety, pending.is_placing_bet),
            (TimerKind::CashOutSafety, pending.is_cashing_out),
        ] {
            if !guard && self.timers.disarm(kind) {
                self.effects.push(SessionEffect::CancelTimer { kind });
            }
        }
    }

    // =========================================================================
    // Network
    // =========================================================================

    fn on_network_changed(&mut self, online: bool) {
        if !self.monitor.set_online(online) {
            return;
        }
        let notice = if online {
            Notice::success("Network connection restored")
        } else {
            Notice::warning("Network connection lost")
        };
        self.effects.push(SessionEffect::Notify(notice));
    }

    // =========================================================================
    // Intents
    // =========================================================================

    fn on_intent(&mut self, intent: Intent) {
        match intent {
            Intent::SetPlayerName(name) => match self.reconciler.set_player_name(&name) {
                Ok(message) => {
                    if self.conn.open_connection().is_some() {
                        self.send(message);
                    } else {
                        self.logger
                            .info("Player name stored until connected", None);
                    }
                }
                Err(e) => self.reject(e),
            },
            Intent::PlaceBet {
                usd_amount,
                cryptocurrency,
            } => {
                match self
                    .reconciler
                    .place_bet(usd_amount, cryptocurrency, self.conn.status)
                {
                    Ok(message) => {
                        self.send(message);
                        self.arm(TimerKind::BetSafety, self.settings.intent_timeout);
                    }
                    Err(e) => self.reject(e),
                }
            }
            Intent::CashOut => match self.reconciler.cash_out(self.conn.status) {
                Ok(message) => {
                    self.send(message);
                    self.arm(TimerKind::CashOutSafety, self.settings.intent_timeout);
                }
                Err(e) => self.reject(e),
            },
        }
    }

    /// Emit one frame on the open connection. Never queues.
    fn send(&mut self, message: OutboundMessage) {
        let Some(connection) = self.conn.open_connection() else {
            self.reject(UserInputError::NotConnected);
            return;
        };

        match message.to_ws_message() {
            Ok(frame) => {
                self.logger
                    .debug("Sending message", Some(json!({ "type": message.kind() })));
                self.effects.push(SessionEffect::Send {
                    connection,
                    message: frame,
                });
            }
            Err(e) => {
                self.logger.error(
                    "Failed to encode message",
                    Some(json!({ "type": message.kind(), "error": e.to_string() })),
                );
            }
        }
    }

    fn reject(&mut self, error: UserInputError) {
        let data = Some(json!({ "reason": error.to_string() }));
        match error {
            UserInputError::NotConnected => {
                self.logger.error("Cannot send message: not connected", data)
            }
            _ => self.logger.warn("Intent rejected", data),
        }
        self.effects
            .push(SessionEffect::Notify(Notice::error(error.to_string())));
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    fn on_teardown(&mut self) {
        self.conn.torn_down = true;
        for kind in self.timers.disarm_all() {
            self.effects.push(SessionEffect::CancelTimer { kind });
        }
        let was_disconnected = self.conn.status == ConnectionStatus::Disconnected;
        if let Some(connection) = self.conn.release() {
            self.effects.push(SessionEffect::CloseTransport { connection });
        }
        if !was_disconnected {
            self.effects
                .push(SessionEffect::StatusChanged(ConnectionStatus::Disconnected));
        }
        self.logger.info("Session torn down", None);
    }

    fn flush_notices(&mut self) {
        for notice in self.reconciler.drain_notices() {
            self.effects.push(SessionEffect::Notify(notice));
        }
    }
}

impl std::fmt::Debug for ConnectionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSession")
            .field("url", &self.settings.url)
            .field("status", &self.conn.status)
            .field("connection", &self.conn.connection)
            .field("exhausted", &self.conn.exhausted)
            .field("torn_down", &self.conn.torn_down)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GamePhase;
    use crate::logging::LogLevel;
    use crate::traits::ExponentialBackoff;
    use serde_json::{json, Value};

    const URL: &str = "ws://crash.test";

    fn session_with(max_attempts: u32) -> ConnectionSession {
        let logger = Logger::init(LogLevel::Debug, 500);
        let strategy = ExponentialBackoff::new(
            Duration::from_millis(3000),
            Duration::from_millis(30000),
            Some(max_attempts),
        )
        .with_jitter(Duration::from_millis(1000));
        let monitor = Arc::new(NetworkMonitor::init(strategy, true, logger.clone()));
        ConnectionSession::new(SessionSettings::new(URL), monitor, logger)
    }

    fn session() -> ConnectionSession {
        session_with(10)
    }

    fn opened_connection(effects: &[SessionEffect]) -> Option<ConnectionId> {
        effects.iter().find_map(|e| match e {
            SessionEffect::OpenTransport { connection, .. } => Some(*connection),
            _ => None,
        })
    }

    fn started(effects: &[SessionEffect], wanted: TimerKind) -> Option<(TimerToken, Duration)> {
        effects.iter().find_map(|e| match e {
            SessionEffect::StartTimer { kind, token, after } if *kind == wanted => {
                Some((*token, *after))
            }
            _ => None,
        })
    }

    fn sent(effects: &[SessionEffect]) -> Vec<Value> {
        effects
            .iter()
            .filter_map(|e| match e {
                SessionEffect::Send {
                    message: WsMessage::Text(text),
                    ..
                } => serde_json::from_str(text).ok(),
                _ => None,
            })
            .collect()
    }

    fn notices(effects: &[SessionEffect]) -> Vec<String> {
        effects
            .iter()
            .filter_map(|e| match e {
                SessionEffect::Notify(n) => Some(n.text.clone()),
                _ => None,
            })
            .collect()
    }

    fn transport(connection: ConnectionId, event: TransportEvent) -> SessionEvent {
        SessionEvent::Transport { connection, event }
    }

    fn frame(connection: ConnectionId, value: Value) -> SessionEvent {
        transport(connection, TransportEvent::Frame(WsMessage::Text(value.to_string())))
    }

    /// Connect, open and receive a session plus a waiting round.
    /// Also returns the watchdog token armed by the connect.
    fn connected(s: &mut ConnectionSession, balance: f64) -> (ConnectionId, TimerToken) {
        let effects = s.dispatch(SessionEvent::Connect);
        let id = opened_connection(&effects).unwrap();
        let (watchdog, _) = started(&effects, TimerKind::Watchdog).unwrap();
        s.dispatch(transport(id, TransportEvent::Opened));
        s.dispatch(frame(
            id,
            json!({ "type": "connected", "data": { "sessionId": "sess-000001", "balance": balance } }),
        ));
        s.dispatch(frame(
            id,
            json!({ "type": "game_state_update", "data": { "phase": "waiting", "timeLeft": 5, "currentRound": 1 } }),
        ));
        (id, watchdog)
    }

    #[test]
    fn test_connect_opens_once() {
        let mut s = session();
        let effects = s.dispatch(SessionEvent::Connect);
        assert_eq!(s.status(), ConnectionStatus::Connecting);
        assert!(opened_connection(&effects).is_some());
        assert!(started(&effects, TimerKind::Watchdog).is_some());

        assert!(s.dispatch(SessionEvent::Connect).is_empty());
    }

    #[test]
    fn test_open_resets_attempts_and_replays_name() {
        let mut s = session();
        s.dispatch(SessionEvent::Intent(Intent::SetPlayerName("  Ada ".into())));
        let id = opened_connection(&s.dispatch(SessionEvent::Connect)).unwrap();
        let effects = s.dispatch(transport(id, TransportEvent::Failed("refused".into())));
        assert_eq!(s.monitor.reconnect_attempts(), 1);

        let (token, _) = started(&effects, TimerKind::Reconnect).unwrap();
        let effects = s.dispatch(SessionEvent::TimerFired {
            kind: TimerKind::Reconnect,
            token,
        });
        let id = opened_connection(&effects).unwrap();
        let effects = s.dispatch(transport(id, TransportEvent::Opened));

        assert_eq!(s.status(), ConnectionStatus::Connected);
        assert_eq!(s.monitor.reconnect_attempts(), 0);
        assert_eq!(
            sent(&effects),
            vec![json!({ "type": "set_player_name", "data": { "playerName": "Ada" } })]
        );
    }

    #[test]
    fn test_send_requires_connection() {
        let mut s = session();
        let effects = s.dispatch(SessionEvent::Intent(Intent::CashOut));
        assert!(sent(&effects).is_empty());
        assert_eq!(notices(&effects), vec!["Not connected to server"]);
        assert!(!s.logger.entries_at(LogLevel::Error).is_empty());
    }

    #[test]
    fn test_place_bet_flow() {
        let mut s = session();
        let (id, _) = connected(&mut s, 100.0);
        assert!(s.snapshot().can_place_bet(50.0));

        let effects = s.dispatch(SessionEvent::Intent(Intent::PlaceBet {
            usd_amount: 50.0,
            cryptocurrency: Cryptocurrency::Bitcoin,
        }));
        assert_eq!(
            sent(&effects),
            vec![json!({ "type": "place_bet", "data": { "usdAmount": 50.0, "cryptocurrency": "bitcoin" } })]
        );
        let (_, after) = started(&effects, TimerKind::BetSafety).unwrap();
        assert_eq!(after, Duration::from_millis(10_000));
        assert!(s.reconciler().pending().is_placing_bet);
        assert!(!s.snapshot().can_place_bet(50.0));

        // duplicate while in flight sends nothing
        let effects = s.dispatch(SessionEvent::Intent(Intent::PlaceBet {
            usd_amount: 50.0,
            cryptocurrency: Cryptocurrency::Bitcoin,
        }));
        assert!(sent(&effects).is_empty());

        let effects = s.dispatch(frame(
            id,
            json!({ "type": "bet_placed", "data": { "newBalance": 50, "bet": { "usdAmount": 50, "cryptocurrency": "bitcoin" } } }),
        ));
        assert!(effects.contains(&SessionEffect::CancelTimer {
            kind: TimerKind::BetSafety
        }));
        assert!(s.snapshot().player.has_active_bet());
        assert_eq!(s.snapshot().player.balance, 50.0);
    }

    #[test]
    fn test_bet_safety_timer_clears_guard() {
        let mut s = session();
        connected(&mut s, 100.0);
        let effects = s.dispatch(SessionEvent::Intent(Intent::PlaceBet {
            usd_amount: 10.0,
            cryptocurrency: Cryptocurrency::Ethereum,
        }));
        let (token, _) = started(&effects, TimerKind::BetSafety).unwrap();

        let effects = s.dispatch(SessionEvent::TimerFired {
            kind: TimerKind::BetSafety,
            token,
        });
        assert!(!s.reconciler().pending().is_placing_bet);
        assert_eq!(notices(&effects), vec!["Bet request timed out"]);

        // firing twice is stale
        assert!(s
            .dispatch(SessionEvent::TimerFired {
                kind: TimerKind::BetSafety,
                token,
            })
            .is_empty());
    }

    #[test]
    fn test_cash_out_flow() {
        let mut s = session();
        let (id, _) = connected(&mut s, 100.0);
        s.dispatch(SessionEvent::Intent(Intent::PlaceBet {
            usd_amount: 20.0,
            cryptocurrency: Cryptocurrency::Cardano,
        }));
        s.dispatch(frame(
            id,
            json!({ "type": "bet_placed", "data": { "newBalance": 80, "bet": { "usdAmount": 20, "cryptocurrency": "cardano" } } }),
        ));
        s.dispatch(frame(
            id,
            json!({ "type": "game_state_update", "data": { "phase": "playing", "multiplier": 1.5, "currentRound": 1 } }),
        ));
        assert!(s.snapshot().can_cash_out());
        assert_eq!(s.snapshot().potential_win, Some(30.0));

        let effects = s.dispatch(SessionEvent::Intent(Intent::CashOut));
        assert_eq!(sent(&effects), vec![json!({ "type": "cash_out", "data": {} })]);
        assert!(started(&effects, TimerKind::CashOutSafety).is_some());

        let effects = s.dispatch(frame(
            id,
            json!({ "type": "cash_out_success", "data": { "newBalance": 110, "winAmount": 30 } }),
        ));
        assert!(effects.contains(&SessionEffect::CancelTimer {
            kind: TimerKind::CashOutSafety
        }));
        let snapshot = s.snapshot();
        assert!(!snapshot.player.has_active_bet());
        assert_eq!(snapshot.player.balance, 110.0);
        assert!(notices(&effects).contains(&"Cashed out! Win: $30.00".to_string()));
    }

    #[test]
    fn test_disconnect_schedules_single_reconnect() {
        let mut s = session();
        let (id, _) = connected(&mut s, 100.0);
        let effects = s.dispatch(transport(id, TransportEvent::Closed(None)));

        assert_eq!(s.status(), ConnectionStatus::Disconnected);
        let (_, after) = started(&effects, TimerKind::Reconnect).unwrap();
        assert!(after >= Duration::from_millis(3000) && after < Duration::from_millis(4000));
        assert!(notices(&effects).contains(&"Disconnected from server".to_string()));

        // late events from the dead socket are ignored
        assert!(s
            .dispatch(frame(id, json!({ "type": "bet_lost" })))
            .is_empty());
    }

    #[test]
    fn test_stale_open_is_closed() {
        let mut s = session();
        let first = opened_connection(&s.dispatch(SessionEvent::Connect)).unwrap();
        let effects = s.dispatch(transport(first, TransportEvent::Failed("timeout".into())));
        let (token, _) = started(&effects, TimerKind::Reconnect).unwrap();
        let second = opened_connection(&s.dispatch(SessionEvent::TimerFired {
            kind: TimerKind::Reconnect,
            token,
        }))
        .unwrap();

        let effects = s.dispatch(transport(first, TransportEvent::Opened));
        assert_eq!(effects, vec![SessionEffect::CloseTransport { connection: first }]);
        assert_eq!(s.status(), ConnectionStatus::Connecting);
        assert!(s.conn.is_current(second));
    }

    #[test]
    fn test_reconnect_cap_is_terminal() {
        let mut s = session_with(3);
        let mut id = opened_connection(&s.dispatch(SessionEvent::Connect)).unwrap();

        for attempt in 1..=3 {
            let effects = s.dispatch(transport(id, TransportEvent::Failed("refused".into())));
            let (token, _) = started(&effects, TimerKind::Reconnect)
                .unwrap_or_else(|| panic!("attempt {} should be scheduled", attempt));
            let effects = s.dispatch(SessionEvent::TimerFired {
                kind: TimerKind::Reconnect,
                token,
            });
            id = opened_connection(&effects).unwrap();
        }

        let effects = s.dispatch(transport(id, TransportEvent::Failed("refused".into())));
        assert!(started(&effects, TimerKind::Reconnect).is_none());
        assert!(s.is_exhausted());
        assert_eq!(s.status(), ConnectionStatus::Disconnected);
        assert!(notices(&effects)
            .iter()
            .any(|n| n.starts_with("Unable to reconnect")));

        // manual connect resumes with a fresh budget
        let effects = s.dispatch(SessionEvent::Connect);
        assert!(opened_connection(&effects).is_some());
        assert!(!s.is_exhausted());
        assert_eq!(s.monitor.reconnect_attempts(), 0);
    }

    #[test]
    fn test_offline_disconnect_does_not_reconnect() {
        let mut s = session();
        let (id, _) = connected(&mut s, 100.0);
        let effects = s.dispatch(SessionEvent::NetworkChanged { online: false });
        assert_eq!(notices(&effects), vec!["Network connection lost"]);

        let effects = s.dispatch(transport(id, TransportEvent::Closed(Some("gone".into()))));
        assert!(started(&effects, TimerKind::Reconnect).is_none());
        assert!(s.is_exhausted());

        assert!(s
            .dispatch(SessionEvent::NetworkChanged { online: false })
            .is_empty());
    }

    #[test]
    fn test_watchdog_rearms_and_clears_stuck_bet() {
        let mut s = session();
        let (id, token) = connected(&mut s, 100.0);
        s.dispatch(SessionEvent::Intent(Intent::PlaceBet {
            usd_amount: 10.0,
            cryptocurrency: Cryptocurrency::Bitcoin,
        }));
        s.dispatch(frame(
            id,
            json!({ "type": "bet_placed", "data": { "newBalance": 90, "bet": { "usdAmount": 10, "cryptocurrency": "bitcoin" } } }),
        ));
        s.dispatch(frame(
            id,
            json!({ "type": "game_state_update", "data": { "phase": "waiting", "timeLeft": 0, "currentRound": 1 } }),
        ));
        assert!(s.snapshot().player.has_active_bet());

        let effects = s.dispatch(SessionEvent::TimerFired {
            kind: TimerKind::Watchdog,
            token,
        });
        assert!(!s.snapshot().player.has_active_bet());
        let (_, after) = started(&effects, TimerKind::Watchdog).unwrap();
        assert_eq!(after, Duration::from_millis(5_000));
    }

    #[test]
    fn test_teardown_is_final() {
        let mut s = session();
        let (id, _) = connected(&mut s, 100.0);
        let effects = s.dispatch(SessionEvent::Teardown);

        assert!(effects.contains(&SessionEffect::CloseTransport { connection: id }));
        assert!(effects.contains(&SessionEffect::CancelTimer {
            kind: TimerKind::Watchdog
        }));
        assert!(s.is_torn_down());
        assert!(s.dispatch(transport(id, TransportEvent::Closed(None))).is_empty());
        assert!(s.dispatch(SessionEvent::Connect).is_empty());
        assert_eq!(s.status(), ConnectionStatus::Disconnected);
    }

    #[test]
    fn test_every_disconnect_releases_the_transport() {
        let mut s = session();
        let (id, _) = connected(&mut s, 100.0);
        let effects = s.dispatch(transport(id, TransportEvent::Closed(None)));
        assert!(effects.contains(&SessionEffect::CloseTransport { connection: id }));

        // failure while still connecting
        let (token, _) = started(&effects, TimerKind::Reconnect).unwrap();
        let effects = s.dispatch(SessionEvent::TimerFired {
            kind: TimerKind::Reconnect,
            token,
        });
        let retry = opened_connection(&effects).unwrap();
        let effects = s.dispatch(transport(retry, TransportEvent::Failed("refused".into())));
        let closes: Vec<_> = effects
            .iter()
            .filter(|e| matches!(e, SessionEffect::CloseTransport { .. }))
            .collect();
        assert_eq!(closes, vec![&SessionEffect::CloseTransport { connection: retry }]);
    }

    #[test]
    fn test_server_driven_round_cycle() {
        let mut s = session();
        let (id, _) = connected(&mut s, 100.0);
        for (phase, multiplier) in [("playing", 1.7), ("crashed", 2.2), ("waiting", 9.0)] {
            s.dispatch(frame(
                id,
                json!({ "type": "game_state_update", "data": { "status": phase, "multiplier": multiplier, "roundNumber": 1 } }),
            ));
        }
        let snapshot = s.snapshot();
        let game = snapshot.game.unwrap();
        assert_eq!(game.phase, GamePhase::Waiting);
        assert_eq!(game.multiplier, 1.0);
        assert_eq!(snapshot.status_text, "Waiting for round...");
    }
}
