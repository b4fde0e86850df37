use crate::config::ClientConfig;
use crate::connection_state::{ConnectionId, ConnectionStatus};
use crate::game::{Cryptocurrency, Notice};
use crate::logging::Logger;
use crate::network::NetworkMonitor;
use crate::session::{ConnectionSession, Intent, SessionEffect, SessionEvent, SessionSettings, TransportEvent};
use crate::snapshot::ClientSnapshot;
use crate::timers::TimerKind;
use crate::traits::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use futures::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Number of notices kept for late readers
pub const NOTICE_HISTORY: usize = 50;

/// Internal input messages for the runtime loop
#[derive(Debug)]
enum Input {
    /// Feed an event to the session
    Event(SessionEvent),
    /// Tear down and exit the loop
    Shutdown,
}

/// Events published to the front end
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A user-visible message
    Notice(Notice),
    /// Game, player or connection state changed
    StateChanged(ClientSnapshot),
    /// Connection status changed
    StatusChanged(ConnectionStatus),
}

/// State readable from outside the runtime task
struct Shared {
    snapshot: RwLock<ClientSnapshot>,
    notices: RwLock<VecDeque<Notice>>,
}

/// Handle to a running crash game client
///
/// The client owns one tokio task that serializes every input (user intents,
/// network signals, socket frames, timer expirations) into the session's
/// single dispatch function and carries out the effects it returns:
/// - WebSocket connections run in their own tasks and report back as events
/// - Timers are abortable sleep tasks
/// - Front-end events are published on an unbounded crossbeam channel
pub struct GameClient {
    /// Input channel into the runtime task
    input_tx: mpsc::UnboundedSender<Input>,
    /// Event channel receiver
    event_rx: Receiver<ClientEvent>,
    shared: Arc<Shared>,
    logger: Logger,
    monitor: Arc<NetworkMonitor>,
    /// Logger and monitor were created by `start` and are disposed on shutdown
    owns_services: bool,
    /// Runtime task handle
    task_handle: Option<JoinHandle<()>>,
}

impl GameClient {
    /// Create the logger and network monitor from `config` and start the
    /// runtime. Must be called within a tokio runtime.
    ///
    /// The client starts disconnected; call [`GameClient::connect`].
    pub fn start(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        let logger = Logger::init(config.logging.level, config.logging.capacity);
        let monitor = Arc::new(NetworkMonitor::init(
            config.reconnect_strategy(),
            true,
            logger.clone(),
        ));
        let mut client = Self::with_services(config, logger, monitor)?;
        client.owns_services = true;
        Ok(client)
    }

    /// Start the runtime with injected services
    pub fn with_services(
        config: &ClientConfig,
        logger: Logger,
        monitor: Arc<NetworkMonitor>,
    ) -> Result<Self> {
        config.validate()?;

        let settings = SessionSettings {
            url: config.server_url.clone(),
            intent_timeout: config.intent_timeout(),
            watchdog_interval: config.watchdog_interval(),
        };
        let session = ConnectionSession::new(settings, Arc::clone(&monitor), logger.clone());

        let shared = Arc::new(Shared {
            snapshot: RwLock::new(session.snapshot()),
            notices: RwLock::new(VecDeque::with_capacity(NOTICE_HISTORY)),
        });

        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = unbounded();

        let runtime = Runtime {
            session,
            input_tx: input_tx.clone(),
            event_tx,
            shared: Arc::clone(&shared),
            timers: HashMap::new(),
            transports: HashMap::new(),
        };
        let task_handle = tokio::spawn(runtime.run(input_rx));

        Ok(Self {
            input_tx,
            event_rx,
            shared,
            logger,
            monitor,
            owns_services: false,
            task_handle: Some(task_handle),
        })
    }

    /// Open the connection. No-op while connecting or connected; resumes
    /// after automatic reconnection gave up.
    pub fn connect(&self) -> Result<()> {
        self.submit(SessionEvent::Connect)
    }

    pub fn set_player_name(&self, name: impl Into<String>) -> Result<()> {
        self.submit(SessionEvent::Intent(Intent::SetPlayerName(name.into())))
    }

    pub fn place_bet(&self, usd_amount: f64, cryptocurrency: Cryptocurrency) -> Result<()> {
        self.submit(SessionEvent::Intent(Intent::PlaceBet {
            usd_amount,
            cryptocurrency,
        }))
    }

    pub fn cash_out(&self) -> Result<()> {
        self.submit(SessionEvent::Intent(Intent::CashOut))
    }

    /// Report the host's connectivity
    pub fn set_online(&self, online: bool) -> Result<()> {
        self.submit(SessionEvent::NetworkChanged { online })
    }

    fn submit(&self, event: SessionEvent) -> Result<()> {
        self.input_tx
            .send(Input::Event(event))
            .map_err(|_| ClientError::ShutDown)
    }

    /// Latest state published by the runtime
    pub fn snapshot(&self) -> ClientSnapshot {
        self.shared.snapshot.read().clone()
    }

    #[inline]
    pub fn status(&self) -> ConnectionStatus {
        self.shared.snapshot.read().status
    }

    /// The most recent notices, oldest first
    pub fn recent_notices(&self) -> Vec<Notice> {
        self.shared.notices.read().iter().cloned().collect()
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ClientEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Receive an event (blocking)
    pub fn recv_event(&self) -> std::result::Result<ClientEvent, crossbeam_channel::RecvError> {
        self.event_rx.recv()
    }

    /// A receiver for consumers on other threads
    pub fn events(&self) -> Receiver<ClientEvent> {
        self.event_rx.clone()
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn monitor(&self) -> &Arc<NetworkMonitor> {
        &self.monitor
    }

    /// Tear down the session, close the socket, cancel every timer and wait
    /// for the runtime task to exit.
    pub async fn shutdown(mut self) -> Result<()> {
        info!("Shutting down crash game client");

        let _ = self.input_tx.send(Input::Shutdown);
        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                error!("Runtime task failed: {}", e);
            }
        }

        if self.owns_services {
            self.monitor.dispose();
            self.logger.dispose();
        }

        info!("Client shut down");
        Ok(())
    }
}

impl Drop for GameClient {
    fn drop(&mut self) {
        if self.task_handle.is_some() {
            let _ = self.input_tx.send(Input::Shutdown);
        }
    }
}

impl std::fmt::Debug for GameClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameClient")
            .field("status", &self.status())
            .field("running", &self.task_handle.is_some())
            .finish()
    }
}

struct TransportHandle {
    outgoing: mpsc::UnboundedSender<WsMessage>,
    task: JoinHandle<()>,
}

/// Owns the session inside the runtime task
struct Runtime {
    session: ConnectionSession,
    input_tx: mpsc::UnboundedSender<Input>,
    event_tx: Sender<ClientEvent>,
    shared: Arc<Shared>,
    timers: HashMap<TimerKind, JoinHandle<()>>,
    transports: HashMap<ConnectionId, TransportHandle>,
}

impl Runtime {
    /// Main runtime loop
    async fn run(mut self, mut input_rx: mpsc::UnboundedReceiver<Input>) {
        while let Some(input) = input_rx.recv().await {
            match input {
                Input::Event(event) => {
                    let effects = self.session.dispatch(event);
                    self.apply(effects);
                }
                Input::Shutdown => {
                    info!("Received shutdown command");
                    let effects = self.session.dispatch(SessionEvent::Teardown);
                    self.apply(effects);
                    break;
                }
            }
        }

        // Nothing may fire after teardown
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
        for (_, transport) in self.transports.drain() {
            transport.task.abort();
        }
        debug!("Runtime task exiting");
    }

    fn apply(&mut self, effects: Vec<SessionEffect>) {
        if effects.is_empty() {
            return;
        }
        for effect in effects {
            self.execute(effect);
        }
        self.publish_snapshot();
    }

    fn execute(&mut self, effect: SessionEffect) {
        match effect {
            SessionEffect::OpenTransport { connection, url } => {
                let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
                let task = tokio::spawn(run_transport(
                    connection,
                    url,
                    outgoing_rx,
                    self.input_tx.clone(),
                ));
                if let Some(old) = self.transports.insert(connection, TransportHandle { outgoing, task }) {
                    old.task.abort();
                }
            }
            SessionEffect::Send { connection, message } => match self.transports.get(&connection) {
                Some(transport) => {
                    if transport.outgoing.send(message).is_err() {
                        warn!("Transport {} already stopped, message dropped", connection);
                    }
                }
                None => warn!("No transport for {}, message dropped", connection),
            },
            SessionEffect::CloseTransport { connection } => {
                // Dropping the sender makes the transport close the socket and exit
                if self.transports.remove(&connection).is_some() {
                    debug!("Closing transport {}", connection);
                }
            }
            SessionEffect::StartTimer { kind, token, after } => {
                let input_tx = self.input_tx.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::sleep(after).await;
                    let _ = input_tx.send(Input::Event(SessionEvent::TimerFired { kind, token }));
                });
                if let Some(previous) = self.timers.insert(kind, handle) {
                    previous.abort();
                }
            }
            SessionEffect::CancelTimer { kind } => {
                if let Some(handle) = self.timers.remove(&kind) {
                    handle.abort();
                }
            }
            SessionEffect::Notify(notice) => {
                {
                    let mut notices = self.shared.notices.write();
                    if notices.len() >= NOTICE_HISTORY {
                        notices.pop_front();
                    }
                    notices.push_back(notice.clone());
                }
                let _ = self.event_tx.send(ClientEvent::Notice(notice));
            }
            SessionEffect::StatusChanged(status) => {
                let _ = self.event_tx.send(ClientEvent::StatusChanged(status));
            }
        }
    }

    fn publish_snapshot(&mut self) {
        let snapshot = self.session.snapshot();
        let changed = {
            let mut current = self.shared.snapshot.write();
            if *current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        };
        if changed {
            let _ = self.event_tx.send(ClientEvent::StateChanged(snapshot));
        }
    }
}

/// Drive one WebSocket connection until it closes, fails or is released
async fn run_transport(
    connection: ConnectionId,
    url: String,
    mut outgoing: mpsc::UnboundedReceiver<WsMessage>,
    input_tx: mpsc::UnboundedSender<Input>,
) {
    let report = |event: TransportEvent| {
        let _ = input_tx.send(Input::Event(SessionEvent::Transport { connection, event }));
    };

    let ws_stream = match connect_async(url.as_str()).await {
        Ok((ws_stream, _)) => ws_stream,
        Err(e) => {
            error!("Failed to connect: {}", e);
            report(TransportEvent::Failed(e.to_string()));
            return;
        }
    };
    info!("Connected to {}", url);
    report(TransportEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                        report(TransportEvent::Closed(reason));
                        return;
                    }
                    Some(Ok(msg)) => {
                        if let Some(ws_msg) = tungstenite_to_ws_message(msg) {
                            report(TransportEvent::Frame(ws_msg));
                        }
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error: {}", e);
                        report(TransportEvent::Failed(e.to_string()));
                        return;
                    }
                    None => {
                        warn!("WebSocket stream closed");
                        report(TransportEvent::Closed(None));
                        return;
                    }
                }
            }

            out = outgoing.recv() => {
                match out {
                    Some(msg) => {
                        if let Err(e) = write.send(ws_message_to_tungstenite(&msg)).await {
                            error!("Failed to send message: {}", e);
                            report(TransportEvent::Failed(e.to_string()));
                            return;
                        }
                    }
                    None => {
                        // The session let go of this connection
                        let _ = write.close().await;
                        return;
                    }
                }
            }
        }
    }
}

/// Convert WsMessage to tungstenite Message
fn ws_message_to_tungstenite(msg: &WsMessage) -> Message {
    match msg {
        WsMessage::Text(text) => Message::Text(text.clone()),
        WsMessage::Binary(data) => Message::Binary(data.clone()),
    }
}

/// Convert tungstenite Message to WsMessage
fn tungstenite_to_ws_message(msg: Message) -> Option<WsMessage> {
    match msg {
        Message::Text(text) => Some(WsMessage::Text(text)),
        Message::Binary(data) => Some(WsMessage::Binary(data)),
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
    }
}
