use serde::Serialize;
use std::fmt;

/// Transport readiness as seen by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
        }
    }

    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    /// Status line shown to the player
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Connecting => "Connecting...",
            ConnectionStatus::Disconnected => "Disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one transport open attempt.
///
/// Events tagged with an id other than the session's current one come from a
/// socket that has already been superseded and are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Connection bookkeeping owned by the session
#[derive(Debug, Clone, Default)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    /// The live (or opening) transport, if any
    pub connection: Option<ConnectionId>,
    /// Reconnect budget spent or network offline; only a manual connect resumes
    pub exhausted: bool,
    /// Set by teardown; every later event is dropped
    pub torn_down: bool,
    next_id: u64,
}

impl ConnectionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the id for a fresh open attempt and mark it current
    pub fn begin_attempt(&mut self) -> ConnectionId {
        self.next_id += 1;
        let id = ConnectionId(self.next_id);
        self.connection = Some(id);
        self.status = ConnectionStatus::Connecting;
        id
    }

    /// Whether `id` belongs to the current transport
    #[inline]
    pub fn is_current(&self, id: ConnectionId) -> bool {
        self.connection == Some(id)
    }

    /// Forget the current transport; returns its id if there was one
    pub fn release(&mut self) -> Option<ConnectionId> {
        self.status = ConnectionStatus::Disconnected;
        self.connection.take()
    }

    /// The current transport, only if it is open
    pub fn open_connection(&self) -> Option<ConnectionId> {
        match self.status {
            ConnectionStatus::Connected => self.connection,
            _ => None,
        }
    }
}
