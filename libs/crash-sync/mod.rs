//! # Crash Sync
//!
//! Connection lifecycle and game-state synchronization for the crypto crash
//! game client.
//!
//! ## Components
//!
//! - **Logger**: level-filtered structured records with an in-memory ring
//! - **NetworkMonitor**: online/offline signal, subscribers, reconnect budget
//! - **ConnectionSession**: deterministic connect/reconnect state machine
//! - **StateReconciler**: applies server messages to game and player state
//!   and self-heals stuck bet state
//! - **GameClient**: tokio runtime executing the session over a WebSocket

pub mod traits;
pub mod core;
pub mod game;
pub mod logging;
pub mod network;

// Re-export all traits
pub use traits::*;
pub use traits::error;

// Re-export core client functionality
pub use core::{
    client, config, connection_state, session, snapshot, timers,
    client::{ClientEvent, GameClient},
    config::ClientConfig,
    connection_state::{ConnectionId, ConnectionStatus},
    session::{ConnectionSession, Intent, SessionEffect, SessionEvent, SessionSettings, TransportEvent},
    snapshot::ClientSnapshot,
    timers::{TimerKind, TimerToken},
};

pub use game::{
    Bet, Cryptocurrency, GamePhase, GameState, Notice, NoticeKind, PendingActions, PlayerState,
    StateReconciler,
};
pub use logging::{init_tracing, LogEntry, LogLevel, Logger};
pub use network::{NetworkEvent, NetworkInfo, NetworkMonitor};
