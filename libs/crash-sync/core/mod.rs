//! # Core
//!
//! The connection session state machine and the tokio runtime that drives it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use crash_sync::{ClientConfig, ClientEvent, Cryptocurrency, GameClient};
//!
//! #[tokio::main]
//! async fn main() -> crash_sync::Result<()> {
//!     let config = ClientConfig::from_env()?;
//!     let client = GameClient::start(&config)?;
//!     client.connect()?;
//!     client.set_player_name("Ada")?;
//!
//!     // Later, while the round is waiting
//!     client.place_bet(10.0, Cryptocurrency::Bitcoin)?;
//!
//!     while let Some(event) = client.try_recv_event() {
//!         if let ClientEvent::Notice(notice) = event {
//!             println!("{}", notice);
//!         }
//!     }
//!
//!     client.shutdown().await
//! }
//! ```

pub mod client;
pub mod config;
pub mod connection_state;
pub mod session;
pub mod snapshot;
pub mod timers;

// Re-export main types
pub use client::{ClientEvent, GameClient, NOTICE_HISTORY};
pub use config::ClientConfig;
pub use connection_state::{ConnectionId, ConnectionState, ConnectionStatus};
pub use session::{
    ConnectionSession, Intent, SessionEffect, SessionEvent, SessionSettings, TransportEvent,
};
pub use snapshot::ClientSnapshot;
pub use timers::{TimerKind, TimerSet, TimerToken};
