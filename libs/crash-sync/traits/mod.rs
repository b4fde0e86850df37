//! # Crash Sync Traits
//!
//! Core traits and error types shared by every component of the client:
//!
//! - **MessageParser**: Turn raw WebSocket frames into typed protocol messages
//! - **ReconnectionStrategy**: Control reconnection backoff
//! - **ClientError** and friends: the error taxonomy (transport, protocol,
//!   user input, configuration)

pub mod error;
pub mod parser;
pub mod reconnect;

// Re-export commonly used types
pub use error::{ClientError, ConfigError, ProtocolError, Result, UserInputError};
pub use parser::{MessageParser, WsMessage};
pub use reconnect::{ExponentialBackoff, ReconnectionStrategy};
