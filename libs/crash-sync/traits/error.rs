use thiserror::Error;

/// Main error type for the crash client
#[derive(Error, Debug)]
pub enum ClientError {
    /// Inbound payload could not be understood
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Intent rejected before reaching the network
    #[error(transparent)]
    UserInput(#[from] UserInputError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The client task has already been torn down
    #[error("Client is shut down")]
    ShutDown,
}

/// Malformed or unrecognized inbound message
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Binary frames are not supported")]
    BinaryFrame,

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error("Message '{kind}' is missing its data field")]
    MissingData { kind: String },

    #[error("Invalid '{kind}' payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("Unknown game phase: {0}")]
    UnknownPhase(String),
}

/// Intent rejected locally
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UserInputError {
    #[error("Not connected to server")]
    NotConnected,

    #[error("Invalid bet amount")]
    InvalidAmount,

    #[error("You already have an active bet")]
    BetAlreadyActive,

    #[error("No active bet to cash out")]
    NoActiveBet,

    #[error("A bet request is already in flight")]
    BetInFlight,

    #[error("A cash out request is already in flight")]
    CashOutInFlight,

    #[error("Bets are only accepted while waiting for a round (current phase: {0})")]
    BettingClosed(String),

    #[error("Cash out is only possible while the round is playing (current phase: {0})")]
    CashOutClosed(String),

    #[error("Player name cannot be empty")]
    EmptyName,
}

/// Configuration loading and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Result type for crash client operations
pub type Result<T> = std::result::Result<T, ClientError>;
