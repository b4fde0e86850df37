//! Crypto Crash Client - Main Library
//!
//! Headless client for the crypto crash betting game.
//!
//! ## Architecture
//!
//! - **bin_common**: Common utilities for binary executables (config loading)
//! - **crash_sync**: Connection lifecycle and game-state synchronization
//!   (re-exported from workspace)
//!
//! ## Usage in Binaries
//!
//! ```rust,ignore
//! use crypto_crash_client::bin_common::{load_client_config, load_config_from_env, ConfigType};
//! use crypto_crash_client::crash_sync::GameClient;
//! ```

// Re-export workspace libraries for convenience
pub use crash_sync;

// Binary common utilities
pub mod bin_common {
    //! Common utilities for binary executables

    pub mod cli;

    pub use cli::{load_client_config, load_config_from_env, parse_args, ConfigType};
}
