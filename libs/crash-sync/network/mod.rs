//! Host connectivity monitoring

pub mod monitor;

pub use monitor::{ListenerError, NetworkEvent, NetworkInfo, NetworkMonitor, SubscriberId};
