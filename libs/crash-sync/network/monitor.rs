//! Connectivity tracking and reconnect budgeting
//!
//! The monitor mirrors the host's online/offline signal, fans transitions out
//! to subscribers and owns the reconnect attempt counter that the session
//! consults before scheduling another attempt.

use crate::logging::Logger;
use crate::traits::{ExponentialBackoff, ReconnectionStrategy};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::json;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Connectivity transition delivered to subscribers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkEvent {
    Online,
    Offline,
}

/// Handle returned by [`NetworkMonitor::subscribe`]
pub type SubscriberId = u64;

/// Error type subscribers may return
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

type Listener = Arc<dyn Fn(NetworkEvent) -> Result<(), ListenerError> + Send + Sync>;

/// Snapshot of the monitor's view of the network
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub is_online: bool,
    pub reconnect_attempts: u32,
    pub max_reconnect_attempts: Option<u32>,
    /// Base delay of the next attempt in milliseconds, jitter excluded
    pub next_reconnect_delay_ms: Option<u64>,
}

pub struct NetworkMonitor {
    online: AtomicBool,
    attempts: AtomicU32,
    strategy: ExponentialBackoff,
    listeners: RwLock<Vec<(SubscriberId, Listener)>>,
    next_id: AtomicU64,
    disposed: AtomicBool,
    logger: Logger,
}

impl NetworkMonitor {
    /// Create a monitor with an initial connectivity reading
    pub fn init(strategy: ExponentialBackoff, online: bool, logger: Logger) -> Self {
        Self {
            online: AtomicBool::new(online),
            attempts: AtomicU32::new(0),
            strategy,
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            disposed: AtomicBool::new(false),
            logger,
        }
    }

    #[inline]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::Acquire)
    }

    /// Host reported connectivity restored
    pub fn handle_online(&self) -> bool {
        self.set_online(true)
    }

    /// Host reported connectivity lost
    pub fn handle_offline(&self) -> bool {
        self.set_online(false)
    }

    /// Record a connectivity reading; subscribers are notified only on change.
    ///
    /// Returns `true` if the reading was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        if self.disposed.load(Ordering::Acquire) {
            return false;
        }
        let previous = self.online.swap(online, Ordering::AcqRel);
        if previous == online {
            return false;
        }

        let event = if online {
            NetworkEvent::Online
        } else {
            NetworkEvent::Offline
        };
        self.logger
            .info("Network status changed", Some(json!({ "event": event })));
        self.notify(event);
        true
    }

    /// Register a callback for connectivity transitions
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(NetworkEvent) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.read().len()
    }

    /// Call every subscriber; a failing or panicking one does not stop the rest.
    ///
    /// Returns the number of subscribers that failed.
    fn notify(&self, event: NetworkEvent) -> usize {
        // Clone out so subscribers may (un)subscribe re-entrantly
        let listeners: Vec<(SubscriberId, Listener)> = self.listeners.read().clone();
        let mut failures = 0;

        for (id, listener) in listeners {
            match catch_unwind(AssertUnwindSafe(|| listener(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    self.logger.error(
                        "Error in connection listener",
                        Some(json!({ "subscriber": id, "error": e.to_string() })),
                    );
                }
                Err(_) => {
                    failures += 1;
                    self.logger.error(
                        "Connection listener panicked",
                        Some(json!({ "subscriber": id })),
                    );
                }
            }
        }

        failures
    }

    /// Online and attempt budget not yet spent
    pub fn should_reconnect(&self) -> bool {
        self.is_online() && self.strategy.should_reconnect(self.reconnect_attempts())
    }

    /// Jittered delay for the next attempt, `None` once the budget is spent
    pub fn get_reconnect_delay(&self) -> Option<Duration> {
        self.strategy.next_delay(self.reconnect_attempts())
    }

    /// Delay for the next attempt without jitter
    pub fn next_base_delay(&self) -> Option<Duration> {
        self.strategy.base_delay(self.reconnect_attempts())
    }

    #[inline]
    pub fn reconnect_attempts(&self) -> u32 {
        self.attempts.load(Ordering::Acquire)
    }

    pub fn max_reconnect_attempts(&self) -> Option<u32> {
        self.strategy.max_attempts()
    }

    pub fn increment_reconnect_attempts(&self) -> u32 {
        self.attempts.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn reset_reconnect_attempts(&self) {
        self.attempts.store(0, Ordering::Release);
    }

    pub fn connection_info(&self) -> NetworkInfo {
        NetworkInfo {
            is_online: self.is_online(),
            reconnect_attempts: self.reconnect_attempts(),
            max_reconnect_attempts: self.max_reconnect_attempts(),
            next_reconnect_delay_ms: self.next_base_delay().map(|d| d.as_millis() as u64),
        }
    }

    /// Drop all subscribers and ignore further connectivity readings
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.listeners.write().clear();
    }
}

impl std::fmt::Debug for NetworkMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkMonitor")
            .field("online", &self.is_online())
            .field("attempts", &self.reconnect_attempts())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
