//! Cancellable timer bookkeeping for the session state machine
//!
//! The session never sleeps. It asks the driver to start a timer and hands
//! out a token; when the timer fires the driver reports the token back. A
//! token that no longer matches (because the timer was re-armed or disarmed
//! in the meantime) is stale and the firing is ignored.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Delayed reconnect attempt
    Reconnect,
    /// Clears the place-bet guard if no response arrives
    BetSafety,
    /// Clears the cash-out guard if no response arrives
    CashOutSafety,
    /// Periodic stuck-bet check
    Watchdog,
}

impl TimerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerKind::Reconnect => "reconnect",
            TimerKind::BetSafety => "bet_safety",
            TimerKind::CashOutSafety => "cash_out_safety",
            TimerKind::Watchdog => "watchdog",
        }
    }
}

impl fmt::Display for TimerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TimerToken(pub u64);

/// At most one live timer per kind
#[derive(Debug, Default)]
pub struct TimerSet {
    armed: HashMap<TimerKind, TimerToken>,
    next_token: u64,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm `kind`, replacing any live timer of the same kind
    pub fn arm(&mut self, kind: TimerKind) -> TimerToken {
        self.next_token += 1;
        let token = TimerToken(self.next_token);
        self.armed.insert(kind, token);
        token
    }

    /// Returns whether a live timer was disarmed
    pub fn disarm(&mut self, kind: TimerKind) -> bool {
        self.armed.remove(&kind).is_some()
    }

    /// Consume a firing. Returns `false` for stale tokens.
    pub fn fire(&mut self, kind: TimerKind, token: TimerToken) -> bool {
        match self.armed.get(&kind) {
            Some(current) if *current == token => {
                self.armed.remove(&kind);
                true
            }
            _ => false,
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.armed.contains_key(&kind)
    }

    /// Disarm everything; returns the kinds that were live
    pub fn disarm_all(&mut self) -> Vec<TimerKind> {
        let mut kinds: Vec<TimerKind> = self.armed.drain().map(|(kind, _)| kind).collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}
