//! Structured, level-filtered logger service
//!
//! `Logger` is a cheap cloneable handle. Every accepted record is forwarded to
//! `tracing` and also kept in a bounded in-memory ring so a front end can show
//! or export recent history.

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Default number of records kept in memory
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// Record severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
            LogLevel::Critical => "critical",
        }
    }

    /// Directive understood by `tracing_subscriber::EnvFilter`
    pub fn as_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Critical => "error",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "debug" | "trace" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "critical" => Ok(LogLevel::Critical),
            other => Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
    }
}

/// One stored log record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

struct LoggerInner {
    level: RwLock<LogLevel>,
    capacity: usize,
    entries: Mutex<VecDeque<LogEntry>>,
    disposed: AtomicBool,
}

/// Process-scoped logger handle
///
/// Created with [`Logger::init`] and torn down with [`Logger::dispose`].
/// Clones share the same buffer and level.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    /// Create a logger that accepts records at `level` and above
    pub fn init(level: LogLevel, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(LoggerInner {
                level: RwLock::new(level),
                capacity,
                entries: Mutex::new(VecDeque::with_capacity(capacity.min(DEFAULT_LOG_CAPACITY))),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    pub fn level(&self) -> LogLevel {
        *self.inner.level.read()
    }

    pub fn set_level(&self, level: LogLevel) {
        *self.inner.level.write() = level;
    }

    /// Whether a record at `level` would be kept
    pub fn should_log(&self, level: LogLevel) -> bool {
        level == LogLevel::Critical || level >= self.level()
    }

    pub fn debug(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Debug, message, data);
    }

    pub fn info(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Info, message, data);
    }

    pub fn warn(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Warn, message, data);
    }

    pub fn error(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Error, message, data);
    }

    /// Always recorded regardless of the configured level
    pub fn critical(&self, message: impl Into<String>, data: Option<Value>) {
        self.log(LogLevel::Critical, message, data);
    }

    /// Record a message at an explicit level
    pub fn log(&self, level: LogLevel, message: impl Into<String>, data: Option<Value>) {
        if self.is_disposed() || !self.should_log(level) {
            return;
        }

        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            data,
        };

        emit(&entry);

        let mut entries = self.inner.entries.lock();
        if entries.len() >= self.inner.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Snapshot of the stored records, oldest first
    pub fn entries(&self) -> Vec<LogEntry> {
        self.inner.entries.lock().iter().cloned().collect()
    }

    /// Stored records at exactly `level`
    pub fn entries_at(&self, level: LogLevel) -> Vec<LogEntry> {
        self.inner
            .entries
            .lock()
            .iter()
            .filter(|entry| entry.level == level)
            .cloned()
            .collect()
    }

    /// Stored records as a pretty-printed JSON array
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        let entries = self.entries();
        serde_json::to_string_pretty(&entries)
    }

    pub fn clear(&self) {
        self.inner.entries.lock().clear();
    }

    /// Stop accepting records and drop the buffer
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::Release);
        self.clear();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::init(LogLevel::Info, DEFAULT_LOG_CAPACITY)
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("level", &self.level())
            .field("capacity", &self.inner.capacity)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

fn emit(entry: &LogEntry) {
    let data = entry
        .data
        .as_ref()
        .map(|d| d.to_string())
        .unwrap_or_default();
    let message = entry.message.as_str();

    match entry.level {
        LogLevel::Debug => debug!(data = %data, "{}", message),
        LogLevel::Info => info!(data = %data, "{}", message),
        LogLevel::Warn => warn!(data = %data, "{}", message),
        LogLevel::Error => error!(data = %data, "{}", message),
        LogLevel::Critical => error!(critical = true, data = %data, "{}", message),
    }
}
