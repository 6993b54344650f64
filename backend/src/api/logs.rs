//! Real-time log streaming via Server-Sent Events (SSE).
//!
//! Workspace and pipeline steps report progress through the `log_*`
//! helpers. Each entry is echoed to the console and broadcast to every
//! subscriber of [`LOG_BROADCASTER`]; the HTTP server forwards them on
//! `GET /api/logs`. The last few entries are kept so a client connecting
//! mid-operation can catch up.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Broadcast channel capacity.
const CHANNEL_CAPACITY: usize = 100;

/// Entries kept for late subscribers.
const HISTORY_LEN: usize = 50;

/// Log level for client display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    /// Nesting depth for sub-steps
    #[serde(default)]
    pub indent: u8,
    /// RFC 3339 time of emission
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            indent: 0,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_indent(mut self, indent: u8) -> Self {
        self.indent = indent;
        self
    }
}

/// Where entries are echoed besides the broadcast channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Echo {
    Stdout = 0,
    /// Used when stdout carries data (e.g. JSON written by the CLI)
    Stderr = 1,
    Off = 2,
}

impl Echo {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Echo::Stdout,
            1 => Echo::Stderr,
            _ => Echo::Off,
        }
    }
}

/// Global log broadcaster
pub static LOG_BROADCASTER: Lazy<LogBroadcaster> = Lazy::new(LogBroadcaster::new);

/// Broadcasts log entries to all connected SSE clients
pub struct LogBroadcaster {
    sender: broadcast::Sender<LogEntry>,
    history: Mutex<VecDeque<LogEntry>>,
    echo: AtomicU8,
}

impl LogBroadcaster {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(HISTORY_LEN)),
            echo: AtomicU8::new(Echo::Stdout as u8),
        }
    }

    pub fn set_echo(&self, echo: Echo) {
        self.echo.store(echo as u8, Ordering::Relaxed);
    }

    pub fn echo(&self) -> Echo {
        Echo::from_u8(self.echo.load(Ordering::Relaxed))
    }

    /// Record an entry and send it to all subscribers
    pub fn log(&self, entry: LogEntry) {
        let prefix = match entry.level {
            LogLevel::Info => "   ",
            LogLevel::Success => "   ✓",
            LogLevel::Warning => "   ⚠️",
            LogLevel::Error => "   ❌",
        };
        let line = format!("{}{} {}", "   ".repeat(entry.indent as usize), prefix, entry.message);
        match self.echo() {
            Echo::Stdout => println!("{}", line),
            Echo::Stderr => eprintln!("{}", line),
            Echo::Off => {}
        }

        // Record and send under one lock so history snapshots and
        // subscriptions never both see an entry.
        let mut history = match self.history.lock() {
            Ok(history) => history,
            Err(poisoned) => poisoned.into_inner(),
        };
        if history.len() == HISTORY_LEN {
            history.pop_front();
        }
        history.push_back(entry.clone());

        // No receivers is fine
        let _ = self.sender.send(entry);
    }

    /// Get a receiver for SSE streaming
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.sender.subscribe()
    }

    /// Recent entries plus a receiver for everything logged after them.
    pub fn subscribe_with_history(&self) -> (Vec<LogEntry>, broadcast::Receiver<LogEntry>) {
        let history = match self.history.lock() {
            Ok(history) => history,
            Err(poisoned) => poisoned.into_inner(),
        };
        (history.iter().cloned().collect(), self.sender.subscribe())
    }

    /// Most recent entries, oldest first.
    pub fn recent(&self) -> Vec<LogEntry> {
        self.history
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for LogBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

pub fn log_info(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg));
}

pub fn log_success(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Success, msg));
}

pub fn log_warning(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg));
}

pub fn log_error(msg: impl Into<String>) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Error, msg));
}

pub fn log_info_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Info, msg).with_indent(indent));
}

pub fn log_warning_indent(msg: impl Into<String>, indent: u8) {
    LOG_BROADCASTER.log(LogEntry::new(LogLevel::Warning, msg).with_indent(indent));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_json_shape() {
        let entry = LogEntry::new(LogLevel::Warning, "careful").with_indent(2);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "careful");
        assert_eq!(json["indent"], 2);
        assert!(json["timestamp"].as_str().is_some());
    }

    #[test]
    fn test_subscriber_receives_entries() {
        let broadcaster = LogBroadcaster::new();
        broadcaster.set_echo(Echo::Off);
        let mut rx = broadcaster.subscribe();

        broadcaster.log(LogEntry::new(LogLevel::Success, "done"));

        let entry = rx.try_recv().unwrap();
        assert_eq!(entry.level, LogLevel::Success);
        assert_eq!(entry.message, "done");
    }

    #[test]
    fn test_history_is_bounded() {
        let broadcaster = LogBroadcaster::new();
        broadcaster.set_echo(Echo::Off);
        for i in 0..HISTORY_LEN + 5 {
            broadcaster.log(LogEntry::new(LogLevel::Info, format!("step {}", i)));
        }

        let recent = broadcaster.recent();
        assert_eq!(recent.len(), HISTORY_LEN);
        assert_eq!(recent[0].message, "step 5");
        assert_eq!(broadcaster.echo(), Echo::Off);
    }

    #[test]
    fn test_history_and_live_entries_do_not_overlap() {
        let broadcaster = LogBroadcaster::new();
        broadcaster.set_echo(Echo::Off);
        broadcaster.log(LogEntry::new(LogLevel::Info, "before"));

        let (history, mut rx) = broadcaster.subscribe_with_history();
        broadcaster.log(LogEntry::new(LogLevel::Info, "after"));

        let replayed: Vec<_> = history.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(replayed, vec!["before"]);
        assert_eq!(rx.try_recv().unwrap().message, "after");
        assert!(rx.try_recv().is_err());
    }
}
