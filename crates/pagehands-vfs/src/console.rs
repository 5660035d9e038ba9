//! Per-page console ring buffer.

use std::collections::VecDeque;

use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Maximum retained entries; older entries fall off the front.
pub const CONSOLE_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl std::fmt::Display for ConsoleLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConsoleLevel::Log => "log",
            ConsoleLevel::Info => "info",
            ConsoleLevel::Warn => "warn",
            ConsoleLevel::Error => "error",
            ConsoleLevel::Debug => "debug",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
struct ConsoleEntry {
    level: ConsoleLevel,
    timestamp: i64,
    message: String,
}

/// Ring of the page's console output. The version is the current entry
/// count, so consumers can cheaply detect new output.
pub struct ConsoleBuffer {
    entries: Mutex<VecDeque<ConsoleEntry>>,
}

impl ConsoleBuffer {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, level: ConsoleLevel, message: impl Into<String>) {
        let mut entries = self.entries.lock();
        if entries.len() == CONSOLE_CAPACITY {
            entries.pop_front();
        }
        entries.push_back(ConsoleEntry {
            level,
            timestamp: Utc::now().timestamp_millis(),
            message: message.into(),
        });
    }

    pub fn version(&self) -> u64 {
        self.entries.lock().len() as u64
    }

    /// One line per entry: `[time] [level] message`.
    pub fn formatted(&self) -> String {
        self.entries
            .lock()
            .iter()
            .map(|e| {
                let time = Utc
                    .timestamp_millis_opt(e.timestamp)
                    .single()
                    .map(|t| t.format("%H:%M:%S%.3f").to_string())
                    .unwrap_or_else(|| e.timestamp.to_string());
                format!("[{time}] [{}] {}", e.level, e.message)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self::new()
    }
}
