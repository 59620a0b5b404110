// ===============================
// src/logbook.rs
// ===============================
//
// Log aktivitas in-memory (system / signal / result / error) untuk endpoint /logs.
// Newest-first, dibatasi LOG_CAP entry; yang paling lama dibuang.
//
use std::collections::VecDeque;

use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{info, warn};

use crate::domain::{OutcomeEvent, TradeCommand};

pub const LOG_CAP: usize = 300;
pub const LOG_VIEW: usize = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogEntry {
    System { msg: String },
    Error { msg: String },
    Signal(TradeCommand),
    Result(OutcomeEvent),
}

#[derive(Debug, Clone, Serialize)]
pub struct LogRecord {
    pub ts: i64,
    #[serde(flatten)]
    pub entry: LogEntry,
}

#[derive(Debug, Default)]
pub struct Logbook {
    entries: Mutex<VecDeque<LogRecord>>,
}

impl Logbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: LogEntry) {
        let rec = LogRecord { ts: Utc::now().timestamp_millis(), entry };
        let mut entries = self.entries.lock();
        entries.push_front(rec);
        entries.truncate(LOG_CAP);
    }

    pub fn system(&self, msg: impl Into<String>) {
        let msg = msg.into();
        info!(%msg, "system");
        self.push(LogEntry::System { msg });
    }

    pub fn error(&self, msg: impl Into<String>) {
        let msg = msg.into();
        warn!(%msg, "error");
        self.push(LogEntry::Error { msg });
    }

    /// Up to `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogRecord> {
        self.entries.lock().iter().take(limit).cloned().collect()
    }
}
