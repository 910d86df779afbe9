//! Append-only combat audit trail.
//!
//! Every state-changing moment in a session lands here: start, turns,
//! actions, damage, deaths, effect changes, and the terminal outcome. The
//! log is retained for the session's full lifetime and handed to the host's
//! end-of-combat callback, so even abnormal endings leave a complete record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::common::ParticipantId;

/// Type tag for one log entry; doubles as the logical outbound event schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum LogEventKind {
    CombatStart,
    Turn,
    Action,
    Damage,
    Heal,
    Miss,
    Death,
    EffectApplied,
    EffectExpired,
    Flee,
    CombatEnd,
}

/// One record in the combat log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub round: u32,
    pub kind: LogEventKind,
    pub source: Option<ParticipantId>,
    pub target: Option<ParticipantId>,
    /// Structured payload (amounts, crit flags, effect ids) for transports
    /// that want more than the message string.
    pub data: serde_json::Value,
    pub message: String,
}

impl LogEntry {
    pub fn new(round: u32, kind: LogEventKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            round,
            kind,
            source: None,
            target: None,
            data: serde_json::Value::Null,
            message: message.into(),
        }
    }

    pub fn with_source(mut self, source: ParticipantId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_target(mut self, target: ParticipantId) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

/// Ordered, append-only sequence of log entries.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CombatLog {
    entries: Vec<LogEntry>,
}

impl CombatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries of a given kind, in order.
    pub fn of_kind(&self, kind: LogEventKind) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }
}
