//! Recent status events shown in the tray menu.

use chrono::{DateTime, Local};
use std::collections::VecDeque;

/// Number of events kept.
pub const HISTORY_CAPACITY: usize = 5;

/// What a status event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Start,
    Stop,
    Correction,
    Stable,
    Config,
    Settings,
}

impl EventKind {
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Start => "START",
            EventKind::Stop => "STOP",
            EventKind::Correction => "CORRECTION",
            EventKind::Stable => "STABLE",
            EventKind::Config => "CONFIG",
            EventKind::Settings => "SETTINGS",
        }
    }
}

/// A user-visible record of something the keeper did.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusEvent {
    pub timestamp: DateTime<Local>,
    pub kind: EventKind,
    pub message: String,
}

impl StatusEvent {
    pub fn new(kind: EventKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} - {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.kind.label(),
            self.message
        )
    }
}

/// Fixed-capacity event log, newest first.
#[derive(Debug, Clone, Default)]
pub struct EventHistory {
    events: VecDeque<StatusEvent>,
}

impl EventHistory {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    /// Record an event, evicting the oldest past capacity.
    pub fn push(&mut self, event: StatusEvent) {
        self.events.push_front(event);
        self.events.truncate(HISTORY_CAPACITY);
    }

    /// Shorthand for `push(StatusEvent::new(kind, message))`.
    pub fn record(&mut self, kind: EventKind, message: impl Into<String>) {
        self.push(StatusEvent::new(kind, message));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Newest event, if any.
    pub fn latest(&self) -> Option<&StatusEvent> {
        self.events.front()
    }

    /// Events from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &StatusEvent> {
        self.events.iter()
    }

    pub fn to_vec(&self) -> Vec<StatusEvent> {
        self.events.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn newest_first() {
        let mut history = EventHistory::new();
        history.record(EventKind::Start, "first");
        history.record(EventKind::Stop, "second");

        assert_eq!(history.latest().unwrap().message, "second");
        assert_eq!(history.to_vec()[1].message, "first");
    }

    #[test]
    fn evicts_oldest_past_capacity() {
        let mut history = EventHistory::new();
        for i in 0..6 {
            history.record(EventKind::Correction, format!("event {i}"));
        }

        assert_eq!(history.len(), HISTORY_CAPACITY);
        let messages: Vec<_> = history.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            ["event 5", "event 4", "event 3", "event 2", "event 1"]
        );
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut history = EventHistory::new();
        for i in 0..50 {
            history.record(EventKind::Stable, i.to_string());
            assert!(history.len() <= HISTORY_CAPACITY);
        }
    }

    #[test]
    fn display_format() {
        let event = StatusEvent {
            timestamp: Local.with_ymd_and_hms(2024, 3, 1, 9, 5, 7).unwrap(),
            kind: EventKind::Correction,
            message: "95% -> 100%".to_string(),
        };
        assert_eq!(event.to_string(), "09:05:07 - CORRECTION: 95% -> 100%");
    }
}
