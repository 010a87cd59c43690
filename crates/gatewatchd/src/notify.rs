//! Notification events and the sinks that render them.
//!
//! The detection core emits a complete [`NotificationEvent`] and moves on;
//! presentation pacing (the character-by-character greeting reveal) is a
//! sink concern, modeled as a lazy character sequence with a fixed
//! inter-element delay.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::providers::NotificationSink;

/// Delay between revealed characters when a sink types out a greeting.
pub const TYPING_DELAY: Duration = Duration::from_millis(50);

/// Which side of the doorway produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Arrival,
    Departure,
}

impl EventKind {
    /// Greeting prefix for this kind of event.
    pub fn phrase(self) -> &'static str {
        match self {
            EventKind::Arrival => "你好",
            EventKind::Departure => "再見",
        }
    }
}

/// One approved sighting, ready for rendering. Ephemeral: handed to the
/// sink and dropped.
#[derive(Debug, Clone, Serialize)]
pub struct NotificationEvent {
    pub gate_id: String,
    pub kind: EventKind,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(gate_id: impl Into<String>, kind: EventKind, label: impl Into<String>) -> Self {
        Self {
            gate_id: gate_id.into(),
            kind,
            label: label.into(),
            timestamp: Utc::now(),
        }
    }

    /// The human-readable line for this event, e.g. `"你好，carol！"`.
    pub fn greeting(&self) -> String {
        format!("{}，{}！", self.kind.phrase(), self.label)
    }

    /// The greeting as a lazily consumed character sequence, for sinks
    /// that reveal it progressively.
    pub fn typing(&self) -> TypingText {
        TypingText::new(&self.greeting(), TYPING_DELAY)
    }
}

/// Lazy sequence of characters with a fixed inter-element delay.
///
/// The consumer decides the pacing: pull a character, wait `delay()`,
/// repeat. Dropping it cancels the remainder with no timers left behind.
pub struct TypingText {
    chars: std::vec::IntoIter<char>,
    delay: Duration,
}

impl TypingText {
    pub fn new(text: &str, delay: Duration) -> Self {
        Self {
            chars: text.chars().collect::<Vec<_>>().into_iter(),
            delay,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Iterator for TypingText {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        self.chars.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.chars.size_hint()
    }
}

/// Sink that writes each greeting as a structured log line.
pub struct LogSink;

impl NotificationSink for LogSink {
    fn render(&self, event: &NotificationEvent) {
        tracing::info!(
            gate = %event.gate_id,
            kind = ?event.kind,
            label = %event.label,
            "{}",
            event.greeting()
        );
    }
}

/// In-memory record of emitted events, exportable as JSON lines.
#[derive(Default)]
pub struct RecordLog {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Serialize the record as one JSON object per line.
    pub fn to_json_lines(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for event in self.events() {
            out.push_str(&serde_json::to_string(&event)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl NotificationSink for RecordLog {
    fn render(&self, event: &NotificationEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arrival_greeting() {
        let event = NotificationEvent::new("entrance", EventKind::Arrival, "carol");
        assert_eq!(event.greeting(), "你好，carol！");
    }

    #[test]
    fn test_departure_greeting() {
        let event = NotificationEvent::new("exit", EventKind::Departure, "carol");
        assert_eq!(event.greeting(), "再見，carol！");
    }

    #[test]
    fn test_typing_text_yields_every_character() {
        let event = NotificationEvent::new("entrance", EventKind::Arrival, "carol");
        let typed: String = event.typing().collect();
        assert_eq!(typed, "你好，carol！");
    }

    #[test]
    fn test_typing_text_delay_and_laziness() {
        let mut typing = TypingText::new("ab", Duration::from_millis(50));
        assert_eq!(typing.delay(), Duration::from_millis(50));
        assert_eq!(typing.next(), Some('a'));
        assert_eq!(typing.next(), Some('b'));
        assert_eq!(typing.next(), None);
    }

    #[test]
    fn test_record_log_collects_and_exports() {
        let log = RecordLog::new();
        log.render(&NotificationEvent::new("entrance", EventKind::Arrival, "carol"));
        log.render(&NotificationEvent::new("exit", EventKind::Departure, "carol"));

        assert_eq!(log.len(), 2);
        let lines = log.to_json_lines().unwrap();
        let mut parsed = lines.lines();
        let first: serde_json::Value = serde_json::from_str(parsed.next().unwrap()).unwrap();
        assert_eq!(first["kind"], "arrival");
        assert_eq!(first["label"], "carol");
        let second: serde_json::Value = serde_json::from_str(parsed.next().unwrap()).unwrap();
        assert_eq!(second["kind"], "departure");
        assert_eq!(second["gate_id"], "exit");
    }
}
