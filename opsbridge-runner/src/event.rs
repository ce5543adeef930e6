//! Execution event envelope
//!
//! Events arrive from the execution engine as loose JSON objects. The kind
//! is derived from the payload shape:
//! - a "stdout" key marks output text
//! - a "status" key marks a phase transition
//! - anything else is carried through untouched

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const STDOUT_KEY: &str = "stdout";
const STATUS_KEY: &str = "status";

/// Classification of an engine event by payload shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Stdout,
    Status,
    Other,
}

/// One event emitted by the execution engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    pub kind: EventKind,
    pub payload: Map<String, Value>,
}

impl ExecutionEvent {
    /// Wrap a raw engine payload, deriving the kind from its keys
    pub fn from_payload(payload: Map<String, Value>) -> Self {
        let kind = if payload.contains_key(STDOUT_KEY) {
            EventKind::Stdout
        } else if payload.contains_key(STATUS_KEY) {
            EventKind::Status
        } else {
            EventKind::Other
        };
        Self { kind, payload }
    }

    /// Build a stdout event carrying the given text
    pub fn stdout<S: Into<String>>(text: S) -> Self {
        let mut payload = Map::new();
        payload.insert(STDOUT_KEY.to_string(), Value::String(text.into()));
        Self::from_payload(payload)
    }

    /// Build a status event carrying the given phase name
    pub fn status<S: Into<String>>(phase: S) -> Self {
        let mut payload = Map::new();
        payload.insert(STATUS_KEY.to_string(), Value::String(phase.into()));
        Self::from_payload(payload)
    }

    /// Text form of the "stdout" field, if present. Strings pass through;
    /// other values serialize to their JSON form.
    pub fn stdout_text(&self) -> Option<String> {
        match self.payload.get(STDOUT_KEY) {
            Some(Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_derivation() {
        let event = ExecutionEvent::stdout("10.0.0.1 | CHANGED | rc=0 >>\nroot");
        assert_eq!(event.kind, EventKind::Stdout);

        let event = ExecutionEvent::status("running");
        assert_eq!(event.kind, EventKind::Status);

        let mut payload = Map::new();
        payload.insert("counter".to_string(), json!(3));
        let event = ExecutionEvent::from_payload(payload);
        assert_eq!(event.kind, EventKind::Other);
    }

    #[test]
    fn test_stdout_text_extraction() {
        let event = ExecutionEvent::stdout("whoami output");
        assert_eq!(event.stdout_text().as_deref(), Some("whoami output"));

        let event = ExecutionEvent::status("starting");
        assert_eq!(event.stdout_text(), None);
    }

    #[test]
    fn test_non_string_stdout_serializes() {
        let mut payload = Map::new();
        payload.insert("stdout".to_string(), json!(42));
        let event = ExecutionEvent::from_payload(payload);
        assert_eq!(event.kind, EventKind::Stdout);
        assert_eq!(event.stdout_text().as_deref(), Some("42"));
    }
}
