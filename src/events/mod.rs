//! Audit events emitted by the commit pipeline

use crate::logging::Logger;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Kind of object an event refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Image,
    Container,
}

/// The object an event acts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventActor {
    /// Image or container id
    pub id: String,
    /// Human-readable reference, empty when none was supplied
    pub ref_name: String,
    pub attributes: HashMap<String, String>,
}

impl EventActor {
    pub fn image(image_id: &str, ref_name: &str) -> Self {
        Self {
            id: image_id.to_string(),
            ref_name: ref_name.to_string(),
            attributes: HashMap::new(),
        }
    }
}

/// A single audit event
#[derive(Debug, Clone)]
pub struct Event {
    pub action: String,
    pub event_type: EventType,
    pub actor: EventActor,
    pub timestamp: DateTime<Utc>,
}

/// Sink receiving audit events
pub trait EventSink: Send + Sync {
    fn log(&self, action: &str, event_type: EventType, actor: EventActor);
}

/// Default sink writing events through the [`Logger`]
#[derive(Debug, Clone)]
pub struct LoggerEventSink {
    output: Logger,
}

impl LoggerEventSink {
    pub fn new(output: Logger) -> Self {
        Self { output }
    }
}

impl EventSink for LoggerEventSink {
    fn log(&self, action: &str, _event_type: EventType, actor: EventActor) {
        if actor.ref_name.is_empty() {
            self.output.info(&format!("{}: {}", action, actor.id));
        } else {
            self.output
                .info(&format!("{}: {} ({})", action, actor.id, actor.ref_name));
        }
    }
}

/// Sink that records events in memory, used by tests and callers that need
/// to forward events elsewhere
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().expect("event sink lock poisoned").clone()
    }
}

impl EventSink for RecordingEventSink {
    fn log(&self, action: &str, event_type: EventType, actor: EventActor) {
        let mut events = self.events.lock().expect("event sink lock poisoned");
        events.push(Event {
            action: action.to_string(),
            event_type,
            actor,
            timestamp: Utc::now(),
        });
    }
}
