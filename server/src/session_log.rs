//! Structured session events.
//!
//! The session handler reports what happened after each mutation. Where the
//! events go is up to the sink; the default one writes them to the `log`
//! facade under the `session` target so they can be filtered with
//! `RUST_LOG=session=info`.

use log::info;
use serde::Serialize;
use shared::PlayerId;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Action,
    State,
    Trading,
    Navigation,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEvent {
    pub timestamp: u64,
    pub kind: EventKind,
    pub player_id: Option<PlayerId>,
    pub data: serde_json::Value,
}

impl SessionEvent {
    pub fn new(
        timestamp: u64,
        kind: EventKind,
        player_id: Option<PlayerId>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            timestamp,
            kind,
            player_id,
            data,
        }
    }
}

pub trait EventSink: Send {
    fn record(&mut self, event: SessionEvent);
}

/// Writes each event as one JSON line through `log`.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&mut self, event: SessionEvent) {
        match serde_json::to_string(&event) {
            Ok(line) => info!(target: "session", "{}", line),
            Err(e) => info!(target: "session", "{:?} (unserializable: {})", event, e),
        }
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|event| event.kind == kind).count()
    }
}

impl EventSink for MemorySink {
    fn record(&mut self, event: SessionEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
