//! Event recording for changes the operator makes.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::ObjectRef;

/// Severity of a recorded event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    Normal,
    Warning,
}

/// A single recorded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub type_: EventType,
    /// Machine readable reason, e.g. `ConfigMapUpdated`.
    pub reason: String,
    pub message: String,
    /// Component suffix of the recorder that emitted the event.
    pub component: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl EventRecord {
    pub fn normal(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EventType::Normal, reason, message)
    }

    pub fn warning(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(EventType::Warning, reason, message)
    }

    fn new(type_: EventType, reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_,
            reason: reason.into(),
            message: message.into(),
            component: String::new(),
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Event describing the outcome of an apply on `object`, if anything changed.
    pub fn for_apply(object: &ObjectRef, created: bool) -> Self {
        let verb = if created { "Created" } else { "Updated" };
        Self::normal(
            format!("{}{verb}", object.kind),
            format!("{verb} {object} because it was missing or changed"),
        )
    }
}

/// Sink for operator events.
pub trait EventRecorder: Send + Sync {
    fn record(&self, event: EventRecord);
}

/// Recorder that writes events to the tracing subscriber.
#[derive(Debug, Clone)]
pub struct TracingRecorder {
    component: String,
}

impl TracingRecorder {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }
}

impl EventRecorder for TracingRecorder {
    fn record(&self, mut event: EventRecord) {
        event.component = self.component.clone();
        match event.type_ {
            EventType::Normal => tracing::info!(
                component = %event.component,
                reason = %event.reason,
                "{}",
                event.message
            ),
            EventType::Warning => tracing::warn!(
                component = %event.component,
                reason = %event.reason,
                "{}",
                event.message
            ),
        }
    }
}

/// Recorder that keeps events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemoryRecorder {
    events: Mutex<Vec<EventRecord>>,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn reasons(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.reason).collect()
    }
}

impl EventRecorder for MemoryRecorder {
    fn record(&self, event: EventRecord) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    #[test]
    fn test_apply_event_reason() {
        let cm = ObjectRef::namespaced(
            ResourceKind::ConfigMap,
            "openshift-config-managed",
            "console-public",
        );
        let created = EventRecord::for_apply(&cm, true);
        assert_eq!(created.reason, "ConfigMapCreated");
        assert_eq!(created.type_, EventType::Normal);

        let updated = EventRecord::for_apply(&cm, false);
        assert_eq!(updated.reason, "ConfigMapUpdated");
        assert!(updated.message.contains("openshift-config-managed/console-public"));
    }

    #[test]
    fn test_memory_recorder_keeps_order() {
        let recorder = MemoryRecorder::new();
        recorder.record(EventRecord::normal("First", "one"));
        recorder.record(EventRecord::warning("Second", "two"));
        assert_eq!(recorder.reasons(), vec!["First", "Second"]);
        assert_eq!(recorder.events()[1].type_, EventType::Warning);
    }
}
