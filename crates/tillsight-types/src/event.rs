//! Event wrapper routed over the status bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::alert::Alert;
use crate::unified::UnifiedStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g., "tillsight-runtime::monitor"
    pub source: String,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data that can be routed over the status bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    /// A freshly refreshed snapshot.
    Status(Box<UnifiedStatus>),
    Alert(Alert),
    MonitoringStarted { interval_ms: u64 },
    MonitoringStopped,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AlertKind;

    #[test]
    fn event_roundtrip() {
        let event = Event::new(
            "tillsight-hal::battery",
            EventPayload::Alert(Alert::new(AlertKind::LowBattery, Some(0.1), "Battery low")),
        );
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, event.id);
        assert_eq!(back.source, event.source);
        assert!(matches!(back.payload, EventPayload::Alert(a) if a.kind == AlertKind::LowBattery));
    }
}
