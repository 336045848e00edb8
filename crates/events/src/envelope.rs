use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::Event;

/// Envelope for an audit event, carrying journal position and stream metadata.
///
/// This is the unit appended to the audit journal.
///
/// Notes:
/// - `stream_id` is the parent transaction (production run, assembly run, lot, ...).
/// - **Append-only**: `sequence_number` increases monotonically across the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    stream_id: Uuid,
    stream_type: String,

    /// Monotonically increasing position in the journal.
    sequence_number: u64,

    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,

    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap a typed event at journal position `sequence_number`, copying
    /// its metadata onto the envelope.
    pub fn wrap(sequence_number: u64, payload: E) -> Self {
        let (stream_id, stream_type) = payload.stream();
        Self {
            event_id: Uuid::now_v7(),
            stream_id,
            stream_type: stream_type.to_string(),
            sequence_number,
            event_type: payload.event_type().to_string(),
            event_version: payload.version(),
            occurred_at: payload.occurred_at(),
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream_id(&self) -> Uuid {
        self.stream_id
    }

    pub fn stream_type(&self) -> &str {
        &self.stream_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Spilled {
        lot: Uuid,
        at: DateTime<Utc>,
    }

    impl Event for Spilled {
        fn event_type(&self) -> &'static str {
            "test.spilled"
        }

        fn version(&self) -> u32 {
            2
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }

        fn stream(&self) -> (Uuid, &'static str) {
            (self.lot, "inventory.lot")
        }
    }

    #[test]
    fn wrap_copies_event_metadata() {
        let at = Utc::now();
        let stream = Uuid::now_v7();
        let env = EventEnvelope::wrap(7, Spilled { lot: stream, at });

        assert_eq!(env.stream_id(), stream);
        assert_eq!(env.stream_type(), "inventory.lot");
        assert_eq!(env.sequence_number(), 7);
        assert_eq!(env.event_type(), "test.spilled");
        assert_eq!(env.event_version(), 2);
        assert_eq!(env.occurred_at(), at);
    }

    #[test]
    fn envelope_serializes_payload_inline() {
        let env = EventEnvelope::wrap(1, Spilled { lot: Uuid::now_v7(), at: Utc::now() });
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["event_type"], "test.spilled");
        assert!(json["payload"]["at"].is_string());
    }
}
