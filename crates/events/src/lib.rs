//! Audit events: the `Event` trait and the envelope persisted to the
//! append-only audit journal.

pub mod envelope;
pub mod event;

pub use envelope::EventEnvelope;
pub use event::Event;
