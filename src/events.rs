//! Anomaly events raised by the dispatch core.
//!
//! Every flow carries an [`EventLog`] (see [`crate::flow::Flow::events`]). Events are diagnostic:
//! raising one never by itself stops inspection (see [`crate::error::AppLayerError`] for what does).

use serde::Serialize;

/// The event taxonomy emitted by the dispatch core (spec §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    /// Detection on the two directions of a TCP flow produced different protocols.
    MismatchProtocolBothDirections,
    /// A parser requires bytes in a specific direction first, but bytes arrived on the other side.
    WrongDirectionFirstData,
    /// Detection exhausted all chances on one direction while never completing on the other.
    DetectProtocolOnlyOneDirection,
}

impl EventKind {
    /// Stable name used in logs and serialized event records.
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::MismatchProtocolBothDirections => "MISMATCH_PROTOCOL_BOTH_DIRECTIONS",
            EventKind::WrongDirectionFirstData => "WRONG_DIRECTION_FIRST_DATA",
            EventKind::DetectProtocolOnlyOneDirection => "DETECT_PROTOCOL_ONLY_ONE_DIRECTION",
        }
    }
}

/// Per-flow anomaly-event sink.
///
/// A concrete `Vec`-backed sink is sufficient for the dispatch core's own needs; a production
/// deployment wiring this core to a SIEM or alerting pipeline would drain `events()` on connection
/// termination rather than replacing this type, so no trait indirection is introduced here.
#[derive(Debug, Default, Clone)]
pub struct EventLog(Vec<EventKind>);

impl EventLog {
    pub fn new() -> Self {
        EventLog(Vec::new())
    }

    /// Raises `kind`, appending it to the log and emitting a `warn!` for operational visibility.
    pub fn raise(&mut self, kind: EventKind) {
        log::warn!("app-layer event raised: {}", kind.name());
        self.0.push(kind);
    }

    pub fn events(&self) -> &[EventKind] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}
