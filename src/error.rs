//! Error types for the application-layer dispatch core.
//!
//! Three classes of failure are distinguished (see `DESIGN.md` and spec §7): a soft rollback that
//! asks the caller to re-present the same bytes later, a fatal-to-flow condition that permanently
//! disables inspection, and "anomalous but continue", which is not an error at all -- it raises an
//! event and returns `Ok(())`.

use crate::events::EventKind;
use thiserror::Error;

/// Failure outcomes of the TCP and UDP data handlers.
#[derive(Debug, Error)]
pub enum AppLayerError {
    /// Detection committed prematurely on the non-preferred direction; the flow's app-layer state
    /// has been reverted and the caller should re-present this chunk once the preferred direction
    /// has been observed.
    #[error("soft rollback: {reason}")]
    SoftRollback {
        /// Human-readable reason, used only for logging.
        reason: &'static str,
    },

    /// The flow can no longer be inspected. `NO_APPLAYER_INSPECTION` has already been set and both
    /// streams' detection-completed latches have already been set by the time this is returned.
    #[error("flow marked uninspectable: {reason}")]
    FatalToFlow {
        /// Human-readable reason, used only for logging.
        reason: &'static str,
        /// The event that was raised immediately before this error, if any.
        event: Option<EventKind>,
    },

    /// A collaborator (the reassembler, in practice) failed on a call this core made into it.
    #[error("collaborator call failed: {0}")]
    Collaborator(#[from] anyhow::Error),
}

impl AppLayerError {
    pub(crate) fn fatal(reason: &'static str) -> Self {
        AppLayerError::FatalToFlow {
            reason,
            event: None,
        }
    }

    pub(crate) fn fatal_with_event(reason: &'static str, event: EventKind) -> Self {
        AppLayerError::FatalToFlow {
            reason,
            event: Some(event),
        }
    }

    pub(crate) fn rollback(reason: &'static str) -> Self {
        AppLayerError::SoftRollback { reason }
    }
}
