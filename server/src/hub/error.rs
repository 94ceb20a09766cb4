//! Hub Error Types

use thiserror::Error;

use crate::ws::proto::ServerEvent;

/// Errors produced while handling a hub event.
///
/// All variants except `Internal` leave room state unchanged; they are
/// reported to the offending connection as an `error` wire event.
#[derive(Debug, Error)]
pub enum HubError {
    /// A non-host issued a host-only event, or an asserted identity
    /// disagrees with the authenticated one.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// Reference to a room with no live state.
    #[error("Unknown room: {0}")]
    UnknownRoom(String),

    /// The event does not apply to the current room state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Frame above the signaling size cap.
    #[error("Payload too large: {size} bytes (cap {cap})")]
    PayloadTooLarge { size: usize, cap: usize },

    /// Unexpected failure; the affected room is destroyed.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Stable machine-readable code for the wire.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Authorization(_) => "AUTHORIZATION",
            Self::UnknownRoom(_) => "UNKNOWN_ROOM",
            Self::InvalidState(_) => "INVALID_STATE",
            Self::PayloadTooLarge { .. } => "PAYLOAD_TOO_LARGE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Render as the `error` wire event.
    #[must_use]
    pub fn to_event(&self) -> ServerEvent {
        ServerEvent::Error {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}
