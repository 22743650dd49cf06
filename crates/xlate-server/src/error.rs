//! Mapping from `EngineError` to the wire's `error` message and a
//! close decision (spec §7 propagation policy).
//!
//! Grounded on `gglib-axum::error::HttpError`'s `From<CoreError>`
//! pattern of centralizing one crate's error taxonomy into another
//! adapter's outward-facing shape — here a WebSocket message instead
//! of an HTTP response.

use crate::wire::WireMessage;
use xlate_core::error::EngineError;

/// Turn an `EngineError` into the `error` TEXT frame to send, plus
/// whether the connection should be closed afterward.
///
/// `NotAuthorized` and `IllegalTransition` never reach here — spec §8
/// "Role authority" requires those to be silently ignored at the
/// engine layer, never surfaced to the wire.
#[must_use]
pub fn to_wire_error(err: &EngineError) -> (WireMessage, bool) {
    let message = WireMessage::Error { message: err.to_string(), kind: err.kind() };
    (message, err.is_fatal())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_timeout_is_not_fatal() {
        let err = EngineError::CapabilityTimeout { stage: "asr", budget_ms: 4_000 };
        let (_, close) = to_wire_error(&err);
        assert!(!close);
    }

    #[test]
    fn room_not_found_is_fatal() {
        let err = EngineError::RoomNotFound(xlate_core::error::RoomCodeDisplay("ab12cd".into()));
        let (_, close) = to_wire_error(&err);
        assert!(close);
    }
}
