//! Engine error taxonomy (spec §7).
//!
//! Every variant here corresponds to one of the error kinds the wire
//! protocol can surface as an `error` message. `xlate-server` maps each
//! variant to a `kind` string and a close decision; nothing in this crate
//! knows about the transport.

/// Errors raised anywhere in the session engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A required capability (VAD/ASR/MT/TTS) failed to initialize at
    /// startup. Fatal to the process.
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(String),

    /// Invalid or conflicting query parameters / connection request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Join to a nonexistent or already-`ended` room.
    #[error("room not found: {0}")]
    RoomNotFound(RoomCodeDisplay),

    /// Join to a room that already has two participants.
    #[error("room full: {0}")]
    RoomFull(RoomCodeDisplay),

    /// An ASR/MT/TTS stage exceeded its configured time budget.
    /// Recoverable — the utterance is dropped, the session continues.
    #[error("capability timed out: {stage} exceeded {budget_ms}ms")]
    CapabilityTimeout { stage: &'static str, budget_ms: u64 },

    /// A connection's outbound queue overflowed. The connection is closed.
    #[error("backpressure: outbound queue overflowed")]
    Backpressure,

    /// Malformed JSON, unknown control marker, or an otherwise
    /// protocol-inconsistent message. Not always fatal — see call site.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// The container's native sample rate is not the only one this
    /// decoder's decimate-by-3 resampler supports (48 kHz). See
    /// DESIGN.md Open Question 1.
    #[error("unsupported sample rate: {0} Hz (only 48000 Hz is supported)")]
    UnsupportedSampleRate(u32),

    /// The peer's transport closed, normally or abnormally.
    #[error("transport closed")]
    TransportClosed,

    /// A role-gated action (START/END) was attempted by a participant
    /// without the authority to perform it. Not surfaced to the wire as
    /// an error — spec §8 "Role authority" says it is silently ignored —
    /// but modeled as a distinct error so callers can log/test it.
    #[error("role {0:?} is not authorized to perform this transition")]
    NotAuthorized(crate::model::Role),

    /// An illegal `SessionPhase` transition was attempted.
    #[error("illegal phase transition: {from:?} -> {to:?}")]
    IllegalTransition {
        from: crate::model::SessionPhase,
        to: crate::model::SessionPhase,
    },

    /// The room's language pair was invalid (equal languages, or an
    /// unknown language code).
    #[error("invalid language pair: {0}")]
    InvalidLanguagePair(String),
}

/// Helper so `RoomCode` (a `[u8; 6]`-backed newtype) implements `Display`
/// without pulling a `Display` impl requirement onto the hot path.
#[derive(Debug)]
pub struct RoomCodeDisplay(pub String);

impl std::fmt::Display for RoomCodeDisplay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<crate::model::RoomCode> for RoomCodeDisplay {
    fn from(code: crate::model::RoomCode) -> Self {
        Self(code.to_string())
    }
}

/// The stable `kind` discriminant the wire protocol's `error` message
/// uses (spec §7). Kept separate from the `Display` message so server
/// code never has to string-match error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    CapabilityUnavailable,
    BadRequest,
    RoomNotFound,
    RoomFull,
    CapabilityTimeout,
    Backpressure,
    ProtocolViolation,
    TransportClosed,
}

impl EngineError {
    /// Map this error to its wire-protocol `kind` discriminant.
    ///
    /// `NotAuthorized` and `IllegalTransition` have no wire
    /// representation — per spec §8 and §4.5 they are silently ignored,
    /// never surfaced as an `error` message — so callers must not route
    /// them through this method; it is only meaningful for errors that
    /// reach a connection boundary.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::CapabilityUnavailable(_) => ErrorKind::CapabilityUnavailable,
            Self::BadRequest(_) | Self::InvalidLanguagePair(_) | Self::UnsupportedSampleRate(_) => {
                ErrorKind::BadRequest
            }
            Self::RoomNotFound(_) => ErrorKind::RoomNotFound,
            Self::RoomFull(_) => ErrorKind::RoomFull,
            Self::CapabilityTimeout { .. } => ErrorKind::CapabilityTimeout,
            Self::Backpressure => ErrorKind::Backpressure,
            Self::ProtocolViolation(_) => ErrorKind::ProtocolViolation,
            Self::TransportClosed => ErrorKind::TransportClosed,
            Self::NotAuthorized(_) | Self::IllegalTransition { .. } => {
                ErrorKind::ProtocolViolation
            }
        }
    }

    /// Whether this error should close the connection (spec §7
    /// propagation policy: registry errors close the connection;
    /// capability timeouts recover locally).
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !matches!(self, Self::CapabilityTimeout { .. })
    }
}
