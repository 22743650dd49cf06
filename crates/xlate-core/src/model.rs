//! Domain types (spec §3 Data Model).
//!
//! Field layout and derive conventions follow `gglib-voice`'s pipeline
//! types (`VoiceState`, `VoicePipelineConfig`): plain structs/enums,
//! `Debug + Clone` everywhere, `serde` only where a type crosses the
//! wire.

use std::fmt;

use chrono::{DateTime, Utc};

// ── Language ────────────────────────────────────────────────────────

/// A supported spoken language (spec §6 connection query parameters
/// restrict this set to `{en, es, pt}`, plus `auto`/`none` sentinels on
/// the solo endpoint only — `Language` itself never carries those
/// sentinels; the solo query-parameter parser maps them to `Option`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Es,
    Pt,
}

impl Language {
    /// Parse a two-letter language code. Returns `None` for anything
    /// outside the supported set (including the solo-only `auto`/`none`
    /// sentinels, which callers must special-case before calling this).
    #[must_use]
    pub fn parse(code: &str) -> Option<Self> {
        match code.to_ascii_lowercase().as_str() {
            "en" => Some(Self::En),
            "es" => Some(Self::Es),
            "pt" => Some(Self::Pt),
            _ => None,
        }
    }

    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
            Self::Pt => "pt",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

// ── Role ────────────────────────────────────────────────────────────

/// A participant's role within a room (spec §3, §4.5 role gating).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    /// The other role in a two-participant room.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::Host => Self::Guest,
            Self::Guest => Self::Host,
        }
    }
}

// ── Participant ─────────────────────────────────────────────────────

/// Server-allocated participant identifier, unique for the lifetime of
/// the process (spec §3: "id (server-allocated)").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ParticipantId(pub u64);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Allocates process-wide-unique `ParticipantId`s.
///
/// A plain atomic counter rather than a UUID — spec §3 calls for a
/// monotonic server-allocated id, and participants never need to be
/// named outside this process (no durability across restarts, per
/// spec.md's Non-goals).
#[derive(Debug, Default)]
pub struct ParticipantIdAllocator(std::sync::atomic::AtomicU64);

impl ParticipantIdAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self(std::sync::atomic::AtomicU64::new(1))
    }

    pub fn next(&self) -> ParticipantId {
        ParticipantId(self.0.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
    }
}

/// A connected participant's identity and session-local state (spec §3).
///
/// `Participant` does not own its transport handle or its audio pipeline
/// state — those belong to the connection's read task (spec §5 "shared
/// resource policy"). This struct is the lightweight, `Clone`-able record
/// a `Room` holds a reference to for routing and role-gating decisions.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Participant {
    pub id: ParticipantId,
    pub display_name: String,
    pub role: Role,
    pub language: Language,
    pub muted: bool,
}

impl Participant {
    /// Trim and clamp a client-supplied display name to the spec's
    /// 20-character limit (spec §3: "`display_name` (≤20 chars, trimmed)").
    #[must_use]
    pub fn sanitize_name(raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return "Guest".to_string();
        }
        trimmed.chars().take(20).collect()
    }
}

// ── Utterance ───────────────────────────────────────────────────────

/// A strictly-monotonic per-participant utterance generation counter
/// (GLOSSARY: "Generation id"). Used to discard stale partial results
/// (spec §3 Utterance invariant, §4.3 R3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct UtteranceGeneration(pub u64);

impl UtteranceGeneration {
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for UtteranceGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen#{}", self.0)
    }
}

/// Per-participant, generation-numbered utterance (spec §3).
///
/// `accumulated_pcm` grows while the participant is speaking; the rest
/// of the fields are populated as the `StagePipeline` advances the
/// utterance through ASR → MT → TTS.
#[derive(Debug, Clone, Default)]
pub struct Utterance {
    pub generation: UtteranceGeneration,
    pub accumulated_pcm: Vec<f32>,
    pub start_time: Option<DateTime<Utc>>,
    pub detected_language: Option<Language>,
    pub final_text: Option<String>,
    pub translated_text: Option<String>,
    pub synthesized_audio: Option<Vec<f32>>,
}

impl Utterance {
    #[must_use]
    pub fn new(generation: UtteranceGeneration) -> Self {
        Self {
            generation,
            start_time: Some(Utc::now()),
            ..Self::default()
        }
    }
}

// ── SessionPhase ────────────────────────────────────────────────────

/// Room-level session phase (spec §3, §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Waiting,
    Ready,
    Active,
    Ended,
}

impl SessionPhase {
    /// Whether `to` is a legal transition from `self` per spec §3's
    /// transition table. Role authority (only the host may drive
    /// `START`/`END`) is enforced by the caller, not this table — this
    /// method only encodes which transitions exist at all.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Waiting, Self::Ready)
                | (Self::Ready, Self::Active)
                | (Self::Active, Self::Ready)
                | (Self::Ready, Self::Waiting)
                | (Self::Waiting | Self::Ready | Self::Active, Self::Ended)
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Waiting => "waiting",
            Self::Ready => "ready",
            Self::Active => "active",
            Self::Ended => "ended",
        };
        f.write_str(s)
    }
}

// ── Room ────────────────────────────────────────────────────────────

/// A room's short join code: 6 uppercase alphanumerics drawn from an
/// ambiguity-free alphabet (spec §3: "ambiguity-free alphabet
/// recommended") — excludes `0`/`O`, `1`/`I`/`L` to avoid the classic
/// read-aloud confusions.
pub const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

/// Number of characters in a room code (spec §3, §6).
pub const ROOM_CODE_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RoomCode(pub [u8; ROOM_CODE_LEN]);

impl RoomCode {
    /// Parse a room code, case-insensitively (spec §6: "room_id (6
    /// chars, case-insensitive)"). Does not validate alphabet
    /// membership on join — an unrecognized code simply won't match any
    /// live room and surfaces as `RoomNotFound`.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let upper = s.to_ascii_uppercase();
        let bytes = upper.as_bytes();
        if bytes.len() != ROOM_CODE_LEN || !bytes.is_ascii() {
            return None;
        }
        let mut arr = [0u8; ROOM_CODE_LEN];
        arr.copy_from_slice(bytes);
        Some(Self(arr))
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(std::str::from_utf8(&self.0).unwrap_or("??????"))
    }
}

/// The ordered language pair fixed at room creation (spec §3: "an
/// ordered pair `(lang_host, lang_guest)` fixed at room creation, must
/// differ").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguagePair {
    pub host: Language,
    pub guest: Language,
}

impl LanguagePair {
    /// Construct a pair, enforcing the spec §3 invariant that the two
    /// languages differ.
    pub fn new(host: Language, guest: Language) -> Result<Self, crate::error::EngineError> {
        if host == guest {
            return Err(crate::error::EngineError::InvalidLanguagePair(format!(
                "host and guest languages must differ, got {host} twice"
            )));
        }
        Ok(Self { host, guest })
    }

    /// The language belonging to the other role.
    #[must_use]
    pub const fn other(&self, role: Role) -> Language {
        match role {
            Role::Host => self.guest,
            Role::Guest => self.host,
        }
    }

    /// The language belonging to the given role.
    #[must_use]
    pub const fn for_role(&self, role: Role) -> Language {
        match role {
            Role::Host => self.host,
            Role::Guest => self.guest,
        }
    }
}

/// A two-participant translation room (spec §3).
///
/// `Room` holds references to its participants by id; the authoritative
/// `Participant` records (and their transport/pipeline state) live in
/// `RoomSession` (spec §3: "A Room holds references; Participants do
/// not own Rooms").
#[derive(Debug, Clone)]
pub struct Room {
    pub code: RoomCode,
    pub host_participant_id: ParticipantId,
    pub guest_participant_id: Option<ParticipantId>,
    pub language_pair: LanguagePair,
    pub phase: SessionPhase,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Room {
    #[must_use]
    pub fn new(code: RoomCode, host_participant_id: ParticipantId, language_pair: LanguagePair) -> Self {
        let now = Utc::now();
        Self {
            code,
            host_participant_id,
            guest_participant_id: None,
            language_pair,
            phase: SessionPhase::Waiting,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.guest_participant_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_other_is_an_involution() {
        assert_eq!(Role::Host.other(), Role::Guest);
        assert_eq!(Role::Guest.other(), Role::Host);
    }

    #[test]
    fn language_pair_rejects_equal_languages() {
        let err = LanguagePair::new(Language::En, Language::En).unwrap_err();
        assert!(matches!(err, crate::error::EngineError::InvalidLanguagePair(_)));
    }

    #[test]
    fn language_pair_other_and_for_role() {
        let pair = LanguagePair::new(Language::En, Language::Es).unwrap();
        assert_eq!(pair.for_role(Role::Host), Language::En);
        assert_eq!(pair.for_role(Role::Guest), Language::Es);
        assert_eq!(pair.other(Role::Host), Language::Es);
        assert_eq!(pair.other(Role::Guest), Language::En);
    }

    #[test]
    fn session_phase_legal_transitions() {
        assert!(SessionPhase::Waiting.can_transition_to(SessionPhase::Ready));
        assert!(SessionPhase::Ready.can_transition_to(SessionPhase::Active));
        assert!(SessionPhase::Active.can_transition_to(SessionPhase::Ready));
        assert!(SessionPhase::Ready.can_transition_to(SessionPhase::Waiting));
        assert!(SessionPhase::Active.can_transition_to(SessionPhase::Ended));
        assert!(!SessionPhase::Waiting.can_transition_to(SessionPhase::Active));
        assert!(!SessionPhase::Ended.can_transition_to(SessionPhase::Active));
    }

    #[test]
    fn room_code_parse_is_case_insensitive() {
        let a = RoomCode::parse("ab12cd").unwrap();
        let b = RoomCode::parse("AB12CD").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "AB12CD");
    }

    #[test]
    fn room_code_parse_rejects_wrong_length() {
        assert!(RoomCode::parse("AB12C").is_none());
        assert!(RoomCode::parse("AB12CDE").is_none());
    }

    #[test]
    fn display_name_is_trimmed_and_clamped() {
        assert_eq!(Participant::sanitize_name("  Alice  "), "Alice");
        assert_eq!(Participant::sanitize_name(""), "Guest");
        assert_eq!(
            Participant::sanitize_name("ThisNameIsWayTooLongToFitIn20"),
            "ThisNameIsWayTooLong"
        );
    }

    #[test]
    fn utterance_generation_is_monotonic() {
        let g0 = UtteranceGeneration::default();
        let g1 = g0.next();
        let g2 = g1.next();
        assert!(g0 < g1);
        assert!(g1 < g2);
    }

    #[test]
    fn participant_id_allocator_is_monotonic_and_unique() {
        let alloc = ParticipantIdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        assert_ne!(a, b);
        assert!(b.0 > a.0);
    }
}
