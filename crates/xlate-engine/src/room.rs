//! Two-participant room: shared phase state machine, role gating, mute
//! state, and the per-participant audio runtime that drives it (spec
//! §4.5).
//!
//! The shared state (`RoomSession`) follows the "single lock guards
//! phase/membership, model calls never run under it" discipline spec
//! §5 describes and that `gglib-voice::service::VoiceService` already
//! documents for its own pipeline lock ("All mutations use
//! `pipeline.write().await`"). Per-participant audio state (decoder,
//! segmenter, pipeline, echo lock) is *not* part of that shared state —
//! spec §5 is explicit that it's owned by the participant's own
//! connection task — so it lives in `RoomParticipantRuntime`, a
//! separate struct each connection task owns exclusively.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;
use xlate_core::config::EngineConfig;
use xlate_core::error::EngineError;
use xlate_core::model::{Language, LanguagePair, ParticipantId, Role, RoomCode, SessionPhase};
use xlate_core::ports::{AsrCapability, SynthesizedAudio, TranslationCapability, TtsCapability, VadCapability};

use crate::decoder::AudioDecoder;
use crate::pipeline::{StagePipeline, UtteranceResult};
use crate::segmenter::{SegmentEvent, VoiceSegmenter};
use crate::worker::WorkerPool;

/// Notifications `RoomSession` delivers to a participant's connection
/// task as the shared phase/membership state changes. The connection
/// task is responsible for translating these into wire messages (spec
/// §6's `session_status`/`partner_joined`/etc).
#[derive(Debug, Clone)]
pub enum RoomEvent {
    PartnerJoined { name: String, language: Language },
    PartnerLeft,
    SessionStatus(SessionPhase),
    PartnerMuted,
    PartnerUnmuted,
    /// The partner's pipeline produced a partial transcript (spec §4.5
    /// direction routing: A's results are delivered to B, never to A).
    PartnerTranscriptPartial {
        text: String,
        language: Language,
        translation: Option<String>,
        target_language: Option<Language>,
    },
    /// The partner's pipeline finalized an utterance, optionally with
    /// synthesized audio addressed to the recipient of this event.
    PartnerTranscript {
        text: String,
        language: Language,
        translation: Option<String>,
        target_language: Option<Language>,
        duration_ms: u32,
        audio: Option<SynthesizedAudio>,
    },
    /// The recipient is about to hear their partner's synthesized voice;
    /// their own mic should be suppressed for `duration_ms` (spec §4.3
    /// "Echo suppression").
    MicLocked { duration_ms: u64 },
}

struct Slot {
    id: ParticipantId,
    display_name: String,
    muted: bool,
    events: mpsc::UnboundedSender<RoomEvent>,
}

struct Inner {
    code: RoomCode,
    language_pair: LanguagePair,
    phase: SessionPhase,
    host: Slot,
    guest: Option<Slot>,
    last_activity: std::time::Instant,
}

impl Inner {
    fn touch(&mut self) {
        self.last_activity = std::time::Instant::now();
    }

    fn notify(&self, role: Role, event: RoomEvent) {
        let slot = match role {
            Role::Host => Some(&self.host),
            Role::Guest => self.guest.as_ref(),
        };
        if let Some(slot) = slot {
            let _ = slot.events.send(event);
        }
    }

    fn broadcast(&self, event: RoomEvent) {
        self.notify(Role::Host, event.clone());
        self.notify(Role::Guest, event);
    }

    fn role_of(&self, participant: ParticipantId) -> Option<Role> {
        if self.host.id == participant {
            Some(Role::Host)
        } else if self.guest.as_ref().is_some_and(|g| g.id == participant) {
            Some(Role::Guest)
        } else {
            None
        }
    }

    fn partner_name(&self, participant: ParticipantId) -> Option<String> {
        match self.role_of(participant)? {
            Role::Host => Some(self.guest.as_ref()?.display_name.clone()),
            Role::Guest => Some(self.host.display_name.clone()),
        }
    }
}

/// Shared room state: a cheap, `Clone`-able handle around one
/// `Arc<Mutex<Inner>>` — every clone refers to the same room.
#[derive(Clone)]
pub struct RoomSession {
    inner: Arc<Mutex<Inner>>,
}

impl RoomSession {
    #[must_use]
    pub fn new(
        code: RoomCode,
        language_pair: LanguagePair,
        host_id: ParticipantId,
        host_name: String,
        host_events: mpsc::UnboundedSender<RoomEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                code,
                language_pair,
                phase: SessionPhase::Waiting,
                host: Slot { id: host_id, display_name: host_name, muted: false, events: host_events },
                guest: None,
                last_activity: std::time::Instant::now(),
            })),
        }
    }

    pub async fn code(&self) -> RoomCode {
        self.inner.lock().await.code
    }

    pub async fn phase(&self) -> SessionPhase {
        self.inner.lock().await.phase
    }

    pub async fn language_pair(&self) -> LanguagePair {
        self.inner.lock().await.language_pair
    }

    pub async fn is_full(&self) -> bool {
        self.inner.lock().await.guest.is_some()
    }

    pub async fn is_idle_since(&self, ttl: Duration) -> bool {
        self.inner.lock().await.last_activity.elapsed() >= ttl
    }

    /// Join a guest into a waiting room (spec §4.6 `join`). The guest's
    /// language is auto-assigned to the remaining member of the pair.
    pub async fn join_guest(
        &self,
        guest_id: ParticipantId,
        guest_name: String,
        events: mpsc::UnboundedSender<RoomEvent>,
    ) -> Result<Language, EngineError> {
        let mut inner = self.inner.lock().await;
        if inner.guest.is_some() {
            return Err(EngineError::RoomFull(inner.code.into()));
        }
        let guest_language = inner.language_pair.other(Role::Host);
        inner.guest = Some(Slot { id: guest_id, display_name: guest_name.clone(), muted: false, events });
        inner.phase = SessionPhase::Ready;
        inner.touch();
        inner.notify(Role::Host, RoomEvent::PartnerJoined { name: guest_name, language: guest_language });
        inner.broadcast(RoomEvent::SessionStatus(SessionPhase::Ready));
        Ok(guest_language)
    }

    /// Host-only: `ready → active` (spec §4.5 role gating). Silently
    /// ignored (no phase change, no broadcast) if called by the guest
    /// or from a phase that doesn't allow it — spec §8 "Role authority"
    /// and scenario 2 require this to be a no-op, not a wire error.
    pub async fn start(&self, by: ParticipantId) {
        let mut inner = self.inner.lock().await;
        if inner.host.id != by {
            tracing::debug!(?by, "ignored START from non-host");
            return;
        }
        if !inner.phase.can_transition_to(SessionPhase::Active) {
            return;
        }
        inner.phase = SessionPhase::Active;
        inner.touch();
        inner.broadcast(RoomEvent::SessionStatus(SessionPhase::Active));
    }

    /// Host-only: `active → ready`.
    pub async fn end_session(&self, by: ParticipantId) {
        let mut inner = self.inner.lock().await;
        if inner.host.id != by {
            tracing::debug!(?by, "ignored END from non-host");
            return;
        }
        if !inner.phase.can_transition_to(SessionPhase::Ready) {
            return;
        }
        inner.phase = SessionPhase::Ready;
        inner.touch();
        inner.broadcast(RoomEvent::SessionStatus(SessionPhase::Ready));
    }

    /// A participant's transport closed, or they explicitly left.
    ///
    /// The transition table (spec §3) only names `ready → waiting` for
    /// a departing guest; it leaves a guest departing from `active`
    /// unspecified. This implementation treats the host leaving, *or*
    /// either participant leaving while `active`, as ending the room —
    /// matching scenario 5's observed effect (`partner_left` +
    /// `session_status=ended`) — and only reverts to `waiting` when the
    /// guest leaves a merely-`ready` (not yet started) room. See
    /// DESIGN.md.
    pub async fn leave(&self, participant: ParticipantId) {
        let mut inner = self.inner.lock().await;
        let Some(role) = inner.role_of(participant) else {
            return;
        };
        match role {
            Role::Host => {
                inner.broadcast(RoomEvent::PartnerLeft);
                inner.phase = SessionPhase::Ended;
                inner.broadcast(RoomEvent::SessionStatus(SessionPhase::Ended));
            }
            Role::Guest if inner.phase == SessionPhase::Active => {
                inner.guest = None;
                inner.notify(Role::Host, RoomEvent::PartnerLeft);
                inner.phase = SessionPhase::Ended;
                inner.notify(Role::Host, RoomEvent::SessionStatus(SessionPhase::Ended));
            }
            Role::Guest => {
                inner.guest = None;
                inner.notify(Role::Host, RoomEvent::PartnerLeft);
                inner.phase = SessionPhase::Waiting;
                inner.notify(Role::Host, RoomEvent::SessionStatus(SessionPhase::Waiting));
            }
        }
        inner.touch();
    }

    /// Toggle a participant's mute flag and notify their partner (spec
    /// §4.5 "Mute state").
    pub async fn set_muted(&self, participant: ParticipantId, muted: bool) {
        let mut inner = self.inner.lock().await;
        let Some(role) = inner.role_of(participant) else {
            return;
        };
        match role {
            Role::Host => inner.host.muted = muted,
            Role::Guest => {
                if let Some(guest) = inner.guest.as_mut() {
                    guest.muted = muted;
                }
            }
        }
        inner.touch();
        let event = if muted { RoomEvent::PartnerMuted } else { RoomEvent::PartnerUnmuted };
        inner.notify(role.other(), event);
    }

    pub async fn is_muted(&self, participant: ParticipantId) -> bool {
        let inner = self.inner.lock().await;
        match inner.role_of(participant) {
            Some(Role::Host) => inner.host.muted,
            Some(Role::Guest) => inner.guest.as_ref().is_some_and(|g| g.muted),
            None => false,
        }
    }

    /// Whether this participant's phase-gated mic capture is currently
    /// trusted server-side (spec §4.5 "the server does not trust
    /// clients here"): audio arriving outside `active` is dropped.
    pub async fn is_capturing_allowed(&self, _participant: ParticipantId) -> bool {
        self.inner.lock().await.phase == SessionPhase::Active
    }

    pub async fn partner_of(&self, participant: ParticipantId) -> Option<ParticipantId> {
        let inner = self.inner.lock().await;
        match inner.role_of(participant)? {
            Role::Host => inner.guest.as_ref().map(|g| g.id),
            Role::Guest => Some(inner.host.id),
        }
    }

    pub async fn role_of(&self, participant: ParticipantId) -> Option<Role> {
        self.inner.lock().await.role_of(participant)
    }

    /// Display name of `participant`'s partner, if one has joined.
    pub async fn partner_name(&self, participant: ParticipantId) -> Option<String> {
        self.inner.lock().await.partner_name(participant)
    }

    /// Route an event to `from`'s partner (spec §4.5 direction routing).
    /// A no-op if `from` has no partner yet (e.g. host speaking before a
    /// guest has joined).
    pub async fn send_to_partner(&self, from: ParticipantId, event: RoomEvent) {
        let inner = self.inner.lock().await;
        if let Some(role) = inner.role_of(from) {
            inner.notify(role.other(), event);
        }
    }
}

/// Tracks the server-side echo-suppression window for one participant
/// (spec §4.3 "Echo suppression"): while armed, inbound encoded audio
/// from this participant is decoded (to keep decoder state consistent)
/// but discarded rather than handed to the segmenter.
#[derive(Default)]
pub struct EchoLock {
    locked_until: Option<Instant>,
}

impl EchoLock {
    pub fn arm(&mut self, duration: Duration) {
        self.locked_until = Some(Instant::now() + duration);
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked_until.is_some_and(|until| Instant::now() < until)
    }
}

/// Per-participant audio runtime inside a room: decoder, segmenter,
/// pipeline, and echo lock, all owned exclusively by that participant's
/// connection task (spec §5 shared-resource policy).
pub struct RoomParticipantRuntime {
    pub participant_id: ParticipantId,
    decoder: AudioDecoder,
    segmenter: VoiceSegmenter,
    pipeline: StagePipeline,
    echo_lock: EchoLock,
}

impl RoomParticipantRuntime {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        participant_id: ParticipantId,
        vad: Arc<dyn VadCapability>,
        asr: Arc<dyn AsrCapability>,
        mt: Arc<dyn TranslationCapability>,
        tts: Arc<dyn TtsCapability>,
        pool: WorkerPool,
        source_language: Language,
        target_language: Language,
        config: &EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<UtteranceResult>) {
        let segmenter = VoiceSegmenter::new(vad, config.silence_window_ms, 0.5);
        let (pipeline, results_rx) = StagePipeline::new(
            asr,
            mt,
            tts,
            pool,
            source_language,
            Some(target_language),
            true,
            16_000,
            config,
        );
        (
            Self {
                participant_id,
                decoder: AudioDecoder::new(),
                segmenter,
                pipeline,
                echo_lock: EchoLock::default(),
            },
            results_rx,
        )
    }

    /// Decode and, if the room currently trusts this participant's mic
    /// (phase `active`, not muted, not inside the echo-suppression
    /// window), feed the result through segmentation and the pipeline.
    /// Always decodes (to keep the decoder's running state correct
    /// across a lock window) even when the result is discarded.
    pub async fn ingest_encoded(&mut self, room: &RoomSession, bytes: &[u8]) -> Result<(), EngineError> {
        let pcm = self.decoder.ingest(bytes)?;
        if pcm.is_empty() {
            return Ok(());
        }
        if self.echo_lock.is_locked() {
            return Ok(());
        }
        if !room.is_capturing_allowed(self.participant_id).await {
            return Ok(());
        }
        if room.is_muted(self.participant_id).await {
            return Ok(());
        }

        if let Some(SegmentEvent::SpeechEnd { duration_ms }) = self.segmenter.update(&pcm) {
            self.pipeline.on_speech_end(duration_ms);
        }
        if self.segmenter.is_speaking() {
            self.pipeline.on_pcm(&pcm);
        }
        Ok(())
    }

    /// Reset decoder, segmenter, and discard any in-flight utterance —
    /// called on mute and on any phase change leaving `active` (spec
    /// §4.2 "Reset", §4.5 "the muter's own pipeline resets its
    /// segmenter").
    pub fn reset(&mut self) {
        self.segmenter.reset();
        self.pipeline.discard_utterance();
    }

    pub fn reset_container(&mut self) {
        self.decoder.reset();
    }

    pub fn arm_echo_lock(&mut self, duration: Duration) {
        self.echo_lock.arm(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlate_core::model::RoomCode;

    fn pair() -> LanguagePair {
        LanguagePair::new(Language::En, Language::Es).unwrap()
    }

    fn code() -> RoomCode {
        RoomCode::parse("AB12CD").unwrap()
    }

    #[tokio::test]
    async fn join_guest_assigns_complementary_language_and_advances_phase() {
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let room = RoomSession::new(code(), pair(), ParticipantId(1), "Alice".into(), host_tx);
        let (guest_tx, _guest_rx) = mpsc::unbounded_channel();
        let lang = room.join_guest(ParticipantId(2), "Bob".into(), guest_tx).await.unwrap();
        assert_eq!(lang, Language::Es);
        assert_eq!(room.phase().await, SessionPhase::Ready);
    }

    #[tokio::test]
    async fn second_join_is_room_full() {
        let (host_tx, _h) = mpsc::unbounded_channel();
        let room = RoomSession::new(code(), pair(), ParticipantId(1), "Alice".into(), host_tx);
        let (g1, _g1r) = mpsc::unbounded_channel();
        room.join_guest(ParticipantId(2), "Bob".into(), g1).await.unwrap();
        let (g2, _g2r) = mpsc::unbounded_channel();
        let err = room.join_guest(ParticipantId(3), "Carl".into(), g2).await.unwrap_err();
        assert!(matches!(err, EngineError::RoomFull(_)));
    }

    #[tokio::test]
    async fn non_host_start_is_ignored() {
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let room = RoomSession::new(code(), pair(), ParticipantId(1), "Alice".into(), host_tx);
        let (guest_tx, _guest_rx) = mpsc::unbounded_channel();
        room.join_guest(ParticipantId(2), "Bob".into(), guest_tx).await.unwrap();
        let _ = host_rx.try_recv(); // drain the Ready broadcast

        room.start(ParticipantId(2)).await; // guest attempts START
        assert_eq!(room.phase().await, SessionPhase::Ready);
        assert!(host_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn host_start_then_end_round_trips_phase() {
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let room = RoomSession::new(code(), pair(), ParticipantId(1), "Alice".into(), host_tx);
        let (guest_tx, _guest_rx) = mpsc::unbounded_channel();
        room.join_guest(ParticipantId(2), "Bob".into(), guest_tx).await.unwrap();
        let _ = host_rx.try_recv();

        room.start(ParticipantId(1)).await;
        assert_eq!(room.phase().await, SessionPhase::Active);
        room.end_session(ParticipantId(1)).await;
        assert_eq!(room.phase().await, SessionPhase::Ready);
    }

    #[tokio::test]
    async fn mute_notifies_partner() {
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let room = RoomSession::new(code(), pair(), ParticipantId(1), "Alice".into(), host_tx);
        let (guest_tx, mut guest_rx) = mpsc::unbounded_channel();
        room.join_guest(ParticipantId(2), "Bob".into(), guest_tx.clone()).await.unwrap();
        let _ = guest_rx.try_recv(); // drain Ready broadcast

        room.set_muted(ParticipantId(1), true).await;
        assert!(matches!(guest_rx.try_recv(), Ok(RoomEvent::PartnerMuted)));
        assert!(room.is_muted(ParticipantId(1)).await);
        let _ = guest_tx; // keep sender alive for the duration of the test
    }

    #[tokio::test]
    async fn host_leave_ends_room_and_notifies_guest() {
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let room = RoomSession::new(code(), pair(), ParticipantId(1), "Alice".into(), host_tx);
        let (guest_tx, mut guest_rx) = mpsc::unbounded_channel();
        room.join_guest(ParticipantId(2), "Bob".into(), guest_tx).await.unwrap();
        let _ = guest_rx.try_recv();

        room.leave(ParticipantId(1)).await;
        assert_eq!(room.phase().await, SessionPhase::Ended);
        assert!(matches!(guest_rx.try_recv(), Ok(RoomEvent::PartnerLeft)));
        assert!(matches!(guest_rx.try_recv(), Ok(RoomEvent::SessionStatus(SessionPhase::Ended))));
    }

    #[tokio::test]
    async fn guest_leave_while_ready_reverts_to_waiting() {
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let room = RoomSession::new(code(), pair(), ParticipantId(1), "Alice".into(), host_tx);
        let (guest_tx, _guest_rx) = mpsc::unbounded_channel();
        room.join_guest(ParticipantId(2), "Bob".into(), guest_tx).await.unwrap();
        let _ = host_rx.try_recv();

        room.leave(ParticipantId(2)).await;
        assert_eq!(room.phase().await, SessionPhase::Waiting);
        assert!(matches!(host_rx.try_recv(), Ok(RoomEvent::PartnerLeft)));
    }

    #[tokio::test]
    async fn partner_name_resolves_both_directions() {
        let (host_tx, _host_rx) = mpsc::unbounded_channel();
        let room = RoomSession::new(code(), pair(), ParticipantId(1), "Alice".into(), host_tx);
        assert_eq!(room.partner_name(ParticipantId(1)).await, None);

        let (guest_tx, _guest_rx) = mpsc::unbounded_channel();
        room.join_guest(ParticipantId(2), "Bob".into(), guest_tx).await.unwrap();
        assert_eq!(room.partner_name(ParticipantId(1)).await.as_deref(), Some("Bob"));
        assert_eq!(room.partner_name(ParticipantId(2)).await.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn send_to_partner_routes_to_the_other_role() {
        let (host_tx, mut host_rx) = mpsc::unbounded_channel();
        let room = RoomSession::new(code(), pair(), ParticipantId(1), "Alice".into(), host_tx);
        let (guest_tx, mut guest_rx) = mpsc::unbounded_channel();
        room.join_guest(ParticipantId(2), "Bob".into(), guest_tx).await.unwrap();
        let _ = host_rx.try_recv(); // drain PartnerJoined
        let _ = host_rx.try_recv(); // drain SessionStatus(Ready)
        let _ = guest_rx.try_recv(); // drain SessionStatus(Ready)

        room.send_to_partner(ParticipantId(1), RoomEvent::MicLocked { duration_ms: 1_500 }).await;
        assert!(matches!(guest_rx.try_recv(), Ok(RoomEvent::MicLocked { duration_ms: 1_500 })));
        assert!(host_rx.try_recv().is_err());
    }

    #[test]
    fn echo_lock_expires_after_duration() {
        let mut lock = EchoLock::default();
        assert!(!lock.is_locked());
        lock.arm(Duration::from_millis(0));
        // Armed with zero duration should already be (or immediately
        // become) unlocked; this just exercises the API shape.
        std::thread::sleep(Duration::from_millis(5));
        assert!(!lock.is_locked());
    }
}
