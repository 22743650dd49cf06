//! Process-wide directory of live rooms by short code (spec §4.6).
//!
//! Room-code allocation via rejection sampling, and a slow periodic
//! sweeper that reclaims `ended` or idle-too-long rooms, follow the
//! teacher's periodic-background-task idiom (`gglib-axum`'s
//! event-polling tasks spawned alongside the HTTP server) — adapted
//! here to `tokio::time::interval` over a `RwLock`-protected map rather
//! than an SSE poll loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{mpsc, RwLock};
use xlate_core::config::EngineConfig;
use xlate_core::error::EngineError;
use xlate_core::model::{
    Language, LanguagePair, ParticipantId, ParticipantIdAllocator, RoomCode, SessionPhase, ROOM_CODE_ALPHABET,
    ROOM_CODE_LEN,
};

use crate::room::{RoomEvent, RoomSession};

/// Process-wide room directory.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomCode, RoomSession>>,
    participant_ids: ParticipantIdAllocator,
    config: Arc<EngineConfig>,
}

impl RoomRegistry {
    #[must_use]
    pub fn new(config: Arc<EngineConfig>) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            participant_ids: ParticipantIdAllocator::new(),
            config,
        }
    }

    /// Create a room, allocating a fresh code and the host's
    /// participant id. `host_language == guest_language` is rejected as
    /// `bad_request` (spec §3 invariant, §7 taxonomy).
    pub async fn create(
        &self,
        host_language: Language,
        guest_language: Language,
        host_name: String,
        host_events: mpsc::UnboundedSender<RoomEvent>,
    ) -> Result<(RoomSession, ParticipantId), EngineError> {
        let pair = LanguagePair::new(host_language, guest_language)?;
        let host_id = self.participant_ids.next();
        let code = self.allocate_code().await;
        let display_name = xlate_core::model::Participant::sanitize_name(&host_name);
        let room = RoomSession::new(code, pair, host_id, display_name, host_events);
        self.rooms.write().await.insert(code, room.clone());
        Ok((room, host_id))
    }

    /// Join an existing, non-`ended` room (spec §4.6 `join`).
    pub async fn join(
        &self,
        code: RoomCode,
        guest_name: String,
        guest_events: mpsc::UnboundedSender<RoomEvent>,
    ) -> Result<(RoomSession, ParticipantId, Language), EngineError> {
        let room = self.rooms.read().await.get(&code).cloned();
        let Some(room) = room else {
            return Err(EngineError::RoomNotFound(code.into()));
        };
        if room.phase().await == SessionPhase::Ended {
            return Err(EngineError::RoomNotFound(code.into()));
        }
        let guest_id = self.participant_ids.next();
        let display_name = xlate_core::model::Participant::sanitize_name(&guest_name);
        let language = room.join_guest(guest_id, display_name, guest_events).await?;
        Ok((room, guest_id, language))
    }

    pub async fn get(&self, code: RoomCode) -> Option<RoomSession> {
        self.rooms.read().await.get(&code).cloned()
    }

    pub async fn leave(&self, code: RoomCode, participant: ParticipantId) {
        if let Some(room) = self.get(code).await {
            room.leave(participant).await;
        }
    }

    async fn allocate_code(&self) -> RoomCode {
        let rooms = self.rooms.read().await;
        let mut rng = rand::thread_rng();
        loop {
            let mut bytes = [0u8; ROOM_CODE_LEN];
            for b in &mut bytes {
                let idx = rng.gen_range(0..ROOM_CODE_ALPHABET.len());
                *b = ROOM_CODE_ALPHABET[idx];
            }
            let candidate = RoomCode(bytes);
            if !rooms.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// One sweep: remove rooms that are `ended`, or idle beyond the
    /// configured TTL. Returns the number of rooms removed (for tests
    /// and logging).
    pub async fn sweep_once(&self) -> usize {
        let mut rooms = self.rooms.write().await;
        let mut stale = Vec::new();
        for (code, room) in rooms.iter() {
            if room.phase().await == SessionPhase::Ended || room.is_idle_since(self.config.room_idle_ttl).await {
                stale.push(*code);
            }
        }
        for code in &stale {
            rooms.remove(code);
        }
        stale.len()
    }

    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.try_read().map(|r| r.len()).unwrap_or(0)
    }
}

/// Spawn the background idle-TTL sweeper (spec.md supplemented
/// feature). Runs until the registry itself is dropped (the loop holds
/// only a `Weak` so it doesn't keep the registry alive on its own).
pub fn spawn_idle_sweeper(registry: &Arc<RoomRegistry>) -> tokio::task::JoinHandle<()> {
    let interval = registry.config.idle_sweep_interval;
    let weak = Arc::downgrade(registry);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let Some(registry) = weak.upgrade() else {
                tracing::debug!("room registry dropped, stopping idle sweeper");
                return;
            };
            let removed = registry.sweep_once().await;
            if removed > 0 {
                tracing::info!(removed, "idle sweeper reclaimed rooms");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_registry() -> RoomRegistry {
        RoomRegistry::new(Arc::new(EngineConfig::default()))
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let registry = test_registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (room, host_id) = registry.create(Language::En, Language::Es, "Alice".into(), tx).await.unwrap();
        let fetched = registry.get(room.code().await).await.unwrap();
        assert_eq!(fetched.phase().await, SessionPhase::Waiting);
        assert_eq!(host_id, ParticipantId(1));
    }

    #[tokio::test]
    async fn create_rejects_equal_languages() {
        let registry = test_registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = registry.create(Language::En, Language::En, "Alice".into(), tx).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidLanguagePair(_)));
    }

    #[tokio::test]
    async fn join_missing_room_is_room_not_found() {
        let registry = test_registry();
        let (tx, _rx) = mpsc::unbounded_channel();
        let code = RoomCode::parse("ZZZZZZ").unwrap();
        let err = registry.join(code, "Bob".into(), tx).await.unwrap_err();
        assert!(matches!(err, EngineError::RoomNotFound(_)));
    }

    #[tokio::test]
    async fn join_full_room_is_room_full() {
        let registry = test_registry();
        let (host_tx, _hrx) = mpsc::unbounded_channel();
        let (room, _host_id) = registry.create(Language::En, Language::Es, "Alice".into(), host_tx).await.unwrap();
        let code = room.code().await;
        let (g1, _g1rx) = mpsc::unbounded_channel();
        registry.join(code, "Bob".into(), g1).await.unwrap();
        let (g2, _g2rx) = mpsc::unbounded_channel();
        let err = registry.join(code, "Carl".into(), g2).await.unwrap_err();
        assert!(matches!(err, EngineError::RoomFull(_)));
    }

    #[tokio::test]
    async fn sweep_removes_ended_rooms() {
        let registry = test_registry();
        let (host_tx, _hrx) = mpsc::unbounded_channel();
        let (room, host_id) = registry.create(Language::En, Language::Es, "Alice".into(), host_tx).await.unwrap();
        room.leave(host_id).await; // host leaving ends the room
        assert_eq!(registry.sweep_once().await, 1);
        assert!(registry.get(room.code().await).await.is_none());
    }

    #[tokio::test]
    async fn allocated_codes_are_unique_while_live() {
        let registry = test_registry();
        let mut codes = std::collections::HashSet::new();
        for i in 0..20 {
            let (tx, _rx) = mpsc::unbounded_channel();
            let (room, _id) = registry
                .create(Language::En, Language::Es, format!("Host{i}"), tx)
                .await
                .unwrap();
            assert!(codes.insert(room.code().await));
        }
    }
}
