//! Query-string parameters for the two upgrade endpoints (spec §6).
//!
//! Parsed via `axum::extract::Query` into the raw string form below,
//! then validated into the typed form the handlers actually use —
//! mirroring `gglib-axum::handlers`'s pattern of a raw DTO plus a
//! `TryFrom` into a validated domain value.

use xlate_core::error::EngineError;
use xlate_core::model::{Language, RoomCode};

/// Raw query parameters for `/ws/audio` (solo mode).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SoloQueryRaw {
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub target_lang: Option<String>,
    #[serde(default)]
    pub tts: Option<String>,
}

/// Validated solo-connection parameters.
#[derive(Debug, Clone, Copy)]
pub struct SoloParams {
    /// `None` means auto-detect (spec §6 `lang=auto`, the default).
    pub source_language: Option<Language>,
    /// `None` means no translation (spec §6 `target_lang=none`, the default).
    pub target_language: Option<Language>,
    pub tts_enabled: bool,
}

impl TryFrom<SoloQueryRaw> for SoloParams {
    type Error = EngineError;

    fn try_from(raw: SoloQueryRaw) -> Result<Self, Self::Error> {
        let lang = raw.lang.as_deref().unwrap_or("auto");
        let source_language = match lang {
            "auto" => None,
            other => Some(
                Language::parse(other)
                    .ok_or_else(|| EngineError::BadRequest(format!("unknown lang: {other}")))?,
            ),
        };

        let target_lang = raw.target_lang.as_deref().unwrap_or("none");
        let target_language = match target_lang {
            "none" => None,
            other => Some(
                Language::parse(other)
                    .ok_or_else(|| EngineError::BadRequest(format!("unknown target_lang: {other}")))?,
            ),
        };

        let tts_enabled = match raw.tts.as_deref().unwrap_or("false") {
            "true" => true,
            "false" => false,
            other => return Err(EngineError::BadRequest(format!("invalid tts flag: {other}"))),
        };

        Ok(Self { source_language, target_language, tts_enabled })
    }
}

/// Raw query parameters for `/ws/session` (room mode). The same struct
/// covers both the create path (`my_lang`/`partner_lang`) and the join
/// path (`room_id`); the handler decides which branch applies based on
/// which fields are present.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RoomQueryRaw {
    #[serde(default)]
    pub my_lang: Option<String>,
    #[serde(default)]
    pub partner_lang: Option<String>,
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// A validated room-connection request: either a creation or a join.
#[derive(Debug, Clone)]
pub enum RoomParams {
    Create { host_language: Language, guest_language: Language, name: String },
    Join { code: RoomCode, name: String },
}

impl TryFrom<RoomQueryRaw> for RoomParams {
    type Error = EngineError;

    fn try_from(raw: RoomQueryRaw) -> Result<Self, Self::Error> {
        let name = raw.name.unwrap_or_default();

        if let Some(room_id) = raw.room_id {
            let code = RoomCode::parse(&room_id)
                .ok_or_else(|| EngineError::BadRequest(format!("malformed room_id: {room_id}")))?;
            return Ok(Self::Join { code, name });
        }

        let my_lang = raw
            .my_lang
            .ok_or_else(|| EngineError::BadRequest("my_lang is required to create a room".into()))?;
        let partner_lang = raw
            .partner_lang
            .ok_or_else(|| EngineError::BadRequest("partner_lang is required to create a room".into()))?;
        let host_language = Language::parse(&my_lang)
            .ok_or_else(|| EngineError::BadRequest(format!("unknown my_lang: {my_lang}")))?;
        let guest_language = Language::parse(&partner_lang)
            .ok_or_else(|| EngineError::BadRequest(format!("unknown partner_lang: {partner_lang}")))?;

        Ok(Self::Create { host_language, guest_language, name })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_defaults_are_auto_none_false() {
        let params = SoloParams::try_from(SoloQueryRaw { lang: None, target_lang: None, tts: None }).unwrap();
        assert!(params.source_language.is_none());
        assert!(params.target_language.is_none());
        assert!(!params.tts_enabled);
    }

    #[test]
    fn solo_rejects_unknown_language_code() {
        let raw = SoloQueryRaw { lang: Some("fr".into()), target_lang: None, tts: None };
        assert!(matches!(SoloParams::try_from(raw), Err(EngineError::BadRequest(_))));
    }

    #[test]
    fn room_query_with_room_id_is_a_join() {
        let raw = RoomQueryRaw {
            my_lang: None,
            partner_lang: None,
            room_id: Some("ab12cd".into()),
            name: Some("Bob".into()),
        };
        let params = RoomParams::try_from(raw).unwrap();
        assert!(matches!(params, RoomParams::Join { name, .. } if name == "Bob"));
    }

    #[test]
    fn room_query_without_room_id_is_a_create() {
        let raw = RoomQueryRaw {
            my_lang: Some("en".into()),
            partner_lang: Some("es".into()),
            room_id: None,
            name: Some("Alice".into()),
        };
        let params = RoomParams::try_from(raw).unwrap();
        assert!(matches!(
            params,
            RoomParams::Create { host_language: Language::En, guest_language: Language::Es, .. }
        ));
    }

    #[test]
    fn create_without_my_lang_is_bad_request() {
        let raw = RoomQueryRaw { my_lang: None, partner_lang: Some("es".into()), room_id: None, name: None };
        assert!(matches!(RoomParams::try_from(raw), Err(EngineError::BadRequest(_))));
    }
}
