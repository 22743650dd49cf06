//! The TEXT/BINARY wire protocol: outbound JSON messages, inbound
//! control markers, and synthesized-audio WAV framing.
//!
//! Message shapes follow `gglib-axum::sse`'s tagged-JSON event pattern
//! (a `type` discriminant plus per-variant fields), adapted from
//! server-sent events to WebSocket TEXT frames.

use xlate_core::error::ErrorKind;
use xlate_core::model::{Language, SessionPhase};

/// Who a `transcript`/`transcript_partial` message is about, from the
/// recipient's point of view. `Myself` is serialized as `"self"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    #[serde(rename = "self")]
    Myself,
    Partner,
}

/// Every outbound TEXT frame (spec §6 server → client JSON table).
#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    RoomCreated {
        room_id: String,
        language: Language,
    },
    RoomJoined {
        room_id: String,
        language: Language,
        partner_name: String,
        partner_language: Language,
    },
    PartnerJoined {
        name: String,
        language: Language,
    },
    PartnerLeft,
    SessionStatus {
        status: SessionPhase,
    },
    PartnerMuted,
    PartnerUnmuted,
    TranscriptPartial {
        speaker: Speaker,
        text: String,
        language: Language,
        #[serde(skip_serializing_if = "Option::is_none")]
        translation: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_language: Option<Language>,
    },
    Transcript {
        speaker: Speaker,
        speaker_name: String,
        text: String,
        language: Language,
        #[serde(skip_serializing_if = "Option::is_none")]
        translation: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        target_language: Option<Language>,
        duration: u32,
        has_tts_audio: bool,
    },
    MicLocked {
        duration_ms: u64,
    },
    Error {
        message: String,
        kind: ErrorKind,
    },
}

/// A 4-byte BINARY frame that carries room control instead of audio
/// (spec §6): `STRT`/`ENDS`/`MUTE`/`UNMT`. Any other BINARY frame,
/// including any 4-byte one that doesn't match, is audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMarker {
    Start,
    End,
    Mute,
    Unmute,
}

impl ControlMarker {
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        match payload {
            b"STRT" => Some(Self::Start),
            b"ENDS" => Some(Self::End),
            b"MUTE" => Some(Self::Mute),
            b"UNMT" => Some(Self::Unmute),
            _ => None,
        }
    }
}

/// Encode mono float32 PCM as a RIFF WAV blob, PCM16, at `sample_rate_hz`
/// (spec §6: "Synthesized audio payloads (RIFF WAV, PCM16 mono, voice-model
/// native rate)"). Samples are clamped to `[-1.0, 1.0]` before scaling.
pub fn pcm_to_wav(pcm: &[f32], sample_rate_hz: u32) -> Vec<u8> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: sample_rate_hz,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    // A Vec<u8> Cursor writer never fails; WavWriter construction over one
    // can only fail on the underlying io::Write, so these are infallible
    // in practice for this sink.
    let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("in-memory WAV writer");
    for &sample in pcm {
        let clamped = sample.clamp(-1.0, 1.0);
        let scaled = (clamped * f32::from(i16::MAX)) as i16;
        writer.write_sample(scaled).expect("in-memory WAV write");
    }
    writer.finalize().expect("in-memory WAV finalize");
    cursor.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_marker_round_trips_all_four() {
        assert_eq!(ControlMarker::parse(b"STRT"), Some(ControlMarker::Start));
        assert_eq!(ControlMarker::parse(b"ENDS"), Some(ControlMarker::End));
        assert_eq!(ControlMarker::parse(b"MUTE"), Some(ControlMarker::Mute));
        assert_eq!(ControlMarker::parse(b"UNMT"), Some(ControlMarker::Unmute));
    }

    #[test]
    fn unrecognized_four_byte_payload_is_not_a_marker() {
        assert_eq!(ControlMarker::parse(b"ABCD"), None);
        assert_eq!(ControlMarker::parse(&[1, 2, 3]), None);
    }

    #[test]
    fn session_status_serializes_with_snake_case_tag() {
        let msg = WireMessage::SessionStatus { status: SessionPhase::Active };
        let json = serde_json::to_string(&msg).unwrap();
        assert_eq!(json, r#"{"type":"session_status","status":"active"}"#);
    }

    #[test]
    fn myself_speaker_serializes_as_self() {
        let msg = WireMessage::TranscriptPartial {
            speaker: Speaker::Myself,
            text: "hi".into(),
            language: Language::En,
            translation: None,
            target_language: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""speaker":"self""#));
        assert!(!json.contains("translation"));
    }

    #[test]
    fn pcm_to_wav_produces_a_riff_header() {
        let pcm = vec![0.0_f32, 0.5, -0.5, 1.0, -1.0];
        let bytes = pcm_to_wav(&pcm, 22_050);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
    }
}
