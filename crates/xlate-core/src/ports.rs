//! Capability ports: the synchronous trait seams `xlate-engine` drives
//! and `xlate-capabilities` implements.
//!
//! Grounded on `gglib-voice`'s `SttBackend`/`TtsBackend` split
//! (load-once backend objects behind a trait, `Send + Sync` so they can
//! live in an `Arc` shared across worker tasks). Unlike the teacher's
//! `TtsBackend::synthesize`, every method here is synchronous — the
//! session engine's worker pool dispatches these via `spawn_blocking`
//! rather than awaiting them directly (see `xlate-engine::worker`).

use crate::error::EngineError;
use crate::model::Language;

/// Raw voice-activity probability for one fixed-size PCM frame.
///
/// `VadCapability` reports a probability only — the start/end hysteresis
/// state machine lives in `xlate-engine::segmenter::VoiceSegmenter`, not
/// here, per the separation between "Capability adapters" and
/// "VoiceSegmenter" the architecture draws as two different components.
pub trait VadCapability: Send + Sync {
    /// `frame` is mono PCM at the engine's internal sample rate (16 kHz
    /// post-decimation). Returns a probability in `[0.0, 1.0]` that the
    /// frame contains speech.
    fn speech_probability(&self, frame: &[f32]) -> f32;
}

/// One finalized or partial transcription result.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub text: String,
    pub language: Language,
    pub is_final: bool,
}

/// Speech-to-text capability.
pub trait AsrCapability: Send + Sync {
    /// Transcribe accumulated PCM for one utterance. `is_final`
    /// indicates whether the caller is asking for the end-of-utterance
    /// transcription (higher effort / higher latency budget allowed) or
    /// a cheap mid-utterance partial.
    fn transcribe(&self, pcm: &[f32], is_final: bool) -> Result<Transcript, EngineError>;
}

/// Machine-translation capability between the engine's supported
/// language set.
pub trait TranslationCapability: Send + Sync {
    fn translate(&self, text: &str, from: Language, to: Language) -> Result<String, EngineError>;
}

/// Synthesized audio ready to be queued to a peer (spec §4.3 step 3).
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedAudio {
    /// Mono PCM samples at the engine's internal sample rate.
    pub pcm: Vec<f32>,
    pub sample_rate_hz: u32,
}

/// Text-to-speech capability.
pub trait TtsCapability: Send + Sync {
    fn synthesize(&self, text: &str, language: Language) -> Result<SynthesizedAudio, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysSpeech;
    impl VadCapability for AlwaysSpeech {
        fn speech_probability(&self, _frame: &[f32]) -> f32 {
            1.0
        }
    }

    #[test]
    fn vad_capability_is_object_safe() {
        let vad: Box<dyn VadCapability> = Box::new(AlwaysSpeech);
        assert_eq!(vad.speech_probability(&[0.0; 160]), 1.0);
    }
}
