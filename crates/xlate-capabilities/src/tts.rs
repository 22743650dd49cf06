//! Placeholder text-to-speech adapter.
//!
//! Shaped like `gglib-voice::backend::sherpa_tts`'s `SherpaTtsBackend`
//! (load-once backend, `synthesize` entry point returning raw PCM at a
//! fixed sample rate) but generates an audible sine tone instead of
//! running a vocoder — long enough to let echo-suppression-window and
//! playback-queue logic exercise a realistic audio duration without
//! bundling a real voice.

use xlate_core::error::EngineError;
use xlate_core::model::Language;
use xlate_core::ports::{SynthesizedAudio, TtsCapability};

/// Internal engine sample rate (spec §4.1: decoder emits 16 kHz PCM
/// after decimation; TTS output is kept at the same rate so it can be
/// queued without another resample step).
const SAMPLE_RATE_HZ: u32 = 16_000;

/// Milliseconds of tone per character of input text, roughly
/// approximating how long a TTS engine would take to speak it.
const MS_PER_CHAR: u64 = 60;
const MIN_DURATION_MS: u64 = 250;

#[derive(Debug, Clone, Copy)]
pub struct ToneTts {
    /// Tone frequency in Hz; varied per language so a human listening to
    /// test fixtures can tell languages apart.
    base_freq_hz: f32,
}

impl ToneTts {
    #[must_use]
    pub fn new() -> Self {
        Self { base_freq_hz: 440.0 }
    }

    fn freq_for(self, language: Language) -> f32 {
        match language {
            Language::En => self.base_freq_hz,
            Language::Es => self.base_freq_hz * 1.25,
            Language::Pt => self.base_freq_hz * 1.5,
        }
    }
}

impl Default for ToneTts {
    fn default() -> Self {
        Self::new()
    }
}

impl TtsCapability for ToneTts {
    fn synthesize(&self, text: &str, language: Language) -> Result<SynthesizedAudio, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::BadRequest("synthesize called with empty text".to_string()));
        }
        let duration_ms = (text.chars().count() as u64 * MS_PER_CHAR).max(MIN_DURATION_MS);
        let sample_count = (u64::from(SAMPLE_RATE_HZ) * duration_ms / 1_000) as usize;
        let freq = self.freq_for(language);
        let pcm: Vec<f32> = (0..sample_count)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32 / SAMPLE_RATE_HZ as f32;
                (std::f32::consts::TAU * freq * t).sin() * 0.2
            })
            .collect();
        tracing::debug!(duration_ms, %language, "synthesized utterance");
        Ok(SynthesizedAudio {
            pcm,
            sample_rate_hz: SAMPLE_RATE_HZ,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn longer_text_produces_longer_audio() {
        let tts = ToneTts::new();
        let short = tts.synthesize("hi", Language::En).unwrap();
        let long = tts.synthesize("hello there, friend", Language::En).unwrap();
        assert!(long.pcm.len() > short.pcm.len());
    }

    #[test]
    fn rejects_empty_text() {
        let tts = ToneTts::new();
        assert!(tts.synthesize("", Language::En).is_err());
    }

    #[test]
    fn sample_rate_is_16khz() {
        let tts = ToneTts::new();
        let out = tts.synthesize("hello", Language::Pt).unwrap();
        assert_eq!(out.sample_rate_hz, 16_000);
    }

    #[test]
    fn different_languages_use_different_tones() {
        let tts = ToneTts::new();
        let en = tts.synthesize("hello", Language::En).unwrap();
        let es = tts.synthesize("hello", Language::Es).unwrap();
        assert_ne!(en.pcm, es.pcm);
    }
}
