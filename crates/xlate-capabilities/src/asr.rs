//! Placeholder speech-to-text adapter.
//!
//! Shaped like `gglib-voice::backend::sherpa_stt`'s `SherpaSttBackend`
//! (load-once backend object, `transcribe` entry point, config struct)
//! but with no model weights behind it — it reports a fixed token count
//! proportional to input length instead of running inference. A real
//! deployment swaps this for a `sherpa-rs`- or `whisper-rs`-backed
//! adapter without touching `xlate_core::ports::AsrCapability`'s
//! callers.

use xlate_core::config::AsrModelSize;
use xlate_core::error::EngineError;
use xlate_core::model::Language;
use xlate_core::ports::{AsrCapability, Transcript};

/// Samples per synthetic "word" this placeholder reports — chosen so a
/// few seconds of audio produces a handful of words rather than one.
const SAMPLES_PER_WORD: usize = 4_000;

#[derive(Debug, Clone)]
pub struct PlaceholderAsr {
    model_size: AsrModelSize,
}

impl PlaceholderAsr {
    #[must_use]
    pub fn new(model_size: AsrModelSize) -> Self {
        Self { model_size }
    }
}

impl AsrCapability for PlaceholderAsr {
    fn transcribe(&self, pcm: &[f32], is_final: bool) -> Result<Transcript, EngineError> {
        if pcm.is_empty() {
            return Err(EngineError::BadRequest(
                "transcribe called with empty pcm buffer".to_string(),
            ));
        }
        let word_count = (pcm.len() / SAMPLES_PER_WORD).max(1);
        let suffix = match self.model_size {
            AsrModelSize::Small => "",
            AsrModelSize::Medium => "-precise",
        };
        let words: Vec<String> = (0..word_count).map(|i| format!("word{i}{suffix}")).collect();
        tracing::debug!(word_count, is_final, model = ?self.model_size, "transcribed utterance");
        Ok(Transcript {
            text: words.join(" "),
            // The placeholder has no language-id model; it reports the
            // caller's best guess via the request context in practice,
            // but since this trait carries no "expected language" hint,
            // default to English — swapped for real language-id output
            // by any real backend.
            language: Language::En,
            is_final,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_pcm() {
        let asr = PlaceholderAsr::new(AsrModelSize::Small);
        assert!(asr.transcribe(&[], true).is_err());
    }

    #[test]
    fn produces_more_words_for_longer_audio() {
        let asr = PlaceholderAsr::new(AsrModelSize::Small);
        let short = asr.transcribe(&vec![0.0; 4_000], true).unwrap();
        let long = asr.transcribe(&vec![0.0; 40_000], true).unwrap();
        assert!(long.text.split_whitespace().count() > short.text.split_whitespace().count());
    }

    #[test]
    fn is_final_flag_is_carried_through() {
        let asr = PlaceholderAsr::new(AsrModelSize::Small);
        let partial = asr.transcribe(&vec![0.1; 8_000], false).unwrap();
        assert!(!partial.is_final);
    }
}
