//! Single-participant session: transcribe, optionally translate, and
//! optionally speak back to the same connection (spec §4.4).

use std::sync::Arc;

use tokio::sync::mpsc;
use xlate_core::config::EngineConfig;
use xlate_core::model::Language;
use xlate_core::ports::{AsrCapability, TranslationCapability, TtsCapability, VadCapability};

use crate::decoder::AudioDecoder;
use crate::pipeline::{StagePipeline, UtteranceResult};
use crate::segmenter::{SegmentEvent, VoiceSegmenter};
use crate::worker::WorkerPool;

/// Everything needed to drive one solo connection's audio: decode,
/// segment, and pipeline. Equivalent to one side of a `RoomSession`
/// with no partner and no echo-suppression directives (spec §4.4).
pub struct SoloSession {
    decoder: AudioDecoder,
    segmenter: VoiceSegmenter,
    pipeline: StagePipeline,
}

impl SoloSession {
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        vad: Arc<dyn VadCapability>,
        asr: Arc<dyn AsrCapability>,
        mt: Arc<dyn TranslationCapability>,
        tts: Arc<dyn TtsCapability>,
        pool: WorkerPool,
        source_language: Language,
        target_language: Option<Language>,
        tts_enabled: bool,
        config: &EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<UtteranceResult>) {
        let segmenter = VoiceSegmenter::new(vad, config.silence_window_ms, 0.5);
        let (pipeline, results_rx) = StagePipeline::new(
            asr,
            mt,
            tts,
            pool,
            source_language,
            target_language,
            tts_enabled,
            16_000,
            config,
        );
        (
            Self {
                decoder: AudioDecoder::new(),
                segmenter,
                pipeline,
            },
            results_rx,
        )
    }

    /// Feed a chunk of encoded container bytes. Decodes, segments, and
    /// drives the pipeline; never awaits a model (spec §4.3 rule R1).
    pub fn ingest_encoded(&mut self, bytes: &[u8]) -> Result<(), xlate_core::error::EngineError> {
        let pcm = self.decoder.ingest(bytes)?;
        if pcm.is_empty() {
            return Ok(());
        }
        if let Some(event) = self.segmenter.update(&pcm) {
            match event {
                SegmentEvent::SpeechStart => {}
                SegmentEvent::SpeechEnd { duration_ms } => {
                    self.pipeline.on_speech_end(duration_ms);
                }
            }
        }
        if self.segmenter.is_speaking() {
            self.pipeline.on_pcm(&pcm);
        }
        Ok(())
    }

    /// Called when the client signals a new container header (periodic
    /// encoder restart, spec §4.1).
    pub fn reset_decoder(&mut self) {
        self.decoder.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xlate_core::error::EngineError;
    use xlate_core::ports::{SynthesizedAudio, Transcript};

    struct AlwaysSpeech;
    impl VadCapability for AlwaysSpeech {
        fn speech_probability(&self, _frame: &[f32]) -> f32 {
            1.0
        }
    }

    struct StubAsr;
    impl AsrCapability for StubAsr {
        fn transcribe(&self, pcm: &[f32], is_final: bool) -> Result<Transcript, EngineError> {
            Ok(Transcript { text: format!("n={}", pcm.len()), language: Language::En, is_final })
        }
    }
    struct StubMt;
    impl TranslationCapability for StubMt {
        fn translate(&self, text: &str, _from: Language, _to: Language) -> Result<String, EngineError> {
            Ok(text.to_string())
        }
    }
    struct StubTts;
    impl TtsCapability for StubTts {
        fn synthesize(&self, _text: &str, _language: Language) -> Result<SynthesizedAudio, EngineError> {
            Ok(SynthesizedAudio { pcm: vec![], sample_rate_hz: 16_000 })
        }
    }

    fn new_session() -> (SoloSession, mpsc::UnboundedReceiver<UtteranceResult>) {
        let config = EngineConfig::default();
        SoloSession::new(
            Arc::new(AlwaysSpeech),
            Arc::new(StubAsr),
            Arc::new(StubMt),
            Arc::new(StubTts),
            WorkerPool::new(2),
            Language::En,
            None,
            false,
            &config,
        )
    }

    #[test]
    fn malformed_bytes_do_not_error() {
        let (mut session, _rx) = new_session();
        assert!(session.ingest_encoded(&[0xFF]).is_ok());
    }

    #[test]
    fn reset_decoder_is_idempotent() {
        let (mut session, _rx) = new_session();
        session.reset_decoder();
        session.reset_decoder();
    }
}
