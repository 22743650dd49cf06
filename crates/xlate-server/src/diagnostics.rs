//! Opt-in debug WAV dumps (spec.md supplemented feature: diagnostics,
//! off by default — see `EngineConfig::diagnostics_dir`).
//!
//! A connection's raw inbound PCM is mirrored into a second,
//! diagnostics-only `AudioDecoder` rather than threaded back out of
//! `SoloSession`/`RoomParticipantRuntime` — those types have no reason
//! to know a dump is happening, so the handler keeps its own decoder
//! and flushes it on disconnect.

use std::path::Path;

use xlate_engine::decoder::AudioDecoder;

use crate::wire::pcm_to_wav;

/// Internal engine sample rate PCM is dumped at (matches
/// `xlate-capabilities::tts::SAMPLE_RATE_HZ` and the decoder's output).
const SAMPLE_RATE_HZ: u32 = 16_000;

/// Accumulates decoded PCM for one connection, purely for the optional
/// WAV dump. A no-op shell when diagnostics aren't enabled.
pub struct DiagnosticsRecorder {
    decoder: AudioDecoder,
    pcm: Vec<f32>,
}

impl DiagnosticsRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self { decoder: AudioDecoder::new(), pcm: Vec::new() }
    }

    /// Feed the same raw container bytes the connection just handed to
    /// its real session/runtime. Decode failures are swallowed — this
    /// path is diagnostics only, never allowed to affect the session.
    pub fn ingest(&mut self, bytes: &[u8]) {
        if let Ok(samples) = self.decoder.ingest(bytes) {
            self.pcm.extend(samples);
        }
    }

    /// Flush the accumulated PCM to `<dir>/<name>.wav`. Logs and gives
    /// up on any I/O error rather than letting a diagnostics failure
    /// take down connection teardown.
    pub fn flush(&self, dir: &Path, name: &str) {
        if self.pcm.is_empty() {
            return;
        }
        let wav = pcm_to_wav(&self.pcm, SAMPLE_RATE_HZ);
        let path = dir.join(format!("{name}.wav"));
        if let Err(err) = std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, wav)) {
            tracing::warn!(error = %err, path = %path.display(), "failed to write diagnostics WAV dump");
        } else {
            tracing::debug!(path = %path.display(), "wrote diagnostics WAV dump");
        }
    }
}

impl Default for DiagnosticsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
