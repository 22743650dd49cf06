//! Engine-wide tunables (spec §4.1–§4.6's assorted thresholds and
//! budgets gathered into one config struct).
//!
//! Grounded on `gglib-voice`'s `VadConfig`/`VoicePipelineConfig`: a
//! plain, `serde`-derivable struct with a documented `Default` impl,
//! constructed once at startup and shared read-only behind an `Arc`.

use std::path::PathBuf;
use std::time::Duration;

/// Model-size knob for the ASR capability (spec.md's "Supplemented
/// features" — the original system's model-size selector, dropped by
/// the distillation but reinstated here since a deployable server
/// needs some way to trade latency for accuracy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AsrModelSize {
    Small,
    Medium,
}

impl Default for AsrModelSize {
    fn default() -> Self {
        Self::Small
    }
}

/// Engine-wide configuration, built once at startup (spec §4.1-§4.6).
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trailing silence duration after which `VoiceSegmenter` ends an
    /// utterance (spec §4.2).
    pub silence_window_ms: u64,

    /// Minimum accumulated speech duration before a partial transcript
    /// is requested (spec §4.2/§4.3).
    pub partial_min_duration_ms: u64,

    /// Number of characters in a generated room code (spec §3).
    /// Informational only: `RoomCode` is a fixed `[u8; ROOM_CODE_LEN]`,
    /// so this field documents the spec's chosen length for operators
    /// reading the config rather than sizing anything at runtime.
    pub room_code_len: usize,

    /// How long a room may sit with no participant activity before the
    /// registry's idle sweeper reclaims it (spec.md supplemented
    /// feature: idle-TTL sweep).
    pub room_idle_ttl: Duration,

    /// How often the idle sweeper scans the registry.
    pub idle_sweep_interval: Duration,

    /// Per-stage time budgets (spec §4.3, §7 `capability_timeout`).
    pub asr_timeout_ms: u64,
    pub mt_timeout_ms: u64,
    pub tts_timeout_ms: u64,

    /// Number of concurrent worker tasks in the `StagePipeline`'s
    /// `WorkerPool` (spec §5 concurrency model).
    pub worker_concurrency: usize,

    /// Whether to run MT on partial transcripts too, or only on final
    /// transcripts (Open Question 3 in DESIGN.md). Off by default: MT
    /// on every partial would multiply translation-capability load by
    /// the partial-emission rate for a feature most clients don't
    /// render anyway.
    pub partial_translation: bool,

    /// ASR model size selector.
    pub asr_model_size: AsrModelSize,

    /// When set, each decoded utterance's PCM is additionally dumped to
    /// a WAV file under this directory (spec.md supplemented feature:
    /// opt-in diagnostics, off in production).
    pub diagnostics_dir: Option<PathBuf>,

    /// Echo-suppression margin added to synthesized-audio duration when
    /// computing how long to suppress a participant's own mic after
    /// their translated speech starts playing to the peer (DESIGN.md
    /// Open Question 2). Clamped to `[echo_suppression_min,
    /// echo_suppression_max]`.
    pub echo_suppression_margin_ms: u64,
    pub echo_suppression_min_ms: u64,
    pub echo_suppression_max_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            silence_window_ms: 700,
            partial_min_duration_ms: 300,
            room_code_len: crate::model::ROOM_CODE_LEN,
            room_idle_ttl: Duration::from_secs(30 * 60),
            idle_sweep_interval: Duration::from_secs(60),
            asr_timeout_ms: 4_000,
            mt_timeout_ms: 2_000,
            tts_timeout_ms: 3_000,
            worker_concurrency: 4,
            partial_translation: false,
            asr_model_size: AsrModelSize::Small,
            diagnostics_dir: None,
            echo_suppression_margin_ms: 300,
            echo_suppression_min_ms: 1_000,
            echo_suppression_max_ms: 4_000,
        }
    }
}

impl EngineConfig {
    /// Clamp a raw synthesized-audio duration into the configured echo
    /// suppression window (DESIGN.md Open Question 2).
    #[must_use]
    pub fn echo_suppression_window(&self, synthesized_audio_ms: u64) -> Duration {
        let raw = synthesized_audio_ms.saturating_add(self.echo_suppression_margin_ms);
        let clamped = raw.clamp(self.echo_suppression_min_ms, self.echo_suppression_max_ms);
        Duration::from_millis(clamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.room_code_len, 6);
        assert!(!cfg.partial_translation);
    }

    #[test]
    fn echo_window_clamps_short_and_long_audio() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.echo_suppression_window(0).as_millis(), 1_000);
        assert_eq!(cfg.echo_suppression_window(10_000).as_millis(), 4_000);
        assert_eq!(cfg.echo_suppression_window(1_200).as_millis(), 1_500);
    }
}
