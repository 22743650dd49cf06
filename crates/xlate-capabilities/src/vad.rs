//! RMS energy-based voice activity detector.
//!
//! The RMS formula and the threshold-mapping curve are carried over
//! directly from the fallback path of `gglib-voice`'s detector; what
//! changes is the return type — this adapter reports a raw probability
//! and leaves the start/end hysteresis decision to
//! `xlate_engine::segmenter::VoiceSegmenter`.

use xlate_core::ports::VadCapability;

/// Energy range the sensitivity knob is mapped across. Below
/// `MIN_ENERGY` nothing is ever speech; above `MAX_ENERGY` everything
/// is.
const MIN_ENERGY: f32 = 0.001;
const MAX_ENERGY: f32 = 0.05;

/// Simple RMS-energy VAD. Stands in for a neural detector (e.g. Silero)
/// in deployments that don't bundle one — no acoustic model ships with
/// this crate.
#[derive(Debug, Clone, Copy)]
pub struct EnergyVad {
    /// Sensitivity in `[0.0, 1.0]`; higher means less sensitive (spec
    /// §4.2 "VAD threshold").
    sensitivity: f32,
}

impl EnergyVad {
    #[must_use]
    pub fn new(sensitivity: f32) -> Self {
        Self {
            sensitivity: sensitivity.clamp(0.0, 1.0),
        }
    }

    fn energy_threshold(self) -> f32 {
        (MAX_ENERGY - MIN_ENERGY).mul_add(self.sensitivity, MIN_ENERGY)
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl VadCapability for EnergyVad {
    fn speech_probability(&self, frame: &[f32]) -> f32 {
        let energy = rms_energy(frame);
        let threshold = self.energy_threshold();
        if threshold <= 0.0 {
            return if energy > 0.0 { 1.0 } else { 0.0 };
        }
        // Soft-saturate the energy/threshold ratio into [0, 1] instead
        // of a hard boolean, so the segmenter's hysteresis can apply its
        // own threshold on a real probability (spec §4.2 expects a
        // probability from the capability, not a verdict).
        (energy / threshold).min(1.0)
    }
}

fn rms_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|&s| s * s).sum();
    #[allow(clippy::cast_precision_loss)]
    let mean = sum_squares / samples.len() as f32;
    mean.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_yields_zero_probability() {
        let vad = EnergyVad::default();
        let silence = vec![0.0_f32; 320];
        assert_eq!(vad.speech_probability(&silence), 0.0);
    }

    #[test]
    fn loud_tone_yields_high_probability() {
        let vad = EnergyVad::default();
        let loud: Vec<f32> = (0..320).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        assert_eq!(vad.speech_probability(&loud), 1.0);
    }

    #[test]
    fn empty_frame_is_not_speech() {
        let vad = EnergyVad::default();
        assert_eq!(vad.speech_probability(&[]), 0.0);
    }

    #[test]
    fn higher_sensitivity_value_requires_more_energy() {
        let lax = EnergyVad::new(0.1);
        let strict = EnergyVad::new(0.9);
        let quiet: Vec<f32> = vec![0.01; 320];
        assert!(lax.speech_probability(&quiet) >= strict.speech_probability(&quiet));
    }
}
