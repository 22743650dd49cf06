//! Concrete capability adapters.
//!
//! Each adapter here implements one of `xlate_core::ports`'s traits.
//! None of them wrap a real acoustic or translation model — per
//! spec.md's scope, bundling real ASR/MT/TTS models is explicitly out
//! of scope. Each type's doc comment names the real backend it stands
//! in for, in the style `gglib-voice::backend` documents its own
//! pluggable backends.

#![deny(unused_crate_dependencies)]

pub mod asr;
pub mod mt;
pub mod tts;
pub mod vad;

pub use asr::PlaceholderAsr;
pub use mt::PassthroughTranslator;
pub use tts::ToneTts;
pub use vad::EnergyVad;
