//! Domain model, capability ports, and error taxonomy shared by every
//! `live-xlate` crate.
//!
//! This crate has no transport or engine dependencies — `xlate-capabilities`
//! implements the ports defined here against concrete VAD/ASR/MT/TTS
//! adapters, `xlate-engine` drives the session state machines defined here,
//! and `xlate-server` exposes them over a WebSocket wire protocol.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod error;
pub mod model;
pub mod ports;

pub use config::EngineConfig;
pub use error::EngineError;
pub use model::{
    Language, Participant, ParticipantId, Role, Room, RoomCode, SessionPhase, Utterance,
    UtteranceGeneration,
};
