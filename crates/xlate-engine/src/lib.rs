//! Audio decoding, voice segmentation, and the session/room pipeline
//! engine built on `xlate-core`'s domain model and capability ports.
//!
//! Nothing in this crate knows about WebSockets or JSON — `xlate-server`
//! drives these types from its connection handlers and translates
//! their events into wire messages.

#![deny(unused_crate_dependencies)]

pub mod decoder;
pub mod pipeline;
pub mod registry;
pub mod room;
pub mod segmenter;
pub mod solo;
pub mod worker;

pub use decoder::AudioDecoder;
pub use pipeline::{StagePipeline, UtteranceResult};
pub use registry::RoomRegistry;
pub use room::{EchoLock, RoomEvent, RoomParticipantRuntime, RoomSession};
pub use segmenter::{SegmentEvent, VoiceSegmenter};
pub use solo::SoloSession;
pub use worker::WorkerPool;
