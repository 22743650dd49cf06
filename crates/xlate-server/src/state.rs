//! Shared application state type (spec §5 "the worker pool is shared
//! across rooms").
//!
//! Follows `gglib-axum::state`'s `AppState = Arc<Context>` pattern: one
//! `Arc`-wrapped composition-root struct, cloned cheaply into every
//! handler via axum's `State` extractor.

use std::sync::Arc;

use xlate_core::config::EngineConfig;
use xlate_core::ports::{AsrCapability, TranslationCapability, TtsCapability, VadCapability};
use xlate_engine::{RoomRegistry, WorkerPool};

/// Everything a connection handler needs: the capability singletons
/// (spec §4.7 "Capability adapters ... singleton lifetimes"), the
/// shared worker pool, the room directory, and the engine-wide config.
pub struct ServerContext {
    pub config: Arc<EngineConfig>,
    pub vad: Arc<dyn VadCapability>,
    pub asr: Arc<dyn AsrCapability>,
    pub mt: Arc<dyn TranslationCapability>,
    pub tts: Arc<dyn TtsCapability>,
    pub pool: WorkerPool,
    pub rooms: Arc<RoomRegistry>,
}

pub type AppState = Arc<ServerContext>;
