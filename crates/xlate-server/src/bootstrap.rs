//! Server bootstrap — the composition root (spec §5, §6 "Environment
//! knobs").
//!
//! Mirrors `gglib-axum::bootstrap`'s shape: a `CorsConfig` enum, a
//! `ServerConfig` the caller builds (here via `clap`'s `derive`/`env`
//! features rather than by hand), a `bootstrap()` that wires every
//! concrete dependency exactly once, and a `start_server()` that binds
//! the listener and serves.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::Parser;
use xlate_capabilities::{EnergyVad, PassthroughTranslator, PlaceholderAsr, ToneTts};
use xlate_core::config::{AsrModelSize, EngineConfig};
use xlate_core::ports::{AsrCapability, TranslationCapability, TtsCapability, VadCapability};
use xlate_engine::registry::spawn_idle_sweeper;
use xlate_engine::{RoomRegistry, WorkerPool};

use crate::state::{AppState, ServerContext};

/// CORS policy for the WebSocket upgrade routes.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins — the default, appropriate for a server that
    /// carries no cookies or other ambient credentials.
    #[default]
    AllowAll,
    AllowOrigins(Vec<String>),
}

/// Server configuration (spec §6's "Environment knobs" table), parsed
/// via `clap` with `env` fallbacks so the same binary works unconfigured
/// in a container or fully pinned in a systemd unit.
///
/// `Default` supplies the spec's recommended values directly (500 ms
/// silence hangover, 1.0 s partial minimum, 6-char room code, 10 min
/// idle TTL, 15 s/5 s/10 s stage timeouts) — deliberately not the same
/// as `EngineConfig::default()`'s broader, library-facing defaults; see
/// DESIGN.md.
#[derive(Debug, Clone, Parser)]
#[command(name = "xlate-server", about = "Real-time bidirectional speech-translation session server")]
pub struct ServerConfig {
    /// TCP port the WebSocket server binds on.
    #[arg(long, env = "XLATE_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Number of concurrent worker-pool slots the `StagePipeline` uses
    /// for ASR/MT/TTS calls (spec §5 concurrency model).
    #[arg(long, env = "XLATE_WORKER_CONCURRENCY", default_value_t = 4)]
    pub worker_concurrency: usize,

    /// ASR model size: `small` or `medium`.
    #[arg(long, env = "XLATE_ASR_MODEL_SIZE", default_value = "small")]
    pub asr_model_size: String,

    /// Trailing silence, in ms, after which an utterance ends (spec §4.2).
    #[arg(long, env = "XLATE_SILENCE_WINDOW_MS", default_value_t = 500)]
    pub silence_window_ms: u64,

    /// Minimum accumulated speech, in ms, before a partial is requested.
    #[arg(long, env = "XLATE_PARTIAL_MIN_DURATION_MS", default_value_t = 1_000)]
    pub partial_min_duration_ms: u64,

    /// Room code length (spec §3, defaults to 6).
    #[arg(long, env = "XLATE_ROOM_CODE_LEN", default_value_t = 6)]
    pub room_code_len: usize,

    /// Idle TTL, in seconds, before the sweeper reclaims a room.
    #[arg(long, env = "XLATE_ROOM_IDLE_TTL_SECS", default_value_t = 600)]
    pub room_idle_ttl_secs: u64,

    /// How often, in seconds, the idle sweeper scans the registry.
    #[arg(long, env = "XLATE_IDLE_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub idle_sweep_interval_secs: u64,

    /// ASR stage timeout, in ms.
    #[arg(long, env = "XLATE_ASR_TIMEOUT_MS", default_value_t = 15_000)]
    pub asr_timeout_ms: u64,

    /// MT stage timeout, in ms.
    #[arg(long, env = "XLATE_MT_TIMEOUT_MS", default_value_t = 5_000)]
    pub mt_timeout_ms: u64,

    /// TTS stage timeout, in ms.
    #[arg(long, env = "XLATE_TTS_TIMEOUT_MS", default_value_t = 10_000)]
    pub tts_timeout_ms: u64,

    /// Whether to run MT on partial transcripts too (Open Question 3).
    #[arg(long, env = "XLATE_PARTIAL_TRANSLATION", default_value_t = false)]
    pub partial_translation: bool,

    /// When set, each session's decoded PCM is dumped to a WAV file
    /// under this directory on disconnect (diagnostics, off by default).
    #[arg(long, env = "XLATE_DIAGNOSTICS_DIR")]
    pub diagnostics_dir: Option<PathBuf>,

    /// Comma-separated list of allowed CORS origins. Unset allows all.
    #[arg(long, env = "XLATE_CORS_ALLOW_ORIGINS")]
    pub cors_allow_origins: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            worker_concurrency: 4,
            asr_model_size: "small".to_string(),
            silence_window_ms: 500,
            partial_min_duration_ms: 1_000,
            room_code_len: 6,
            room_idle_ttl_secs: 600,
            idle_sweep_interval_secs: 60,
            asr_timeout_ms: 15_000,
            mt_timeout_ms: 5_000,
            tts_timeout_ms: 10_000,
            partial_translation: false,
            diagnostics_dir: None,
            cors_allow_origins: None,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn cors_config(&self) -> CorsConfig {
        match &self.cors_allow_origins {
            None => CorsConfig::AllowAll,
            Some(origins) => {
                CorsConfig::AllowOrigins(origins.split(',').map(str::trim).map(str::to_string).collect())
            }
        }
    }

    fn asr_model_size(&self) -> Result<AsrModelSize> {
        match self.asr_model_size.to_ascii_lowercase().as_str() {
            "small" => Ok(AsrModelSize::Small),
            "medium" => Ok(AsrModelSize::Medium),
            other => bail!("unknown asr model size: {other} (expected small or medium)"),
        }
    }

    fn engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            silence_window_ms: self.silence_window_ms,
            partial_min_duration_ms: self.partial_min_duration_ms,
            room_code_len: self.room_code_len,
            room_idle_ttl: Duration::from_secs(self.room_idle_ttl_secs),
            idle_sweep_interval: Duration::from_secs(self.idle_sweep_interval_secs),
            asr_timeout_ms: self.asr_timeout_ms,
            mt_timeout_ms: self.mt_timeout_ms,
            tts_timeout_ms: self.tts_timeout_ms,
            worker_concurrency: self.worker_concurrency,
            partial_translation: self.partial_translation,
            asr_model_size: self.asr_model_size()?,
            diagnostics_dir: self.diagnostics_dir.clone(),
            ..EngineConfig::default()
        })
    }
}

/// Wire every capability singleton, the worker pool, and the room
/// registry together (spec §4.7 "Capability adapters ... singleton
/// lifetimes"). The only place in the crate that names a concrete
/// adapter type.
pub async fn bootstrap(config: &ServerConfig) -> Result<AppState> {
    let engine_config = Arc::new(config.engine_config()?);

    let vad: Arc<dyn VadCapability> = Arc::new(EnergyVad::default());
    let asr: Arc<dyn AsrCapability> = Arc::new(PlaceholderAsr::new(engine_config.asr_model_size));
    let mt: Arc<dyn TranslationCapability> = Arc::new(PassthroughTranslator);
    let tts: Arc<dyn TtsCapability> = Arc::new(ToneTts::new());
    let pool = WorkerPool::new(engine_config.worker_concurrency);
    let rooms = Arc::new(RoomRegistry::new(engine_config.clone()));
    spawn_idle_sweeper(&rooms);

    tracing::info!(
        worker_concurrency = engine_config.worker_concurrency,
        room_code_len = engine_config.room_code_len,
        "xlate-server bootstrap complete"
    );

    Ok(Arc::new(ServerContext { config: engine_config, vad, asr, mt, tts, pool, rooms }))
}

/// Bind and serve (spec.md supplemented feature 3: graceful shutdown on
/// `SIGINT`/`SIGTERM`).
pub async fn start_server(config: ServerConfig) -> Result<()> {
    let cors = config.cors_config();
    let state = bootstrap(&config).await?;
    let app = crate::routes::create_router(state, &cors);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("xlate-server listening on ws://{addr}");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => tracing::warn!(error = %err, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining in-flight connections");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_recommended_values() {
        let config = ServerConfig::default();
        assert_eq!(config.silence_window_ms, 500);
        assert_eq!(config.partial_min_duration_ms, 1_000);
        assert_eq!(config.room_code_len, 6);
        assert_eq!(config.room_idle_ttl_secs, 600);
        assert_eq!(config.asr_timeout_ms, 15_000);
        assert_eq!(config.mt_timeout_ms, 5_000);
        assert_eq!(config.tts_timeout_ms, 10_000);
    }

    #[test]
    fn cors_config_defaults_to_allow_all() {
        assert!(matches!(ServerConfig::default().cors_config(), CorsConfig::AllowAll));
    }

    #[test]
    fn cors_allow_origins_splits_on_comma() {
        let config = ServerConfig { cors_allow_origins: Some("https://a.test, https://b.test".into()), ..ServerConfig::default() };
        let CorsConfig::AllowOrigins(origins) = config.cors_config() else {
            panic!("expected AllowOrigins");
        };
        assert_eq!(origins, vec!["https://a.test".to_string(), "https://b.test".to_string()]);
    }

    #[test]
    fn unknown_asr_model_size_is_rejected() {
        let config = ServerConfig { asr_model_size: "large".into(), ..ServerConfig::default() };
        assert!(config.engine_config().is_err());
    }

    #[tokio::test]
    async fn bootstrap_wires_a_working_context() {
        let state = bootstrap(&ServerConfig::default()).await.unwrap();
        assert_eq!(state.rooms.room_count(), 0);
    }
}
