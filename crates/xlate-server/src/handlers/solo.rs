//! `/ws/audio` — solo-mode WebSocket upgrade handler (spec §4.4, §6).
//!
//! Grounded directly on `gglib-axum::handlers::voice_ws`'s ingest/egress
//! task split: one task decodes inbound binary frames and drives the
//! session state machine, the other drains the session's result channel
//! and forwards wire messages to the browser; `tokio::select!` tears
//! down whichever task finishes first.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use xlate_core::model::Language;
use xlate_engine::{SoloSession, UtteranceResult};

use crate::diagnostics::DiagnosticsRecorder;
use crate::error::to_wire_error;
use crate::query::{SoloParams, SoloQueryRaw};
use crate::state::AppState;
use crate::wire::{pcm_to_wav, Speaker, WireMessage};

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

pub async fn solo_ws(
    ws: WebSocketUpgrade,
    Query(raw): Query<SoloQueryRaw>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match SoloParams::try_from(raw) {
        Ok(params) => ws.on_upgrade(move |socket| handle_solo_ws(socket, state, params)),
        Err(err) => {
            let (message, _) = to_wire_error(&err);
            ws.on_upgrade(move |socket| reject(socket, message))
        }
    }
}

async fn reject(mut socket: WebSocket, message: WireMessage) {
    let _ = send_wire(&mut socket, &message).await;
    let _ = socket.close().await;
}

fn send_wire_json(message: &WireMessage) -> Message {
    Message::Text(serde_json::to_string(message).expect("wire message serializes to JSON"))
}

async fn send_wire(socket: &mut WebSocket, message: &WireMessage) -> Result<(), axum::Error> {
    socket.send(send_wire_json(message)).await
}

async fn handle_solo_ws(socket: WebSocket, state: AppState, params: SoloParams) {
    let source_language = params.source_language.unwrap_or(Language::En);
    let target_language = params.target_language;

    let (mut session, mut results_rx) = SoloSession::new(
        state.vad.clone(),
        state.asr.clone(),
        state.mt.clone(),
        state.tts.clone(),
        state.pool.clone(),
        source_language,
        target_language,
        params.tts_enabled,
        &state.config,
    );

    let diagnostics_dir = state.config.diagnostics_dir.clone();
    let connection_id = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);

    let (mut ws_sender, mut ws_receiver) = socket.split();

    let mut ingest = tokio::spawn(async move {
        let mut diagnostics = diagnostics_dir.is_some().then(DiagnosticsRecorder::new);
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Binary(bytes)) => {
                    if let Some(recorder) = diagnostics.as_mut() {
                        recorder.ingest(&bytes);
                    }
                    if let Err(err) = session.ingest_encoded(&bytes) {
                        tracing::warn!(error = %err, "solo ingest error");
                        if err.is_fatal() {
                            break;
                        }
                    }
                }
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => {}
            }
        }
        if let (Some(dir), Some(recorder)) = (diagnostics_dir.as_ref(), diagnostics.as_ref()) {
            recorder.flush(dir, &format!("solo-{connection_id}"));
        }
    });

    let mut egress = tokio::spawn(async move {
        while let Some(result) = results_rx.recv().await {
            let (message, audio) = match result {
                UtteranceResult::Partial { text, language, translation, .. } => {
                    let reported_target = if translation.is_some() { target_language } else { None };
                    let message = WireMessage::TranscriptPartial {
                        speaker: Speaker::Myself,
                        text,
                        language,
                        translation,
                        target_language: reported_target,
                    };
                    (message, None)
                }
                UtteranceResult::Final { text, language, translation, target_language, duration_ms, audio, .. } => {
                    let message = WireMessage::Transcript {
                        speaker: Speaker::Myself,
                        speaker_name: "You".to_string(),
                        text,
                        language,
                        translation,
                        target_language,
                        duration: duration_ms,
                        has_tts_audio: audio.is_some(),
                    };
                    (message, audio)
                }
            };

            if ws_sender.send(send_wire_json(&message)).await.is_err() {
                break;
            }
            if let Some(audio) = audio {
                let wav = pcm_to_wav(&audio.pcm, audio.sample_rate_hz);
                if ws_sender.send(Message::Binary(wav)).await.is_err() {
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut ingest => { egress.abort(); }
        _ = &mut egress => { ingest.abort(); }
    }
}
