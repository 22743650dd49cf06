//! `/ws/session` — room-mode WebSocket upgrade handler (spec §4.5, §6).
//!
//! Unlike solo mode, one connection's utterance results are addressed to
//! its *partner*, not to itself (spec §4.5 direction routing), and a
//! connection must react both to its own inbound audio/control frames
//! and to events the partner's connection raises (`PartnerJoined`,
//! `PartnerTranscript`, `MicLocked`, ...). Rather than splitting ingest
//! and egress into two tasks racing on `tokio::select!` the way
//! `gglib-axum::handlers::voice_ws` does for its single-stream audio
//! plane, this handler keeps the socket unsplit and runs one task that
//! `select!`s across three sources — inbound WS frames, the room-event
//! channel, and this participant's own pipeline results — since the
//! `MicLocked` event needs direct mutable access to this connection's
//! own `RoomParticipantRuntime` (to arm its echo lock) that a second
//! task could not share.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use xlate_core::model::{Role, SessionPhase};
use xlate_engine::{RoomEvent, RoomParticipantRuntime, RoomSession, UtteranceResult};

use crate::diagnostics::DiagnosticsRecorder;
use crate::error::to_wire_error;
use crate::query::{RoomParams, RoomQueryRaw};
use crate::state::AppState;
use crate::wire::{pcm_to_wav, ControlMarker, Speaker, WireMessage};

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

pub async fn room_ws(
    ws: WebSocketUpgrade,
    Query(raw): Query<RoomQueryRaw>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    match RoomParams::try_from(raw) {
        Ok(params) => ws.on_upgrade(move |socket| handle_room_ws(socket, state, params)),
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

fn wire_json(message: &WireMessage) -> Message {
    Message::Text(serde_json::to_string(message).expect("wire message serializes to JSON"))
}

async fn send_wire(socket: &mut WebSocket, message: &WireMessage) -> Result<(), axum::Error> {
    socket.send(wire_json(message)).await
}

async fn handle_room_ws(mut socket: WebSocket, state: AppState, params: RoomParams) {
    let (events_tx, mut events_rx) = tokio::sync::mpsc::unbounded_channel();

    let setup = match params {
        RoomParams::Create { host_language, guest_language, name } => {
            state.rooms.create(host_language, guest_language, name, events_tx).await
        }
        RoomParams::Join { code, name } => {
            state.rooms.join(code, name, events_tx).await.map(|(room, id, _lang)| (room, id))
        }
    };

    let (room, participant_id) = match setup {
        Ok(v) => v,
        Err(err) => {
            let (message, _) = to_wire_error(&err);
            reject(socket, message).await;
            return;
        }
    };

    let Some(role) = room.role_of(participant_id).await else {
        return;
    };
    let language_pair = room.language_pair().await;
    let own_language = language_pair.for_role(role);
    let target_language = language_pair.other(role);

    let ack = match role {
        Role::Host => WireMessage::RoomCreated { room_id: room.code().await.to_string(), language: own_language },
        Role::Guest => {
            let partner_name = room.partner_name(participant_id).await.unwrap_or_default();
            WireMessage::RoomJoined {
                room_id: room.code().await.to_string(),
                language: own_language,
                partner_name,
                partner_language: target_language,
            }
        }
    };
    if send_wire(&mut socket, &ack).await.is_err() {
        room.leave(participant_id).await;
        return;
    }

    if role == Role::Host {
        let status = WireMessage::SessionStatus { status: SessionPhase::Waiting };
        if send_wire(&mut socket, &status).await.is_err() {
            room.leave(participant_id).await;
            return;
        }
    }

    let (mut runtime, mut results_rx) = RoomParticipantRuntime::new(
        participant_id,
        state.vad.clone(),
        state.asr.clone(),
        state.mt.clone(),
        state.tts.clone(),
        state.pool.clone(),
        own_language,
        target_language,
        &state.config,
    );

    let mut diagnostics = state.config.diagnostics_dir.is_some().then(DiagnosticsRecorder::new);
    let connection_id = CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed);

    loop {
        tokio::select! {
            msg = socket.next() => {
                match msg {
                    Some(Ok(Message::Binary(bytes))) => {
                        if let Some(recorder) = diagnostics.as_mut() {
                            recorder.ingest(&bytes);
                        }
                        if let Some(marker) = ControlMarker::parse(&bytes) {
                            handle_control_marker(&room, &mut runtime, participant_id, marker).await;
                        } else if let Err(err) = runtime.ingest_encoded(&room, &bytes).await {
                            tracing::warn!(error = %err, "room ingest error");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
            Some(event) = events_rx.recv() => {
                if handle_room_event(&mut socket, &mut runtime, event).await.is_err() {
                    break;
                }
            }
            Some(result) = results_rx.recv() => {
                if handle_own_result(&mut socket, &room, &state, participant_id, target_language, result)
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }

    room.leave(participant_id).await;
    if let Some(dir) = state.config.diagnostics_dir.as_ref() {
        if let Some(recorder) = diagnostics.as_ref() {
            recorder.flush(dir, &format!("room-{connection_id}"));
        }
    }
}

async fn handle_control_marker(
    room: &RoomSession,
    runtime: &mut RoomParticipantRuntime,
    participant_id: xlate_core::model::ParticipantId,
    marker: ControlMarker,
) {
    match marker {
        ControlMarker::Start => room.start(participant_id).await,
        ControlMarker::End => room.end_session(participant_id).await,
        ControlMarker::Mute => {
            room.set_muted(participant_id, true).await;
            runtime.reset();
        }
        ControlMarker::Unmute => room.set_muted(participant_id, false).await,
    }
}

/// Translate a `RoomEvent` from the partner/room into a wire message,
/// applying whatever local side effect it carries (arming this
/// connection's echo lock, discarding an in-flight utterance on a phase
/// change away from `active`).
async fn handle_room_event(
    socket: &mut WebSocket,
    runtime: &mut RoomParticipantRuntime,
    event: RoomEvent,
) -> Result<(), axum::Error> {
    match event {
        RoomEvent::PartnerJoined { name, language } => {
            send_wire(socket, &WireMessage::PartnerJoined { name, language }).await
        }
        RoomEvent::PartnerLeft => send_wire(socket, &WireMessage::PartnerLeft).await,
        RoomEvent::SessionStatus(status) => {
            if status != SessionPhase::Active {
                runtime.reset();
            }
            send_wire(socket, &WireMessage::SessionStatus { status }).await
        }
        RoomEvent::PartnerMuted => send_wire(socket, &WireMessage::PartnerMuted).await,
        RoomEvent::PartnerUnmuted => send_wire(socket, &WireMessage::PartnerUnmuted).await,
        RoomEvent::PartnerTranscriptPartial { text, language, translation, target_language } => {
            send_wire(
                socket,
                &WireMessage::TranscriptPartial { speaker: Speaker::Partner, text, language, translation, target_language },
            )
            .await
        }
        RoomEvent::PartnerTranscript { text, language, translation, target_language, duration_ms, audio } => {
            let has_tts_audio = audio.is_some();
            send_wire(
                socket,
                &WireMessage::Transcript {
                    speaker: Speaker::Partner,
                    speaker_name: "Partner".to_string(),
                    text,
                    language,
                    translation,
                    target_language,
                    duration: duration_ms,
                    has_tts_audio,
                },
            )
            .await?;
            if let Some(audio) = audio {
                let wav = pcm_to_wav(&audio.pcm, audio.sample_rate_hz);
                socket.send(Message::Binary(wav)).await?;
            }
            Ok(())
        }
        RoomEvent::MicLocked { duration_ms } => {
            runtime.arm_echo_lock(Duration::from_millis(duration_ms));
            send_wire(socket, &WireMessage::MicLocked { duration_ms }).await
        }
    }
}

/// This participant's own utterance result: the text goes to this
/// participant's own client, and the routable parts (translation,
/// audio) are forwarded to the partner via the room (spec §4.5).
async fn handle_own_result(
    socket: &mut WebSocket,
    room: &RoomSession,
    state: &AppState,
    participant_id: xlate_core::model::ParticipantId,
    target_language: xlate_core::model::Language,
    result: UtteranceResult,
) -> Result<(), axum::Error> {
    match result {
        UtteranceResult::Partial { text, language, translation, .. } => {
            send_wire(
                socket,
                &WireMessage::TranscriptPartial {
                    speaker: Speaker::Myself,
                    text: text.clone(),
                    language,
                    translation: translation.clone(),
                    target_language: translation.as_ref().map(|_| target_language),
                },
            )
            .await?;
            let has_translation = translation.is_some();
            room.send_to_partner(
                participant_id,
                RoomEvent::PartnerTranscriptPartial {
                    text,
                    language,
                    translation,
                    target_language: has_translation.then_some(target_language),
                },
            )
            .await;
            Ok(())
        }
        UtteranceResult::Final { text, language, translation, target_language: resolved_target, duration_ms, audio, .. } => {
            send_wire(
                socket,
                &WireMessage::Transcript {
                    speaker: Speaker::Myself,
                    speaker_name: "You".to_string(),
                    text: text.clone(),
                    language,
                    translation: translation.clone(),
                    target_language: resolved_target,
                    duration: duration_ms,
                    has_tts_audio: audio.is_some(),
                },
            )
            .await?;

            let audio_ms = audio.as_ref().map(|a| audio_duration_ms(a));
            room.send_to_partner(
                participant_id,
                RoomEvent::PartnerTranscript {
                    text,
                    language,
                    translation,
                    target_language: resolved_target,
                    duration_ms,
                    audio,
                },
            )
            .await;
            if let Some(audio_ms) = audio_ms {
                let lock_duration = state.config.echo_suppression_window(audio_ms);
                room.send_to_partner(
                    participant_id,
                    RoomEvent::MicLocked { duration_ms: u64::try_from(lock_duration.as_millis()).unwrap_or(u64::MAX) },
                )
                .await;
            }
            Ok(())
        }
    }
}

fn audio_duration_ms(audio: &xlate_core::ports::SynthesizedAudio) -> u64 {
    if audio.sample_rate_hz == 0 {
        return 0;
    }
    (audio.pcm.len() as u64 * 1_000) / u64::from(audio.sample_rate_hz)
}
