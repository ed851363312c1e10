use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::messages::{OutboundUpdate, OutgoingMessage, SessionInput};
use crate::room::{RoomBus, RoomPublisher, TranscriptEvent};
use crate::stt::{SttEngine, SttError, SttEvent, SttStream, SttStreamConfig, TranscriptUpdate};
use crate::translate::Translator;
use crate::tts::Synthesizer;

/// Errors that abort session establishment.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The transcription engine rejected the configuration or could not be
    /// reached; no session persists.
    #[error("transcription engine unavailable: {0}")]
    UpstreamUnavailable(#[source] SttError),

    /// The room fan-out transport refused the join.
    #[error("room fan-out unavailable: {0}")]
    RoomUnavailable(#[source] anyhow::Error),
}

/// Session lifecycle. Connecting fails only to Closed (no partial Active
/// state); input handlers run only in Active; Closing -> Closed happens
/// exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Active,
    Closing,
    Closed,
}

/// Collaborator handles shared by every session on this node.
#[derive(Clone)]
pub struct SessionContext {
    pub bus: Arc<dyn RoomBus>,
    pub stt: Arc<dyn SttEngine>,
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn Synthesizer>,
}

/// Connection parameters for one participant.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub room: String,
    /// Language the participant speaks.
    pub source_lang: String,
    /// Language the participant wants to hear.
    pub target_lang: String,
}

/// Handle the transport layer uses to drive a running session.
pub struct SessionHandle {
    id: String,
    inputs: mpsc::UnboundedSender<SessionInput>,
    task: JoinHandle<()>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Forward a raw audio frame. A no-op once the session is closing.
    pub fn send_audio(&self, frame: bytes::Bytes) {
        let _ = self.inputs.send(SessionInput::AudioFrame(frame));
    }

    /// Request teardown. Idempotent; safe to call after the task has exited.
    pub fn shutdown(&self) {
        let _ = self.inputs.send(SessionInput::Shutdown);
    }

    /// Wait for the session task to finish its teardown.
    pub async fn closed(self) {
        let _ = self.task.await;
    }
}

/// One connected participant: owns the transcription stream, the room
/// membership, and the translate-then-synthesize pipeline feeding its
/// connection. All state is mutated from the single `run` control flow.
pub struct Session {
    id: String,
    room: String,
    source_lang: String,
    target_lang: String,
    state: SessionState,
    stt: Box<dyn SttStream>,
    publisher: Arc<dyn RoomPublisher>,
    room_forward: JoinHandle<()>,
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
    outbound: mpsc::Sender<OutboundUpdate>,
}

impl Session {
    /// Join the room and open the transcription stream, then spawn the
    /// session's control flow. On transcription start failure the room is
    /// left again and no session persists.
    pub async fn connect(
        ctx: SessionContext,
        params: SessionParams,
        outbound: mpsc::Sender<OutboundUpdate>,
    ) -> Result<SessionHandle, SessionError> {
        let id = Uuid::new_v4().to_string();

        info!(
            "Connecting session {} to room {} ({} -> {})",
            id, params.room, params.source_lang, params.target_lang
        );

        let membership = ctx
            .bus
            .join(&params.room)
            .await
            .map_err(SessionError::RoomUnavailable)?;
        let (publisher, room_events, room_forward) = membership.into_parts();

        // The engine fires callbacks on its own execution context; this
        // channel is the re-dispatch into the session's control flow.
        let (stt_tx, stt_events) = mpsc::unbounded_channel();

        let stt = match ctx
            .stt
            .start(SttStreamConfig::for_language(&params.source_lang), stt_tx)
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                room_forward.abort();
                publisher.leave().await;
                return Err(SessionError::UpstreamUnavailable(e));
            }
        };

        let (inputs_tx, inputs_rx) = mpsc::unbounded_channel();

        let session = Session {
            id: id.clone(),
            room: params.room,
            source_lang: params.source_lang,
            target_lang: params.target_lang,
            state: SessionState::Active,
            stt,
            publisher,
            room_forward,
            translator: ctx.translator,
            synthesizer: ctx.synthesizer,
            outbound,
        };

        let task = tokio::spawn(session.run(inputs_rx, stt_events, room_events));

        Ok(SessionHandle {
            id,
            inputs: inputs_tx,
            task,
        })
    }

    /// Single-writer control flow: every mutation of session state happens
    /// here, one input at a time.
    async fn run(
        mut self,
        mut inputs: mpsc::UnboundedReceiver<SessionInput>,
        mut stt_events: mpsc::UnboundedReceiver<SttEvent>,
        mut room_events: mpsc::UnboundedReceiver<TranscriptEvent>,
    ) {
        info!("Session {} active in room {}", self.id, self.room);

        let mut stt_open = true;

        while self.state == SessionState::Active {
            tokio::select! {
                input = inputs.recv() => match input {
                    Some(SessionInput::AudioFrame(frame)) => self.on_audio_frame(frame).await,
                    Some(SessionInput::Shutdown) | None => self.state = SessionState::Closing,
                },

                event = stt_events.recv(), if stt_open => match event {
                    Some(SttEvent::Transcript(update)) => self.on_transcript(update).await,
                    Some(SttEvent::Error(e)) => {
                        error!("Transcription error on session {}: {}", self.id, e);
                    }
                    None => {
                        debug!("Transcript stream for session {} ended", self.id);
                        stt_open = false;
                    }
                },

                event = room_events.recv() => match event {
                    Some(event) => self.on_room_event(event).await,
                    None => {
                        warn!("Room stream for session {} ended", self.id);
                        self.state = SessionState::Closing;
                    }
                },
            }
        }

        self.teardown().await;
    }

    /// Forward raw audio verbatim; dropped quietly if the transcription
    /// stream is gone.
    async fn on_audio_frame(&mut self, frame: bytes::Bytes) {
        if let Err(e) = self.stt.send_audio(frame).await {
            debug!("Dropping audio frame for session {}: {}", self.id, e);
        }
    }

    /// Publish a finalized utterance to the room. Partial and empty
    /// transcripts never broadcast.
    async fn on_transcript(&mut self, update: TranscriptUpdate) {
        if !update.is_final {
            return;
        }

        let text = update.text.trim();
        if text.is_empty() {
            return;
        }

        let event = TranscriptEvent::new(text, &self.source_lang, &self.id);
        if let Err(e) = self.publisher.publish(&event).await {
            error!("Session {} failed to publish transcript: {}", self.id, e);
        }
    }

    /// Handle one event fanned out by the room, own speech included.
    async fn on_room_event(&mut self, event: TranscriptEvent) {
        // Self-echo: show the speaker their own words. No translation, no
        // audio, no engine calls.
        if event.origin_session == self.id {
            let update = OutboundUpdate {
                message: OutgoingMessage::Transcription {
                    text: event.text,
                    translation: String::new(),
                    lang: event.source_lang,
                },
                audio: None,
            };

            if self.outbound.send(update).await.is_err() {
                debug!("Session {} connection gone, dropping self-echo", self.id);
            }
            return;
        }

        // Listener: each event gets its own pipeline so one slow or failing
        // translation never stalls the session's control flow or the room.
        // Updates may therefore finish out of publish order.
        let translator = Arc::clone(&self.translator);
        let synthesizer = Arc::clone(&self.synthesizer);
        let outbound = self.outbound.clone();
        let target_lang = self.target_lang.clone();
        let session_id = self.id.clone();

        tokio::spawn(async move {
            let translation = translator
                .translate(&event.text, &event.source_lang, &target_lang)
                .await;

            let audio = synthesizer.synthesize(&translation, &target_lang).await;
            if audio.is_none() {
                debug!(
                    "Session {} delivering text-only update (synthesis unavailable)",
                    session_id
                );
            }

            let update = OutboundUpdate {
                message: OutgoingMessage::Transcription {
                    text: event.text,
                    translation,
                    lang: event.source_lang,
                },
                audio,
            };

            if outbound.send(update).await.is_err() {
                debug!("Session {} closed before update delivery", session_id);
            }
        });
    }

    /// Release the transcription stream and the room membership. Runs
    /// exactly once, whether teardown came from the client or the transport.
    async fn teardown(mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closing;

        self.stt.finish().await;
        self.room_forward.abort();
        self.publisher.leave().await;

        self.state = SessionState::Closed;
        info!("Session {} closed (room {})", self.id, self.room);
    }
}
