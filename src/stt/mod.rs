//! Streaming speech-to-text collaborator
//!
//! A session opens one live transcription stream for the lifetime of its
//! connection and feeds it raw audio. The engine reports results on its own
//! execution context; they are re-dispatched into the owning session's
//! control flow through the event channel handed to [`SttEngine::start`] —
//! that channel is the only synchronization point between the two.

mod deepgram;

pub use deepgram::DeepgramStt;

use bytes::Bytes;
use tokio::sync::mpsc;

/// One transcription update from the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptUpdate {
    pub text: String,
    /// Interim results carry `false` and are never broadcast.
    pub is_final: bool,
}

/// Error types for STT operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SttError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Stream closed")]
    StreamClosed,
}

/// Events emitted by a live transcription stream.
#[derive(Debug, Clone)]
pub enum SttEvent {
    Transcript(TranscriptUpdate),
    Error(SttError),
}

/// Channel the engine uses to hand events back to the owning session.
pub type SttEventSender = mpsc::UnboundedSender<SttEvent>;

/// Options for one live transcription stream.
#[derive(Debug, Clone)]
pub struct SttStreamConfig {
    /// Language code of the incoming audio (e.g. "es").
    pub language: String,
    /// Engine model identifier.
    pub model: String,
    /// Silence duration that finalizes an utterance, in milliseconds.
    pub endpointing_ms: u32,
    /// Apply punctuation/number formatting to results.
    pub smart_format: bool,
}

impl SttStreamConfig {
    pub fn for_language(language: &str) -> Self {
        Self {
            language: language.to_string(),
            ..Self::default()
        }
    }
}

impl Default for SttStreamConfig {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            model: "nova-2".to_string(),
            endpointing_ms: 350,
            smart_format: true,
        }
    }
}

/// An open live transcription stream. Exactly one session owns a stream.
#[async_trait::async_trait]
pub trait SttStream: Send {
    /// Forward raw audio bytes verbatim to the engine.
    async fn send_audio(&mut self, frame: Bytes) -> Result<(), SttError>;

    /// Close the stream. Idempotent; transport errors are suppressed.
    async fn finish(&mut self);
}

/// Factory for live transcription streams.
#[async_trait::async_trait]
pub trait SttEngine: Send + Sync {
    /// Open a stream configured for `config.language`, delivering results
    /// and errors through `events`. Fails if the engine rejects the
    /// configuration or the connection cannot be established.
    async fn start(
        &self,
        config: SttStreamConfig,
        events: SttEventSender,
    ) -> Result<Box<dyn SttStream>, SttError>;
}
