use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Inputs re-dispatched into a session's single control flow.
#[derive(Debug)]
pub enum SessionInput {
    /// Raw audio bytes from the participant's connection, forwarded verbatim
    /// to the transcription engine.
    AudioFrame(Bytes),
    /// The connection is going away; tear the session down.
    Shutdown,
}

/// JSON frames sent down a participant's connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutgoingMessage {
    #[serde(rename = "transcription")]
    Transcription {
        /// Original text as spoken.
        text: String,
        /// Translation into the listener's language; empty for self-echo.
        translation: String,
        /// Language the speaker was talking in.
        lang: String,
    },
}

/// One update for a participant: a text frame plus, when synthesis
/// succeeded, the audio that must follow it. The connection writer emits the
/// pair back to back, never interleaved with another update's frames.
#[derive(Debug)]
pub struct OutboundUpdate {
    pub message: OutgoingMessage,
    pub audio: Option<Bytes>,
}
