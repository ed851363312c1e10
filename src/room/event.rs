use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One finalized utterance published to a room.
///
/// Immutable once published; every member of the room (including the
/// publisher) receives its own copy and decides locally what to do with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// Original transcribed text, trimmed and non-empty.
    pub text: String,

    /// Language code the speaker was talking in.
    pub source_lang: String,

    /// Session that published the event, used for self-echo suppression.
    pub origin_session: String,

    /// When the event was published.
    pub published_at: DateTime<Utc>,
}

impl TranscriptEvent {
    pub fn new(
        text: impl Into<String>,
        source_lang: impl Into<String>,
        origin_session: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            source_lang: source_lang.into(),
            origin_session: origin_session.into(),
            published_at: Utc::now(),
        }
    }
}
