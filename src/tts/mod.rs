//! Speech synthesis client
//!
//! One request per translated utterance against Deepgram's speak API. A
//! failed synthesis degrades to "no audio": the listener still gets the text
//! update, just without the binary frame.

use bytes::Bytes;
use std::time::Duration;
use tracing::{debug, warn};

use crate::lang::voice_for;

const SPEAK_URL: &str = "https://api.deepgram.com/v1/speak";
const AUDIO_ENCODING: &str = "mp3";

/// Text-to-speech collaborator.
#[async_trait::async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with the voice mapped to `target_lang`. Returns
    /// `None` when synthesis fails for any reason.
    async fn synthesize(&self, text: &str, target_lang: &str) -> Option<Bytes>;
}

/// Deepgram Aura synthesis over REST.
pub struct DeepgramTts {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DeepgramTts {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, SPEAK_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl Synthesizer for DeepgramTts {
    async fn synthesize(&self, text: &str, target_lang: &str) -> Option<Bytes> {
        let voice = voice_for(target_lang);
        let url = format!(
            "{}?model={}&encoding={}",
            self.base_url, voice, AUDIO_ENCODING
        );

        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Synthesis request failed: {}", e);
                return None;
            }
        };

        if !response.status().is_success() {
            warn!("Synthesis rejected with status {}", response.status());
            return None;
        }

        match response.bytes().await {
            Ok(audio) if !audio.is_empty() => {
                debug!("Synthesized {} bytes with voice {}", audio.len(), voice);
                Some(audio)
            }
            Ok(_) => {
                warn!("Synthesis returned an empty body");
                None
            }
            Err(e) => {
                warn!("Failed to read synthesis body: {}", e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_engine_degrades_to_no_audio() {
        let tts = DeepgramTts::with_base_url("test-key", "http://127.0.0.1:9/v1/speak");
        assert!(tts.synthesize("Bonjour", "fr").await.is_none());
    }
}
