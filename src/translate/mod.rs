//! Translation client
//!
//! One request per utterance against Groq's chat-completions API. Failure is
//! never surfaced: any transport, quota, or parse error falls back to the
//! original text, so a broken translator degrades the relay to a same-language
//! echo instead of breaking it.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::lang::language_name;

const GROQ_CHAT_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const TRANSLATION_MODEL: &str = "llama-3.3-70b-versatile";
const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 1024;

/// Text translation collaborator.
#[async_trait::async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source_lang` into `target_lang`. Returns the
    /// original text unchanged when translation fails.
    async fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> String;
}

/// Build the interpreter instruction for a target language. Unknown codes
/// fall back to English rather than failing.
pub fn system_prompt(target_lang: &str) -> String {
    format!(
        "You are a professional simultaneous interpreter. \
         Translate the following text to {}. \
         Do not explain. Output ONLY the translation. \
         Keep the tone conversational but professional.",
        language_name(target_lang)
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Groq-backed translator. Stateless per call; owns one HTTP client for the
/// session's lifetime, released when the session drops it.
pub struct GroqTranslator {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GroqTranslator {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, GROQ_CHAT_URL)
    }

    /// Point the translator at an OpenAI-compatible endpoint other than
    /// Groq's hosted API.
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

    async fn request(&self, text: &str, target_lang: &str) -> anyhow::Result<String> {
        let prompt = system_prompt(target_lang);
        let body = ChatRequest {
            model: TRANSLATION_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let response: ChatResponse = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            anyhow::bail!("empty completion");
        }

        Ok(content)
    }
}

#[async_trait::async_trait]
impl Translator for GroqTranslator {
    async fn translate(&self, text: &str, _source_lang: &str, target_lang: &str) -> String {
        match self.request(text, target_lang).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!("Translation failed, falling back to original text: {}", e);
                text.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_the_target_language() {
        let prompt = system_prompt("fr");
        assert!(prompt.contains("Translate the following text to French."));
        assert!(prompt.contains("Output ONLY the translation."));
    }

    #[test]
    fn prompt_falls_back_to_english_for_unknown_codes() {
        assert!(system_prompt("zz").contains("to English."));
    }

    #[tokio::test]
    async fn failing_engine_returns_original_text() {
        // Nothing listens on the discard port, so every request fails fast;
        // the client must swallow the failure and echo the input.
        let translator = GroqTranslator::with_base_url("test-key", "http://127.0.0.1:9/v1/chat/completions");
        let out = translator.translate("Hola", "es", "en").await;
        assert_eq!(out, "Hola");
    }
}
