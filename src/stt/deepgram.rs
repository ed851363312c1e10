use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{
        handshake::client::generate_key,
        http::{header::AUTHORIZATION, Request},
        protocol::Message,
    },
};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{SttEngine, SttError, SttEvent, SttEventSender, SttStream, SttStreamConfig, TranscriptUpdate};

const LISTEN_URL: &str = "wss://api.deepgram.com/v1/listen";

/// Deepgram live transcription over WebSocket.
pub struct DeepgramStt {
    api_key: String,
}

impl DeepgramStt {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    fn build_listen_url(config: &SttStreamConfig) -> Result<Url, SttError> {
        let mut url = Url::parse(LISTEN_URL)
            .map_err(|e| SttError::ConfigurationError(format!("Invalid listen URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("model", &config.model)
            .append_pair("language", &config.language)
            .append_pair("smart_format", &config.smart_format.to_string())
            .append_pair("endpointing", &config.endpointing_ms.to_string());

        Ok(url)
    }
}

/// Transcription payloads Deepgram sends on the live socket. Only the fields
/// the relay consumes are modeled.
#[derive(Debug, Deserialize)]
struct ListenResponse {
    #[serde(rename = "type")]
    kind: String,
    channel: Option<ListenChannel>,
    is_final: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Debug, Deserialize)]
struct ListenAlternative {
    transcript: String,
}

#[derive(Debug, Deserialize)]
struct ListenError {
    description: Option<String>,
    message: Option<String>,
}

#[async_trait::async_trait]
impl SttEngine for DeepgramStt {
    async fn start(
        &self,
        config: SttStreamConfig,
        events: SttEventSender,
    ) -> Result<Box<dyn SttStream>, SttError> {
        if self.api_key.is_empty() {
            return Err(SttError::ConfigurationError(
                "Deepgram API key is required".to_string(),
            ));
        }

        let url = Self::build_listen_url(&config)?;
        let host = url
            .host_str()
            .ok_or_else(|| SttError::ConfigurationError("Listen URL has no host".to_string()))?
            .to_string();

        let request = Request::builder()
            .method("GET")
            .uri(url.as_str())
            .header("Host", host)
            .header("Connection", "Upgrade")
            .header("Upgrade", "websocket")
            .header("Sec-WebSocket-Version", "13")
            .header("Sec-WebSocket-Key", generate_key())
            .header(AUTHORIZATION, format!("Token {}", self.api_key))
            .body(())
            .map_err(|e| SttError::ConfigurationError(format!("Invalid request: {e}")))?;

        let (ws_stream, _) = connect_async(request)
            .await
            .map_err(|e| SttError::ConnectionFailed(format!("Deepgram connect failed: {e}")))?;

        info!("Connected to Deepgram live transcription ({})", config.language);

        let (mut ws_sink, mut ws_source) = ws_stream.split();
        let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<Message>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = outgoing_rx.recv() => {
                        match outgoing {
                            Some(message) => {
                                if let Err(e) = ws_sink.send(message).await {
                                    error!("Failed to send to Deepgram: {}", e);
                                    let _ = events.send(SttEvent::Error(SttError::ProviderError(
                                        format!("Send failed: {e}"),
                                    )));
                                    break;
                                }
                            }
                            // Stream handle dropped; connection is done.
                            None => break,
                        }
                    }

                    incoming = ws_source.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                handle_listen_payload(&text, &events);
                            }
                            Some(Ok(Message::Close(frame))) => {
                                debug!("Deepgram closed the stream: {:?}", frame);
                                break;
                            }
                            Some(Ok(_)) => {
                                // Pings are answered by the library; Deepgram
                                // sends no binary data on the listen socket.
                            }
                            Some(Err(e)) => {
                                let _ = events.send(SttEvent::Error(SttError::ProviderError(
                                    format!("WebSocket error: {e}"),
                                )));
                                break;
                            }
                            None => {
                                debug!("Deepgram stream ended");
                                break;
                            }
                        }
                    }
                }
            }
        });

        Ok(Box::new(DeepgramSttStream {
            outgoing: outgoing_tx,
            finished: false,
        }))
    }
}

fn handle_listen_payload(text: &str, events: &SttEventSender) {
    let response: ListenResponse = match serde_json::from_str(text) {
        Ok(response) => response,
        Err(e) => {
            warn!("Unparseable Deepgram payload: {}", e);
            return;
        }
    };

    match response.kind.as_str() {
        "Results" => {
            let transcript = response
                .channel
                .as_ref()
                .and_then(|channel| channel.alternatives.first())
                .map(|alt| alt.transcript.clone());

            if let Some(text) = transcript {
                let _ = events.send(SttEvent::Transcript(TranscriptUpdate {
                    text,
                    is_final: response.is_final.unwrap_or(false),
                }));
            }
        }
        "Metadata" => {}
        "Error" => {
            let detail = serde_json::from_str::<ListenError>(text)
                .ok()
                .and_then(|e| e.description.or(e.message))
                .unwrap_or_else(|| "unknown Deepgram error".to_string());
            let _ = events.send(SttEvent::Error(SttError::ProviderError(detail)));
        }
        other => {
            debug!("Ignoring Deepgram message type {}", other);
        }
    }
}

struct DeepgramSttStream {
    outgoing: mpsc::UnboundedSender<Message>,
    finished: bool,
}

#[async_trait::async_trait]
impl SttStream for DeepgramSttStream {
    async fn send_audio(&mut self, frame: Bytes) -> Result<(), SttError> {
        if self.finished {
            return Err(SttError::StreamClosed);
        }

        self.outgoing
            .send(Message::Binary(frame.to_vec()))
            .map_err(|_| SttError::StreamClosed)
    }

    async fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        // Flush any buffered audio server-side, then close. The connection
        // task exits when the channel drops.
        let _ = self
            .outgoing
            .send(Message::Text(r#"{"type":"CloseStream"}"#.to_string()));
        let _ = self.outgoing.send(Message::Close(None));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listen_url_carries_stream_options() {
        let config = SttStreamConfig::for_language("es");
        let url = DeepgramStt::build_listen_url(&config).unwrap();
        let query = url.query().unwrap();

        assert!(query.contains("model=nova-2"));
        assert!(query.contains("language=es"));
        assert!(query.contains("smart_format=true"));
        assert!(query.contains("endpointing=350"));
    }

    #[test]
    fn results_payload_becomes_transcript_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let payload = r#"{
            "type": "Results",
            "is_final": true,
            "channel": { "alternatives": [ { "transcript": "Hola", "confidence": 0.98 } ] }
        }"#;

        handle_listen_payload(payload, &tx);

        match rx.try_recv().unwrap() {
            SttEvent::Transcript(update) => {
                assert_eq!(update.text, "Hola");
                assert!(update.is_final);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn error_payload_becomes_error_event() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let payload = r#"{ "type": "Error", "description": "quota exceeded", "message": "x" }"#;

        handle_listen_payload(payload, &tx);

        assert!(matches!(
            rx.try_recv().unwrap(),
            SttEvent::Error(SttError::ProviderError(_))
        ));
    }

    #[test]
    fn malformed_payload_is_skipped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        handle_listen_payload("not json", &tx);
        assert!(rx.try_recv().is_err());
    }
}
