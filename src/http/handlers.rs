use super::state::AppState;
use crate::session::{OutboundUpdate, Session, SessionParams};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Buffer for updates waiting on the socket writer. Updates are small; a
/// short queue keeps slow clients from piling up synthesized audio.
const OUTBOUND_BUFFER: usize = 64;

fn default_source() -> String {
    "es".to_string()
}

fn default_target() -> String {
    "en".to_string()
}

#[derive(Debug, Deserialize)]
pub struct ConnectQuery {
    /// Language the participant speaks.
    #[serde(default = "default_source")]
    pub source: String,
    /// Language the participant wants to hear.
    #[serde(default = "default_target")]
    pub target: String,
}

/// GET /ws/:room
/// One bidirectional connection per participant: binary frames in are raw
/// audio, text + binary frames out carry transcripts and synthesized speech.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room): Path<String>,
    Query(query): Query<ConnectQuery>,
    State(state): State<AppState>,
) -> Response {
    info!(
        "WebSocket upgrade for room {} ({} -> {})",
        room, query.source, query.target
    );

    ws.on_upgrade(move |socket| handle_socket(socket, state, room, query))
}

async fn handle_socket(socket: WebSocket, state: AppState, room: String, query: ConnectQuery) {
    let (mut sender, mut receiver) = socket.split();

    let params = SessionParams {
        room,
        source_lang: query.source,
        target_lang: query.target,
    };

    let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundUpdate>(OUTBOUND_BUFFER);

    let session = match Session::connect(state.ctx, params, outbound_tx).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Session establishment failed: {}", e);
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    // Writer task: the only place frames are put on the wire, so the text
    // frame of an update always precedes its audio frame and two updates
    // never interleave.
    let writer = tokio::spawn(write_updates(sender, outbound_rx));

    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Binary(data)) => {
                session.send_audio(Bytes::from(data));
            }
            Ok(Message::Close(_)) => {
                info!("Connection closed by client (session {})", session.id());
                break;
            }
            Ok(_) => {
                // Text/ping/pong frames are not consumed by the relay.
            }
            Err(e) => {
                warn!("WebSocket error on session {}: {}", session.id(), e);
                break;
            }
        }
    }

    session.shutdown();
    session.closed().await;

    // Any pipeline still holding an update sender dies with its send; the
    // writer drains what was already queued and exits.
    writer.abort();

    debug!("Connection handler finished");
}

async fn write_updates(
    mut sender: futures::stream::SplitSink<WebSocket, Message>,
    mut updates: mpsc::Receiver<OutboundUpdate>,
) {
    while let Some(update) = updates.recv().await {
        let json = match serde_json::to_string(&update.message) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize outgoing message: {}", e);
                continue;
            }
        };

        if sender.send(Message::Text(json)).await.is_err() {
            break;
        }

        if let Some(audio) = update.audio {
            if sender.send(Message::Binary(audio.to_vec())).await.is_err() {
                break;
            }
        }
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
