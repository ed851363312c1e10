use anyhow::{Context, Result};
use async_nats::Client;
use futures::StreamExt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::bus::{RoomBus, RoomMembership, RoomPublisher};
use super::event::TranscriptEvent;

/// Room fan-out over NATS. Each room maps to one subject; every member holds
/// its own subscription, so a published event reaches each member exactly
/// once, the publisher included.
pub struct NatsRoomBus {
    client: Client,
}

impl NatsRoomBus {
    /// Connect to the NATS server backing the room fan-out.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self { client })
    }

    fn subject(room: &str) -> String {
        format!("room.{}.transcripts", room)
    }
}

#[async_trait::async_trait]
impl RoomBus for NatsRoomBus {
    async fn join(&self, room: &str) -> Result<RoomMembership> {
        let subject = Self::subject(room);

        let mut subscriber = self
            .client
            .subscribe(subject.clone())
            .await
            .with_context(|| format!("Failed to subscribe to {}", subject))?;

        info!("Joined room {} on {}", room, subject);

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let forward = tokio::spawn(async move {
            while let Some(msg) = subscriber.next().await {
                match serde_json::from_slice::<TranscriptEvent>(&msg.payload) {
                    Ok(event) => {
                        if events_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Skipping malformed room event: {}", e);
                    }
                }
            }
        });

        let publisher = Arc::new(NatsRoomPublisher {
            client: self.client.clone(),
            subject,
        });

        Ok(RoomMembership::new(room, publisher, events_rx, forward))
    }
}

struct NatsRoomPublisher {
    client: Client,
    subject: String,
}

#[async_trait::async_trait]
impl RoomPublisher for NatsRoomPublisher {
    async fn publish(&self, event: &TranscriptEvent) -> Result<()> {
        let payload = serde_json::to_vec(event)?;

        self.client
            .publish(self.subject.clone(), payload.into())
            .await
            .context("Failed to publish room event")?;

        debug!(
            "Published transcript to {} ({} chars)",
            self.subject,
            event.text.len()
        );

        Ok(())
    }

    async fn leave(&self) {
        // The subscription is dropped with the forwarding task; async-nats
        // unsubscribes on drop.
        debug!("Left {}", self.subject);
    }
}
