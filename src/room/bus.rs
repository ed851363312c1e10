use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::event::TranscriptEvent;

/// Group publish/subscribe transport for rooms.
///
/// Joining a room yields a [`RoomMembership`]: a publish handle plus a stream
/// of every event published to the room, including the member's own. Rooms
/// come into existence on first join and the transport owns their lifecycle.
#[async_trait::async_trait]
pub trait RoomBus: Send + Sync {
    async fn join(&self, room: &str) -> Result<RoomMembership>;
}

/// Publish side of a room membership.
#[async_trait::async_trait]
pub trait RoomPublisher: Send + Sync {
    /// Deliver the event exactly once to every current member, publisher
    /// included.
    async fn publish(&self, event: &TranscriptEvent) -> Result<()>;

    /// Leave the room. Idempotent; errors from the transport are not
    /// surfaced past this call.
    async fn leave(&self);
}

/// A single member's view of a room: the publish handle, the inbound event
/// stream, and the task forwarding transport messages into that stream.
pub struct RoomMembership {
    room: String,
    publisher: Arc<dyn RoomPublisher>,
    events: mpsc::UnboundedReceiver<TranscriptEvent>,
    forward: JoinHandle<()>,
}

impl RoomMembership {
    pub fn new(
        room: impl Into<String>,
        publisher: Arc<dyn RoomPublisher>,
        events: mpsc::UnboundedReceiver<TranscriptEvent>,
        forward: JoinHandle<()>,
    ) -> Self {
        Self {
            room: room.into(),
            publisher,
            events,
            forward,
        }
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    pub async fn publish(&self, event: &TranscriptEvent) -> Result<()> {
        self.publisher.publish(event).await
    }

    /// Receive the next event delivered to this member. Returns `None` once
    /// the membership has been torn down.
    pub async fn recv(&mut self) -> Option<TranscriptEvent> {
        self.events.recv().await
    }

    /// Split into the pieces a session actor owns separately: the publish
    /// handle, the event stream, and the forwarding task handle.
    pub fn into_parts(
        self,
    ) -> (
        Arc<dyn RoomPublisher>,
        mpsc::UnboundedReceiver<TranscriptEvent>,
        JoinHandle<()>,
    ) {
        (self.publisher, self.events, self.forward)
    }
}
