use anyhow::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

use super::bus::{RoomBus, RoomMembership, RoomPublisher};
use super::event::TranscriptEvent;

/// Per-room broadcast capacity. A room only carries finalized utterances, so
/// a small backlog is plenty; a lagging member skips ahead with a warning.
const ROOM_CAPACITY: usize = 64;

/// One live room: its broadcast channel plus an explicit member count. The
/// count, not the channel's receiver count, decides when the room dies — a
/// member's aborted forward task can keep its receiver alive briefly after
/// the member has already left.
struct RoomEntry {
    sender: broadcast::Sender<TranscriptEvent>,
    members: usize,
}

type RoomMap = Arc<Mutex<HashMap<String, RoomEntry>>>;

/// In-process room fan-out backed by broadcast channels. Used for
/// single-node deployments and tests; semantics match [`super::NatsRoomBus`]:
/// every current member, publisher included, receives each event once.
#[derive(Default)]
pub struct LocalRoomBus {
    rooms: RoomMap,
}

impl LocalRoomBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl RoomBus for LocalRoomBus {
    async fn join(&self, room: &str) -> Result<RoomMembership> {
        let sender = {
            let mut rooms = self.rooms.lock().expect("room registry poisoned");
            let entry = rooms.entry(room.to_string()).or_insert_with(|| RoomEntry {
                sender: broadcast::channel(ROOM_CAPACITY).0,
                members: 0,
            });
            entry.members += 1;
            entry.sender.clone()
        };

        let mut rx = sender.subscribe();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let room_name = room.to_string();

        let forward = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if events_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Room {} member lagged, skipped {} events", room_name, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        debug!("Joined local room {}", room);

        let publisher = Arc::new(LocalRoomPublisher {
            rooms: Arc::clone(&self.rooms),
            room: room.to_string(),
            sender,
            left: AtomicBool::new(false),
        });

        Ok(RoomMembership::new(room, publisher, events_rx, forward))
    }
}

struct LocalRoomPublisher {
    rooms: RoomMap,
    room: String,
    sender: broadcast::Sender<TranscriptEvent>,
    left: AtomicBool,
}

#[async_trait::async_trait]
impl RoomPublisher for LocalRoomPublisher {
    async fn publish(&self, event: &TranscriptEvent) -> Result<()> {
        // A send error only means nobody is listening anymore.
        let _ = self.sender.send(event.clone());
        Ok(())
    }

    async fn leave(&self) {
        // Each membership decrements the count once, however many times
        // leave is called.
        if self.left.swap(true, Ordering::SeqCst) {
            return;
        }

        let mut rooms = self.rooms.lock().expect("room registry poisoned");
        if let Some(entry) = rooms.get_mut(&self.room) {
            entry.members = entry.members.saturating_sub(1);
            if entry.members == 0 {
                rooms.remove(&self.room);
                debug!("Room {} is empty, removed", self.room);
            }
        }
    }
}
