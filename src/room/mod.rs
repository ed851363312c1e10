//! Room fan-out
//!
//! A room is the set of sessions subscribed to one pub/sub group. This module
//! provides the thin abstraction over the transport: join/leave a named
//! group, publish a transcript event to all members, and deliver each event
//! to every member (publisher included) exactly once.

mod bus;
mod event;
mod local;
mod nats;

pub use bus::{RoomBus, RoomMembership, RoomPublisher};
pub use event::TranscriptEvent;
pub use local::LocalRoomBus;
pub use nats::NatsRoomBus;
