//! Per-participant session actor
//!
//! One session per connected participant. The session bridges the
//! transcription engine's callback context into its own control flow,
//! publishes finalized transcripts to the room, and runs the per-listener
//! translate-then-synthesize pipeline with self-echo suppression.

mod messages;
mod session;

pub use messages::{OutboundUpdate, OutgoingMessage, SessionInput};
pub use session::{Session, SessionContext, SessionError, SessionHandle, SessionParams};
