pub mod config;
pub mod http;
pub mod lang;
pub mod room;
pub mod session;
pub mod stt;
pub mod translate;
pub mod tts;

pub use config::Config;
pub use http::{create_router, AppState};
pub use room::{LocalRoomBus, NatsRoomBus, RoomBus, RoomMembership, RoomPublisher, TranscriptEvent};
pub use session::{
    OutboundUpdate, OutgoingMessage, Session, SessionContext, SessionError, SessionHandle,
    SessionInput, SessionParams,
};
pub use stt::{
    DeepgramStt, SttEngine, SttError, SttEvent, SttEventSender, SttStream, SttStreamConfig,
    TranscriptUpdate,
};
pub use translate::{GroqTranslator, Translator};
pub use tts::{DeepgramTts, Synthesizer};
