//! HTTP server and WebSocket transport
//!
//! - GET /ws/:room?source=<lang>&target=<lang> - per-participant connection
//! - GET /health - health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
