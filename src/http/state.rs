use crate::session::SessionContext;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    /// Collaborator handles handed to every new session.
    pub ctx: SessionContext,
}

impl AppState {
    pub fn new(ctx: SessionContext) -> Self {
        Self { ctx }
    }
}
