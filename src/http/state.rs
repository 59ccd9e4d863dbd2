use crate::relay::DialogAgent;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Agent every message is forwarded to
    pub agent: Arc<dyn DialogAgent>,
}

impl AppState {
    pub fn new(agent: Arc<dyn DialogAgent>) -> Self {
        Self { agent }
    }
}
