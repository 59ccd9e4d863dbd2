use serde::{Deserialize, Serialize};

/// Reply sent when the dialog agent cannot be reached
pub const FALLBACK_REPLY: &str = "Sorry, I'm having trouble connecting to the AI service.";

/// Transcript posted to the relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub message: String,
}

/// Relay answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub reply: String,
}
