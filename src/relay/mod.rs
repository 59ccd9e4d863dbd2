//! Relay between the voice front-end and the dialog agent
//!
//! - `client`: what the front-end uses to send a transcript and get a reply
//! - `agent`: what the relay server uses to reach the dialog agent
//! - `messages`: the JSON contract between the two

pub mod agent;
pub mod client;
pub mod messages;

pub use agent::{new_session_id, DialogAgent, DialogflowAgent};
pub use client::{HttpRelay, Relay, RelayError};
pub use messages::{MessageRequest, MessageResponse, FALLBACK_REPLY};
