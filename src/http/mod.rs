//! HTTP relay server
//!
//! This module exposes the dialog agent to the voice front-end:
//! - POST /message - Forward `{message}` to the agent, answer `{reply}`
//! - POST /.netlify/functions/message - Same handler under the legacy function path
//! - GET /health - Health check
//!
//! Any other method on the message routes is answered with 405.

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
