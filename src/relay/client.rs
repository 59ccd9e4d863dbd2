use anyhow::{Context, Result};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use super::messages::{MessageRequest, MessageResponse};

/// Relay failures; all of them are recoverable for the session
#[derive(Debug, Error)]
pub enum RelayError {
    /// Relay answered with a non-2xx status
    #[error("relay returned HTTP {0}")]
    Status(u16),

    /// Request never completed or the body could not be decoded
    #[error("relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Sends a finalized transcript and returns the reply text
#[async_trait::async_trait]
pub trait Relay: Send + Sync {
    async fn send(&self, message: &str) -> std::result::Result<String, RelayError>;
}

/// JSON-over-HTTP relay client
pub struct HttpRelay {
    client: reqwest::Client,
    url: String,
}

impl HttpRelay {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        let url = url.into();
        info!("Relay endpoint: {}", url);

        Ok(Self { client, url })
    }
}

#[async_trait::async_trait]
impl Relay for HttpRelay {
    async fn send(&self, message: &str) -> std::result::Result<String, RelayError> {
        debug!("POST {} ({} chars)", self.url, message.len());

        let response = self
            .client
            .post(&self.url)
            .json(&MessageRequest {
                message: message.to_string(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status(status.as_u16()));
        }

        let body: MessageResponse = response.json().await?;
        Ok(body.reply)
    }
}
