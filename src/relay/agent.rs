use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::config::AgentConfig;

/// A conversational agent that answers one text turn
#[async_trait::async_trait]
pub trait DialogAgent: Send + Sync {
    /// Send `text` within `session_id` and return the agent's first text response
    async fn detect_intent(&self, session_id: &str, text: &str) -> Result<String>;
}

/// Fresh random dialog session id; every relay request gets its own
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Dialogflow CX agent reached over its REST API
pub struct DialogflowAgent {
    client: reqwest::Client,
    project_id: String,
    location: String,
    agent_id: String,
    access_token: String,
    language_code: String,
}

impl DialogflowAgent {
    /// Build from configuration; every coordinate and the access token are required
    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        fn required(value: &Option<String>, name: &str) -> Result<String> {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| anyhow!("Missing required agent setting: {}", name))
        }

        let agent = Self {
            client: reqwest::Client::new(),
            project_id: required(&config.project_id, "GOOGLE_PROJECT_ID")?,
            location: required(&config.location, "GOOGLE_LOCATION")?,
            agent_id: required(&config.agent_id, "GOOGLE_AGENT_ID")?,
            access_token: required(&config.access_token, "GOOGLE_ACCESS_TOKEN")?,
            language_code: config
                .language_code
                .clone()
                .unwrap_or_else(|| "en".to_string()),
        };

        info!(
            "Dialogflow agent {} ({}, {})",
            agent.agent_id, agent.location, agent.language_code
        );

        Ok(agent)
    }

    pub fn session_path(&self, session_id: &str) -> String {
        format!(
            "projects/{}/locations/{}/agents/{}/sessions/{}",
            self.project_id, self.location, self.agent_id, session_id
        )
    }

    pub fn endpoint(&self, session_id: &str) -> String {
        let host = if self.location == "global" {
            "dialogflow.googleapis.com".to_string()
        } else {
            format!("{}-dialogflow.googleapis.com", self.location)
        };

        format!(
            "https://{}/v3/{}:detectIntent",
            host,
            self.session_path(session_id)
        )
    }
}

#[async_trait::async_trait]
impl DialogAgent for DialogflowAgent {
    async fn detect_intent(&self, session_id: &str, text: &str) -> Result<String> {
        let url = self.endpoint(session_id);
        debug!("detectIntent {}", url);

        let body = json!({
            "queryInput": {
                "text": { "text": text },
                "languageCode": self.language_code,
            }
        });

        let response: DetectIntentResponse = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .context("Failed to reach Dialogflow")?
            .error_for_status()
            .context("Dialogflow rejected the request")?
            .json()
            .await
            .context("Failed to decode Dialogflow response")?;

        response
            .first_text()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Dialogflow response has no text message"))
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectIntentResponse {
    #[serde(default)]
    pub query_result: QueryResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    #[serde(default)]
    pub response_messages: Vec<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    pub text: Option<TextMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TextMessage {
    #[serde(default)]
    pub text: Vec<String>,
}

impl DetectIntentResponse {
    /// Text of the first response message, if it is a text message
    pub fn first_text(&self) -> Option<&str> {
        self.query_result
            .response_messages
            .first()?
            .text
            .as_ref()?
            .text
            .first()
            .map(String::as_str)
    }
}
