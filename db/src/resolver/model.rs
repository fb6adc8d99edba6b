//! Chat model clients for decisions and entry text
//!
//! Both talk to any OpenAI-compatible `/chat/completions` endpoint and expect
//! a strict JSON object back.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use super::decision::{Decision, DecisionContext, DecisionModel};
use super::editor::EditorModel;
use super::hygiene::sanitize_text;
use crate::config::ModelConfig;

const SYSTEM_PROMPT: &str = "You are the write coordinator for a daily journal. \
Return strict JSON only with keys: resolved_date (YYYY-MM-DD), \
action (noop|append|update|create), candidate_entry_ids (array of ints), reason.";

const EDITOR_PROMPT: &str = "Polish a daily journal event into one clear sentence. \
Follow the instruction if one is given. Do not invent facts. \
Return strict JSON only: {\"event_text\":\"...\"}";

/// Errors from the decision model
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("API key not found in environment variable {0}")]
    MissingApiKey(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid model output: {0}")]
    InvalidOutput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::MissingApiKey(_) => false,
            ModelError::Api { status, .. } => *status == 429 || *status >= 500,
            ModelError::Network(_) | ModelError::InvalidOutput(_) | ModelError::Json(_) => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Connection to an OpenAI-compatible endpoint
struct ChatClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl ChatClient {
    fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let api_key =
            std::env::var(&config.api_key_env).map_err(|_| ModelError::MissingApiKey(config.api_key_env.clone()))?;

        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Post a request body and return the first message's content
    async fn complete(&self, body: &serde_json::Value) -> Result<String, ModelError> {
        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            debug!(%status, "complete: API error");
            return Err(ModelError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ModelError::InvalidOutput("response has no message content".to_string()))
    }
}

fn request_body(model: &str, temperature: f32, system: &str, user: String) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "temperature": temperature,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
        "response_format": {"type": "json_object"},
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim()
}

/// Decision client for an OpenAI-compatible endpoint
pub struct ModelDecider {
    model: String,
    temperature: f32,
    client: ChatClient,
}

impl ModelDecider {
    /// Create a new client from configuration
    ///
    /// Reads the API key from the environment variable named in config.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        debug!(model = %config.model, base_url = %config.base_url, "from_config: called");
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            client: ChatClient::from_config(config)?,
        })
    }

    fn user_prompt(context: &DecisionContext) -> String {
        format!(
            "resolved_date_hint={}\nuser_text={}\ncandidate_entry_ids={:?}\ntop_similarity={:.3}\nexisting_entries_count={}",
            context.resolved_date,
            sanitize_text(&context.user_text),
            context.candidate_entry_ids,
            context.top_similarity,
            context.existing_entries_count
        )
    }
}

/// Parse the model's message content into a decision
pub(crate) fn parse_decision(content: &str) -> Result<Decision, ModelError> {
    Ok(serde_json::from_str(strip_code_fence(content))?)
}

#[async_trait]
impl DecisionModel for ModelDecider {
    async fn decide(&self, context: &DecisionContext) -> Result<Decision, ModelError> {
        debug!(%context.resolved_date, "decide: called");
        let body = request_body(&self.model, self.temperature, SYSTEM_PROMPT, Self::user_prompt(context));
        let content = self.client.complete(&body).await?;
        parse_decision(&content)
    }
}

#[derive(Debug, Deserialize)]
struct EditedText {
    event_text: String,
}

/// Text editing client for an OpenAI-compatible endpoint
pub struct ModelEditor {
    model: String,
    temperature: f32,
    client: ChatClient,
}

impl ModelEditor {
    /// Create from the model section; the editor's own model wins when set
    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        let model = config.editor.model.clone().unwrap_or_else(|| config.model.clone());
        debug!(%model, base_url = %config.base_url, "ModelEditor::from_config: called");
        Ok(Self {
            model,
            temperature: config.editor.temperature,
            client: ChatClient::from_config(config)?,
        })
    }

    fn user_prompt(source_text: &str, instruction: Option<&str>) -> String {
        format!(
            "source_text={}\ninstruction={}",
            sanitize_text(source_text),
            instruction.map(sanitize_text).unwrap_or_default()
        )
    }
}

/// Parse the editor's message content into entry text
pub(crate) fn parse_edited_text(content: &str) -> Result<String, ModelError> {
    let edited: EditedText = serde_json::from_str(strip_code_fence(content))?;
    let text = sanitize_text(&edited.event_text);
    if text.is_empty() {
        return Err(ModelError::InvalidOutput("event_text is empty".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl EditorModel for ModelEditor {
    async fn edit(&self, source_text: &str, instruction: Option<&str>) -> Result<String, ModelError> {
        debug!(has_instruction = instruction.is_some(), "edit: called");
        let body = request_body(
            &self.model,
            self.temperature,
            EDITOR_PROMPT,
            Self::user_prompt(source_text, instruction),
        );
        let content = self.client.complete(&body).await?;
        parse_edited_text(&content)
    }
}
