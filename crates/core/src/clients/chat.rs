use super::shared_client;
use crate::traits::TextGenerator;
use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;

pub const DEFAULT_CHAT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "llama-3.3-70b-versatile";

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CHAT_ENDPOINT.to_string(),
            api_key: None,
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
            timeout: Duration::from_secs(20),
        }
    }
}

/// OpenAI-compatible `/chat/completions` client.
pub struct ChatCompletionGenerator {
    config: ChatConfig,
    client: OnceCell<Client>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatCompletionGenerator {
    pub fn new(config: ChatConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, SearchError> {
        let api_key = self
            .api_key()
            .ok_or_else(|| SearchError::NotReady("no API key for the completion endpoint".to_string()))?;
        let client = shared_client(&self.client, self.config.timeout).await?;

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
        };

        let response = client
            .post(&self.config.endpoint)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::backend("chat", response.status().to_string()));
        }

        let parsed: Value = response.json().await?;
        parse_completion(parsed)
    }
}

fn parse_completion(parsed: Value) -> Result<String, SearchError> {
    let response: ChatResponse = serde_json::from_value(parsed)
        .map_err(|error| SearchError::backend("chat", error.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| SearchError::backend("chat", "completion has no choices"))
}
