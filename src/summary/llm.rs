use std::time::Duration;

use anyhow::{anyhow, Context as _};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::LlmConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("the LLM API key is not configured")]
    MissingApiKey,

    #[error("could not reach the LLM API")]
    Request(#[from] reqwest::Error),

    #[error("the LLM API responded with {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("the LLM API returned no completion")]
    EmptyResponse,

    #[error("the LLM API did not answer within {}s", .0.as_secs())]
    Timeout(Duration),
}

/// A chat completion model answering a single system + user exchange.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError>;
}

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_text(self) -> Result<String, LlmError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(|content| content.trim().to_owned())
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

/// A client for any API that speaks the OpenAI chat completion protocol.
pub struct OpenAiCompatClient {
    http_client: Client,
    url: Url,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiCompatClient {
    pub fn new(cfg: &LlmConfig) -> anyhow::Result<Self> {
        let base_url = cfg.base_url.trim_end_matches('/');
        let url = Url::parse(&format!("{base_url}/chat/completions"))
            .with_context(|| anyhow!("invalid LLM API URL `{}`", cfg.base_url))?;

        let http_client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(cfg.timeout.into())
            .build()
            .context("could not create an HTTP client")?;

        Ok(Self {
            http_client,
            url,
            api_key: cfg.api_key.clone().filter(|key| !key.trim().is_empty()),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiCompatClient {
    #[instrument(level = "DEBUG", skip_all, fields(model = %self.model))]
    async fn complete(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let api_key = self.api_key.as_deref().ok_or(LlmError::MissingApiKey)?;

        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        let response = self
            .http_client
            .post(self.url.clone())
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();

            return Err(LlmError::Status {
                status,
                message: message.chars().take(200).collect(),
            });
        }

        let text = response.json::<ChatResponse>().await?.into_text()?;
        debug!(chars = text.chars().count(), "Received a completion");

        Ok(text)
    }
}
