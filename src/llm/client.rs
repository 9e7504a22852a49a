//! OpenAI-compatible chat-completions client.
//!
//! Used as the grading model. Supports both a single JSON response and a
//! streamed `data:` response whose raw chunks can be observed live.

use super::stream::{SseLineBuffer, Utf8ChunkDecoder};
use crate::config::ApiConfig;
use crate::error::{EvalError, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Callback receiving every raw chunk of a streamed response.
pub type ChunkObserver<'a> = dyn Fn(&str) + Send + Sync + 'a;

/// Message role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Request body for chat completion.
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/// Response from chat completion.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// OpenAI API error response.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Response from an LLM call including metadata.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated content.
    pub content: String,
    /// Reason the model stopped generating.
    pub finish_reason: Option<String>,
    /// Token usage (not reported for streamed responses).
    pub usage: Option<TokenUsage>,
}

#[derive(Debug)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// OpenAI-compatible LLM client.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    config: ApiConfig,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn request(&self, messages: Vec<Message>, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
            stream,
        }
    }

    async fn send(&self, request: &ChatCompletionRequest) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(&self.config.scoring_endpoint)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if let Ok(api_error) = serde_json::from_str::<ApiError>(&body) {
            debug!("Scoring API error body: {}", api_error.error.message);
            return Err(EvalError::LlmApi(format!(
                "API error ({}): {}",
                status, api_error.error.message
            )));
        }
        Err(EvalError::http(status))
    }

    /// Send a chat completion request and wait for the full answer.
    pub async fn chat(&self, messages: Vec<Message>) -> Result<LlmResponse> {
        let request = self.request(messages, false);
        let response = self.send(&request).await?;
        let body = response.text().await?;

        let completion: ChatCompletionResponse = serde_json::from_str(&body)?;

        let choice = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EvalError::LlmApi("No choices in response".to_string()))?;

        Ok(LlmResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason,
            usage: completion.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    /// Send a streamed chat completion request.
    ///
    /// Raw chunks are passed to `observer` as they arrive, decoded as UTF-8
    /// with split characters held until complete; the returned content is
    /// the concatenation of all content deltas.
    pub async fn chat_stream(
        &self,
        messages: Vec<Message>,
        observer: Option<&ChunkObserver<'_>>,
    ) -> Result<LlmResponse> {
        let request = self.request(messages, true);
        let response = self.send(&request).await?;

        let mut stream = response.bytes_stream();
        let mut buffer = SseLineBuffer::new();
        let mut decoder = Utf8ChunkDecoder::new();
        let mut content = String::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if let Some(observe) = observer {
                let text = decoder.push(&chunk);
                if !text.is_empty() {
                    observe(&text);
                }
            }
            for delta in buffer.push(&chunk) {
                content.push_str(&delta);
            }
        }
        if let (Some(observe), Some(rest)) = (observer, decoder.finish()) {
            observe(&rest);
        }
        if let Some(delta) = buffer.finish() {
            content.push_str(&delta);
        }

        Ok(LlmResponse {
            content,
            finish_reason: None,
            usage: None,
        })
    }

    /// Single user message with optional system prompt, streamed or not.
    pub async fn complete(
        &self,
        system: Option<&str>,
        user: &str,
        stream: bool,
        observer: Option<&ChunkObserver<'_>>,
    ) -> Result<String> {
        let mut messages = Vec::new();

        if let Some(sys) = system {
            messages.push(Message::system(sys));
        }
        messages.push(Message::user(user));

        let response = if stream {
            self.chat_stream(messages, observer).await?
        } else {
            self.chat(messages).await?
        };
        Ok(response.content)
    }

    /// Probe the scoring endpoint with a one-line grading request.
    ///
    /// Succeeds when the model answers with any non-empty text.
    pub async fn test_connection(&self) -> Result<()> {
        let probe = self
            .chat(vec![Message::user("Reply with 'Final score: 5' only.")])
            .await?;

        if probe.content.trim().is_empty() {
            return Err(EvalError::LlmApi(
                "scoring endpoint returned an empty answer".to_string(),
            ));
        }
        debug!("Scoring probe answered: {}", probe.content.trim());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let sys = Message::system("You are a strict grader.");
        let user = Message::user("Grade this.");

        assert!(matches!(sys.role, Role::System));
        assert!(matches!(user.role, Role::User));
        assert_eq!(serde_json::to_value(&sys).unwrap()["role"], "system");
        assert_eq!(serde_json::to_value(&user).unwrap()["role"], "user");
    }

    #[test]
    fn test_request_body_shape() {
        let config = ApiConfig {
            model: "glm-4".to_string(),
            max_tokens: 256,
            ..Default::default()
        };
        let client = LlmClient::new(config);
        let body = serde_json::to_value(client.request(vec![Message::user("hi")], true)).unwrap();

        assert_eq!(body["model"], "glm-4");
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_response_with_null_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#;
        let parsed: ChatCompletionResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
        assert!(parsed.usage.is_none());
    }
}
