// src/ai/provider.rs - The hosted model behind GAMAI
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::config::AiSettings;
use crate::errors::AiFailure;

const ERROR_BODY_LIMIT: usize = 500;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// One prompt with its context, ready to send.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Given a prompt and its context, returns generated text or a failure.
/// One call is one attempt.
#[async_trait]
pub trait AiProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &ProviderRequest) -> Result<String, AiFailure>;
}

/// OpenRouter style chat-completions endpoint.
pub struct OpenRouterProvider {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenRouterProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn from_settings(settings: &AiSettings) -> Result<Self, AiFailure> {
        match settings.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(Self::new(&settings.endpoint, key, &settings.model)),
            _ => Err(AiFailure::NotConfigured),
        }
    }
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait]
impl AiProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<String, AiFailure> {
        let body = CompletionBody {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .header("X-Title", "GameBox")
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AiFailure::Timeout
                } else {
                    AiFailure::Network(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(map_http_error(status, text));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|err| AiFailure::Malformed(format!("could not parse response: {}", err)))?;
        extract_content(parsed)
    }
}

fn map_http_error(status: StatusCode, body: String) -> AiFailure {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AiFailure::Auth(truncate(&body)),
        StatusCode::TOO_MANY_REQUESTS => AiFailure::RateLimited,
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => AiFailure::Timeout,
        _ => AiFailure::Http { status: status.as_u16(), body: truncate(&body) },
    }
}

fn extract_content(response: CompletionResponse) -> Result<String, AiFailure> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| AiFailure::Malformed("the provider returned no content".to_string()))
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_failures() {
        assert!(matches!(map_http_error(StatusCode::UNAUTHORIZED, "bad key".into()), AiFailure::Auth(_)));
        assert!(matches!(map_http_error(StatusCode::FORBIDDEN, String::new()), AiFailure::Auth(_)));
        assert_eq!(map_http_error(StatusCode::TOO_MANY_REQUESTS, String::new()), AiFailure::RateLimited);
        assert_eq!(
            map_http_error(StatusCode::BAD_GATEWAY, "upstream".into()),
            AiFailure::Http { status: 502, body: "upstream".to_string() }
        );
    }

    #[test]
    fn empty_content_is_malformed() {
        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"  "}}]}"#).unwrap();
        assert!(matches!(extract_content(parsed), Err(AiFailure::Malformed(_))));

        let parsed: CompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(matches!(extract_content(parsed), Err(AiFailure::Malformed(_))));

        let parsed: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"<html></html>"}}]}"#).unwrap();
        assert_eq!(extract_content(parsed).unwrap(), "<html></html>");
    }

    #[test]
    fn messages_serialize_with_lowercase_roles() {
        let json = serde_json::to_string(&ChatMessage::system("be brief")).unwrap();
        assert_eq!(json, r#"{"role":"system","content":"be brief"}"#);
    }

    #[test]
    fn missing_key_is_not_configured() {
        let settings = AiSettings {
            model: "m".to_string(),
            endpoint: "http://localhost".to_string(),
            timeout_secs: 5,
            max_tokens: 10,
            temperature: 0.1,
            api_key: None,
        };
        assert!(matches!(OpenRouterProvider::from_settings(&settings), Err(AiFailure::NotConfigured)));
    }

    #[test]
    fn long_error_bodies_are_cut() {
        let body = "x".repeat(ERROR_BODY_LIMIT + 10);
        assert_eq!(truncate(&body).len(), ERROR_BODY_LIMIT + 3);
    }
}
