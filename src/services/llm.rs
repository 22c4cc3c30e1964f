use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cheap model for classification, keyword extraction and small talk.
pub const FAST_MODEL: &str = "gpt-4o-mini";
/// Stronger model for SQL generation, document answers and analysis.
pub const SMART_MODEL: &str = "gpt-4o";

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("LLM API error: {status} - {message}")]
    ApiError { status: StatusCode, message: String },

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),
}

/// One system + user exchange sent to a chat model.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// Ask the model to answer with a single JSON object.
    pub json_mode: bool,
}

impl CompletionRequest {
    pub fn new(model: &str, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.to_string(),
            system: system.into(),
            user: user.into(),
            temperature: 0.0,
            json_mode: false,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

/// A hosted text-completion capability.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns the text of the first choice, or an empty string when the
    /// service answered without one.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Client for OpenAI-compatible `/v1/chat/completions` endpoints.
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: Secret<String>,
}

impl OpenAiClient {
    pub fn new(base_url: &str, api_key: Secret<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl ChatModel for OpenAiClient {
    #[tracing::instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = ChatCompletionBody {
            model: &request.model,
            messages: [
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            temperature: request.temperature,
            response_format: request.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!(status = %status, error = %error_text, "LLM request failed");
            return Err(LlmError::ApiError {
                status,
                message: error_text,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default();

        tracing::debug!(chars = content.len(), "LLM completion received");

        Ok(content)
    }
}

/// Parses a JSON-mode answer, falling back to `T::default()` when the model
/// returned nothing usable.
pub fn parse_json_answer<T>(content: &str) -> T
where
    T: for<'de> Deserialize<'de> + Default,
{
    serde_json::from_str(content.trim()).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "LLM returned malformed JSON, using defaults");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(&server.uri(), Secret::new("sk-test".to_string()))
    }

    #[tokio::test]
    async fn test_complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "response_format": { "type": "json_object" },
                "messages": [
                    { "role": "system", "content": "classify" },
                    { "role": "user", "content": "How many eggs today?" }
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [
                    { "message": { "role": "assistant", "content": "{\"type\":\"sql\"}" } }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request =
            CompletionRequest::new(FAST_MODEL, "classify", "How many eggs today?").json();
        let content = client(&server).complete(request).await.unwrap();

        assert_eq!(content, "{\"type\":\"sql\"}");
    }

    #[tokio::test]
    async fn test_missing_choice_yields_empty_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
            .mount(&server)
            .await;

        let request = CompletionRequest::new(SMART_MODEL, "system", "user");
        let content = client(&server).complete(request).await.unwrap();

        assert_eq!(content, "");
    }

    #[tokio::test]
    async fn test_non_success_status_is_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let request = CompletionRequest::new(SMART_MODEL, "system", "user");
        let err = client(&server).complete(request).await.unwrap_err();

        match err {
            LlmError::ApiError { status, message } => {
                assert_eq!(status, StatusCode::UNAUTHORIZED);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let request = CompletionRequest::new(SMART_MODEL, "system", "user");
        let err = client(&server).complete(request).await.unwrap_err();

        assert!(matches!(err, LlmError::ParseError(_)));
    }

    #[derive(Debug, Default, Deserialize, PartialEq)]
    struct Answer {
        sql: Option<String>,
    }

    #[test]
    fn test_parse_json_answer_falls_back_to_default() {
        assert_eq!(
            parse_json_answer::<Answer>(r#"{"sql": "SELECT 1"}"#),
            Answer {
                sql: Some("SELECT 1".to_string())
            }
        );
        assert_eq!(parse_json_answer::<Answer>(""), Answer::default());
        assert_eq!(parse_json_answer::<Answer>("not json"), Answer::default());
    }
}
