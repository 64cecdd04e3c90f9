use reqwest::{Client, IntoUrl, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::backends::wire::{HttpError, Url};
use crate::backends::{CallOptions, ToolSpec};
use crate::chat;

const OLLAMA_DEFAULT_ENDPOINT: &str = "http://localhost:11434";

#[derive(Debug, Error)]
pub(super) enum Error {
    #[error("invalid ollama api base: {0}")]
    InvalidApiBase(reqwest::Error),

    #[error("invalid ollama endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("a request to ollama failed: {0}")]
    RequestFailed(#[from] HttpError),

    #[error("failed to query ollama resource: {0}")]
    NotFound(String),

    #[error("request to the ollama api failed: {0}")]
    BadRequest(String),

    #[error("ollama encountered an internal error: {0}")]
    InternalError(String),

    #[error("the ollama API returned an unspecified error: {0}")]
    UnspecifiedError(String),

    #[error("failed to encode tool calls")]
    ToolCallEncoding(#[source] serde_json::Error),
}

/* === IO === */

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "snake_case")]
pub(super) enum Role {
    Assistant,
    User,
    System,
    Tool,
}

impl From<&chat::Role> for Role {
    fn from(value: &chat::Role) -> Self {
        match value {
            chat::Role::System => Role::System,
            chat::Role::User => Role::User,
            chat::Role::Model => Role::Assistant,
            chat::Role::Tool => Role::Tool,
        }
    }
}

// Structures to serialize /api/chat
#[derive(Serialize, Debug)]
pub(super) struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl From<&chat::Message> for ChatMessage {
    fn from(value: &chat::Message) -> Self {
        ChatMessage {
            role: (&value.role).into(),
            content: value.content.clone(),
        }
    }
}

#[derive(Serialize, Debug)]
struct GenerationOptions {
    num_predict: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Serialize, Debug)]
struct ChatRequest<'m> {
    model: &'m str,
    messages: &'m [ChatMessage],
    stream: bool,
    options: GenerationOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'m [ToolSpec]>,
}

// Structures to deserialize /api/chat

#[derive(Serialize, Deserialize, Debug)]
pub(super) struct ToolCallFunction {
    pub name: String,
    /// Arguments arrive as a JSON object, not an encoded string.
    pub arguments: serde_json::Value,
}

#[derive(Serialize, Deserialize, Debug)]
pub(super) struct ToolCall {
    pub function: ToolCallFunction,
}

#[derive(Deserialize, Debug)]
pub(super) struct ResponseMessage {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
pub(super) struct ChatResponse {
    pub message: ResponseMessage,
    pub done: bool,
    #[serde(default)]
    pub done_reason: Option<String>,
    #[serde(default)]
    pub prompt_eval_count: Option<usize>,
    #[serde(default)]
    pub eval_count: Option<usize>,
}

// Structures to deserialize /api/tags

#[derive(Debug, Deserialize)]
pub(super) struct Tag {
    pub name: String,
    pub model: String,
    pub size: u64,
}

#[derive(Debug, Deserialize)]
struct TagsList {
    models: Vec<Tag>,
}

// Errors
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

/// Reduce a chat response to its textual reply: tool calls win over
/// content when the model produced them.
pub(super) fn response_text(response: ChatResponse) -> Result<String, Error> {
    if let Some(calls) = &response.message.tool_calls {
        if !calls.is_empty() {
            return serde_json::to_string(calls).map_err(Error::ToolCallEncoding);
        }
    }

    Ok(response.message.content)
}

pub(super) struct OllamaApi {
    api_base: Url,
    client: Client,
}

impl OllamaApi {
    pub(super) fn with_api_base<U: IntoUrl>(api_base: U) -> Result<OllamaApi, Error> {
        Ok(OllamaApi {
            api_base: api_base.into_url().map_err(Error::InvalidApiBase)?,
            client: Client::new(),
        })
    }

    pub(super) fn new() -> OllamaApi {
        Self::with_api_base(OLLAMA_DEFAULT_ENDPOINT).unwrap()
    }

    async fn maybe_parse_api_error(res: Response) -> Result<Response, Error> {
        let status = res.status();

        if status.is_success() {
            Ok(res)
        } else {
            let err: ApiError = res.json().await.map_err(|e| Error::RequestFailed(e.into()))?;

            match status {
                StatusCode::NOT_FOUND => Err(Error::NotFound(err.error)),
                code => match code.as_u16() {
                    400..=499 => Err(Error::BadRequest(err.error)),
                    500..=599 => Err(Error::InternalError(err.error)),
                    _ => Err(Error::UnspecifiedError(err.error)),
                },
            }
        }
    }

    pub(super) async fn tags(&self) -> Result<Vec<Tag>, Error> {
        let url = self.api_base.join("/api/tags")?;

        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let res = Self::maybe_parse_api_error(res).await?;

        let tags: TagsList = res.json().await.map_err(|e| Error::RequestFailed(e.into()))?;

        Ok(tags.models)
    }

    pub(super) async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CallOptions,
        tools: Option<&[ToolSpec]>,
    ) -> Result<ChatResponse, Error> {
        let url = self.api_base.join("/api/chat")?;

        let res = self
            .client
            .post(url)
            .json(&ChatRequest {
                model,
                messages,
                stream: false,
                options: GenerationOptions {
                    num_predict: options.max_tokens,
                    temperature: options.temperature,
                },
                tools,
            })
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let res = Self::maybe_parse_api_error(res).await?;

        let response: ChatResponse = res.json().await.map_err(|e| Error::RequestFailed(e.into()))?;

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hello() -> Vec<ChatMessage> {
        vec![ChatMessage {
            role: Role::User,
            content: "Hello!".to_string(),
        }]
    }

    #[tokio::test]
    async fn tags_lists_installed_models() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "models": [
                    {
                        "name": "gemma:2b",
                        "model": "gemma:2b",
                        "modified_at": "2024-05-01T10:00:00Z",
                        "size": 1678456656u64,
                        "digest": "b50d6c999e59",
                        "details": {"family": "gemma"}
                    },
                    {
                        "name": "llama3:8b",
                        "model": "llama3:8b",
                        "modified_at": "2024-05-02T10:00:00Z",
                        "size": 4661224676u64,
                        "digest": "365c0bd3c000",
                        "details": {"family": "llama"}
                    }
                ]
            })))
            .mount(&server)
            .await;

        let api = OllamaApi::with_api_base(server.uri()).unwrap();

        let tags = api.tags().await.unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].name, "gemma:2b");
        assert_eq!(tags[1].model, "llama3:8b");
        assert_eq!(tags[0].size, 1678456656);
    }

    #[tokio::test]
    async fn chat_requests_a_single_response() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({
                "model": "gemma:2b",
                "stream": false,
                "options": {"num_predict": 128, "temperature": 0.1}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "gemma:2b",
                "message": {"role": "assistant", "content": "Hello to you!"},
                "done": true,
                "done_reason": "stop",
                "prompt_eval_count": 6,
                "eval_count": 4
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = OllamaApi::with_api_base(server.uri()).unwrap();

        let options = CallOptions {
            max_tokens: 128,
            temperature: Some(0.1),
        };

        let response = api.chat("gemma:2b", &hello(), &options, None).await.unwrap();

        assert!(response.done);
        assert_eq!(response.eval_count, Some(4));
        assert_eq!(response_text(response).unwrap(), "Hello to you!");
    }

    #[tokio::test]
    async fn missing_model_maps_to_not_found() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": "model \"_nonexistent_\" not found, try pulling it first"
            })))
            .mount(&server)
            .await;

        let api = OllamaApi::with_api_base(server.uri()).unwrap();

        let err = api
            .chat("_nonexistent_", &hello(), &CallOptions::default(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn unreachable_daemon_is_a_connection_error() {
        // Nothing listens on port 1.
        let api = OllamaApi::with_api_base("http://127.0.0.1:1").unwrap();

        let err = api.tags().await.unwrap_err();

        assert!(matches!(err, Error::RequestFailed(_)));

        let err: crate::backends::Error = err.into();
        assert!(matches!(
            err.kind(),
            crate::backends::ErrorKind::Connection
        ));
    }

    #[test]
    fn tool_calls_are_reencoded_as_json() {
        let response: ChatResponse = serde_json::from_value(json!({
            "model": "llama3:8b",
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [
                    {"function": {"name": "get_weather", "arguments": {"city": "Oslo"}}}
                ]
            },
            "done": true
        }))
        .unwrap();

        let text = response_text(response).unwrap();

        assert!(text.contains("get_weather"));
        assert!(text.contains("Oslo"));
    }
}
