//! The OpenAI-compatible chat-completions wire protocol.
//!
//! Groq serves the same `/chat/completions` shape as OpenAI, so both
//! clients share this module and differ only in endpoint, credentials,
//! and catalog. Requests are issued non-streaming: the caller of this
//! layer wants the whole reply as one string.

use reqwest::{Client, IntoUrl};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backends::wire::{HttpError, Url};
use crate::backends::{CallOptions, ToolSpec};
use crate::chat;

#[derive(thiserror::Error, Debug)]
pub(super) enum Error {
    /// The API base is not a URL that can be used in a network request
    #[error("invalid api base")]
    InvalidApiBase(#[source] reqwest::Error),

    /// Endpoint URL is invalid
    #[error("invalid endpoint")]
    InvalidEndpoint(
        #[from]
        #[source]
        url::ParseError,
    ),

    /// No API key was configured for a backend that requires one
    #[error("no API key is configured")]
    MissingApiKey,

    /// Some issue with the request
    #[error("{}", .0)]
    RequestFailed(
        #[from]
        #[source]
        HttpError,
    ),

    /// The response carried no choices, or a choice with neither
    /// content nor tool calls
    #[error("the completion contained no message")]
    EmptyResponse,

    /// Tool calls in the response could not be re-encoded as JSON
    #[error("failed to encode tool calls")]
    ToolCallEncoding(#[source] serde_json::Error),

    /// Your request was malformed or missing some required parameters
    #[error("{}", .0.message)]
    BadRequest(ApiErrorPayload),

    /// The API key is missing, malformed, or revoked
    #[error("{}", .0.message)]
    Authentication(ApiErrorPayload),

    /// You don't have access to the requested resource
    #[error("{}", .0.message)]
    PermissionDenied(ApiErrorPayload),

    /// Requested resource does not exist
    #[error("{}", .0.message)]
    NotFound(ApiErrorPayload),

    /// You have hit your assigned rate limit
    #[error("{}", .0.message)]
    RateLimit(ApiErrorPayload),

    /// The service has an internal issue
    #[error("{}", .0.message)]
    InternalError(ApiErrorPayload),

    /// The engine is currently overloaded, please try again later
    #[error("{}", .0.message)]
    ApiOverloaded(ApiErrorPayload),

    /// Some unknown error was returned by the API
    #[error("{}", .0.message)]
    UnknownStatus(ApiErrorPayload),
}

impl Error {
    fn from_status(status: u16, payload: ApiErrorPayload) -> Error {
        match status {
            400 => Error::BadRequest(payload),
            401 => Error::Authentication(payload),
            403 => Error::PermissionDenied(payload),
            404 => Error::NotFound(payload),
            429 => Error::RateLimit(payload),
            500 => Error::InternalError(payload),
            503 => Error::ApiOverloaded(payload),
            400..=599 => Error::UnknownStatus(payload),
            _ => unimplemented!("successful status routed to error handling"),
        }
    }
}

impl From<Error> for crate::backends::Error {
    fn from(value: Error) -> Self {
        use crate::backends::ErrorKind;

        let kind = match &value {
            Error::Authentication(_) | Error::PermissionDenied(_) | Error::MissingApiKey => {
                Some(ErrorKind::Authentication)
            }
            Error::BadRequest(_) | Error::InvalidApiBase(_) | Error::InvalidEndpoint(_) => {
                Some(ErrorKind::BadRequest)
            }
            Error::NotFound(_) => Some(ErrorKind::NotFound),
            Error::RateLimit(_) => Some(ErrorKind::ExcessUsage),
            Error::InternalError(_) => Some(ErrorKind::InternalError),
            Error::ApiOverloaded(_) => Some(ErrorKind::ApiOverloaded),
            Error::UnknownStatus(_) => Some(ErrorKind::UnspecifiedError),
            Error::EmptyResponse | Error::ToolCallEncoding(_) => {
                Some(ErrorKind::UnexpectedResponse)
            }

            Error::RequestFailed(_) => None,
        };

        match value {
            Error::RequestFailed(err) => err.into(),
            value => crate::backends::Error::from_source(kind.unwrap(), Box::new(value)),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub(super) enum Role {
    System,
    User,
    Assistant,
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

/* Structures to serialize /chat/completions */

#[derive(Serialize, Debug)]
struct ChatRequest<'r> {
    model: &'r str,
    messages: &'r [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'r [ToolSpec]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'r str>,
}

/* Structures to deserialize /chat/completions */

#[derive(Serialize, Deserialize, Debug)]
pub(super) struct ToolCallFunction {
    pub name: String,
    /// JSON-encoded arguments, relayed as the API produced them.
    pub arguments: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub(super) struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolCallFunction,
}

#[derive(Deserialize, Debug)]
pub(super) struct ResponseMessage {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Deserialize, Debug)]
pub(super) struct Choice {
    pub index: u32,
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(super) struct Usage {
    pub completion_tokens: usize,
    pub prompt_tokens: usize,
    pub total_tokens: usize,
}

#[derive(Deserialize, Debug)]
pub(super) struct ChatCompletion {
    pub id: String,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

/* API Errors */

#[derive(Deserialize, Debug)]
pub(super) struct ApiErrorPayload {
    message: String,
    #[serde(rename = "type")]
    #[allow(dead_code)]
    typ: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    error: ApiErrorPayload,
}

/// Reduce a completion to the textual reply: the first choice's content,
/// or the JSON serialization of its tool calls when the model answered
/// with calls instead of text.
pub(super) fn response_text(completion: ChatCompletion) -> Result<String, Error> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or(Error::EmptyResponse)?;

    if let Some(calls) = &choice.message.tool_calls {
        if !calls.is_empty() {
            return serde_json::to_string(calls).map_err(Error::ToolCallEncoding);
        }
    }

    match choice.message.content {
        Some(content) => Ok(content),
        None => Err(Error::EmptyResponse),
    }
}

pub(super) struct ChatCompletionsApi {
    endpoint: Url,
    api_key: Option<String>,
    client: Client,
}

impl ChatCompletionsApi {
    pub(super) fn new<U: IntoUrl>(
        api_base: U,
        route: &str,
        api_key: Option<String>,
    ) -> Result<ChatCompletionsApi, Error> {
        let api_base = api_base.into_url().map_err(Error::InvalidApiBase)?;

        Ok(ChatCompletionsApi {
            endpoint: api_base.join(route)?,
            api_key,
            client: Client::new(),
        })
    }

    pub(super) async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &CallOptions,
        tools: Option<&[ToolSpec]>,
        tool_choice: Option<&str>,
    ) -> Result<ChatCompletion, Error> {
        let api_key = self.api_key.as_ref().ok_or(Error::MissingApiKey)?;

        let res = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&ChatRequest {
                model,
                messages,
                max_tokens: options.max_tokens,
                temperature: options.temperature,
                tools,
                tool_choice,
            })
            .send()
            .await
            .map_err(|e| Error::RequestFailed(e.into()))?;

        let status = res.status();

        if status.is_success() {
            let completion: ChatCompletion =
                res.json().await.map_err(|e| Error::RequestFailed(e.into()))?;

            if let Some(usage) = &completion.usage {
                debug!(
                    id = %completion.id,
                    model = %completion.model,
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    total_tokens = usage.total_tokens,
                    "chat completion received"
                );
            }

            Ok(completion)
        } else {
            let err: ApiErrorResponse =
                res.json().await.map_err(|e| Error::RequestFailed(e.into()))?;

            Err(Error::from_status(status.as_u16(), err.error))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn hello() -> Vec<ChatMessage> {
        vec![ChatMessage {
            role: Role::User,
            content: "Hello!".to_string(),
        }]
    }

    fn completion_body(message: serde_json::Value) -> serde_json::Value {
        json!({
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "created": 1722000000,
            "model": "gpt-4o-mini",
            "choices": [
                {"index": 0, "message": message, "finish_reason": "stop"}
            ],
            "usage": {"prompt_tokens": 4, "completion_tokens": 3, "total_tokens": 7}
        })
    }

    #[tokio::test]
    async fn completion_returns_message_content() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 64,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                json!({"role": "assistant", "content": "Hi there!"}),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let api = ChatCompletionsApi::new(
            server.uri(),
            "/v1/chat/completions",
            Some("test-key".to_string()),
        )
        .unwrap();

        let options = CallOptions {
            max_tokens: 64,
            temperature: None,
        };

        let completion = api
            .chat_completion("gpt-4o-mini", &hello(), &options, None, None)
            .await
            .unwrap();

        assert_eq!(response_text(completion).unwrap(), "Hi there!");
    }

    #[tokio::test]
    async fn temperature_and_tools_are_serialized_when_present() {
        let server = MockServer::start().await;

        let tools = [ToolSpec::function(
            "get_weather".to_string(),
            "Look up the weather".to_string(),
            json!({"type": "object", "properties": {}}),
        )];

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(body_partial_json(json!({
                "temperature": 0.1,
                "tools": [{"type": "function", "function": {"name": "get_weather"}}],
                "tool_choice": "auto",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                json!({"role": "assistant", "content": "Sunny."}),
            )))
            .expect(1)
            .mount(&server)
            .await;

        let api = ChatCompletionsApi::new(
            server.uri(),
            "/v1/chat/completions",
            Some("test-key".to_string()),
        )
        .unwrap();

        let options = CallOptions {
            max_tokens: 64,
            temperature: Some(0.1),
        };

        api.chat_completion("gpt-4o-mini", &hello(), &options, Some(&tools), Some("auto"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn invalid_credentials_map_to_authentication() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}
            })))
            .mount(&server)
            .await;

        let api = ChatCompletionsApi::new(
            server.uri(),
            "/v1/chat/completions",
            Some("not-a-valid-key".to_string()),
        )
        .unwrap();

        let err = api
            .chat_completion("gpt-4o-mini", &hello(), &CallOptions::default(), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Authentication(_)));

        let err: crate::backends::Error = err.into();
        assert!(matches!(
            err.kind(),
            crate::backends::ErrorKind::Authentication
        ));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let api =
            ChatCompletionsApi::new("http://127.0.0.1:1", "/v1/chat/completions", None).unwrap();

        let err = api
            .chat_completion("gpt-4o-mini", &hello(), &CallOptions::default(), None, None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::MissingApiKey));
    }

    #[test]
    fn tool_calls_win_over_absent_content() {
        let completion: ChatCompletion = serde_json::from_value(completion_body(json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}
                }
            ]
        })))
        .unwrap();

        let text = response_text(completion).unwrap();

        assert!(text.contains("get_weather"));
        assert!(text.contains("call_1"));
    }

    #[test]
    fn choiceless_completion_is_an_error() {
        let completion: ChatCompletion = serde_json::from_value(json!({
            "id": "chatcmpl-123",
            "model": "gpt-4o-mini",
            "choices": [],
            "usage": null
        }))
        .unwrap();

        assert!(matches!(
            response_text(completion),
            Err(Error::EmptyResponse)
        ));
    }
}
