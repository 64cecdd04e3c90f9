//! Traits and type definitions for talking to chat-model backends.
//!
//! The `backends` module contains everything needed to relay one chat
//! request to one backend. The interface shared by all backends is the
//! [`ChatBackend`] trait: a completion operation and a tool-augmented
//! completion operation, both returning the model's reply as text.
//!
//! ## Backends
//!
//! Each serving backend (Groq, OpenAI, or a local Ollama daemon) implements
//! [`ChatBackend`] to be usable from the dispatcher. A backend client is
//! constructed once at startup and reused for every request; it must be safe
//! for concurrent invocation, since independent requests may call into it at
//! the same time. Connection state and credentials live inside the client.
//!
//! ## Error Handling
//!
//! Each API has its own bespoke error surface. Backend-specific errors are
//! defined next to the wire code that produces them and folded into
//! [`Error`], with [`ErrorKind`] giving the category a caller can act on.
//! Nothing in this module retries or rewrites a backend failure.

mod groq;
mod oaichat;
mod ollama;
mod openai;
mod wire;

pub(crate) mod backends;

use async_trait::async_trait;
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;

use self::backends::BackendId;
use crate::chat::Message;

/// This is a list specifying general categories of errors that can be
/// returned by a [`ChatBackend`]. This list may be updated as backends
/// are added.
#[derive(Debug, Clone, Copy)]
pub(crate) enum ErrorKind {
    /// Failed to connect to the underlying API service.
    /// This could be due to network issues like DNS
    /// resolution, connectivity issues, or routing problems.
    Connection,
    /// A request timed out.
    TimedOut,
    /// An API key was not provided or service-specific
    /// permissions are needed.
    Authentication,
    /// A rate limit was reached or a quota was exceeded.
    ExcessUsage,
    /// The servers are overloaded. This is non-fatal
    /// and indicates that a retry may be needed later.
    ApiOverloaded,
    /// The requested resource was not found. This likely means that
    /// the model requested by the user was not found.
    NotFound,
    /// The request was malformed or is otherwise improper. This
    /// often corresponds to errors with HTTP status codes in
    /// the 400s.
    BadRequest,
    /// The server encountered an error. This often corresponds to
    /// errors with HTTP status codes in the 500s.
    InternalError,
    /// An API response was unable to be deserialized, malformed,
    /// or otherwise violated the assumptions of the client.
    UnexpectedResponse,
    /// An error that does not fit into any of the other categories.
    UnspecifiedError,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }

    pub(crate) fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            source: Some(source),
        }
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::Connection => "failed to connect to the API service",
            ErrorKind::TimedOut => "request timed out",
            ErrorKind::Authentication => "authentication failed or not provided",
            ErrorKind::ExcessUsage => "rate limit exceeded or quota crossed",
            ErrorKind::ApiOverloaded => "API server(s) are currently overloaded",
            ErrorKind::NotFound => "the requested resource was not found",
            ErrorKind::BadRequest => "the request was bad or malformed",
            ErrorKind::InternalError => "the server encountered an internal error",
            ErrorKind::UnexpectedResponse => "API response was unexpected or malformed",
            ErrorKind::UnspecifiedError => "an unspecified error occurred",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// Cap on generated tokens when the caller does not specify one.
pub(crate) const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Near-deterministic sampling temperature used by the asynchronous
/// completion variant when the caller takes the default.
pub(crate) const DEFAULT_TEMPERATURE: f64 = 0.1;

/// Per-call generation parameters, forwarded to the backend unchanged.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CallOptions {
    /// Maximum number of tokens the model may generate.
    pub max_tokens: u32,
    /// Sampling temperature. When unset, the backend's own default applies.
    pub temperature: Option<f64>,
}

impl Default for CallOptions {
    fn default() -> CallOptions {
        CallOptions {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }
}

/// A function-shaped tool the model may call. The `parameters` schema is
/// untyped JSON: descriptors are relayed to the backend without validation,
/// and the backend alone decides what to make of them.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSpec {
    pub(crate) fn function(
        name: String,
        description: String,
        parameters: serde_json::Value,
    ) -> ToolSpec {
        ToolSpec {
            kind: "function".to_string(),
            function: FunctionSpec {
                name,
                description,
                parameters,
            },
        }
    }
}

/// A trait implemented by all backend clients.
///
/// Implementations must be safe to call from many tasks at once; the
/// dispatcher shares one client instance across all in-flight requests.
/// Dropping the future returned by either operation aborts the request
/// in flight.
#[async_trait]
pub(crate) trait ChatBackend: Send + Sync {
    /// Returns the backend tag this client serves.
    fn id(&self) -> BackendId;

    /// Takes a series of messages that are part of a chat conversation
    /// and produces the model's reply as text.
    ///
    /// `model`: The id of the model.
    /// `messages`: A series of messages in the conversation.
    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<String, Error>;

    /// Like [`ChatBackend::complete`], with optional tool descriptors and
    /// an optional tool-choice directive relayed verbatim. When the model
    /// answers with tool calls instead of text, the reply is the JSON
    /// serialization of those calls.
    async fn complete_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        options: &CallOptions,
        tools: Option<&[ToolSpec]>,
        tool_choice: Option<&str>,
    ) -> Result<String, Error>;
}
