//! The local Ollama backend.
//!
//! Unlike the hosted backends there is no curated catalog: the daemon is
//! asked once, at startup, which models it has installed. If it cannot be
//! reached the backend simply serves no models for the life of the process.

mod api;

use async_trait::async_trait;
use reqwest::IntoUrl;

use self::api::OllamaApi;
use super::backends::BackendId;
use crate::backends::{CallOptions, ChatBackend, Error, ErrorKind, ToolSpec};
use crate::catalog::catalog::ModelEntry;
use crate::chat::Message;

impl From<api::Error> for Error {
    fn from(value: api::Error) -> Self {
        let kind = match &value {
            api::Error::InvalidApiBase(_) | api::Error::InvalidEndpoint(_) => {
                Some(ErrorKind::Connection)
            }
            api::Error::NotFound(_) => Some(ErrorKind::NotFound),
            api::Error::BadRequest(_) => Some(ErrorKind::BadRequest),
            api::Error::InternalError(_) => Some(ErrorKind::InternalError),
            api::Error::UnspecifiedError(_) => Some(ErrorKind::UnspecifiedError),
            api::Error::ToolCallEncoding(_) => Some(ErrorKind::UnexpectedResponse),
            api::Error::RequestFailed(_) => None,
        };

        match value {
            api::Error::RequestFailed(err) => err.into(),
            value => Error::from_source(kind.unwrap(), Box::new(value)),
        }
    }
}

pub(crate) struct OllamaClient {
    api: OllamaApi,
}

impl OllamaClient {
    pub(crate) fn with_api_base<U: IntoUrl>(api_base: U) -> Result<OllamaClient, Error> {
        Ok(OllamaClient {
            api: OllamaApi::with_api_base(api_base)?,
        })
    }

    pub(crate) fn new() -> OllamaClient {
        OllamaClient {
            api: OllamaApi::new(),
        }
    }

    /// The models installed on the daemon, as catalog entries. A
    /// Connection- or TimedOut-kind failure here means the daemon is not
    /// running; the startup probe treats that as "backend not ready".
    pub(crate) async fn installed_models(&self) -> Result<Vec<ModelEntry>, Error> {
        let tags = self.api.tags().await?;

        let models = tags
            .into_iter()
            .map(|tag| ModelEntry::new(&tag.name, &tag.name))
            .collect();

        Ok(models)
    }
}

#[async_trait]
impl ChatBackend for OllamaClient {
    fn id(&self) -> BackendId {
        BackendId::Ollama
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<String, Error> {
        let messages: Vec<api::ChatMessage> = messages.iter().map(Into::into).collect();

        let response = self.api.chat(model, &messages, options, None).await?;

        Ok(api::response_text(response)?)
    }

    async fn complete_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        options: &CallOptions,
        tools: Option<&[ToolSpec]>,
        _tool_choice: Option<&str>,
    ) -> Result<String, Error> {
        // The Ollama chat API has no tool_choice field; the directive is
        // this client's to interpret, and it has nothing to attach it to.
        let messages: Vec<api::ChatMessage> = messages.iter().map(Into::into).collect();

        let response = self.api.chat(model, &messages, options, tools).await?;

        Ok(api::response_text(response)?)
    }
}
