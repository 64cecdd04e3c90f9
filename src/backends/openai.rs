//! The hosted OpenAI backend.

pub(crate) mod models;

use async_trait::async_trait;
use reqwest::IntoUrl;

use super::backends::BackendId;
use super::oaichat::{self, ChatCompletionsApi, ChatMessage};
use crate::backends::{CallOptions, ChatBackend, Error, ToolSpec};
use crate::chat::Message;

const DEFAULT_API_BASE: &str = "https://api.openai.com";
const CHAT_ROUTE: &str = "/v1/chat/completions";

pub(crate) struct OpenAIClient {
    api: ChatCompletionsApi,
}

impl OpenAIClient {
    pub(crate) fn new<U: IntoUrl>(
        api_key: Option<String>,
        api_base: U,
    ) -> Result<OpenAIClient, Error> {
        Ok(OpenAIClient {
            api: ChatCompletionsApi::new(api_base, CHAT_ROUTE, api_key)?,
        })
    }

    pub(crate) fn with_api_key(api_key: Option<String>) -> OpenAIClient {
        Self::new(api_key, DEFAULT_API_BASE).unwrap()
    }
}

#[async_trait]
impl ChatBackend for OpenAIClient {
    fn id(&self) -> BackendId {
        BackendId::OpenAI
    }

    async fn complete(
        &self,
        model: &str,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<String, Error> {
        let messages: Vec<ChatMessage> = messages.iter().map(Into::into).collect();

        let completion = self
            .api
            .chat_completion(model, &messages, options, None, None)
            .await?;

        Ok(oaichat::response_text(completion)?)
    }

    async fn complete_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        options: &CallOptions,
        tools: Option<&[ToolSpec]>,
        tool_choice: Option<&str>,
    ) -> Result<String, Error> {
        let messages: Vec<ChatMessage> = messages.iter().map(Into::into).collect();

        let completion = self
            .api
            .chat_completion(model, &messages, options, tools, tool_choice)
            .await?;

        Ok(oaichat::response_text(completion)?)
    }
}
