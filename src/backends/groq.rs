//! The hosted Groq backend.
//!
//! Groq exposes the OpenAI chat-completions protocol under an `/openai`
//! prefix, so the wire handling lives in [`super::oaichat`] and this
//! client only supplies the endpoint, credentials, and catalog.

pub(crate) mod models;

use async_trait::async_trait;
use reqwest::IntoUrl;

use super::backends::BackendId;
use super::oaichat::{self, ChatCompletionsApi, ChatMessage};
use crate::backends::{CallOptions, ChatBackend, Error, ToolSpec};
use crate::chat::Message;

const DEFAULT_API_BASE: &str = "https://api.groq.com";
const CHAT_ROUTE: &str = "/openai/v1/chat/completions";

pub(crate) struct GroqClient {
    api: ChatCompletionsApi,
}

impl GroqClient {
    pub(crate) fn new<U: IntoUrl>(
        api_key: Option<String>,
        api_base: U,
    ) -> Result<GroqClient, Error> {
        Ok(GroqClient {
            api: ChatCompletionsApi::new(api_base, CHAT_ROUTE, api_key)?,
        })
    }

    pub(crate) fn with_api_key(api_key: Option<String>) -> GroqClient {
        Self::new(api_key, DEFAULT_API_BASE).unwrap()
    }
}

#[async_trait]
impl ChatBackend for GroqClient {
    fn id(&self) -> BackendId {
        BackendId::Groq
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
