use std::collections::HashMap;
use std::env::VarError;

use crate::die;

use super::catalog::{Catalog, ModelEntry};
use crate::backends::backends::{BackendId, GroqClient, OllamaClient, OpenAIClient};
use crate::backends::{ChatBackend, ErrorKind};
use crate::config::Config;
use crate::dispatch::Exchange;

const GROQ_KEY_VAR: &str = "GROQ_API_KEY";
const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
const OPENAI_BASE_VAR: &str = "OPENAI_BASE_URL";
const OLLAMA_HOST_VAR: &str = "OLLAMA_HOST";

fn env_value(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(value) => Some(value),
        Err(err) => match err {
            VarError::NotUnicode(_) => die!("failed to parse {}", var),
            VarError::NotPresent => None,
        },
    }
}

/// Ask the local daemon for its installed models. `None` means the
/// daemon is unreachable; any other failure is reported but treated the
/// same way, since a misbehaving daemon should not serve models either.
async fn ollama_models_if_awake(ollama: &OllamaClient) -> Option<Vec<ModelEntry>> {
    match ollama.installed_models().await {
        Ok(models) => Some(models),
        Err(err) => {
            if !matches!(err.kind(), ErrorKind::Connection | ErrorKind::TimedOut) {
                crate::warn!("unexpected response while probing ollama: {}", err);
            }

            None
        }
    }
}

/// Build the exchange the process will serve requests from: the three
/// live clients (constructed exactly once, keyed by every backend tag)
/// and the catalog, enriched with the local daemon's models when the
/// one-shot startup probe finds it awake. Readiness is never re-checked;
/// a daemon started later is picked up on the next process start.
pub(crate) async fn populated_exchange(config: &Config) -> Exchange {
    let groq = {
        let api_key = config.groq.api_key.clone().or_else(|| env_value(GROQ_KEY_VAR));

        match &config.groq.api_base {
            Some(api_base) => match GroqClient::new(api_key, api_base.as_str()) {
                Ok(groq) => groq,
                Err(err) => die!("groq API base failed to parse: {}", err),
            },
            None => GroqClient::with_api_key(api_key),
        }
    };

    let openai = {
        let api_key = config
            .openai
            .api_key
            .clone()
            .or_else(|| env_value(OPENAI_KEY_VAR));
        let api_base = config
            .openai
            .api_base
            .clone()
            .or_else(|| env_value(OPENAI_BASE_VAR));

        match api_base {
            Some(api_base) => match OpenAIClient::new(api_key, api_base.as_str()) {
                Ok(openai) => openai,
                Err(err) => die!("openai API base failed to parse: {}", err),
            },
            None => OpenAIClient::with_api_key(api_key),
        }
    };

    let ollama = {
        let api_base = config
            .ollama
            .api_base
            .clone()
            .or_else(|| env_value(OLLAMA_HOST_VAR));

        match api_base {
            Some(api_base) => match OllamaClient::with_api_base(api_base.as_str()) {
                Ok(ollama) => ollama,
                Err(err) => die!("ollama API base failed to parse: {}", err),
            },
            None => OllamaClient::new(),
        }
    };

    let mut catalog = Catalog::new();

    if let Some(models) = ollama_models_if_awake(&ollama).await {
        catalog.set_local_models(models);
    }

    let clients: HashMap<BackendId, Box<dyn ChatBackend>> = HashMap::from([
        (BackendId::Groq, Box::new(groq) as Box<dyn ChatBackend>),
        (BackendId::OpenAI, Box::new(openai) as Box<dyn ChatBackend>),
        (BackendId::Ollama, Box::new(ollama) as Box<dyn ChatBackend>),
    ]);

    Exchange::new(catalog, clients)
}
