//! Request dispatch: one deterministic lookup, one delegated call.
//!
//! The [`Exchange`] is the process-wide table built once at startup by
//! [`populate`]: the model catalog plus one live client per backend tag.
//! It is never mutated afterwards, so concurrent readers need no
//! locking. A [`Dispatcher`] is the per-request view over it — it holds
//! nothing but the requested model identifier and is cheap to construct
//! and discard.
//!
//! Every call variant runs the same two steps before touching the
//! network: resolve the identifier to a backend tag through the catalog,
//! then bind the tag to its live client. Both failures are produced
//! before any suspension, even from the asynchronous variants. Whatever
//! the bound client raises afterwards is surfaced unchanged; this module
//! neither retries nor rewraps delegated failures.
//!
//! [`populate`]: crate::catalog::populate

use std::collections::HashMap;

use thiserror::Error;
use tracing::info;

use crate::backends::backends::BackendId;
use crate::backends::{self, CallOptions, ChatBackend, ToolSpec};
use crate::catalog::catalog::Catalog;
use crate::chat::Message;

#[derive(Error, Debug)]
pub(crate) enum DispatchError {
    /// No dispatch is possible without a model identifier.
    #[error("no model was specified")]
    ModelUnset,
    /// The identifier matches no backend's catalog entries. Raised
    /// before any client is touched; choosing a valid identifier
    /// recovers.
    #[error("model \"{0}\" is not served by any of the configured backends")]
    UnresolvedModel(String),
    /// The catalog resolved a backend that has no live client. The
    /// exchange is built with a client per tag, so this indicates a
    /// construction bug rather than a usage error.
    #[error("backend \"{0}\" has no live client")]
    UnsupportedBackend(BackendId),
    /// A failure raised by the bound client during the delegated call,
    /// passed through unchanged.
    #[error(transparent)]
    Backend(#[from] backends::Error),
}

/// The immutable-after-init pairing of catalog and live clients. One
/// per process; every dispatcher borrows it.
pub(crate) struct Exchange {
    catalog: Catalog,
    clients: HashMap<BackendId, Box<dyn ChatBackend>>,
}

impl Exchange {
    pub(crate) fn new(
        catalog: Catalog,
        clients: HashMap<BackendId, Box<dyn ChatBackend>>,
    ) -> Exchange {
        Exchange { catalog, clients }
    }

    pub(crate) fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn client(&self, id: BackendId) -> Option<&dyn ChatBackend> {
        self.clients.get(&id).map(|client| client.as_ref())
    }
}

/// A per-request dispatcher bound to one model identifier.
pub(crate) struct Dispatcher<'x> {
    exchange: &'x Exchange,
    model_id: Option<String>,
}

impl<'x> Dispatcher<'x> {
    /// The identifier may be left unset at construction, but must be set
    /// before any call variant is used.
    pub(crate) fn new(exchange: &'x Exchange, model_id: Option<String>) -> Dispatcher<'x> {
        Dispatcher { exchange, model_id }
    }

    pub(crate) fn set_model(&mut self, model_id: String) {
        self.model_id = Some(model_id);
    }

    /// Resolve the held identifier and bind its live client. This is the
    /// only failure this layer introduces; it runs synchronously, ahead
    /// of any network traffic.
    fn bind(&self) -> Result<(&str, &'x dyn ChatBackend), DispatchError> {
        let model_id = self.model_id.as_deref().ok_or(DispatchError::ModelUnset)?;

        let backend = self
            .exchange
            .catalog()
            .backend_for(model_id)
            .ok_or_else(|| DispatchError::UnresolvedModel(model_id.to_string()))?;

        let client = self
            .exchange
            .client(backend)
            .ok_or(DispatchError::UnsupportedBackend(backend))?;

        info!(model = model_id, backend = %backend, "resolved model");

        Ok((model_id, client))
    }

    /// Dispatch and block the calling thread until the reply arrives.
    ///
    /// This drives the delegated call on a private current-thread
    /// runtime and therefore must not be used from async context; use
    /// [`Dispatcher::complete`] there instead.
    pub(crate) fn complete_blocking(
        &self,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<String, DispatchError> {
        let (model, client) = self.bind()?;

        let options = CallOptions {
            max_tokens,
            temperature: None,
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("failed to build dispatch runtime");

        Ok(runtime.block_on(client.complete(model, messages, &options))?)
    }

    /// Dispatch and suspend the calling task until the reply arrives.
    /// Dropping the returned future cancels the delegated call.
    pub(crate) async fn complete(
        &self,
        messages: &[Message],
        max_tokens: u32,
        temperature: f64,
    ) -> Result<String, DispatchError> {
        let (model, client) = self.bind()?;

        let options = CallOptions {
            max_tokens,
            temperature: Some(temperature),
        };

        Ok(client.complete(model, messages, &options).await?)
    }

    /// The tool-augmented variant: `tools` and `tool_choice` default to
    /// "none supplied" and are relayed to the bound client without
    /// validation or substitution.
    pub(crate) async fn complete_with_tools(
        &self,
        messages: &[Message],
        max_tokens: u32,
        tools: Option<&[ToolSpec]>,
        tool_choice: Option<&str>,
    ) -> Result<String, DispatchError> {
        let (model, client) = self.bind()?;

        let options = CallOptions {
            max_tokens,
            temperature: None,
        };

        Ok(client
            .complete_with_tools(model, messages, &options, tools, tool_choice)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::backends::{Error, ErrorKind, DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
    use crate::catalog::catalog::ModelEntry;
    use crate::chat::Role;

    #[derive(Debug, Clone)]
    struct SeenCall {
        model: String,
        messages: usize,
        temperature: Option<f64>,
        tools: Option<usize>,
        tool_choice: Option<String>,
    }

    struct StubBackend {
        id: BackendId,
        reply: Result<String, ErrorKind>,
        calls: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<SeenCall>>>,
    }

    impl StubBackend {
        fn replying(id: BackendId, reply: &str) -> StubBackend {
            StubBackend {
                id,
                reply: Ok(reply.to_string()),
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn failing(id: BackendId, kind: ErrorKind) -> StubBackend {
            StubBackend {
                reply: Err(kind),
                ..StubBackend::replying(id, "")
            }
        }

        fn record(
            &self,
            model: &str,
            messages: &[Message],
            options: &CallOptions,
            tools: Option<&[ToolSpec]>,
            tool_choice: Option<&str>,
        ) {
            self.calls.fetch_add(1, Ordering::SeqCst);

            self.seen.lock().unwrap().push(SeenCall {
                model: model.to_string(),
                messages: messages.len(),
                temperature: options.temperature,
                tools: tools.map(|tools| tools.len()),
                tool_choice: tool_choice.map(|choice| choice.to_string()),
            });
        }

        fn respond(&self) -> Result<String, Error> {
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(kind) => Err(Error::from_kind(*kind)),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for StubBackend {
        fn id(&self) -> BackendId {
            self.id
        }

        async fn complete(
            &self,
            model: &str,
            messages: &[Message],
            options: &CallOptions,
        ) -> Result<String, Error> {
            self.record(model, messages, options, None, None);

            // Yield so concurrent dispatches genuinely overlap.
            tokio::time::sleep(Duration::from_millis(5)).await;

            self.respond()
        }

        async fn complete_with_tools(
            &self,
            model: &str,
            messages: &[Message],
            options: &CallOptions,
            tools: Option<&[ToolSpec]>,
            tool_choice: Option<&str>,
        ) -> Result<String, Error> {
            self.record(model, messages, options, tools, tool_choice);

            self.respond()
        }
    }

    fn hello() -> Vec<Message> {
        vec![Message::new(Role::User, "Hello!".to_string())]
    }

    fn scenario_catalog() -> Catalog {
        Catalog::with_entries(HashMap::from([
            (
                BackendId::Groq,
                vec![ModelEntry::new("LLAMA3 8B", "llama3-8b-8192")],
            ),
            (
                BackendId::OpenAI,
                vec![ModelEntry::new("4O-MINI", "gpt-4o-mini")],
            ),
        ]))
    }

    fn exchange_of(catalog: Catalog, backends: Vec<StubBackend>) -> Exchange {
        let clients: HashMap<BackendId, Box<dyn ChatBackend>> = backends
            .into_iter()
            .map(|stub| (stub.id(), Box::new(stub) as Box<dyn ChatBackend>))
            .collect();

        Exchange::new(catalog, clients)
    }

    #[tokio::test]
    async fn dispatch_binds_the_declaring_backend() {
        let groq = StubBackend::replying(BackendId::Groq, "groq reply");
        let openai = StubBackend::replying(BackendId::OpenAI, "openai reply");

        let groq_calls = groq.calls.clone();
        let openai_calls = openai.calls.clone();
        let openai_seen = openai.seen.clone();

        let exchange = exchange_of(scenario_catalog(), vec![groq, openai]);

        let dispatcher = Dispatcher::new(&exchange, Some("gpt-4o-mini".to_string()));

        let reply = dispatcher
            .complete(&hello(), DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE)
            .await
            .unwrap();

        assert_eq!(reply, "openai reply");
        assert_eq!(openai_calls.load(Ordering::SeqCst), 1);
        assert_eq!(groq_calls.load(Ordering::SeqCst), 0);

        let seen = openai_seen.lock().unwrap();
        assert_eq!(seen[0].model, "gpt-4o-mini");
        assert_eq!(seen[0].messages, 1);
        assert_eq!(seen[0].temperature, Some(DEFAULT_TEMPERATURE));
    }

    #[tokio::test]
    async fn unresolved_model_fails_before_any_client_call() {
        let groq = StubBackend::replying(BackendId::Groq, "groq reply");
        let openai = StubBackend::replying(BackendId::OpenAI, "openai reply");

        let groq_calls = groq.calls.clone();
        let openai_calls = openai.calls.clone();

        let exchange = exchange_of(scenario_catalog(), vec![groq, openai]);

        let dispatcher = Dispatcher::new(&exchange, Some("not-a-real-model".to_string()));

        let err = dispatcher
            .complete(&hello(), DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::UnresolvedModel(model) if model == "not-a-real-model"));
        assert_eq!(groq_calls.load(Ordering::SeqCst), 0);
        assert_eq!(openai_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unset_model_is_a_resolution_failure() {
        let openai = StubBackend::replying(BackendId::OpenAI, "openai reply");
        let openai_calls = openai.calls.clone();

        let exchange = exchange_of(scenario_catalog(), vec![openai]);

        let mut dispatcher = Dispatcher::new(&exchange, None);

        let err = dispatcher
            .complete(&hello(), DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::ModelUnset));
        assert_eq!(openai_calls.load(Ordering::SeqCst), 0);

        // Setting the identifier afterwards makes the same dispatcher whole.
        dispatcher.set_model("gpt-4o-mini".to_string());

        let reply = dispatcher
            .complete(&hello(), DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE)
            .await
            .unwrap();

        assert_eq!(reply, "openai reply");
    }

    #[tokio::test]
    async fn missing_live_client_is_an_unsupported_backend() {
        // The populated exchange always carries a client per tag; build a
        // deliberately inconsistent one to pin the defensive check.
        let groq = StubBackend::replying(BackendId::Groq, "groq reply");

        let exchange = exchange_of(scenario_catalog(), vec![groq]);

        let dispatcher = Dispatcher::new(&exchange, Some("gpt-4o-mini".to_string()));

        let err = dispatcher
            .complete(&hello(), DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DispatchError::UnsupportedBackend(BackendId::OpenAI)
        ));
    }

    #[tokio::test]
    async fn absent_tool_arguments_pass_through_unchanged() {
        let openai = StubBackend::replying(BackendId::OpenAI, "openai reply");
        let openai_seen = openai.seen.clone();

        let exchange = exchange_of(scenario_catalog(), vec![openai]);

        let dispatcher = Dispatcher::new(&exchange, Some("gpt-4o-mini".to_string()));

        dispatcher
            .complete_with_tools(&hello(), DEFAULT_MAX_TOKENS, None, None)
            .await
            .unwrap();

        let tools = [ToolSpec::function(
            "get_weather".to_string(),
            "Look up the weather".to_string(),
            serde_json::json!({"type": "object"}),
        )];

        dispatcher
            .complete_with_tools(&hello(), DEFAULT_MAX_TOKENS, Some(&tools), Some("auto"))
            .await
            .unwrap();

        let seen = openai_seen.lock().unwrap();

        assert_eq!(seen[0].tools, None);
        assert_eq!(seen[0].tool_choice, None);

        assert_eq!(seen[1].tools, Some(1));
        assert_eq!(seen[1].tool_choice.as_deref(), Some("auto"));
    }

    #[tokio::test]
    async fn delegated_failures_surface_unwrapped() {
        let openai = StubBackend::failing(BackendId::OpenAI, ErrorKind::ExcessUsage);
        let openai_calls = openai.calls.clone();

        let exchange = exchange_of(scenario_catalog(), vec![openai]);

        let dispatcher = Dispatcher::new(&exchange, Some("gpt-4o-mini".to_string()));

        let err = dispatcher
            .complete(&hello(), DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE)
            .await
            .unwrap_err();

        match err {
            DispatchError::Backend(err) => {
                assert!(matches!(err.kind(), ErrorKind::ExcessUsage))
            }
            err => panic!("expected a delegated failure, got: {}", err),
        }

        assert_eq!(openai_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn blocking_variant_dispatches_without_an_ambient_runtime() {
        let openai = StubBackend::replying(BackendId::OpenAI, "openai reply");
        let openai_seen = openai.seen.clone();

        let exchange = exchange_of(scenario_catalog(), vec![openai]);

        let dispatcher = Dispatcher::new(&exchange, Some("gpt-4o-mini".to_string()));

        let reply = dispatcher
            .complete_blocking(&hello(), DEFAULT_MAX_TOKENS)
            .unwrap();

        assert_eq!(reply, "openai reply");

        // The blocking variant forwards no temperature of its own.
        let seen = openai_seen.lock().unwrap();
        assert_eq!(seen[0].temperature, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_dispatches_are_independent() {
        let mut catalog = scenario_catalog();
        catalog.set_local_models(vec![ModelEntry::new("llama3:8b", "llama3:8b")]);

        let groq = StubBackend::replying(BackendId::Groq, "groq reply");
        let openai = StubBackend::failing(BackendId::OpenAI, ErrorKind::InternalError);
        let ollama = StubBackend::replying(BackendId::Ollama, "ollama reply");

        let calls = [
            groq.calls.clone(),
            openai.calls.clone(),
            ollama.calls.clone(),
        ];

        let exchange = Arc::new(exchange_of(catalog, vec![groq, openai, ollama]));

        let mut handles = Vec::new();

        for model in ["llama3-8b-8192", "gpt-4o-mini", "llama3:8b"] {
            let exchange = exchange.clone();

            handles.push(tokio::spawn(async move {
                let dispatcher = Dispatcher::new(&exchange, Some(model.to_string()));

                dispatcher
                    .complete(&hello(), DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE)
                    .await
            }));
        }

        let results: Vec<Result<String, DispatchError>> = {
            let mut results = Vec::new();
            for handle in handles {
                results.push(handle.await.unwrap());
            }
            results
        };

        // One backend's failure affects only its own dispatch.
        assert_eq!(results[0].as_deref().unwrap(), "groq reply");
        assert!(matches!(results[1], Err(DispatchError::Backend(_))));
        assert_eq!(results[2].as_deref().unwrap(), "ollama reply");

        for calls in calls {
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }
}
