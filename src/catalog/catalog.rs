use std::collections::HashMap;

use strum::IntoEnumIterator;

use crate::backends::backends::{BackendId, GROQ_MODELS, OPENAI_MODELS};

/// One catalog entry: a display label and the exact identifier the
/// owning backend expects. Identifiers are opaque here beyond equality.
#[derive(Debug, Clone)]
pub(crate) struct ModelEntry {
    /// Human-readable name, for listings only
    pub label: String,
    /// The identifier passed through to the backend
    pub id: String,
}

impl ModelEntry {
    pub(crate) fn new(label: &str, id: &str) -> ModelEntry {
        ModelEntry {
            label: label.to_string(),
            id: id.to_string(),
        }
    }
}

/// The per-backend model catalog. Constructed once at startup; the only
/// mutation is the one-shot local-backend enrichment performed during
/// population.
pub(crate) struct Catalog {
    entries: HashMap<BackendId, Vec<ModelEntry>>,
}

impl Catalog {
    /// A catalog holding the curated hosted-backend entries and an empty
    /// local-backend listing.
    pub(crate) fn new() -> Catalog {
        Catalog::with_entries(HashMap::from([
            (BackendId::Groq, GROQ_MODELS.to_vec()),
            (BackendId::OpenAI, OPENAI_MODELS.to_vec()),
        ]))
    }

    /// A catalog over explicit entries. Backends absent from `entries`
    /// are present with an empty listing, so the tag set is always the
    /// full [`BackendId`] set.
    pub(crate) fn with_entries(mut entries: HashMap<BackendId, Vec<ModelEntry>>) -> Catalog {
        for id in BackendId::iter() {
            entries.entry(id).or_default();
        }

        Catalog { entries }
    }

    /// Replace the local backend's listing with what the daemon reports.
    /// Startup population calls this at most once; the catalog is not to
    /// be mutated afterwards.
    pub(crate) fn set_local_models(&mut self, models: Vec<ModelEntry>) {
        self.entries.insert(BackendId::Ollama, models);
    }

    pub(crate) fn models_for(&self, id: BackendId) -> &[ModelEntry] {
        self.entries
            .get(&id)
            .map(|models| models.as_slice())
            .unwrap_or(&[])
    }

    /// Every backend tag with its listing, in scan order.
    pub(crate) fn backends(&self) -> impl Iterator<Item = (BackendId, &[ModelEntry])> {
        BackendId::iter().map(move |id| (id, self.models_for(id)))
    }

    /// Resolve a model identifier to the backend that declares it.
    ///
    /// Backends are scanned in declaration order, entries in listed
    /// order; the first entry whose identifier is exactly equal wins.
    /// An identifier declared by two backends resolves to the earlier
    /// one, silently. No match is an absence, not an error.
    pub(crate) fn backend_for(&self, model_id: &str) -> Option<BackendId> {
        for (backend, models) in self.backends() {
            for model in models {
                if model.id == model_id {
                    return Some(backend);
                }
            }
        }

        None
    }
}
