use lazy_static::lazy_static;

use crate::catalog::catalog::ModelEntry;

lazy_static! {
    // The OpenAI /v1/models route lists far more than the chat models this
    // crate can drive, so the catalog entry is curated by hand and needs an
    // update whenever a model is added or retired.
    pub(crate) static ref OPENAI_MODELS: [ModelEntry; 1] =
        [ModelEntry::new("4O-MINI", "gpt-4o-mini")];
}
