//! Concrete backend types, along with their identifying tags

use strum_macros;

/// The `BackendId` is the tag naming one serving backend. It is the join
/// key between the model catalog and the live-client table, and its
/// `Display`/`FromStr` forms are part of the CLI surface.
///
/// The declaration order below is load-bearing: `BackendId::iter()` fixes
/// the scan order of catalog resolution for the life of the process.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Hash,
    Clone,
    Copy,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub(crate) enum BackendId {
    Groq,
    OpenAI,
    Ollama,
}

pub(crate) use super::groq::GroqClient;
pub(crate) use super::ollama::OllamaClient;
pub(crate) use super::openai::OpenAIClient;

pub(crate) use super::groq::models::GROQ_MODELS;
pub(crate) use super::openai::models::OPENAI_MODELS;
