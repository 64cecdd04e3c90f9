use lazy_static::lazy_static;

use crate::catalog::catalog::ModelEntry;

lazy_static! {
    // Groq's hosted lineup, labeled for listings. Groq retires models on
    // short notice, so stale entries here surface as NotFound at call time.
    pub(crate) static ref GROQ_MODELS: [ModelEntry; 8] = [
        ModelEntry::new("LLAMA3 8B", "llama3-8b-8192"),
        ModelEntry::new("LLAMA3 70B", "llama3-70b-8192"),
        ModelEntry::new("LLAMA3.1 70B", "llama-3.1-70b-versatile"),
        ModelEntry::new("LLAMA3.1 8B", "llama-3.1-8b-instant"),
        ModelEntry::new("LLAMA3.3 70B", "llama-3.3-70b-specdec"),
        ModelEntry::new("LLAMA2 70B", "llama2-70b-4096"),
        ModelEntry::new("Mixtral", "mixtral-8x7b-32768"),
        ModelEntry::new("GEMMA 7B", "gemma-7b-it"),
    ];
}
