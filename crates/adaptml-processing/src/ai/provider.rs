//! Text generation trait for abstracting LLM interactions.
//!
//! Summaries only ever wrap structured results that are already computed,
//! so a generator is free to fail: callers substitute a deterministic
//! template (see [`super::Summarizer`]).

use anyhow::Result;

/// A backend that turns a prompt into prose.
///
/// Implementations must be `Send + Sync` so one generator can be shared by
/// concurrent requests.
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for `prompt` under the given system
    /// instructions, bounded by `max_tokens`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable, times out, or returns
    /// no content.
    fn generate(&self, system: &str, prompt: &str, max_tokens: u32) -> Result<String>;

    /// Provider name for logging.
    fn name(&self) -> &str;

    /// The model in use, when the provider exposes one.
    fn model(&self) -> Option<&str> {
        None
    }
}
