//! Natural-language summaries of profiles and trained models.
//!
//! The [`TextGenerator`] trait and the template-backed [`Summarizer`] are
//! always available. The OpenRouter client needs the `ai` feature:
//!
//! ```toml
//! # Enable the OpenRouter provider (default)
//! adaptml-processing = { version = "0.1", features = ["ai"] }
//!
//! # Templates only, no HTTP client
//! adaptml-processing = { version = "0.1", default-features = false }
//! ```

mod provider;
mod summary;

pub use provider::TextGenerator;
pub use summary::{
    DatasetFacts, ModelFacts, ProjectInsights, Summarizer, display_algorithm,
    fallback_dataset_summary, fallback_insights, fallback_model_summary, quality_label,
};

#[cfg(feature = "ai")]
mod openrouter;

#[cfg(feature = "ai")]
pub use openrouter::{API_KEY_ENV, OpenRouterConfig, OpenRouterConfigBuilder, OpenRouterProvider};
