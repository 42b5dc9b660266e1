//! Upstream narrative providers.
//!
//! [`NarrativeProvider`] is the seam between orchestration and the
//! generative upstream; [`CompletionsClient`] is the production
//! implementation speaking the OpenAI-compatible streaming wire format.

mod completions;
mod traits;

pub use completions::CompletionsClient;
pub use traits::NarrativeProvider;
