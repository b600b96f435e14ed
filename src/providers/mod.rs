//! Image generation provider clients.

mod openai;
mod replicate;

pub use openai::{OpenAiProvider, OpenAiProviderBuilder};
pub use replicate::{ReplicateProvider, ReplicateProviderBuilder};
