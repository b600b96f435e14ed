#![warn(missing_docs)]
//! artgen - prompt-to-image generation over heterogeneous providers.
//!
//! This crate turns a text prompt into a generated image URL using one of
//! two providers behind a single interface: OpenAI DALL-E (one synchronous
//! request) or Replicate-hosted Stable Diffusion (submit a prediction, poll
//! it to completion). Progress events stream to the caller over a channel
//! while a generation is in flight.
//!
//! # Quick Start
//!
//! ```no_run
//! use artgen::{CredentialMap, GenerationRequest, Orchestrator, ProviderKind};
//!
//! #[tokio::main]
//! async fn main() -> artgen::Result<()> {
//!     let mut credentials = CredentialMap::new();
//!     credentials.insert(ProviderKind::OpenAi, "sk-...");
//!
//!     let orchestrator = Orchestrator::new();
//!     let request = GenerationRequest::new("A golden retriever puppy", ProviderKind::OpenAi);
//!     let result = orchestrator.generate(&request, &credentials, None).await?;
//!     println!("{}", result.image_url);
//!     Ok(())
//! }
//! ```
//!
//! # Observing Progress
//!
//! ```no_run
//! use artgen::{CredentialMap, GenerationRequest, Orchestrator, ProviderKind};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> artgen::Result<()> {
//!     let mut credentials = CredentialMap::new();
//!     credentials.insert(ProviderKind::Replicate, "r8_...");
//!
//!     let (tx, mut rx) = mpsc::unbounded_channel::<artgen::ProgressEvent>();
//!     tokio::spawn(async move {
//!         while let Some(event) = rx.recv().await {
//!             eprintln!("{}% {}", event.percentage, event.status);
//!         }
//!     });
//!
//!     let orchestrator = Orchestrator::new();
//!     let request = GenerationRequest::new("A cat astronaut", ProviderKind::Replicate);
//!     let result = orchestrator.generate(&request, &credentials, Some(tx)).await?;
//!     println!("{}", result.image_url);
//!     Ok(())
//! }
//! ```

mod error;
mod orchestrator;
mod progress;
mod provider;
pub mod providers;
mod types;

pub use error::{Error, Result};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
pub use progress::{ProgressEvent, ProgressSender, ProgressSink};
pub use provider::{ImageProvider, ProviderRequest};
pub use providers::{
    OpenAiProvider, OpenAiProviderBuilder, ReplicateProvider, ReplicateProviderBuilder,
};
pub use types::{CredentialMap, GenerationRequest, GenerationResult, ImageSize, ProviderKind};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::orchestrator::Orchestrator;
    pub use crate::progress::ProgressEvent;
    pub use crate::provider::ImageProvider;
    pub use crate::types::{
        CredentialMap, GenerationRequest, GenerationResult, ImageSize, ProviderKind,
    };
}
