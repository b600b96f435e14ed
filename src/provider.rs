//! Image provider trait.

use crate::error::Result;
use crate::progress::ProgressSink;
use crate::types::{ImageSize, ProviderKind};
use async_trait::async_trait;

/// A normalized request handed to a provider client.
///
/// The orchestrator has already validated the prompt and applied any style
/// augmentation by the time a provider sees this.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    /// The fully assembled prompt to submit.
    pub prompt: String,
    /// Desired image size.
    pub size: ImageSize,
}

/// Trait for image generation provider clients.
///
/// The two implementations follow very different protocols (one synchronous
/// call versus submit/poll/retrieve) but share this one capability surface;
/// dispatch happens on [`ProviderKind`], not on a deeper class hierarchy.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Generates an image and returns its URL.
    ///
    /// Intermediate progress, if the protocol has any, is emitted through
    /// `progress`; the final image location is the return value. Failures
    /// are final for the attempt: nothing in the core retries.
    async fn generate(&self, request: &ProviderRequest, progress: &ProgressSink)
        -> Result<String>;

    /// Returns the kind of this provider.
    fn kind(&self) -> ProviderKind;

    /// Returns the name of this provider for display.
    fn name(&self) -> &'static str {
        self.kind().display_name()
    }
}
