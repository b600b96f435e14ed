//! OpenAI image generation provider (DALL-E 3).
//!
//! One synchronous request: either an image URL comes back immediately or
//! the attempt is over. No intermediate state, no polling.

use crate::error::{Error, Result};
use crate::progress::ProgressSink;
use crate::provider::{ImageProvider, ProviderRequest};
use crate::types::ProviderKind;
use serde::{Deserialize, Serialize};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const MODEL: &str = "dall-e-3";

/// Builder for [`OpenAiProvider`].
#[derive(Debug, Clone)]
pub struct OpenAiProviderBuilder {
    api_key: Option<String>,
    base_url: String,
}

impl Default for OpenAiProviderBuilder {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl OpenAiProviderBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to the `OPENAI_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Overrides the API base URL (primarily for tests).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Builds the provider, resolving the API key.
    pub fn build(self) -> Result<OpenAiProvider> {
        let api_key = self
            .api_key
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or(Error::MissingCredential(ProviderKind::OpenAi))?;

        Ok(OpenAiProvider {
            client: reqwest::Client::new(),
            api_key,
            base_url: self.base_url,
        })
    }
}

/// OpenAI image generation provider.
#[derive(Debug)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    /// Creates a new `OpenAiProviderBuilder`.
    pub fn builder() -> OpenAiProviderBuilder {
        OpenAiProviderBuilder::new()
    }
}

#[async_trait::async_trait]
impl ImageProvider for OpenAiProvider {
    async fn generate(
        &self,
        request: &ProviderRequest,
        _progress: &ProgressSink,
    ) -> Result<String> {
        let url = format!("{}/images/generations", self.base_url);
        let body = OpenAiImageRequest::from_request(request);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Provider {
                status: status.as_u16(),
                message,
            });
        }

        let openai_response: OpenAiImageResponse = response.json().await?;

        let image_url = openai_response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| Error::Provider {
                status: status.as_u16(),
                message: "response contained no image URL".into(),
            })?;

        tracing::debug!(url = %image_url, "OpenAI image generation complete");
        Ok(image_url)
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }
}

#[derive(Debug, Serialize)]
struct OpenAiImageRequest {
    model: &'static str,
    prompt: String,
    size: &'static str,
    quality: &'static str,
    n: u32,
}

impl OpenAiImageRequest {
    fn from_request(request: &ProviderRequest) -> Self {
        Self {
            model: MODEL,
            prompt: request.prompt.clone(),
            size: request.size.as_str(),
            quality: "standard",
            n: 1,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiImageResponse {
    data: Vec<OpenAiImageData>,
}

#[derive(Debug, Deserialize)]
struct OpenAiImageData {
    #[serde(default)]
    url: Option<String>,
}
