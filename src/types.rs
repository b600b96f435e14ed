//! Core types for image generation.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Image provider kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI image models (DALL-E), synchronous request/response.
    OpenAi,
    /// Replicate-hosted Stable Diffusion, submit/poll/retrieve.
    Replicate,
}

impl ProviderKind {
    /// Returns the stable lowercase id for this provider.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Replicate => "replicate",
        }
    }

    /// Returns the human-readable provider name for display.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI DALL-E",
            Self::Replicate => "Stable Diffusion",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Supported square image sizes.
///
/// Both providers accept the same three sizes, expressed as a single
/// `"WxH"` token. Width and height are positive by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageSize {
    /// 256x256 pixels.
    #[serde(rename = "256x256")]
    Small,
    /// 512x512 pixels.
    #[serde(rename = "512x512")]
    Medium,
    /// 1024x1024 pixels (default).
    #[default]
    #[serde(rename = "1024x1024")]
    Large,
}

impl ImageSize {
    /// Returns the size as a `"WxH"` token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Small => "256x256",
            Self::Medium => "512x512",
            Self::Large => "1024x1024",
        }
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        match self {
            Self::Small => 256,
            Self::Medium => 512,
            Self::Large => 1024,
        }
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.width()
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ImageSize {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "256x256" => Ok(Self::Small),
            "512x512" => Ok(Self::Medium),
            "1024x1024" => Ok(Self::Large),
            other => Err(Error::Validation(format!(
                "unsupported size token: {other} (expected 256x256, 512x512 or 1024x1024)"
            ))),
        }
    }
}

/// A request to generate an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The text prompt describing the desired image. Must be non-empty;
    /// validated by the orchestrator before any network call.
    pub prompt: String,
    /// The provider that should fulfill this request.
    pub provider: ProviderKind,
    /// Desired image size.
    pub size: ImageSize,
    /// Whether to append the artistic style suffix to the prompt.
    pub style_modifier: bool,
}

impl GenerationRequest {
    /// Creates a new request with the given prompt and provider.
    pub fn new(prompt: impl Into<String>, provider: ProviderKind) -> Self {
        Self {
            prompt: prompt.into(),
            provider,
            size: ImageSize::default(),
            style_modifier: false,
        }
    }

    /// Sets the desired image size.
    pub fn with_size(mut self, size: ImageSize) -> Self {
        self.size = size;
        self
    }

    /// Enables the artistic style modifier.
    pub fn with_style_modifier(mut self, enabled: bool) -> Self {
        self.style_modifier = enabled;
        self
    }
}

/// A successfully generated image.
///
/// Created once per successful generation and never mutated afterwards; the
/// caller owns it for the rest of the session.
#[derive(Debug, Clone, Serialize)]
#[must_use = "generated image URL should be rendered or stored by the caller"]
pub struct GenerationResult {
    /// Location of the generated image.
    pub image_url: String,
    /// The prompt as submitted to the provider, including any style suffix.
    pub prompt: String,
    /// Size the image was generated at.
    pub size: ImageSize,
    /// Whether the style modifier was applied.
    pub style_modifier: bool,
    /// Provider that generated this image.
    pub provider: ProviderKind,
}

/// In-memory credential lookup, one opaque key per provider.
///
/// Persistent storage is the caller's concern; this type is only the lookup
/// interface the orchestrator consults before dispatching. Empty strings
/// count as missing.
#[derive(Debug, Clone, Default)]
pub struct CredentialMap {
    keys: HashMap<ProviderKind, String>,
}

impl CredentialMap {
    /// Creates an empty credential map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the credential for a provider, replacing any previous value.
    pub fn insert(&mut self, provider: ProviderKind, key: impl Into<String>) {
        self.keys.insert(provider, key.into());
    }

    /// Looks up the credential for a provider. Empty values are treated as
    /// absent.
    pub fn get(&self, provider: ProviderKind) -> Option<&str> {
        self.keys
            .get(&provider)
            .map(String::as_str)
            .filter(|k| !k.is_empty())
    }
}
