//! Model capability seam
//!
//! Language-model backends are external. The orchestrator only sees
//! [`ModelBackend`]: one blocking-style completion call and one streaming call.

use crate::error::ModelError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Stream of text chunks from a backend
pub type ChunkStream = BoxStream<'static, Result<String, ModelError>>;

/// One part of the user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    /// Plain text
    Text {
        /// Text content
        text: String,
    },
    /// Image reference (URL or data URL)
    Image {
        /// Image location
        url: String,
    },
}

impl ContentPart {
    /// Text part
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Image part
    #[inline]
    #[must_use]
    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { url: url.into() }
    }

    /// Text content, if this is a text part
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// A generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Backend model id
    pub model: String,
    /// System instructions
    pub system: String,
    /// User message parts
    pub content: Vec<ContentPart>,
    /// Sampling temperature
    pub temperature: f32,
}

impl ModelRequest {
    /// Text-only request
    #[must_use]
    pub fn new(model: impl Into<String>, system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            content: vec![ContentPart::text(prompt)],
            temperature: 0.3,
        }
    }

    /// With temperature
    #[inline]
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// With additional content parts
    #[inline]
    #[must_use]
    pub fn with_parts(mut self, parts: impl IntoIterator<Item = ContentPart>) -> Self {
        self.content.extend(parts);
        self
    }

    /// All text parts joined by blank lines
    #[must_use]
    pub fn prompt_text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentPart::as_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// A finished completion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Tokens billed for the call
    pub total_tokens: u64,
}

impl Completion {
    /// Create completion
    #[inline]
    #[must_use]
    pub fn new(text: impl Into<String>, total_tokens: u64) -> Self {
        Self {
            text: text.into(),
            total_tokens,
        }
    }
}

/// Black-box language-model capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Generate a full response
    async fn complete(&self, request: ModelRequest) -> Result<Completion, ModelError>;

    /// Generate a response as a stream of text chunks
    async fn stream(&self, request: ModelRequest) -> Result<ChunkStream, ModelError>;
}
