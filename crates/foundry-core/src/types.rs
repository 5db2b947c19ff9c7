//! Core request and result types for Foundry

use foundry_sentinel::SecurityThreat;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Attachment kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    /// Image; `data` is a URL or data URL
    Image,
    /// Supplementary text file; `data` is its content
    File,
}

/// Extra material supplied with a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Display name
    pub name: String,
    /// Kind
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    /// Payload
    pub data: String,
}

impl Attachment {
    /// Text file attachment
    #[must_use]
    pub fn file(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttachmentKind::File,
            data: content.into(),
        }
    }

    /// Image attachment
    #[must_use]
    pub fn image(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: AttachmentKind::Image,
            data: url.into(),
        }
    }
}

/// Outcome of a single-shot generation
///
/// Always returned, never raised: failures carry `success = false` and a message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Safe code (or a code-free answer) was produced
    pub success: bool,
    /// Approved code
    pub code: Option<String>,
    /// Prose around the code
    pub explanation: Option<String>,
    /// Threats from the last scan
    pub threats: Vec<SecurityThreat>,
    /// Attempts made
    pub attempts: u32,
    /// Tokens used across all attempts
    pub tokens_used: u64,
    /// Human-readable status
    pub message: String,
    /// Code awaits explicit persistence
    pub pending_approval: bool,
    /// Backup taken when the code was applied
    pub backup_path: Option<PathBuf>,
}

impl GenerationResult {
    /// Failed result with a message
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }
}

/// Outcome of a manual save
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    /// Content was written
    pub success: bool,
    /// Human-readable status
    pub message: String,
    /// Backup of the previous content
    pub backup_path: Option<PathBuf>,
    /// Threats found in the content
    pub threats: Vec<SecurityThreat>,
}

/// Streaming run mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Propose changes
    #[default]
    Act,
    /// Plan only, no code
    Planning,
}

/// Streaming multi-agent request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamRequest {
    /// User request
    pub prompt: String,
    /// Target file; empty for project-wide context
    pub target_file: String,
    /// Extra material
    pub attachments: Vec<Attachment>,
    /// Explicit agent selection; empty means all active agents
    pub agent_ids: Vec<String>,
    /// Model override for every agent
    pub model: Option<String>,
    /// Run mode
    pub mode: Mode,
}

impl StreamRequest {
    /// Create request
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    /// With target file
    #[inline]
    #[must_use]
    pub fn with_target_file(mut self, target: impl Into<String>) -> Self {
        self.target_file = target.into();
        self
    }

    /// With explicit agents
    #[inline]
    #[must_use]
    pub fn with_agents<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agent_ids = ids.into_iter().map(Into::into).collect();
        self
    }

    /// With model override
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// With mode
    #[inline]
    #[must_use]
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// With attachment
    #[inline]
    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Snapshot for status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorStatus {
    /// Tokens used since the orchestrator was created
    pub total_tokens: u64,
    /// Primary root
    pub project_dir: String,
    /// Current single-shot model
    pub model: String,
    /// Listed project files
    pub files: Vec<String>,
}

/// Running token total owned by one orchestrator
#[derive(Debug, Clone, Default)]
pub struct TokenMeter {
    total: Arc<AtomicU64>,
}

impl TokenMeter {
    /// Create meter at zero
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add tokens; returns the new total
    #[inline]
    pub fn add(&self, tokens: u64) -> u64 {
        self.total.fetch_add(tokens, Ordering::Relaxed) + tokens
    }

    /// Current total
    #[inline]
    #[must_use]
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}
