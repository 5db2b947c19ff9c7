//! Foundry Core - sentinel-gated code generation
//!
//! The orchestrator that:
//! - Runs single-shot generation with a scan-and-retry feedback loop
//! - Fans multiple agents into one ordered event stream
//! - Gates every write through the security sentinel
//! - Persists only inside the sandbox, versioning overwritten files
//!
//! Model backends are external; implement [`ModelBackend`] to plug one in.
//!
//! # Example
//!
//! ```rust,ignore
//! use foundry_core::{FoundryConfig, Orchestrator, StreamRequest};
//! use futures::StreamExt;
//!
//! # async fn example(backend: std::sync::Arc<dyn foundry_core::ModelBackend>) -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::open("/srv/project", FoundryConfig::default(), backend)?;
//!
//! let result = orchestrator
//!     .generate_and_validate("Write a CSV parser", "parser.py", &[])
//!     .await;
//! println!("{} after {} attempt(s)", result.message, result.attempts);
//!
//! let mut events = orchestrator.stream_generate(StreamRequest::new("Add tests")).await;
//! while let Some(event) = events.next().await {
//!     print!("{}", event.to_ndjson_line()?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

// Core modules
pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod extract;
pub mod model;
pub mod orchestrator;
pub mod prompt;
mod stream;
pub mod telemetry;
pub mod types;

// Re-exports for convenience
pub use agent::{default_agents, Agent, AgentStore, AgentUpdate};
pub use config::{
    ContextConfig, FoundryConfig, GenerationConfig, HistoryConfig, LoggingConfig, SandboxConfig,
};
pub use error::{AgentStoreError, ConfigError, FoundryError, ModelError};
pub use event::{EventStream, StreamEvent};
pub use extract::{extract, Extracted};
pub use model::{ChunkStream, Completion, ContentPart, ModelBackend, ModelRequest};
pub use orchestrator::Orchestrator;
pub use prompt::{build_feedback_prompt, REMEDIATION_CHECKLIST_V1};
pub use telemetry::init_tracing;
pub use types::{
    Attachment, AttachmentKind, GenerationResult, Mode, OrchestratorStatus, SaveOutcome,
    StreamRequest, TokenMeter,
};

pub use foundry_sandbox::{BackupEntry, FileStore, HistoryStore, SandboxError, VersionedStore};
pub use foundry_sentinel::{ScanReport, SecurityThreat, Sentinel, Severity, ThreatCategory};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Foundry Core
    pub use crate::{
        Agent, Attachment, FoundryConfig, GenerationResult, ModelBackend, Orchestrator,
        StreamEvent, StreamRequest,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
