//! Streaming producers
//!
//! One producer per agent. Each forwards its chunks to the shared channel,
//! scans the finished output once, and converts every failure (including a
//! panic) into an `error` event so siblings are unaffected.

use crate::agent::Agent;
use crate::event::StreamEvent;
use crate::extract::extract;
use crate::model::{ModelBackend, ModelRequest};
use dashmap::DashMap;
use foundry_sentinel::Sentinel;
use futures::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything one producer needs, owned
pub(crate) struct Producer {
    pub(crate) agent: Agent,
    pub(crate) request: ModelRequest,
    pub(crate) filename: String,
    pub(crate) model: Arc<dyn ModelBackend>,
    pub(crate) sentinel: Arc<Sentinel>,
    pub(crate) usage: Arc<DashMap<String, u64>>,
    pub(crate) tx: mpsc::Sender<StreamEvent>,
}

/// Receiver went away; stop quietly
struct Disconnected;

enum Failure {
    Disconnected,
    Message(String),
}

impl From<Disconnected> for Failure {
    fn from(_: Disconnected) -> Self {
        Self::Disconnected
    }
}

impl Producer {
    /// Run to completion, reporting failures as events
    pub(crate) async fn run(self) {
        let agent_id = self.agent.id.clone();
        let agent_name = self.agent.name.clone();
        let tx = self.tx.clone();
        tracing::info!(agent = %agent_name, model = %self.request.model, "producer started");

        let outcome = AssertUnwindSafe(self.produce()).catch_unwind().await;
        let message = match outcome {
            Ok(Ok(())) => {
                tracing::info!(agent = %agent_name, "producer finished");
                return;
            }
            Ok(Err(Failure::Disconnected)) => {
                tracing::debug!(agent = %agent_name, "consumer gone, producer stopping");
                return;
            }
            Ok(Err(Failure::Message(message))) => message,
            Err(_) => "agent task panicked".to_string(),
        };

        tracing::error!(agent = %agent_name, "producer failed: {}", message);
        let _ = tx
            .send(StreamEvent::Error {
                agent_id,
                agent_name,
                message,
            })
            .await;
    }

    async fn produce(self) -> Result<(), Failure> {
        let mut chunks = self
            .model
            .stream(self.request.clone())
            .await
            .map_err(|e| Failure::Message(e.to_string()))?;

        let mut output = String::new();
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| Failure::Message(e.to_string()))?;
            if chunk.is_empty() {
                continue;
            }
            output.push_str(&chunk);
            *self.usage.entry(self.agent.id.clone()).or_insert(0) += 1;
            self.send(StreamEvent::Chunk {
                agent_id: self.agent.id.clone(),
                agent_name: self.agent.name.clone(),
                color: self.agent.color.clone(),
                content: chunk,
            })
            .await?;
        }

        self.publish_verdict(&output).await?;
        Ok(())
    }

    /// At most one preview or security warning per producer
    async fn publish_verdict(&self, output: &str) -> Result<(), Disconnected> {
        let extracted = extract(output);
        let Some(code) = extracted.code else {
            return Ok(());
        };

        let report = self.sentinel.scan(&code);
        let event = if report.is_safe {
            tracing::info!(agent = %self.agent.name, file = %self.filename, "preview approved");
            StreamEvent::Preview {
                agent_id: self.agent.id.clone(),
                agent_name: self.agent.name.clone(),
                filename: self.filename_for(extracted.language.as_deref()),
                code,
                explanation: extracted.explanation,
            }
        } else {
            tracing::warn!(agent = %self.agent.name, "{}", report.render());
            StreamEvent::SecurityWarning {
                agent_id: self.agent.id.clone(),
                agent_name: self.agent.name.clone(),
                threats: report
                    .critical()
                    .map(|t| format!("Line {}: {} ({})", t.line_number, t.description, t.category))
                    .collect(),
            }
        };
        self.send(event).await
    }

    fn filename_for(&self, language: Option<&str>) -> String {
        if self.filename.is_empty() {
            format!("generated.{}", extension_for(language))
        } else {
            self.filename.clone()
        }
    }

    async fn send(&self, event: StreamEvent) -> Result<(), Disconnected> {
        self.tx.send(event).await.map_err(|_| Disconnected)
    }
}

/// File extension for a fence language tag
fn extension_for(language: Option<&str>) -> &'static str {
    match language.map(str::to_ascii_lowercase).as_deref() {
        Some("python" | "py") => "py",
        Some("javascript" | "js") => "js",
        Some("jsx") => "jsx",
        Some("typescript" | "ts") => "ts",
        Some("tsx") => "tsx",
        Some("rust" | "rs") => "rs",
        Some("html") => "html",
        Some("css") => "css",
        Some("json") => "json",
        Some("yaml" | "yml") => "yaml",
        Some("toml") => "toml",
        Some("markdown" | "md") => "md",
        _ => "txt",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_mapping() {
        assert_eq!(extension_for(Some("Python")), "py");
        assert_eq!(extension_for(Some("tsx")), "tsx");
        assert_eq!(extension_for(Some("cobol")), "txt");
        assert_eq!(extension_for(None), "txt");
    }
}
