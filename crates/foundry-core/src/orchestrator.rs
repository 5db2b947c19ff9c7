//! Generation Orchestrator
//!
//! Coordinates agents, the model backend, the sentinel, and the sandboxed
//! store:
//! - Single-shot generation with a scan-and-retry feedback loop
//! - Streaming multi-agent generation fanned into one ordered event stream
//! - Manual saves, gated by the sentinel and versioned before overwrite
//!
//! Nothing a model produces is written unless the sentinel reports it safe.

use crate::agent::{Agent, AgentStore};
use crate::config::FoundryConfig;
use crate::context::{build_content, project_context, target_context};
use crate::error::FoundryError;
use crate::event::{EventStream, StreamEvent};
use crate::extract::extract;
use crate::model::{ModelBackend, ModelRequest};
use crate::prompt::{agent_system_prompt, build_feedback_prompt, SINGLE_SHOT_SYSTEM};
use crate::stream::Producer;
use crate::types::{
    Attachment, GenerationResult, Mode, OrchestratorStatus, SaveOutcome, StreamRequest,
    TokenMeter,
};
use dashmap::DashMap;
use foundry_sandbox::{FileStore, HistoryStore, VersionedStore};
use foundry_sentinel::{ScanReport, Sentinel};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Project-bound state, swapped as a unit by `set_project_dir`
#[derive(Debug, Clone)]
struct Workspace {
    store: Arc<VersionedStore>,
    agents: Arc<AgentStore>,
}

/// The central orchestrator
pub struct Orchestrator {
    /// Configuration
    config: FoundryConfig,
    /// Threat classifier
    sentinel: Arc<Sentinel>,
    /// Model capability
    model: Arc<dyn ModelBackend>,
    /// Current project
    workspace: RwLock<Workspace>,
    /// Model used by single-shot generation
    current_model: RwLock<String>,
    /// Running token total
    tokens: TokenMeter,
    /// Streamed chunks per agent id
    agent_usage: Arc<DashMap<String, u64>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("workspace", &*self.workspace.read())
            .field("current_model", &*self.current_model.read())
            .field("tokens", &self.tokens.total())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create orchestrator from parts
    #[must_use]
    pub fn new(
        config: FoundryConfig,
        files: Arc<VersionedStore>,
        sentinel: Arc<Sentinel>,
        model: Arc<dyn ModelBackend>,
        agents: Arc<AgentStore>,
    ) -> Self {
        tracing::info!(
            root = %files.files().primary_root().display(),
            model = %config.generation.default_model,
            "orchestrator initialized"
        );
        Self {
            current_model: RwLock::new(config.generation.default_model.clone()),
            config,
            sentinel,
            model,
            workspace: RwLock::new(Workspace {
                store: files,
                agents,
            }),
            tokens: TokenMeter::new(),
            agent_usage: Arc::new(DashMap::new()),
        }
    }

    /// Open a project directory with the default sentinel
    ///
    /// # Errors
    /// `FoundryError::Config` if the config is invalid; sandbox or agent
    /// store errors if the project cannot be opened
    pub fn open(
        project_dir: impl AsRef<Path>,
        config: FoundryConfig,
        model: Arc<dyn ModelBackend>,
    ) -> Result<Self, FoundryError> {
        config.validate()?;
        let workspace = open_workspace(project_dir.as_ref(), &config)?;
        Ok(Self::new(
            config,
            workspace.store,
            Arc::new(Sentinel::new()),
            model,
            workspace.agents,
        ))
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &FoundryConfig {
        &self.config
    }

    /// Sentinel
    #[inline]
    #[must_use]
    pub fn sentinel(&self) -> &Arc<Sentinel> {
        &self.sentinel
    }

    /// Versioned store of the current project
    #[must_use]
    pub fn files(&self) -> Arc<VersionedStore> {
        Arc::clone(&self.workspace.read().store)
    }

    /// Agent registry of the current project
    #[must_use]
    pub fn agents(&self) -> Arc<AgentStore> {
        Arc::clone(&self.workspace.read().agents)
    }

    /// Tokens used since creation
    #[inline]
    #[must_use]
    pub fn token_usage(&self) -> u64 {
        self.tokens.total()
    }

    /// Streamed chunk counts per agent id
    #[must_use]
    pub fn agent_usage(&self) -> HashMap<String, u64> {
        self.agent_usage
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect()
    }

    /// Model used by single-shot generation
    #[must_use]
    pub fn current_model(&self) -> String {
        self.current_model.read().clone()
    }

    /// Switch the single-shot model
    pub fn set_model(&self, model: impl Into<String>) {
        let model = model.into();
        tracing::info!(model = %model, "model changed");
        *self.current_model.write() = model;
    }

    /// Switch to another project directory
    ///
    /// Returns the new project's file listing.
    ///
    /// # Errors
    /// `InvalidProjectDir` if the path is missing or not a directory
    pub fn set_project_dir(&self, path: impl AsRef<Path>) -> Result<Vec<String>, FoundryError> {
        let path = path.as_ref();
        let canonical = std::fs::canonicalize(path)
            .map_err(|_| FoundryError::InvalidProjectDir(path.to_path_buf()))?;
        if !canonical.is_dir() {
            return Err(FoundryError::InvalidProjectDir(path.to_path_buf()));
        }

        let workspace = open_workspace(&canonical, &self.config)?;
        let files = workspace
            .store
            .files()
            .list_files(self.config.sandbox.list_max_depth);
        *self.workspace.write() = workspace;

        tracing::info!(root = %canonical.display(), files = files.len(), "project directory changed");
        Ok(files)
    }

    /// Token total, project, model, and file listing
    #[must_use]
    pub fn status(&self) -> OrchestratorStatus {
        let store = self.files();
        let files = store.files();
        OrchestratorStatus {
            total_tokens: self.token_usage(),
            project_dir: files.primary_root().display().to_string(),
            model: self.current_model(),
            files: files.list_files(self.config.sandbox.list_max_depth),
        }
    }

    /// Classify code
    #[must_use]
    pub fn scan_code(&self, code: &str) -> ScanReport {
        self.sentinel.scan(code)
    }

    /// Single-shot generation with scan-and-retry
    ///
    /// At most `max_retries` attempts. Safe code is returned as a pending
    /// preview and never written. A response with no fenced code block is
    /// reported as success without scanning.
    pub async fn generate_and_validate(
        &self,
        prompt: &str,
        filename: &str,
        attachments: &[Attachment],
    ) -> GenerationResult {
        let store = self.files();
        let files = store.files();
        if let Err(e) = files.resolve(filename) {
            tracing::warn!(file = filename, "generation refused: {}", e);
            return GenerationResult::failed(e.to_string());
        }

        let context = target_context(files, filename).await;
        let model = self.current_model();
        let max_retries = self.config.generation.max_retries;
        let mut result = GenerationResult::default();
        let mut request_text = prompt.to_string();
        let mut last_model_error = None;

        for attempt in 1..=max_retries {
            result.attempts = attempt;
            tracing::info!(attempt, max_retries, file = filename, "generation attempt");

            let request = ModelRequest {
                model: model.clone(),
                system: SINGLE_SHOT_SYSTEM.to_string(),
                content: build_content(&context, &request_text, attachments),
                temperature: self.config.generation.temperature,
            };

            let completion = match self.model.complete(request).await {
                Ok(completion) => completion,
                Err(e) => {
                    tracing::warn!(attempt, "model call failed: {}", e);
                    let retryable = e.is_retryable();
                    last_model_error = Some(e);
                    if retryable {
                        continue;
                    }
                    break;
                }
            };
            last_model_error = None;
            result.tokens_used += completion.total_tokens;
            self.tokens.add(completion.total_tokens);

            let extracted = extract(&completion.text);
            let Some(code) = extracted.code else {
                tracing::info!(attempt, "response contained no code block");
                result.success = true;
                result.explanation = Some(extracted.explanation);
                result.threats.clear();
                result.message = "response contained no code block".to_string();
                return result;
            };

            let report = self.sentinel.scan(&code);
            result.threats = report.threats.clone();

            if report.is_safe {
                tracing::info!(attempt, file = filename, "code approved by sentinel");
                result.success = true;
                result.code = Some(code);
                result.explanation = Some(extracted.explanation);
                result.pending_approval = true;
                result.message = format!("code generated for {filename}, awaiting approval");
                return result;
            }

            tracing::warn!(attempt, "{}", report.render());
            if attempt < max_retries {
                request_text = build_feedback_prompt(prompt, &report.threats);
            }
        }

        result.message = match last_model_error {
            Some(e) => format!("model call failed after {} attempt(s): {e}", result.attempts),
            None => format!(
                "could not generate safe code after {} attempt(s)",
                result.attempts
            ),
        };
        tracing::error!(file = filename, "{}", result.message);
        result
    }

    /// Single-shot generation, then a versioned write of approved code
    ///
    /// # Errors
    /// Sandbox or history errors from the write
    pub async fn generate_and_apply(
        &self,
        prompt: &str,
        filename: &str,
    ) -> Result<GenerationResult, FoundryError> {
        let mut result = self.generate_and_validate(prompt, filename, &[]).await;
        let Some(code) = result.code.as_deref().filter(|_| result.success) else {
            return Ok(result);
        };

        let backup = self.files().write_versioned(filename, code).await?;
        result.backup_path = backup.map(|b| b.path);
        result.pending_approval = false;
        result.message = format!("code generated and written to {filename}");
        tracing::info!(file = filename, "generated code applied");
        Ok(result)
    }

    /// Scan supplied content and, if safe, write it with a backup
    ///
    /// A sentinel rejection is `Ok` with `success = false`.
    ///
    /// # Errors
    /// Sandbox or history errors from the write
    pub async fn manual_save(
        &self,
        filename: &str,
        content: &str,
    ) -> Result<SaveOutcome, FoundryError> {
        let report = self.sentinel.scan(content);
        if !report.is_safe {
            tracing::warn!(file = filename, "manual save rejected\n{}", report.render());
            return Ok(SaveOutcome {
                success: false,
                message: "security check failed".to_string(),
                backup_path: None,
                threats: report.threats,
            });
        }

        let backup = self.files().write_versioned(filename, content).await?;
        tracing::info!(file = filename, backed_up = backup.is_some(), "manual save");
        Ok(SaveOutcome {
            success: true,
            message: format!("{filename} saved"),
            backup_path: backup.map(|b| b.path),
            threats: report.threats,
        })
    }

    /// Run the selected agents concurrently
    ///
    /// Agents are `request.agent_ids` (unknown ids ignored) or, when empty,
    /// every active agent. Nothing is written to disk. Dropping the returned
    /// stream aborts every producer.
    pub async fn stream_generate(&self, request: StreamRequest) -> EventStream {
        let Workspace { store, agents } = self.workspace.read().clone();
        let selected = select_agents(&agents, &request.agent_ids);
        if selected.is_empty() {
            tracing::warn!("stream requested with no agents selected");
            return EventStream::from_events(vec![StreamEvent::Error {
                agent_id: String::new(),
                agent_name: String::new(),
                message: "no agents selected".to_string(),
            }]);
        }

        let files = store.files();
        let context = if request.target_file.is_empty() {
            project_context(files, &self.config.context).await
        } else {
            target_context(files, &request.target_file).await
        };
        let content = build_content(&context, &request.prompt, &request.attachments);
        let planning = request.mode == Mode::Planning;

        // `new` takes the config unvalidated; a zero capacity would panic.
        let (tx, rx) = mpsc::channel(self.config.generation.event_buffer.max(1));
        let mut producers = JoinSet::new();
        tracing::info!(agents = selected.len(), mode = ?request.mode, "starting multi-agent stream");

        for agent in selected {
            let model_id = request.model.clone().unwrap_or_else(|| agent.model.clone());
            let producer = Producer {
                request: ModelRequest {
                    model: model_id,
                    system: agent_system_prompt(&agent.role, planning),
                    content: content.clone(),
                    temperature: self.config.generation.temperature,
                },
                agent,
                filename: request.target_file.clone(),
                model: Arc::clone(&self.model),
                sentinel: Arc::clone(&self.sentinel),
                usage: Arc::clone(&self.agent_usage),
                tx: tx.clone(),
            };
            producers.spawn(producer.run());
        }
        drop(tx);

        EventStream::new(rx, producers)
    }
}

fn select_agents(agents: &AgentStore, ids: &[String]) -> Vec<Agent> {
    if ids.is_empty() {
        return agents.active();
    }
    ids.iter()
        .filter_map(|id| {
            let agent = agents.get(id);
            if agent.is_none() {
                tracing::debug!(id = %id, "unknown agent id ignored");
            }
            agent
        })
        .collect()
}

fn open_workspace(project_dir: &Path, config: &FoundryConfig) -> Result<Workspace, FoundryError> {
    let files = Arc::new(FileStore::new(project_dir)?);
    let mut store = VersionedStore::new(Arc::clone(&files));
    if config.history.enabled {
        store = store.with_history(
            HistoryStore::new(Arc::clone(&files), config.history.max_backups)
                .with_dir_name(&config.history.dir_name),
        );
    }
    let agents = AgentStore::open(files.primary_root())?;
    Ok(Workspace {
        store: Arc::new(store),
        agents: Arc::new(agents),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;
    use crate::model::{ChunkStream, Completion, MockModelBackend};
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fenced(code: &str) -> String {
        format!("Here it is:\n```python\n{code}\n```\nDone.")
    }

    fn orchestrator(dir: &Path, mock: MockModelBackend) -> Orchestrator {
        Orchestrator::open(dir, FoundryConfig::default(), Arc::new(mock)).unwrap()
    }

    fn chunks(parts: &[&str]) -> ChunkStream {
        let items: Vec<Result<String, ModelError>> =
            parts.iter().map(|p| Ok((*p).to_string())).collect();
        futures::stream::iter(items).boxed()
    }

    #[tokio::test]
    async fn safe_code_is_pending_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelBackend::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Ok(Completion::new(fenced("print('hi')"), 42)));
        let orch = orchestrator(dir.path(), mock);

        let result = orch.generate_and_validate("say hi", "hi.py", &[]).await;
        assert!(result.success);
        assert!(result.pending_approval);
        assert_eq!(result.code.as_deref(), Some("print('hi')"));
        assert_eq!(result.explanation.as_deref(), Some("Here it is:\n\nDone."));
        assert_eq!(result.attempts, 1);
        assert_eq!(result.tokens_used, 42);
        assert_eq!(orch.token_usage(), 42);
        assert!(!dir.path().join("hi.py").exists());
    }

    #[tokio::test]
    async fn unsafe_then_safe_uses_feedback_from_original() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let mut mock = MockModelBackend::new();
        {
            let calls = Arc::clone(&calls);
            let seen = Arc::clone(&seen);
            mock.expect_complete().returning(move |req| {
                seen.lock().push(req.prompt_text());
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let code = if n == 0 { "eval(x)" } else { "int(x)" };
                Ok(Completion::new(fenced(code), 10))
            });
        }
        let orch = orchestrator(dir.path(), mock);

        let result = orch.generate_and_validate("parse x", "p.py", &[]).await;
        assert!(result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.tokens_used, 20);
        assert!(result.threats.is_empty());

        let prompts = seen.lock();
        assert!(prompts[1].contains("ORIGINAL REQUEST:\nparse x"));
        assert!(prompts[1].contains("code-execution"));
    }

    #[tokio::test]
    async fn always_unsafe_stops_at_max_retries() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelBackend::new();
        mock.expect_complete()
            .times(3)
            .returning(|_| Ok(Completion::new(fenced("os.system('sudo rm -rf /')"), 5)));
        let orch = orchestrator(dir.path(), mock);

        let result = orch.generate_and_validate("clean up", "c.py", &[]).await;
        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert!(result.code.is_none());
        assert!(!result.threats.is_empty());
        assert!(result.message.contains("3 attempt"));
    }

    #[tokio::test]
    async fn transient_model_errors_are_retried() {
        let dir = tempfile::tempdir().unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let mut mock = MockModelBackend::new();
        {
            let calls = Arc::clone(&calls);
            mock.expect_complete().returning(move |_| {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ModelError::Request("timeout".into()))
                } else {
                    Ok(Completion::new(fenced("x = 1"), 1))
                }
            });
        }
        let orch = orchestrator(dir.path(), mock);

        let result = orch.generate_and_validate("x", "x.py", &[]).await;
        assert!(result.success);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn non_retryable_model_error_stops_early() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelBackend::new();
        mock.expect_complete()
            .times(1)
            .returning(|_| Err(ModelError::UnknownModel("nope".into())));
        let orch = orchestrator(dir.path(), mock);

        let result = orch.generate_and_validate("x", "x.py", &[]).await;
        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert!(result.message.contains("unknown model"));
    }

    #[tokio::test]
    async fn answer_without_code_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelBackend::new();
        mock.expect_complete()
            .returning(|_| Ok(Completion::new("Use a dict for that.", 2)));
        let orch = orchestrator(dir.path(), mock);

        let result = orch.generate_and_validate("how?", "a.py", &[]).await;
        assert!(result.success);
        assert!(!result.pending_approval);
        assert!(result.code.is_none());
        assert_eq!(result.explanation.as_deref(), Some("Use a dict for that."));
    }

    #[tokio::test]
    async fn sandboxed_filename_is_never_sent_to_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelBackend::new();
        mock.expect_complete().never();
        let orch = orchestrator(dir.path(), mock);

        let result = orch.generate_and_validate("x", "../../etc/passwd", &[]).await;
        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert!(result.message.contains("access denied"));
    }

    #[tokio::test]
    async fn manual_save_scans_then_versions() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), MockModelBackend::new());

        let first = orch.manual_save("a.py", "x = 1").await.unwrap();
        assert!(first.success);
        assert!(first.backup_path.is_none());

        let second = orch.manual_save("a.py", "x = 2").await.unwrap();
        let backup = second.backup_path.unwrap();
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "x = 1");

        let rejected = orch.manual_save("a.py", "eval(input())").await.unwrap();
        assert!(!rejected.success);
        assert!(!rejected.threats.is_empty());
        assert_eq!(std::fs::read_to_string(dir.path().join("a.py")).unwrap(), "x = 2");
    }

    #[tokio::test]
    async fn generate_and_apply_writes_approved_code() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("app.py"), "old = True").unwrap();
        let mut mock = MockModelBackend::new();
        mock.expect_complete()
            .returning(|_| Ok(Completion::new(fenced("new = True"), 3)));
        let orch = orchestrator(dir.path(), mock);

        let result = orch.generate_and_apply("update", "app.py").await.unwrap();
        assert!(result.success);
        assert!(!result.pending_approval);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("app.py")).unwrap(),
            "new = True"
        );
        let backup = result.backup_path.unwrap();
        assert_eq!(std::fs::read_to_string(backup).unwrap(), "old = True");
    }

    #[tokio::test]
    async fn status_and_model_switch() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.py"), "x").unwrap();
        let orch = orchestrator(dir.path(), MockModelBackend::new());

        assert_eq!(orch.current_model(), "gpt-4o-mini");
        orch.set_model("gpt-4o");
        let status = orch.status();
        assert_eq!(status.model, "gpt-4o");
        assert_eq!(status.total_tokens, 0);
        assert_eq!(status.files, vec!["main.py"]);
    }

    #[tokio::test]
    async fn set_project_dir_swaps_workspace() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::write(second.path().join("lib.rs"), "fn f() {}").unwrap();
        let orch = orchestrator(first.path(), MockModelBackend::new());

        let files = orch.set_project_dir(second.path()).unwrap();
        assert_eq!(files, vec!["lib.rs"]);
        assert!(second.path().join(".agent/agents.json").is_file());

        let err = orch.set_project_dir(second.path().join("missing")).unwrap_err();
        assert!(matches!(err, FoundryError::InvalidProjectDir(_)));
    }

    #[tokio::test]
    async fn no_agents_yields_error_then_done() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(dir.path(), MockModelBackend::new());

        let events: Vec<_> = orch
            .stream_generate(StreamRequest::new("go").with_agents(["missing"]))
            .await
            .collect()
            .await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::Error { .. }));
        assert!(events[1].is_done());
    }

    #[tokio::test]
    async fn single_agent_stream_previews_safe_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelBackend::new();
        mock.expect_stream()
            .returning(|_| Ok(chunks(&["Plan:\n```python\n", "x = 1\n", "```\n"])));
        let orch = orchestrator(dir.path(), mock);
        let architect = orch.agents().active()[0].clone();

        let events: Vec<_> = orch
            .stream_generate(
                StreamRequest::new("go")
                    .with_agents([architect.id.clone()])
                    .with_target_file("a.py"),
            )
            .await
            .collect()
            .await;

        let chunk_count = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Chunk { .. }))
            .count();
        assert_eq!(chunk_count, 3);
        assert!(events.iter().any(|e| matches!(
            e,
            StreamEvent::Preview { filename, code, .. } if filename == "a.py" && code == "x = 1"
        )));
        assert!(events.last().unwrap().is_done());
        assert_eq!(orch.agent_usage().get(&architect.id), Some(&3));
        assert!(!dir.path().join("a.py").exists());
    }

    #[tokio::test]
    async fn unsafe_stream_output_yields_security_warning() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelBackend::new();
        mock.expect_stream()
            .returning(|_| Ok(chunks(&["```python\nexec(payload)\n```"])));
        let orch = orchestrator(dir.path(), mock);
        let agent_id = orch.agents().active()[0].id.clone();

        let events: Vec<_> = orch
            .stream_generate(StreamRequest::new("go").with_agents([agent_id]))
            .await
            .collect()
            .await;

        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Preview { .. })));
        let warning = events
            .iter()
            .find_map(|e| match e {
                StreamEvent::SecurityWarning { threats, .. } => Some(threats.clone()),
                _ => None,
            })
            .unwrap();
        assert!(warning[0].contains("code-execution"));
    }

    #[tokio::test]
    async fn zero_event_buffer_still_streams_to_done() {
        let dir = tempfile::tempdir().unwrap();
        let mut mock = MockModelBackend::new();
        mock.expect_stream()
            .returning(|_| Ok(chunks(&["a", "b", "c"])));

        let mut config = FoundryConfig::default();
        config.generation.event_buffer = 0;
        let files = Arc::new(FileStore::new(dir.path()).unwrap());
        let agents = Arc::new(AgentStore::open(dir.path()).unwrap());
        let orch = Orchestrator::new(
            config,
            Arc::new(VersionedStore::new(files)),
            Arc::new(Sentinel::new()),
            Arc::new(mock),
            agents,
        );

        let events: Vec<_> = orch
            .stream_generate(StreamRequest::new("go"))
            .await
            .collect()
            .await;
        let chunk_count = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Chunk { .. }))
            .count();
        assert_eq!(chunk_count, 6);
        assert_eq!(events.iter().filter(|e| e.is_done()).count(), 1);
        assert!(events.last().unwrap().is_done());
    }
}
