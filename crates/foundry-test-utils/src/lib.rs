//! Testing utilities for the Foundry workspace
//!
//! Shared fixtures: a deterministic model backend and throwaway projects.

#![allow(missing_docs)]

use async_trait::async_trait;
use foundry_core::{
    ChunkStream, Completion, FoundryConfig, ModelBackend, ModelError, ModelRequest, Orchestrator,
};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Wrap `code` in a python fence with some prose around it
pub fn fenced(code: &str) -> String {
    format!("Proposed change:\n\n```python\n{code}\n```\n\nNext steps:\n- review")
}

/// Scripted behaviour of one streaming call
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Emit these chunks, then end
    Chunks(Vec<String>),
    /// Emit these chunks with a pause before each one
    Delayed(Duration, Vec<String>),
    /// Fail before the stream starts
    Fail(ModelError),
    /// Emit these chunks, then fail mid-stream
    FailAfter(Vec<String>, ModelError),
    /// Emit these chunks, then never finish
    Hang(Vec<String>),
}

impl StreamScript {
    /// Chunks from string slices
    pub fn chunks(parts: &[&str]) -> Self {
        Self::Chunks(parts.iter().map(|p| (*p).to_string()).collect())
    }
}

/// Counts dropped streams
struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Deterministic [`ModelBackend`]
///
/// Completions are replayed in order and the last one repeats. Streams are
/// chosen by the request's model id, falling back to a default script.
/// Every request is recorded.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    completions: Mutex<VecDeque<Result<Completion, ModelError>>>,
    streams: HashMap<String, StreamScript>,
    default_stream: Option<StreamScript>,
    requests: Mutex<Vec<ModelRequest>>,
    completion_calls: AtomicUsize,
    dropped_streams: Arc<AtomicUsize>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a completion
    #[must_use]
    pub fn with_completion(self, text: impl Into<String>, tokens: u64) -> Self {
        self.completions
            .lock()
            .push_back(Ok(Completion::new(text, tokens)));
        self
    }

    /// Queue a failure
    #[must_use]
    pub fn with_failure(self, error: ModelError) -> Self {
        self.completions.lock().push_back(Err(error));
        self
    }

    /// Stream script for one model id
    #[must_use]
    pub fn with_stream(mut self, model: impl Into<String>, script: StreamScript) -> Self {
        self.streams.insert(model.into(), script);
        self
    }

    /// Stream script for unmatched model ids
    #[must_use]
    pub fn with_default_stream(mut self, script: StreamScript) -> Self {
        self.default_stream = Some(script);
        self
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().clone()
    }

    /// Number of `complete` calls
    pub fn completion_calls(&self) -> usize {
        self.completion_calls.load(Ordering::SeqCst)
    }

    /// Streams dropped so far (finished or aborted)
    pub fn dropped_streams(&self) -> usize {
        self.dropped_streams.load(Ordering::SeqCst)
    }

    fn next_completion(&self) -> Result<Completion, ModelError> {
        let mut queue = self.completions.lock();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        next.unwrap_or_else(|| Err(ModelError::Request("no scripted completion".to_string())))
    }
}

#[async_trait]
impl ModelBackend for ScriptedModel {
    async fn complete(&self, request: ModelRequest) -> Result<Completion, ModelError> {
        self.requests.lock().push(request);
        self.completion_calls.fetch_add(1, Ordering::SeqCst);
        self.next_completion()
    }

    async fn stream(&self, request: ModelRequest) -> Result<ChunkStream, ModelError> {
        let script = self
            .streams
            .get(&request.model)
            .or(self.default_stream.as_ref())
            .cloned()
            .ok_or_else(|| ModelError::UnknownModel(request.model.clone()))?;
        self.requests.lock().push(request);

        let guard = DropCounter(Arc::clone(&self.dropped_streams));
        let ok = |parts: Vec<String>| {
            futures::stream::iter(parts.into_iter().map(Ok::<String, ModelError>))
        };

        let stream: ChunkStream = match script {
            StreamScript::Chunks(parts) => ok(parts).boxed(),
            StreamScript::Delayed(pause, parts) => ok(parts)
                .then(move |chunk| async move {
                    tokio::time::sleep(pause).await;
                    chunk
                })
                .boxed(),
            StreamScript::Fail(error) => return Err(error),
            StreamScript::FailAfter(parts, error) => ok(parts)
                .chain(futures::stream::once(async move { Err(error) }))
                .boxed(),
            StreamScript::Hang(parts) => ok(parts).chain(futures::stream::pending()).boxed(),
        };

        Ok(stream
            .map(move |item| {
                let _alive = &guard;
                item
            })
            .boxed())
    }
}

/// Temporary project directory
#[derive(Debug)]
pub struct TestProject {
    dir: TempDir,
}

impl TestProject {
    /// Empty project
    ///
    /// # Panics
    /// If the temp directory cannot be created
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp project"),
        }
    }

    /// Seed a file (parents created)
    ///
    /// # Panics
    /// If the file cannot be written
    #[must_use]
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        let path = self.dir.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent dirs");
        }
        std::fs::write(path, content).expect("seed file");
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    /// Read a project file, `None` if missing
    pub fn read(&self, rel: &str) -> Option<String> {
        std::fs::read_to_string(self.join(rel)).ok()
    }

    /// Orchestrator over this project
    ///
    /// # Panics
    /// If the project cannot be opened
    pub fn orchestrator(&self, model: Arc<dyn ModelBackend>, config: FoundryConfig) -> Orchestrator {
        Orchestrator::open(self.path(), config, model).expect("open orchestrator")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
