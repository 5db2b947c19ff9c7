//! Agent registry
//!
//! Agents are configured personas persisted per project in
//! `.agent/agents.json`. The registry is loaded once at open, bootstrapped
//! with defaults when missing or unreadable, and rewritten on every mutation.

use crate::error::AgentStoreError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Registry directory under the project root
pub const AGENT_DIR: &str = ".agent";

/// Registry file name
pub const AGENT_FILE: &str = "agents.json";

/// Default model for new agents
pub const DEFAULT_AGENT_MODEL: &str = "gpt-4o-mini";

/// Default display color
pub const DEFAULT_AGENT_COLOR: &str = "blue";

/// A configured persona
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    /// Stable id (UUID v4 string)
    #[serde(default = "new_agent_id")]
    pub id: String,
    /// Display name
    pub name: String,
    /// System instructions
    pub role: String,
    /// Backend model id
    #[serde(default = "default_model")]
    pub model: String,
    /// Display color
    #[serde(default = "default_color")]
    pub color: String,
    /// Included in runs without an explicit selection
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl Agent {
    /// Create an active agent with a fresh id
    #[must_use]
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: new_agent_id(),
            name: name.into(),
            role: role.into(),
            model: default_model(),
            color: default_color(),
            is_active: true,
        }
    }

    /// With backend model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With display color
    #[inline]
    #[must_use]
    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = color.into();
        self
    }

    /// With explicit id
    #[inline]
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// With active flag
    #[inline]
    #[must_use]
    pub fn with_active(mut self, is_active: bool) -> Self {
        self.is_active = is_active;
        self
    }
}

fn new_agent_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_model() -> String {
    DEFAULT_AGENT_MODEL.to_string()
}

fn default_color() -> String {
    DEFAULT_AGENT_COLOR.to_string()
}

fn default_active() -> bool {
    true
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentUpdate {
    /// New display name
    pub name: Option<String>,
    /// New system instructions
    pub role: Option<String>,
    /// New backend model
    pub model: Option<String>,
    /// New display color
    pub color: Option<String>,
    /// New active flag
    pub is_active: Option<bool>,
}

impl AgentUpdate {
    fn apply(self, agent: &mut Agent) {
        if let Some(name) = self.name {
            agent.name = name;
        }
        if let Some(role) = self.role {
            agent.role = role;
        }
        if let Some(model) = self.model {
            agent.model = model;
        }
        if let Some(color) = self.color {
            agent.color = color;
        }
        if let Some(is_active) = self.is_active {
            agent.is_active = is_active;
        }
    }
}

/// The three bootstrap agents; the tester starts inactive
#[must_use]
pub fn default_agents() -> Vec<Agent> {
    vec![
        Agent::new(
            "Lead Architect",
            "You are an experienced software architect. Focus on structure, design patterns and scalability.",
        )
        .with_color("blue"),
        Agent::new(
            "Senior Developer",
            "You are a senior developer. Your code is efficient, clean and follows best practices.",
        )
        .with_color("green"),
        Agent::new(
            "QA Tester",
            "You are a QA engineer. Your job is to find potential bugs and propose tests.",
        )
        .with_color("red")
        .with_active(false),
    ]
}

/// Persistent, insertion-ordered agent registry
#[derive(Debug)]
pub struct AgentStore {
    path: PathBuf,
    agents: RwLock<IndexMap<String, Agent>>,
}

impl AgentStore {
    /// Open the registry under `project_root`
    ///
    /// Bootstraps and saves [`default_agents`] if the file is missing or
    /// cannot be parsed.
    ///
    /// # Errors
    /// `AgentStoreError::Io` if the defaults cannot be written
    pub fn open(project_root: impl AsRef<Path>) -> Result<Self, AgentStoreError> {
        let path = project_root.as_ref().join(AGENT_DIR).join(AGENT_FILE);

        let loaded = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<Vec<Agent>>(&text) {
                Ok(agents) => Some(agents),
                Err(e) => {
                    tracing::warn!(path = %path.display(), "unreadable agent registry, using defaults: {}", e);
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(AgentStoreError::io_error(&path, e)),
        };

        let bootstrap = loaded.is_none();
        let agents = loaded
            .unwrap_or_else(default_agents)
            .into_iter()
            .map(|a| (a.id.clone(), a))
            .collect();

        let store = Self {
            path,
            agents: RwLock::new(agents),
        };
        if bootstrap {
            store.save()?;
            tracing::info!(path = %store.path.display(), "default agents created");
        }
        Ok(store)
    }

    /// Registry file path
    #[inline]
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All agents in insertion order
    #[must_use]
    pub fn list(&self) -> Vec<Agent> {
        self.agents.read().values().cloned().collect()
    }

    /// Agent by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Agent> {
        self.agents.read().get(id).cloned()
    }

    /// Active agents in insertion order
    #[must_use]
    pub fn active(&self) -> Vec<Agent> {
        self.agents
            .read()
            .values()
            .filter(|a| a.is_active)
            .cloned()
            .collect()
    }

    /// Register a new agent
    ///
    /// # Errors
    /// `DuplicateId` if the id is taken; `Io` if saving fails
    pub fn add(&self, agent: Agent) -> Result<(), AgentStoreError> {
        {
            let mut agents = self.agents.write();
            if agents.contains_key(&agent.id) {
                return Err(AgentStoreError::DuplicateId(agent.id));
            }
            tracing::info!(id = %agent.id, name = %agent.name, "agent added");
            agents.insert(agent.id.clone(), agent);
        }
        self.save()
    }

    /// Apply a partial update; returns false when the id is unknown
    ///
    /// # Errors
    /// `Io` if saving fails
    pub fn update(&self, id: &str, update: AgentUpdate) -> Result<bool, AgentStoreError> {
        {
            let mut agents = self.agents.write();
            let Some(agent) = agents.get_mut(id) else {
                return Ok(false);
            };
            update.apply(agent);
            tracing::info!(id, "agent updated");
        }
        self.save()?;
        Ok(true)
    }

    /// Remove an agent; returns whether it existed
    ///
    /// # Errors
    /// `Io` if saving fails
    pub fn delete(&self, id: &str) -> Result<bool, AgentStoreError> {
        let removed = self.agents.write().shift_remove(id).is_some();
        if removed {
            tracing::info!(id, "agent deleted");
        }
        self.save()?;
        Ok(removed)
    }

    /// Persist the registry as a pretty JSON array
    ///
    /// # Errors
    /// `Io` on write failure, `Serialize` if encoding fails
    pub fn save(&self) -> Result<(), AgentStoreError> {
        let agents = self.list();
        let json = serde_json::to_string_pretty(&agents)?;
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| AgentStoreError::io_error(dir, e))?;
        }
        std::fs::write(&self.path, json).map_err(|e| AgentStoreError::io_error(&self.path, e))?;
        tracing::debug!(path = %self.path.display(), count = agents.len(), "agents saved");
        Ok(())
    }
}
