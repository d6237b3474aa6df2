use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

/// Lifecycle state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Waiting for work.
    Idle,
    /// Holding a task.
    Working,
    /// Temporarily withheld from dispatch.
    Paused,
    /// Shut down; no longer counts against capacity.
    Stopped,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Working => write!(f, "working"),
            AgentStatus::Paused => write!(f, "paused"),
            AgentStatus::Stopped => write!(f, "stopped"),
        }
    }
}

impl FromStr for AgentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "idle" => Ok(AgentStatus::Idle),
            "working" => Ok(AgentStatus::Working),
            "paused" => Ok(AgentStatus::Paused),
            "stopped" => Ok(AgentStatus::Stopped),
            other => Err(format!("unknown agent status '{other}'")),
        }
    }
}

/// Behavioral profile an agent is spawned from.
///
/// The orchestrator only looks at the name and the declared capabilities;
/// everything else belongs to the persona-loading layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
}

impl Persona {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }
}

/// A managed worker agent.
///
/// Values handed out by the registry are snapshots; mutating one has no
/// effect on the registry.
#[derive(Debug, Clone, Serialize)]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub persona_name: String,
    /// Role label resolved from `persona_name` at spawn.
    pub role: String,
    pub project_id: String,
    pub capabilities: BTreeSet<String>,
    pub status: AgentStatus,
    /// The bead this agent is working on, if any.
    pub current_task_id: Option<String>,
    pub last_active: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    #[serde(skip)]
    pub persona: Arc<Persona>,
}

impl Agent {
    pub fn is_idle(&self) -> bool {
        self.status == AgentStatus::Idle
    }

    /// Whether the agent counts against the registry's capacity.
    pub fn is_live(&self) -> bool {
        self.status != AgentStatus::Stopped
    }
}

/// Status of a task (bead) as tracked by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Assigned,
    Completed,
    Failed { reason: String },
}

impl TaskStatus {
    /// Completed and failed tasks never change state again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed { .. })
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Assigned => write!(f, "assigned"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed { .. } => write!(f, "failed"),
        }
    }
}

/// A unit of work submitted for dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Higher is more urgent.
    #[serde(default)]
    pub priority: i32,
    pub status: TaskStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Capability tags the submitter explicitly asks for.
    #[serde(default)]
    pub required_capabilities: BTreeSet<String>,
    /// Agent holding the task once dispatched.
    #[serde(default)]
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl Task {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: String::new(),
            description: description.into(),
            priority: 0,
            status: TaskStatus::Pending,
            tags: Vec::new(),
            required_capabilities: BTreeSet::new(),
            assigned_to: None,
            created_at: Utc::now(),
            completed_at: None,
            result: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Title, description and tags joined and lower-cased, for keyword scans.
    pub fn searchable_text(&self) -> String {
        let mut text = String::with_capacity(self.title.len() + self.description.len() + 16);
        text.push_str(&self.title);
        text.push('\n');
        text.push_str(&self.description);
        for tag in &self.tags {
            text.push('\n');
            text.push_str(tag);
        }
        text.to_lowercase()
    }

    /// Tasks created automatically from captured errors.
    pub fn is_auto_filed(&self) -> bool {
        self.title.to_lowercase().contains("[auto-filed]")
            || self.tags.iter().any(|t| t.eq_ignore_ascii_case("auto-filed"))
    }

    /// Lower-cased capability tags implied by the task.
    ///
    /// Explicit capabilities and tags are taken whole; title and description
    /// contribute their individual word tokens (hyphens kept, so
    /// `backend-engineer` stays one token).
    pub fn implied_capabilities(&self) -> BTreeSet<String> {
        let mut caps: BTreeSet<String> = self
            .required_capabilities
            .iter()
            .chain(self.tags.iter())
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty())
            .collect();

        for text in [&self.title, &self.description] {
            caps.extend(
                text.split(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_'))
                    .map(|w| w.trim_matches('-').to_lowercase())
                    .filter(|w| !w.is_empty()),
            );
        }
        caps
    }
}
