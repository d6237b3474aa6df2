use crate::config::RegistryConfig;
use crate::roles::resolve_role;
use crate::types::{Agent, AgentStatus, Persona};
use chrono::{DateTime, Duration, Utc};
use loom_core::{Clock, LoomError, LoomResult, SystemClock};
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A request to spawn a new agent into the registry.
#[derive(Debug, Clone)]
pub struct SpawnRequest {
    /// Display name; the persona name is used when empty.
    pub name: String,
    pub persona_name: String,
    pub project_id: String,
    pub persona: Arc<Persona>,
    /// Capabilities on top of the ones the persona declares.
    pub extra_capabilities: BTreeSet<String>,
}

impl SpawnRequest {
    pub fn new(
        persona_name: impl Into<String>,
        project_id: impl Into<String>,
        persona: Arc<Persona>,
    ) -> Self {
        Self {
            name: String::new(),
            persona_name: persona_name.into(),
            project_id: project_id.into(),
            persona,
            extra_capabilities: BTreeSet::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_capabilities<I, S>(mut self, capabilities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_capabilities
            .extend(capabilities.into_iter().map(Into::into));
        self
    }
}

/// Everything the registry lock protects.
#[derive(Default)]
struct Indices {
    agents: HashMap<String, Agent>,
    by_project: HashMap<String, HashSet<String>>,
    /// task id -> agent id, for every agent with a current task.
    task_holders: HashMap<String, String>,
}

impl Indices {
    fn live_count(&self) -> usize {
        self.agents.values().filter(|a| a.is_live()).count()
    }

    fn agent_mut(&mut self, id: &str) -> LoomResult<&mut Agent> {
        self.agents
            .get_mut(id)
            .ok_or_else(|| LoomError::NotFound(id.to_string()))
    }

    /// Drop the agent's current task, keeping the holder index in sync.
    fn clear_task(&mut self, id: &str) {
        let released = self
            .agents
            .get_mut(id)
            .and_then(|agent| agent.current_task_id.take());
        if let Some(task_id) = released {
            self.task_holders.remove(&task_id);
        }
    }
}

/// Owns every live agent record.
///
/// All state sits behind a single reader/writer lock: mutations hold the
/// write lock for the whole index update and reads clone records out before
/// releasing the read lock, so callers never alias internal state.
pub struct AgentRegistry {
    max_agents: i64,
    stale_after: Duration,
    clock: Arc<dyn Clock>,
    inner: RwLock<Indices>,
}

impl AgentRegistry {
    /// Create a registry with the given capacity ceiling and the system clock.
    ///
    /// A ceiling of zero or below rejects every spawn.
    pub fn new(max_agents: i64) -> Self {
        Self::with_clock(max_agents, Arc::new(SystemClock))
    }

    pub fn with_clock(max_agents: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_agents,
            stale_after: RegistryConfig::default().stale_after(),
            clock,
            inner: RwLock::new(Indices::default()),
        }
    }

    pub fn from_config(config: &RegistryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            stale_after: config.stale_after(),
            ..Self::with_clock(config.max_agents, clock)
        }
    }

    /// The time source used for liveness stamps.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Silence threshold used by [`stale_agents_default`](Self::stale_agents_default).
    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// The configured capacity ceiling.
    pub fn capacity(&self) -> i64 {
        self.max_agents
    }

    /// Number of agents that count against capacity.
    pub fn live_count(&self) -> usize {
        self.inner.read().live_count()
    }

    /// Spawn a new idle agent.
    pub fn spawn(&self, request: SpawnRequest) -> LoomResult<Agent> {
        let role = resolve_role(&request.persona_name);
        let mut capabilities = request.persona.capabilities.clone();
        capabilities.extend(request.extra_capabilities);
        let name = if request.name.is_empty() {
            request.persona_name.clone()
        } else {
            request.name
        };

        let mut inner = self.inner.write();

        let live = i64::try_from(inner.live_count()).unwrap_or(i64::MAX);
        if live >= self.max_agents {
            warn!(
                max_agents = self.max_agents,
                persona = %request.persona_name,
                "Spawn rejected: agent capacity reached"
            );
            return Err(LoomError::CapacityExceeded {
                max: self.max_agents,
            });
        }

        let now = self.clock.now();
        let agent = Agent {
            id: format!("agent-{}", Uuid::new_v4()),
            name,
            persona_name: request.persona_name,
            role,
            project_id: request.project_id,
            capabilities,
            status: AgentStatus::Idle,
            current_task_id: None,
            last_active: now,
            started_at: now,
            persona: request.persona,
        };

        inner
            .by_project
            .entry(agent.project_id.clone())
            .or_default()
            .insert(agent.id.clone());
        inner.agents.insert(agent.id.clone(), agent.clone());

        info!(
            agent = %agent.id,
            persona = %agent.persona_name,
            role = %agent.role,
            project = %agent.project_id,
            "Spawned agent"
        );
        Ok(agent)
    }

    pub fn get(&self, id: &str) -> LoomResult<Agent> {
        self.inner
            .read()
            .agents
            .get(id)
            .cloned()
            .ok_or_else(|| LoomError::NotFound(id.to_string()))
    }

    /// Snapshot of every agent. Order is not significant.
    pub fn list(&self) -> Vec<Agent> {
        self.inner.read().agents.values().cloned().collect()
    }

    /// Snapshot of the agents scoped to a project.
    pub fn list_by_project(&self, project_id: &str) -> Vec<Agent> {
        let inner = self.inner.read();
        inner
            .by_project
            .get(project_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.agents.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set an agent's status.
    ///
    /// This is a low-level primitive: any status is accepted. Moving to a
    /// non-working status releases the agent's current task. Bringing a
    /// stopped agent back is subject to the capacity ceiling.
    pub fn update_status(&self, id: &str, status: AgentStatus) -> LoomResult<()> {
        let now = self.clock.now();
        let mut inner = self.inner.write();

        let previous = inner.agent_mut(id)?.status;
        if previous == AgentStatus::Stopped && status != AgentStatus::Stopped {
            let live = i64::try_from(inner.live_count()).unwrap_or(i64::MAX);
            if live >= self.max_agents {
                warn!(
                    agent = %id,
                    max_agents = self.max_agents,
                    "Revive rejected: agent capacity reached"
                );
                return Err(LoomError::CapacityExceeded {
                    max: self.max_agents,
                });
            }
        }

        let agent = inner.agent_mut(id)?;
        agent.status = status;
        touch(agent, now);

        if status != AgentStatus::Working {
            inner.clear_task(id);
        }

        debug!(agent = %id, from = %previous, to = %status, "Agent status updated");
        Ok(())
    }

    /// Hand a task to an agent: records the task and forces `Working`.
    ///
    /// The agent must be idle, or already working on this same task. Of two
    /// concurrent calls against one idle agent exactly one succeeds; the
    /// loser gets [`LoomError::AgentUnavailable`].
    pub fn assign_task(&self, id: &str, task_id: &str) -> LoomResult<Agent> {
        let now = self.clock.now();
        let mut inner = self.inner.write();

        if let Some(holder) = inner.task_holders.get(task_id) {
            if holder != id {
                return Err(LoomError::TaskAlreadyAssigned {
                    task_id: task_id.to_string(),
                    agent_id: holder.clone(),
                });
            }
        }

        let agent = inner.agent_mut(id)?;
        let already_holding = agent.status == AgentStatus::Working
            && agent.current_task_id.as_deref() == Some(task_id);
        if agent.status != AgentStatus::Idle && !already_holding {
            return Err(LoomError::AgentUnavailable {
                id: id.to_string(),
                status: agent.status.to_string(),
            });
        }

        agent.current_task_id = Some(task_id.to_string());
        agent.status = AgentStatus::Working;
        touch(agent, now);
        let snapshot = agent.clone();

        inner
            .task_holders
            .insert(task_id.to_string(), id.to_string());

        info!(agent = %id, task = %task_id, "Assigned task");
        Ok(snapshot)
    }

    /// Return an agent to `Idle` and clear its current task.
    pub fn release(&self, id: &str) -> LoomResult<Agent> {
        let now = self.clock.now();
        let mut inner = self.inner.write();

        let agent = inner.agent_mut(id)?;
        agent.status = AgentStatus::Idle;
        touch(agent, now);
        inner.clear_task(id);

        debug!(agent = %id, "Released agent");
        inner
            .agents
            .get(id)
            .cloned()
            .ok_or_else(|| LoomError::NotFound(id.to_string()))
    }

    /// Record that the agent is still alive.
    pub fn heartbeat(&self, id: &str) -> LoomResult<()> {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        touch(inner.agent_mut(id)?, now);
        debug!(agent = %id, "Heartbeat");
        Ok(())
    }

    /// Remove an agent from every index. Its capacity slot is freed.
    pub fn stop(&self, id: &str) -> LoomResult<()> {
        let mut inner = self.inner.write();

        let agent = inner
            .agents
            .remove(id)
            .ok_or_else(|| LoomError::NotFound(id.to_string()))?;

        if let Some(ids) = inner.by_project.get_mut(&agent.project_id) {
            ids.remove(id);
            if ids.is_empty() {
                inner.by_project.remove(&agent.project_id);
            }
        }
        if let Some(task_id) = &agent.current_task_id {
            inner.task_holders.remove(task_id);
        }

        info!(agent = %id, project = %agent.project_id, "Stopped agent");
        Ok(())
    }

    /// Snapshot of the agents currently idle.
    pub fn idle_agents(&self) -> Vec<Agent> {
        self.inner
            .read()
            .agents
            .values()
            .filter(|a| a.is_idle())
            .cloned()
            .collect()
    }

    /// The agent currently holding a task, if any.
    pub fn holder_of(&self, task_id: &str) -> Option<Agent> {
        let inner = self.inner.read();
        inner
            .task_holders
            .get(task_id)
            .and_then(|id| inner.agents.get(id))
            .cloned()
    }

    /// Live agents that have not shown activity for longer than `max_silence`.
    pub fn stale_agents(&self, max_silence: Duration) -> Vec<Agent> {
        let cutoff = self.clock.now() - max_silence;
        self.inner
            .read()
            .agents
            .values()
            .filter(|a| a.is_live() && a.last_active < cutoff)
            .cloned()
            .collect()
    }

    /// [`stale_agents`](Self::stale_agents) with the configured threshold.
    pub fn stale_agents_default(&self) -> Vec<Agent> {
        self.stale_agents(self.stale_after)
    }
}

/// Bump `last_active` without ever moving it backwards.
fn touch(agent: &mut Agent, now: DateTime<Utc>) {
    if now > agent.last_active {
        agent.last_active = now;
    }
}
