use crate::bug_router::BugRouter;
use crate::config::DispatchConfig;
use crate::persona_hint::PersonaMatcher;
use crate::priority::PriorityEvaluator;
use crate::registry::AgentRegistry;
use crate::task_queue::TaskQueue;
use crate::types::{Agent, Task};
use loom_core::{Clock, LoomError, LoomResult};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the scorer needs to know about a task, computed once per dispatch.
struct TaskProfile {
    capabilities: BTreeSet<String>,
    persona_hint: Option<String>,
}

/// Holds a ledger claim for the duration of a `dispatch_next` call.
struct ClaimGuard<'a> {
    queue: &'a Mutex<TaskQueue>,
    task_id: String,
}

impl Drop for ClaimGuard<'_> {
    fn drop(&mut self) {
        self.queue.lock().release_claim(&self.task_id);
    }
}

/// Matches tasks to idle agents and performs the hand-off.
///
/// Selection scores every idle agent by capability overlap and persona-hint
/// match, breaking ties in favour of the agent idle the longest. The
/// registry's guarded `assign_task` makes the hand-off atomic; if another
/// caller wins the agent first, selection runs again within the configured
/// retry budget.
pub struct TaskDispatcher {
    registry: Arc<AgentRegistry>,
    evaluator: Arc<dyn PriorityEvaluator>,
    matcher: PersonaMatcher,
    bug_router: BugRouter,
    config: DispatchConfig,
    queue: Mutex<TaskQueue>,
}

impl TaskDispatcher {
    pub fn new(
        registry: Arc<AgentRegistry>,
        evaluator: Arc<dyn PriorityEvaluator>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            registry,
            evaluator,
            matcher: PersonaMatcher::new(),
            bug_router: BugRouter::new(),
            config,
            queue: Mutex::new(TaskQueue::new()),
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// Assign a task to the best idle agent and return that agent.
    ///
    /// Fails with [`LoomError::NoAgentAvailable`] when nobody is idle or the
    /// retry budget runs out, and with [`LoomError::Cancelled`] once the
    /// token is cancelled.
    pub async fn assign_task(&self, cancel: &CancellationToken, mut task: Task) -> LoomResult<Agent> {
        if let Some(existing) = self.queue.lock().get(&task.id) {
            if existing.status.is_terminal() {
                return Err(LoomError::InvalidTransition {
                    task_id: task.id,
                    from: existing.status.to_string(),
                });
            }
        }

        task.priority = self.evaluator.evaluate(&task);
        let profile = self.profile(&task);

        for attempt in 0..=self.config.max_retries {
            if cancel.is_cancelled() {
                info!(task = %task.id, attempt, "Dispatch cancelled");
                return Err(LoomError::Cancelled);
            }

            let candidates = self.registry.idle_agents();
            let Some(winner) = self.select(&candidates, &profile) else {
                debug!(task = %task.id, "No idle agents");
                return Err(LoomError::NoAgentAvailable);
            };

            match self.registry.assign_task(&winner.id, &task.id) {
                Ok(agent) => {
                    info!(
                        task = %task.id,
                        agent = %agent.id,
                        role = %agent.role,
                        priority = task.priority,
                        attempt,
                        "Dispatched task"
                    );
                    if let Err(e) = self.queue.lock().mark_assigned(task, &agent.id) {
                        // The task was finalised concurrently; give the agent back.
                        warn!(agent = %agent.id, error = %e, "Ledger rejected assignment");
                        self.registry.release(&agent.id)?;
                        return Err(e);
                    }
                    return Ok(agent);
                }
                Err(e @ (LoomError::AgentUnavailable { .. } | LoomError::NotFound(_))) => {
                    debug!(
                        task = %task.id,
                        agent = %winner.id,
                        attempt,
                        error = %e,
                        "Lost hand-off race, reselecting"
                    );
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            task = %task.id,
            retries = self.config.max_retries,
            "Retry budget exhausted"
        );
        Err(LoomError::NoAgentAvailable)
    }

    /// Queue a task for a later [`dispatch_next`](Self::dispatch_next).
    pub fn submit(&self, mut task: Task) -> LoomResult<()> {
        task.priority = self.evaluator.evaluate(&task);
        debug!(task = %task.id, priority = task.priority, "Queued task");
        self.queue.lock().add(task)
    }

    /// Dispatch the most urgent queued task. The task stays queued if no
    /// agent can take it.
    ///
    /// Concurrent callers never pick the same task. Returns `Ok(None)` when
    /// nothing unclaimed is pending.
    pub async fn dispatch_next(&self, cancel: &CancellationToken) -> LoomResult<Option<(Task, Agent)>> {
        let Some(task) = self.queue.lock().claim_next() else {
            return Ok(None);
        };

        let task_id = task.id.clone();
        let _claim = ClaimGuard {
            queue: &self.queue,
            task_id: task_id.clone(),
        };
        let agent = self.assign_task(cancel, task).await?;
        let task = self
            .task(&task_id)
            .ok_or(LoomError::TaskNotFound(task_id))?;
        Ok(Some((task, agent)))
    }

    /// Mark a task completed and return its agent to idle.
    pub fn complete_task(&self, task_id: &str, result: Option<serde_json::Value>) -> LoomResult<()> {
        let now = self.registry.clock().now();
        let holder = self.queue.lock().mark_completed(task_id, result, now)?;
        info!(task = %task_id, "Task completed");
        self.release_holder(task_id, holder)
    }

    /// Mark a task failed and return its agent to idle.
    pub fn fail_task(&self, task_id: &str, reason: impl Into<String>) -> LoomResult<()> {
        let reason = reason.into();
        let now = self.registry.clock().now();
        let holder = self.queue.lock().mark_failed(task_id, reason.clone(), now)?;
        warn!(task = %task_id, reason = %reason, "Task failed");
        self.release_holder(task_id, holder)
    }

    /// Snapshot of a task the dispatcher has seen.
    pub fn task(&self, task_id: &str) -> Option<Task> {
        self.queue.lock().get(task_id).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.lock().pending_count()
    }

    pub fn assigned_count(&self) -> usize {
        self.queue.lock().assigned_count()
    }

    /// Forget finished tasks older than `max_age`. Returns how many were dropped.
    pub fn prune_finished(&self, max_age: chrono::Duration) -> usize {
        let cutoff = self.registry.clock().now() - max_age;
        let pruned = self.queue.lock().prune_finished(cutoff);
        if pruned > 0 {
            debug!(pruned, "Pruned finished tasks");
        }
        pruned
    }

    fn release_holder(&self, task_id: &str, holder: Option<String>) -> LoomResult<()> {
        let Some(agent_id) = holder else {
            return Ok(());
        };
        // The agent may have been stopped or moved on already.
        match self.registry.holder_of(task_id) {
            Some(agent) if agent.id == agent_id => {
                self.registry.release(&agent_id)?;
            }
            _ => debug!(task = %task_id, agent = %agent_id, "Agent no longer holds task"),
        }
        Ok(())
    }

    fn profile(&self, task: &Task) -> TaskProfile {
        let persona_hint = self.matcher.extract_hint(task).or_else(|| {
            let route = self.bug_router.route(task);
            route.should_route.then_some(route.persona_hint).flatten()
        });
        TaskProfile {
            capabilities: task.implied_capabilities(),
            persona_hint,
        }
    }

    fn score(&self, agent: &Agent, profile: &TaskProfile) -> u64 {
        let overlap = agent
            .capabilities
            .iter()
            .filter(|c| profile.capabilities.contains(&c.to_lowercase()))
            .count() as u64;
        let hinted = profile
            .persona_hint
            .as_deref()
            .is_some_and(|hint| self.matcher.hint_matches(hint, agent));

        overlap * u64::from(self.config.capability_weight)
            + if hinted {
                u64::from(self.config.role_weight)
            } else {
                0
            }
    }

    /// Highest score wins; ties go to the earliest `last_active`, then the
    /// smallest id so selection is deterministic.
    fn select<'a>(&self, candidates: &'a [Agent], profile: &TaskProfile) -> Option<&'a Agent> {
        candidates
            .iter()
            .map(|agent| (self.score(agent, profile), agent))
            .max_by(|(score_a, a), (score_b, b)| {
                score_a
                    .cmp(score_b)
                    .then_with(|| b.last_active.cmp(&a.last_active))
                    .then_with(|| b.id.cmp(&a.id))
            })
            .map(|(_, agent)| agent)
    }
}
