use crate::types::{Task, TaskStatus};
use chrono::{DateTime, Utc};
use loom_core::{LoomError, LoomResult};
use std::collections::{HashMap, HashSet};

/// The dispatcher's ledger of submitted tasks.
///
/// Tracks each task from submission through assignment to a terminal state.
/// Terminal tasks stay in the ledger for lookup, and never change again,
/// until [`prune_finished`](Self::prune_finished) drops them.
pub struct TaskQueue {
    tasks: HashMap<String, Task>,
    /// Pending tasks a dispatcher is currently trying to place.
    claimed: HashSet<String>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
            claimed: HashSet::new(),
        }
    }

    /// Add a pending task. A task id already in the ledger is rejected
    /// unless that entry is still pending, in which case it is replaced.
    pub fn add(&mut self, mut task: Task) -> LoomResult<()> {
        if let Some(existing) = self.tasks.get(&task.id) {
            if existing.status != TaskStatus::Pending {
                return Err(LoomError::InvalidTransition {
                    task_id: task.id,
                    from: existing.status.to_string(),
                });
            }
        }
        task.status = TaskStatus::Pending;
        task.assigned_to = None;
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// The most urgent unclaimed pending task; the oldest wins among equal
    /// priorities.
    pub fn next_pending(&self) -> Option<&Task> {
        self.tasks
            .values()
            .filter(|t| t.status == TaskStatus::Pending && !self.claimed.contains(&t.id))
            .max_by(|a, b| {
                a.priority
                    .cmp(&b.priority)
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.id.cmp(&a.id))
            })
    }

    /// Reserve the next pending task so concurrent callers skip it.
    pub fn claim_next(&mut self) -> Option<Task> {
        let task = self.next_pending().cloned()?;
        self.claimed.insert(task.id.clone());
        Some(task)
    }

    /// Give a claimed task back. Unknown or unclaimed ids are ignored.
    pub fn release_claim(&mut self, id: &str) {
        self.claimed.remove(id);
    }

    pub fn is_claimed(&self, id: &str) -> bool {
        self.claimed.contains(id)
    }

    /// Record a task as held by an agent. Inserts the task if unknown.
    pub fn mark_assigned(&mut self, mut task: Task, agent_id: &str) -> LoomResult<()> {
        self.claimed.remove(&task.id);
        if let Some(existing) = self.tasks.get(&task.id) {
            if existing.status.is_terminal() {
                return Err(LoomError::InvalidTransition {
                    task_id: task.id,
                    from: existing.status.to_string(),
                });
            }
        }
        task.status = TaskStatus::Assigned;
        task.assigned_to = Some(agent_id.to_string());
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Finish a task successfully. Returns the agent that held it.
    pub fn mark_completed(
        &mut self,
        id: &str,
        result: Option<serde_json::Value>,
        at: DateTime<Utc>,
    ) -> LoomResult<Option<String>> {
        let task = self.finishable(id)?;
        task.status = TaskStatus::Completed;
        task.result = result;
        task.completed_at = Some(at);
        Ok(task.assigned_to.clone())
    }

    /// Finish a task unsuccessfully. Returns the agent that held it.
    pub fn mark_failed(
        &mut self,
        id: &str,
        reason: String,
        at: DateTime<Utc>,
    ) -> LoomResult<Option<String>> {
        let task = self.finishable(id)?;
        task.status = TaskStatus::Failed { reason };
        task.completed_at = Some(at);
        Ok(task.assigned_to.clone())
    }

    fn finishable(&mut self, id: &str) -> LoomResult<&mut Task> {
        self.claimed.remove(id);
        let task = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| LoomError::TaskNotFound(id.to_string()))?;
        if task.status.is_terminal() {
            return Err(LoomError::InvalidTransition {
                task_id: id.to_string(),
                from: task.status.to_string(),
            });
        }
        Ok(task)
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn pending_count(&self) -> usize {
        self.count(|s| *s == TaskStatus::Pending)
    }

    pub fn assigned_count(&self) -> usize {
        self.count(|s| *s == TaskStatus::Assigned)
    }

    pub fn completed_count(&self) -> usize {
        self.count(|s| *s == TaskStatus::Completed)
    }

    pub fn total_count(&self) -> usize {
        self.tasks.len()
    }

    /// Drop terminal tasks that finished before `cutoff`. Returns how many
    /// were removed.
    pub fn prune_finished(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|_, t| {
            !(t.status.is_terminal() && t.completed_at.is_some_and(|at| at < cutoff))
        });
        before - self.tasks.len()
    }

    fn count(&self, pred: impl Fn(&TaskStatus) -> bool) -> usize {
        self.tasks.values().filter(|t| pred(&t.status)).count()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn task(id: &str, priority: i32) -> Task {
        Task::new(id, format!("task {id}")).with_priority(priority)
    }

    #[test]
    fn test_empty_queue() {
        let queue = TaskQueue::new();
        assert_eq!(queue.total_count(), 0);
        assert_eq!(queue.pending_count(), 0);
        assert!(queue.next_pending().is_none());
    }

    #[test]
    fn test_add_and_retrieve() {
        let mut queue = TaskQueue::new();
        queue.add(task("bead-1", 1)).unwrap();
        assert_eq!(queue.total_count(), 1);
        assert_eq!(queue.get("bead-1").unwrap().description, "task bead-1");
        assert_eq!(queue.pending_count(), 1);
    }

    #[test]
    fn test_next_pending_by_priority_then_age() {
        let mut queue = TaskQueue::new();
        let now = Utc::now();

        let mut old_low = task("old-low", 1);
        old_low.created_at = now - Duration::minutes(10);
        let mut old_high = task("old-high", 5);
        old_high.created_at = now - Duration::minutes(5);
        let mut new_high = task("new-high", 5);
        new_high.created_at = now;

        queue.add(new_high).unwrap();
        queue.add(old_low).unwrap();
        queue.add(old_high).unwrap();

        assert_eq!(queue.next_pending().unwrap().id, "old-high");

        let picked = queue.get("old-high").cloned().unwrap();
        queue.mark_assigned(picked, "agent-1").unwrap();
        assert_eq!(queue.next_pending().unwrap().id, "new-high");
    }

    #[test]
    fn test_assign_then_complete() {
        let mut queue = TaskQueue::new();
        queue.mark_assigned(task("bead-1", 0), "agent-1").unwrap();

        let stored = queue.get("bead-1").unwrap();
        assert_eq!(stored.status, TaskStatus::Assigned);
        assert_eq!(stored.assigned_to.as_deref(), Some("agent-1"));
        assert_eq!(queue.assigned_count(), 1);

        let holder = queue
            .mark_completed("bead-1", Some(serde_json::json!({"ok": true})), Utc::now())
            .unwrap();
        assert_eq!(holder.as_deref(), Some("agent-1"));

        let stored = queue.get("bead-1").unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert!(stored.completed_at.is_some());
        assert_eq!(stored.result, Some(serde_json::json!({"ok": true})));
        assert_eq!(queue.completed_count(), 1);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut queue = TaskQueue::new();
        queue.mark_assigned(task("bead-1", 0), "agent-1").unwrap();
        queue
            .mark_failed("bead-1", "compilation error".into(), Utc::now())
            .unwrap();

        assert!(matches!(
            queue.get("bead-1").unwrap().status,
            TaskStatus::Failed { .. }
        ));
        assert!(matches!(
            queue.mark_completed("bead-1", None, Utc::now()),
            Err(LoomError::InvalidTransition { .. })
        ));
        assert!(matches!(
            queue.mark_assigned(task("bead-1", 0), "agent-2"),
            Err(LoomError::InvalidTransition { .. })
        ));
        assert!(matches!(
            queue.add(task("bead-1", 0)),
            Err(LoomError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_unknown_task() {
        let mut queue = TaskQueue::new();
        assert!(matches!(
            queue.mark_completed("missing", None, Utc::now()),
            Err(LoomError::TaskNotFound(_))
        ));
    }

    #[test]
    fn test_claims_are_exclusive() {
        let mut queue = TaskQueue::new();
        queue.add(task("a", 5)).unwrap();
        queue.add(task("b", 1)).unwrap();

        assert_eq!(queue.claim_next().unwrap().id, "a");
        assert!(queue.is_claimed("a"));
        assert_eq!(queue.claim_next().unwrap().id, "b");
        assert!(queue.claim_next().is_none());
        assert_eq!(queue.pending_count(), 2);

        queue.release_claim("a");
        assert_eq!(queue.next_pending().unwrap().id, "a");

        let b = queue.get("b").cloned().unwrap();
        queue.mark_assigned(b, "agent-1").unwrap();
        assert!(!queue.is_claimed("b"));
        assert_eq!(queue.claim_next().unwrap().id, "a");
        assert!(queue.claim_next().is_none());
    }

    #[test]
    fn test_prune_finished() {
        let mut queue = TaskQueue::new();
        let now = Utc::now();
        queue.mark_assigned(task("old", 0), "agent-1").unwrap();
        queue.mark_completed("old", None, now - Duration::hours(2)).unwrap();
        queue.mark_assigned(task("recent", 0), "agent-1").unwrap();
        queue.mark_failed("recent", "boom".into(), now).unwrap();
        queue.mark_assigned(task("running", 0), "agent-2").unwrap();
        queue.add(task("waiting", 0)).unwrap();

        assert_eq!(queue.prune_finished(now - Duration::hours(1)), 1);
        assert!(queue.get("old").is_none());
        assert!(queue.get("recent").is_some());
        assert!(queue.get("running").is_some());
        assert!(queue.get("waiting").is_some());
        assert_eq!(queue.total_count(), 3);
    }

    #[test]
    fn test_resubmitting_pending_task_replaces_it() {
        let mut queue = TaskQueue::new();
        queue.add(task("bead-1", 1)).unwrap();
        queue.add(task("bead-1", 7)).unwrap();
        assert_eq!(queue.total_count(), 1);
        assert_eq!(queue.get("bead-1").unwrap().priority, 7);
    }
}
