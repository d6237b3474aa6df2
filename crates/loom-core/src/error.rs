use thiserror::Error;

/// A convenience `Result` alias using [`LoomError`].
pub type LoomResult<T> = Result<T, LoomError>;

/// Top-level error type for the Loom orchestrator.
///
/// Registry and dispatcher failures are all typed and recoverable. Callers
/// should treat [`LoomError::is_retryable`] errors as operational conditions
/// (queue the task, back off) and everything else as a caller bug or a stale
/// reference.
#[derive(Error, Debug)]
pub enum LoomError {
    /// A spawn was rejected because the live-agent ceiling is reached.
    #[error("agent capacity exceeded (max {max})")]
    CapacityExceeded {
        /// The configured ceiling.
        max: i64,
    },

    /// An operation referenced an unknown or empty agent id.
    #[error("agent not found: {0:?}")]
    NotFound(String),

    /// No idle agent exists to take the task.
    #[error("no agent available")]
    NoAgentAvailable,

    /// The dispatch was cancelled or its deadline passed mid-search.
    #[error("dispatch cancelled")]
    Cancelled,

    /// The agent exists but cannot take a task in its current state.
    #[error("agent {id} is unavailable (status {status})")]
    AgentUnavailable {
        /// Agent id.
        id: String,
        /// Status the agent was observed in.
        status: String,
    },

    /// Another agent already holds the task.
    #[error("task {task_id} is already assigned to agent {agent_id}")]
    TaskAlreadyAssigned {
        /// Task id.
        task_id: String,
        /// Agent currently holding the task.
        agent_id: String,
    },

    /// The dispatcher has no record of the task.
    #[error("task not found: {0:?}")]
    TaskNotFound(String),

    /// The task is in a state that does not allow the requested transition.
    #[error("task {task_id} cannot transition from {from}")]
    InvalidTransition {
        /// Task id.
        task_id: String,
        /// Current status of the task.
        from: String,
    },

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LoomError {
    /// Whether the caller can reasonably retry the operation later.
    ///
    /// `NoAgentAvailable` and `Cancelled` are expected operational outcomes;
    /// `AgentUnavailable` is a lost race against another dispatcher.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LoomError::NoAgentAvailable | LoomError::Cancelled | LoomError::AgentUnavailable { .. }
        )
    }
}
