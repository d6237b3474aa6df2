//! Agent orchestration core: who is available and who gets which task.
//!
//! Agents are spawned into an [`AgentRegistry`] under a capacity ceiling and
//! move between idle, working, paused and stopped. The [`TaskDispatcher`]
//! scores idle agents against each task and hands the task to the winner
//! atomically, so no two agents ever hold the same task.
//!
//! # Main types
//!
//! - [`AgentRegistry`]: concurrent store of agents, statuses and heartbeats.
//! - [`TaskDispatcher`]: selects an agent for a task and tracks completion.
//! - [`PriorityEvaluator`]: pluggable task urgency scoring.
//! - [`PersonaMatcher`]: reads persona hints out of task text.
//! - [`BugRouter`]: classifies auto-filed bugs by error category.
//! - [`LoomConfig`]: TOML configuration for all of the above.

/// Auto-filed bug classification.
pub mod bug_router;
/// TOML configuration.
pub mod config;
/// Task-to-agent dispatch.
pub mod dispatcher;
/// Persona hint extraction and agent matching.
pub mod persona_hint;
/// Task priority evaluation.
pub mod priority;
/// Agent registry.
pub mod registry;
/// Persona name to workflow role mapping.
pub mod roles;
/// Task ledger used by the dispatcher.
pub mod task_queue;
/// Tracing subscriber setup.
pub mod telemetry;
/// Shared types (Agent, Persona, Task, statuses).
pub mod types;

pub use bug_router::{BugRoute, BugRouter};
pub use config::{DispatchConfig, LoggingConfig, LoomConfig, PriorityConfig, RegistryConfig};
pub use dispatcher::TaskDispatcher;
pub use persona_hint::{normalize_hint, PersonaMatcher};
pub use priority::{KeywordPriorityEvaluator, PriorityEvaluator};
pub use registry::{AgentRegistry, SpawnRequest};
pub use roles::{persona_leaf, resolve_role};
pub use task_queue::TaskQueue;
pub use types::{Agent, AgentStatus, Persona, Task, TaskStatus};
