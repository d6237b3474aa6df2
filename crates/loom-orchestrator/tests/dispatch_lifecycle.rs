//! End-to-end dispatch lifecycle test.
//!
//! Drives a registry and dispatcher built from TOML configuration through
//! spawn, dispatch, completion and shutdown.

use loom_core::{LoomError, ManualClock};
use loom_orchestrator::*;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
[registry]
max_agents = 10

[dispatch]
max_retries = 3
"#;

fn build() -> (Arc<AgentRegistry>, TaskDispatcher, ManualClock) {
    let config = LoomConfig::from_toml_str(CONFIG).unwrap();
    let clock = ManualClock::default();
    let registry = Arc::new(AgentRegistry::from_config(
        &config.registry,
        Arc::new(clock.clone()),
    ));
    let dispatcher = TaskDispatcher::new(
        Arc::clone(&registry),
        Arc::new(KeywordPriorityEvaluator::new(config.priority.clone())),
        config.dispatch.clone(),
    );
    (registry, dispatcher, clock)
}

fn persona(name: &str, capabilities: &[&str]) -> Arc<Persona> {
    Arc::new(Persona::new(name).with_capabilities(capabilities.iter().copied()))
}

#[tokio::test]
async fn test_full_lifecycle() {
    let (registry, dispatcher, clock) = build();
    let cancel = CancellationToken::new();

    let backend = registry
        .spawn(SpawnRequest::new(
            "default/backend-engineer",
            "proj-1",
            persona("backend-engineer", &["api", "sql"]),
        ))
        .unwrap();
    clock.advance(chrono::Duration::seconds(1));
    let qa = registry
        .spawn(SpawnRequest::new(
            "default/qa-engineer",
            "proj-1",
            persona("qa-engineer", &["testing"]),
        ))
        .unwrap();
    assert_eq!(backend.role, "Backend Engineer");
    assert_eq!(qa.role, "QA");
    assert_eq!(registry.list_by_project("proj-1").len(), 2);

    let task = Task::new("bead-1", "The orders api returns stale rows from sql")
        .with_title("Fix order listing");
    let agent = dispatcher.assign_task(&cancel, task).await.unwrap();
    assert_eq!(agent.id, backend.id);

    let working = registry.get(&backend.id).unwrap();
    assert_eq!(working.status, AgentStatus::Working);
    assert_eq!(working.current_task_id.as_deref(), Some("bead-1"));
    assert_eq!(registry.holder_of("bead-1").unwrap().id, backend.id);

    // A QA task goes to the only idle agent.
    let agent = dispatcher
        .assign_task(&cancel, Task::new("bead-2", "write testing notes"))
        .await
        .unwrap();
    assert_eq!(agent.id, qa.id);

    // Everyone is busy now.
    assert!(matches!(
        dispatcher
            .assign_task(&cancel, Task::new("bead-3", "more work"))
            .await,
        Err(LoomError::NoAgentAvailable)
    ));

    dispatcher
        .complete_task("bead-1", Some(serde_json::json!({"pr": 42})))
        .unwrap();
    let idle = registry.get(&backend.id).unwrap();
    assert_eq!(idle.status, AgentStatus::Idle);
    assert!(idle.current_task_id.is_none());

    let agent = dispatcher
        .assign_task(&cancel, Task::new("bead-3", "more work"))
        .await
        .unwrap();
    assert_eq!(agent.id, backend.id);

    registry.stop(&backend.id).unwrap();
    assert!(matches!(
        registry.get(&backend.id),
        Err(LoomError::NotFound(_))
    ));
    assert!(registry.holder_of("bead-3").is_none());
    dispatcher.fail_task("bead-3", "agent stopped").unwrap();
    assert_eq!(registry.list().len(), 1);
}

#[tokio::test]
async fn test_capacity_ceiling_from_config() {
    let (registry, _dispatcher, _clock) = build();
    for i in 0..10 {
        registry
            .spawn(SpawnRequest::new(
                format!("default/worker-{i}"),
                "proj",
                persona("worker", &[]),
            ))
            .unwrap();
    }
    assert!(matches!(
        registry.spawn(SpawnRequest::new("default/worker-x", "proj", persona("worker", &[]))),
        Err(LoomError::CapacityExceeded { max: 10 })
    ));
}

#[tokio::test]
async fn test_dispatch_with_empty_registry() {
    let (_registry, dispatcher, _clock) = build();
    dispatcher
        .submit(Task::new("bead-1", "urgent: production outage"))
        .unwrap();

    let err = dispatcher
        .dispatch_next(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, LoomError::NoAgentAvailable));
    assert_eq!(dispatcher.pending_count(), 1);
    assert_eq!(dispatcher.task("bead-1").unwrap().priority, 2);
}
