//! Store fallback and recovery scenarios: a task manager backed by the
//! in-memory store, exercised the way a process restart would see it (task
//! known to the store but gone from memory), plus event-history recovery
//! for a subscriber that reconnects after missing events.

use std::sync::Arc;
use std::time::Duration;

use vox_core::{InMemoryTaskStore, ManagerConfig, RiskLevel, TaskManager, TaskStatus, TaskStore};
use vox_test_support::create_request;

#[tokio::test]
async fn a_task_manager_restarted_with_the_same_store_recovers_tasks() {
    let store = Arc::new(InMemoryTaskStore::new());
    let manager = TaskManager::new(ManagerConfig::default(), Some(store.clone()));

    let created = manager
        .create(
            create_request("s1", "plan the trip"),
            None,
            RiskLevel::Low,
            false,
        )
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let fresh_manager = TaskManager::new(ManagerConfig::default(), Some(store.clone()));
    let recovered = fresh_manager.get(&created.task.id).await.unwrap();
    assert_eq!(recovered.id, created.task.id);
    assert_eq!(recovered.status, TaskStatus::Running);
    assert!(!recovered.plan_graph.nodes.is_empty());
}

#[tokio::test]
async fn list_by_session_merges_memory_and_store_without_duplicates() {
    let store = Arc::new(InMemoryTaskStore::new());
    let manager = TaskManager::new(ManagerConfig::default(), Some(store.clone()));

    let a = manager
        .create(create_request("s1", "first"), None, RiskLevel::Low, false)
        .await
        .unwrap();
    let b = manager
        .create(create_request("s1", "second"), None, RiskLevel::Low, false)
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(20)).await;

    let tasks = manager.list_by_session("s1", 10).await;
    let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains(&a.task.id.as_str()));
    assert!(ids.contains(&b.task.id.as_str()));
    // newest first
    assert_eq!(tasks[0].id, b.task.id);
}

#[tokio::test]
async fn list_events_lets_a_reconnecting_subscriber_catch_up() {
    let manager = TaskManager::new(ManagerConfig::default(), None);
    let created = manager
        .create(
            create_request("s1", "send the email"),
            None,
            RiskLevel::Low,
            false,
        )
        .await
        .unwrap();

    manager
        .append_step_log(&created.task.id, "drafting")
        .await
        .unwrap();
    manager
        .complete(&created.task.id, Some("sent".to_string()))
        .await
        .unwrap();

    let events = manager.list_events(&created.task.id, 0).await.unwrap();
    let kinds: Vec<String> = events.iter().map(|e| e.event_type.to_string()).collect();
    assert!(kinds.contains(&"task_created".to_string()));
    assert!(kinds.contains(&"task_step_log".to_string()));
    assert!(kinds.contains(&"task_completed".to_string()));

    let limited = manager.list_events(&created.task.id, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn idempotent_create_returns_the_same_task_without_double_publishing() {
    let manager = TaskManager::new(ManagerConfig::default(), None);
    let first = manager
        .create(
            create_request("s1", "Turn on the lights"),
            None,
            RiskLevel::Low,
            false,
        )
        .await
        .unwrap();
    let second = manager
        .create(
            create_request("s1", "turn on the lights"),
            None,
            RiskLevel::Low,
            false,
        )
        .await
        .unwrap();

    assert!(second.was_dedup);
    assert_eq!(first.task.id, second.task.id);

    let events = manager.list_events(&first.task.id, 0).await.unwrap();
    let created_events = events
        .iter()
        .filter(|e| e.event_type == vox_core::EventType::TaskCreated)
        .count();
    assert_eq!(created_events, 1);
}

#[tokio::test]
async fn snapshot_counts_reflect_running_and_queued_tasks_across_sessions() {
    let manager = TaskManager::new(ManagerConfig::default(), None);
    manager
        .create(create_request("s1", "a"), None, RiskLevel::Low, false)
        .await
        .unwrap();
    manager
        .create(create_request("s1", "b"), None, RiskLevel::Low, false)
        .await
        .unwrap();
    manager
        .create(create_request("s2", "c"), None, RiskLevel::Low, false)
        .await
        .unwrap();

    let (running, queued) = manager.snapshot_counts();
    assert_eq!(running, 2);
    assert_eq!(queued, 1);
}
