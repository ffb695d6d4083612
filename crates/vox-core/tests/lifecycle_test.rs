//! Cross-module scenarios: a session creates several tasks and drives them
//! through the runtime bridge to completion, exercising the same path
//! `vox-cli` wires up at startup but without a store attached.

use std::sync::Arc;
use std::time::Duration;

use tokio_stream::StreamExt;
use vox_core::{
    CreateRequest, ManagerConfig, RiskLevel, RuntimeConfig, SessionManager, SessionManagerConfig,
    TaskManager, TaskRuntime, TaskStatus,
};
use vox_test_support::{create_request, ScriptedExecutor, ScriptedOutcome};

fn req(session_id: &str, intent: &str) -> CreateRequest {
    create_request(session_id, intent)
}

#[tokio::test]
async fn a_single_session_runs_tasks_one_at_a_time_in_order() {
    let sessions = SessionManager::new(SessionManagerConfig::default());
    let manager = TaskManager::new(ManagerConfig::default(), None);
    let executor = ScriptedExecutor::completing_with(Some("ok".to_string()));
    let runtime = TaskRuntime::new(manager.clone(), executor.clone(), RuntimeConfig::default());

    let session = sessions.create("user-1", "default", None);

    let first = runtime
        .create(req(&session.id, "book a flight"), None, RiskLevel::Low, false)
        .await
        .unwrap();
    let second = runtime
        .create(req(&session.id, "book a hotel"), None, RiskLevel::Low, false)
        .await
        .unwrap();

    assert_eq!(first.task.status, TaskStatus::Running);
    assert_eq!(second.task.status, TaskStatus::Planned);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let first_task = manager.get(&first.task.id).await.unwrap();
    assert_eq!(first_task.status, TaskStatus::Completed);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let second_task = manager.get(&second.task.id).await.unwrap();
    assert_eq!(second_task.status, TaskStatus::Completed);
    assert_eq!(executor.run_count(), 2);
}

#[tokio::test]
async fn subscriber_sees_the_full_event_sequence_for_a_simple_task() {
    let manager = TaskManager::new(ManagerConfig::default(), None);
    let executor = ScriptedExecutor::new(
        vec!["halfway there".to_string()],
        ScriptedOutcome::Complete(Some("done".to_string())),
    );
    let runtime = TaskRuntime::new(manager.clone(), executor, RuntimeConfig::default());

    let (mut stream, unsub) = manager.subscribe("s1");

    let outcome = runtime
        .create(req("s1", "wash the car"), None, RiskLevel::Low, false)
        .await
        .unwrap();

    let mut seen = Vec::new();
    for _ in 0..5 {
        if let Ok(Some(event)) =
            tokio::time::timeout(Duration::from_millis(200), stream.next()).await
        {
            seen.push(event.event_type.to_string());
        }
    }

    assert_eq!(
        seen,
        vec![
            "task_created",
            "task_plan_graph",
            "task_step_started",
            "task_step_log",
            "task_step_completed",
        ]
    );

    let task = manager.get(&outcome.task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    unsub.unsubscribe();
}

#[tokio::test]
async fn a_failing_executor_frees_the_queue_for_the_next_task() {
    let manager = TaskManager::new(ManagerConfig::default(), None);
    let executor = ScriptedExecutor::new(
        Vec::new(),
        ScriptedOutcome::Fail("tool exploded".to_string()),
    );
    let runtime = TaskRuntime::new(manager.clone(), executor, RuntimeConfig::default());

    let first = runtime
        .create(req("s1", "do the risky thing"), None, RiskLevel::Low, false)
        .await
        .unwrap();
    let second = runtime
        .create(req("s1", "do the safe thing"), None, RiskLevel::Low, false)
        .await
        .unwrap();
    assert_eq!(second.task.status, TaskStatus::Planned);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let first_task = manager.get(&first.task.id).await.unwrap();
    assert_eq!(first_task.status, TaskStatus::Failed);
    assert_eq!(first_task.error.as_deref(), Some("tool exploded"));

    let second_task = manager.get(&second.task.id).await.unwrap();
    assert_eq!(second_task.status, TaskStatus::Running);
}

#[tokio::test]
async fn cancel_stops_a_hanging_executor_and_releases_the_slot() {
    let manager = TaskManager::new(ManagerConfig::default(), None);
    let executor = ScriptedExecutor::new(Vec::new(), ScriptedOutcome::Hang);
    let runtime = TaskRuntime::new(manager.clone(), executor, RuntimeConfig::default());

    let first = runtime
        .create(req("s1", "stall forever"), None, RiskLevel::Low, false)
        .await
        .unwrap();
    let second = runtime
        .create(req("s1", "do this next"), None, RiskLevel::Low, false)
        .await
        .unwrap();

    runtime
        .cancel(&first.task.id, "operator stop".to_string())
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;

    let first_task = manager.get(&first.task.id).await.unwrap();
    assert_eq!(first_task.status, TaskStatus::Cancelled);

    let second_task = manager.get(&second.task.id).await.unwrap();
    assert_eq!(second_task.status, TaskStatus::Running);
}

#[tokio::test]
async fn session_expiry_does_not_disturb_an_unrelated_task_queue() {
    let sessions = SessionManager::new(SessionManagerConfig::new(
        chrono::Duration::seconds(30),
        chrono::Duration::zero(),
    ));
    let manager = TaskManager::new(ManagerConfig::default(), None);
    let executor = ScriptedExecutor::completing_with(Some("ok".to_string()));
    let runtime = TaskRuntime::new(manager.clone(), executor, RuntimeConfig::default());

    let stale = sessions.create("stale-user", "default", None);
    let fresh = sessions.create("fresh-user", "default", None);

    let fresh_task = runtime
        .create(req(&fresh.id, "keep going"), None, RiskLevel::Low, false)
        .await
        .unwrap();

    let later = stale.last_activity_at + chrono::Duration::seconds(31);
    sessions.sweep(later);

    assert_eq!(sessions.get(&stale.id).unwrap().status, vox_core::SessionStatus::Ended);
    assert_eq!(sessions.get(&fresh.id).unwrap().status, vox_core::SessionStatus::Active);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let task = manager.get(&fresh_task.task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
}

#[tokio::test]
async fn approval_gate_blocks_execution_until_approved_then_runs() {
    let manager = TaskManager::new(ManagerConfig::default(), None);
    let executor = ScriptedExecutor::completing_with(Some("shipped".to_string()));
    let runtime = TaskRuntime::new(manager.clone(), executor.clone(), RuntimeConfig::default());

    let created = runtime
        .create(
            req("s1", "delete the production database"),
            None,
            RiskLevel::Blocked,
            true,
        )
        .await
        .unwrap();
    assert_eq!(created.task.status, TaskStatus::AwaitingApproval);
    assert_eq!(executor.run_count(), 0);

    let approved = runtime.approve(&created.task.id, true).await.unwrap();
    assert_eq!(approved.task.status, TaskStatus::Running);

    tokio::time::sleep(Duration::from_millis(30)).await;
    let task = manager.get(&created.task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.as_deref(), Some("shipped"));
}

#[tokio::test]
async fn disabled_runtime_still_lets_the_manager_create_tasks_directly() {
    let manager = TaskManager::new(ManagerConfig::default(), None);
    let executor: Arc<ScriptedExecutor> = ScriptedExecutor::completing_with(None);
    let runtime = TaskRuntime::new(
        manager.clone(),
        executor.clone(),
        RuntimeConfig {
            enabled: false,
            task_timeout: Duration::from_secs(1),
        },
    );

    assert!(runtime
        .create(req("s1", "anything"), None, RiskLevel::Low, false)
        .await
        .is_err());

    let outcome = manager
        .create(req("s1", "anything"), None, RiskLevel::Low, false)
        .await
        .unwrap();
    assert_eq!(outcome.task.status, TaskStatus::Running);
    assert_eq!(executor.run_count(), 0);
}
