//! End-to-end wiring test: session manager, task manager, task runtime and
//! a SQLite-backed store together, the same shape `vox-cli::build_app`
//! assembles at startup.

use std::sync::Arc;

use vox_core::{CoreConfig, RiskLevel, SessionManager, TaskManager, TaskRuntime, TaskStatus, TaskStore};
use vox_store::{SqliteTaskStore, StoreConfig};
use vox_test_support::{create_request, ScriptedExecutor, ScriptedOutcome};

#[tokio::test]
async fn create_runs_to_completion_and_persists() {
    let core = CoreConfig::default();
    let store = Arc::new(
        SqliteTaskStore::connect(&StoreConfig::in_memory())
            .await
            .unwrap(),
    );
    let sessions = SessionManager::new(core.session);
    let manager = TaskManager::new(core.task, Some(store.clone() as Arc<dyn TaskStore>));
    let executor = ScriptedExecutor::new(
        vec!["step one".to_string()],
        ScriptedOutcome::Complete(Some("all done".to_string())),
    );
    let runtime = TaskRuntime::new(manager.clone(), executor.clone(), core.runtime);

    let session = sessions.create("u1", "default", None);
    let outcome = runtime
        .create(
            create_request(&session.id, "book a flight"),
            None,
            RiskLevel::Low,
            false,
        )
        .await
        .unwrap();

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let task = manager.get(&outcome.task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result.as_deref(), Some("all done"));
    assert_eq!(executor.run_count(), 1);

    let persisted = store.get_task(&outcome.task.id).await.unwrap();
    assert_eq!(persisted.status, TaskStatus::Completed);
}

#[tokio::test]
async fn approval_required_task_does_not_start_until_approved() {
    let core = CoreConfig::default();
    let manager = TaskManager::new(core.task, None);
    let executor = ScriptedExecutor::completing_with(None);
    let runtime = TaskRuntime::new(manager.clone(), executor.clone(), core.runtime);

    let outcome = runtime
        .create(
            create_request("s1", "do something risky"),
            None,
            RiskLevel::High,
            true,
        )
        .await
        .unwrap();
    assert_eq!(outcome.task.status, TaskStatus::AwaitingApproval);
    assert_eq!(executor.run_count(), 0);

    runtime.approve(&outcome.task.id, true).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert_eq!(executor.run_count(), 1);
}
