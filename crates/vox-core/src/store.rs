//! The task store contract. `TaskManager` depends only on this trait, never
//! on a concrete storage engine, so persistence can be swapped (or dropped
//! entirely) without touching state-machine logic.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::TaskStoreError;
use crate::types::Task;

#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn save_task(&self, task: &Task) -> Result<(), TaskStoreError>;
    async fn get_task(&self, task_id: &str) -> Result<Task, TaskStoreError>;
    async fn list_tasks_by_session(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Task>, TaskStoreError>;
    /// Releases the store's underlying resources (connections, file
    /// handles). Called once during shutdown; a closed store must not be
    /// used afterwards.
    async fn close(&self) -> Result<(), TaskStoreError>;
}

/// A `TaskStore` backed by a plain map. Used by `vox-core`'s own tests and by
/// `vox-test-support`; not meant to survive a process restart.
#[derive(Default)]
pub struct InMemoryTaskStore {
    tasks: Mutex<HashMap<String, Task>>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn save_task(&self, task: &Task) -> Result<(), TaskStoreError> {
        self.tasks
            .lock()
            .unwrap()
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, TaskStoreError> {
        self.tasks
            .lock()
            .unwrap()
            .get(task_id)
            .cloned()
            .ok_or(TaskStoreError::NotFound)
    }

    async fn list_tasks_by_session(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Task>, TaskStoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.session_id == session_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if limit > 0 {
            tasks.truncate(limit as usize);
        }
        Ok(tasks)
    }

    async fn close(&self) -> Result<(), TaskStoreError> {
        self.tasks.lock().unwrap().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::build_plan_graph;
    use crate::types::{RiskLevel, TaskStatus};
    use chrono::Utc;

    fn sample_task(id: &str, session_id: &str) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            session_id: session_id.to_string(),
            user_id: "u1".to_string(),
            intent_text: "do a thing".to_string(),
            summary: "do a thing".to_string(),
            plan_graph: build_plan_graph("do a thing", "do a thing", RiskLevel::Low, false),
            mode: String::new(),
            priority: String::new(),
            status: TaskStatus::Planned,
            risk: RiskLevel::Low,
            requires_approval: false,
            current_step_id: "n1".to_string(),
            steps: vec![],
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
        }
    }

    #[tokio::test]
    async fn round_trips_and_lists_by_session() {
        let store = InMemoryTaskStore::new();
        store.save_task(&sample_task("t1", "s1")).await.unwrap();
        store.save_task(&sample_task("t2", "s1")).await.unwrap();
        store.save_task(&sample_task("t3", "s2")).await.unwrap();

        let fetched = store.get_task("t1").await.unwrap();
        assert_eq!(fetched.id, "t1");

        let by_session = store.list_tasks_by_session("s1", 10).await.unwrap();
        assert_eq!(by_session.len(), 2);

        let missing = store.get_task("nope").await;
        assert!(matches!(missing, Err(TaskStoreError::NotFound)));

        store.close().await.unwrap();
        assert!(matches!(
            store.get_task("t1").await,
            Err(TaskStoreError::NotFound)
        ));
    }
}
