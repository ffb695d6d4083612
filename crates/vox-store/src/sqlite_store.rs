//! `TaskStore` implementation backed by SQLite via `sqlx`.

use async_trait::async_trait;
use sqlx::SqlitePool;
use vox_core::{Task, TaskStore, TaskStoreError};

use crate::config::StoreConfig;
use crate::pool::{create_pool, run_migrations};
use crate::queries::tasks;

pub struct SqliteTaskStore {
    pool: SqlitePool,
}

impl SqliteTaskStore {
    pub async fn connect(config: &StoreConfig) -> anyhow::Result<Self> {
        let pool = create_pool(config).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn save_task(&self, task: &Task) -> Result<(), TaskStoreError> {
        tasks::save_task(&self.pool, task)
            .await
            .map_err(|e| TaskStoreError::Unavailable(e.to_string()))
    }

    async fn get_task(&self, task_id: &str) -> Result<Task, TaskStoreError> {
        match tasks::get_task(&self.pool, task_id).await {
            Ok(Some(task)) => Ok(task),
            Ok(None) => Err(TaskStoreError::NotFound),
            Err(e) => Err(TaskStoreError::Unavailable(e.to_string())),
        }
    }

    async fn list_tasks_by_session(
        &self,
        session_id: &str,
        limit: i64,
    ) -> Result<Vec<Task>, TaskStoreError> {
        tasks::list_tasks_by_session(&self.pool, session_id, limit)
            .await
            .map_err(|e| TaskStoreError::Unavailable(e.to_string()))
    }

    async fn close(&self) -> Result<(), TaskStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
