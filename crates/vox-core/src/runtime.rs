//! The task runtime: bridges task-manager transitions to executor
//! invocations. Wraps `TaskManager`'s public operations the way
//! `run_agent_lifecycle` wraps a dispatch sequence — spawn, stream,
//! complete/fail — rather than registering itself as a callback inside the
//! state machine, so there is no reference cycle between the two.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::TaskManagerError;
use crate::executor::{DeltaSink, Executor, ExecutorRequest};
use crate::task_manager::{CreateOutcome, Outcome, TaskManager};
use crate::types::{CreateRequest, RiskLevel, Task};

#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    pub enabled: bool,
    pub task_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            task_timeout: Duration::from_secs(60),
        }
    }
}

pub struct TaskRuntime {
    manager: Arc<TaskManager>,
    executor: Arc<dyn Executor>,
    contexts: Mutex<HashMap<String, CancellationToken>>,
    config: RuntimeConfig,
}

impl TaskRuntime {
    pub fn new(manager: Arc<TaskManager>, executor: Arc<dyn Executor>, config: RuntimeConfig) -> Arc<Self> {
        Arc::new(Self {
            manager,
            executor,
            contexts: Mutex::new(HashMap::new()),
            config,
        })
    }

    pub fn store_mode(&self) -> &'static str {
        if !self.config.enabled {
            "disabled"
        } else if self.manager.has_store() {
            "persistent"
        } else {
            "in-memory"
        }
    }

    pub async fn create(
        &self,
        req: CreateRequest,
        summary: Option<String>,
        risk: RiskLevel,
        requires_approval: bool,
    ) -> Result<CreateOutcome, TaskManagerError> {
        if !self.config.enabled {
            return Err(TaskManagerError::InvalidState(
                "task runtime is disabled".to_string(),
            ));
        }
        let outcome = self
            .manager
            .create(req, summary, risk, requires_approval)
            .await?;
        if let Some(task) = &outcome.started_task {
            self.spawn_execution(task.clone());
        }
        Ok(outcome)
    }

    pub async fn approve(&self, task_id: &str, approved: bool) -> Result<Outcome, TaskManagerError> {
        let outcome = self.manager.approve(task_id, approved).await?;
        if let Some(task) = &outcome.started_task {
            self.spawn_execution(task.clone());
        }
        Ok(outcome)
    }

    pub async fn pause(&self, task_id: &str, reason: Option<String>) -> Result<Outcome, TaskManagerError> {
        let outcome = self.manager.pause(task_id, reason).await?;
        self.cancel_context(task_id);
        if let Some(task) = &outcome.started_task {
            self.spawn_execution(task.clone());
        }
        Ok(outcome)
    }

    pub async fn cancel(&self, task_id: &str, reason: String) -> Result<Outcome, TaskManagerError> {
        let outcome = self.manager.cancel(task_id, reason).await?;
        self.cancel_context(task_id);
        if let Some(task) = &outcome.started_task {
            self.spawn_execution(task.clone());
        }
        Ok(outcome)
    }

    pub async fn resume(&self, task_id: &str) -> Result<Outcome, TaskManagerError> {
        let outcome = self.manager.resume(task_id).await?;
        if let Some(task) = &outcome.started_task {
            self.spawn_execution(task.clone());
        }
        Ok(outcome)
    }

    fn cancel_context(&self, task_id: &str) {
        if let Some(token) = self.contexts.lock().unwrap().remove(task_id) {
            token.cancel();
        }
    }

    /// Spawns a detached tokio task that drives one execution of `task`
    /// against the configured executor: deltas are drained in order through
    /// a single consumer so interleaved `AppendStepLog` calls stay ordered,
    /// and the result feeds back into `complete`/`fail` on the manager.
    fn spawn_execution(&self, task: Task) {
        let cancel = CancellationToken::new();
        self.contexts
            .lock()
            .unwrap()
            .insert(task.id.clone(), cancel.clone());

        let manager = self.manager.clone();
        let executor = self.executor.clone();
        let timeout = self.config.task_timeout;
        let task_id = task.id.clone();

        tokio::spawn(async move {
            let (delta_tx, mut delta_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
            let on_delta: DeltaSink = Arc::new(move |delta: String| {
                let _ = delta_tx.send(delta);
            });

            let drain_manager = manager.clone();
            let drain_task_id = task_id.clone();
            let drain_handle = tokio::spawn(async move {
                while let Some(delta) = delta_rx.recv().await {
                    let _ = drain_manager.append_step_log(&drain_task_id, &delta).await;
                }
            });

            let request = ExecutorRequest {
                task_id: task.id.clone(),
                session_id: task.session_id.clone(),
                intent_text: task.intent_text.clone(),
                summary: task.summary.clone(),
            };

            let run = executor.run(cancel.clone(), request, on_delta);
            let outcome = tokio::time::timeout(timeout, run).await;
            let _ = drain_handle.await;

            match outcome {
                Ok(Ok(response)) => {
                    let _ = manager.complete(&task_id, response.result).await;
                }
                Ok(Err(err)) => {
                    let _ = manager.fail(&task_id, err.to_string()).await;
                }
                Err(_elapsed) => {
                    let _ = manager.fail(&task_id, "execution timed out".to_string()).await;
                }
            }
        });
    }
}
